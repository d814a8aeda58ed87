//! Database connection management
//!
//! Provides the SQLite connection pool, embedded migrations and health checks.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::db::error::DbResult;

/// Type alias for the database connection pool
pub type DatabasePool = SqlitePool;

/// Database connection wrapper
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: DatabasePool,
}

impl DatabaseConnection {
    /// Create a new database connection from a connection string
    ///
    /// # Arguments
    /// * `database_url` - SQLite connection string (e.g., "sqlite://orderflow.db")
    ///
    /// File databases are created when missing.
    pub async fn new(database_url: &str) -> DbResult<Self> {
        Self::with_max_connections(database_url, 5).await
    }

    /// Create a new database connection with custom pool size
    ///
    /// # Arguments
    /// * `database_url` - SQLite connection string
    /// * `max_connections` - Maximum number of concurrent connections
    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        tracing::debug!("Opened database pool for {}", database_url);
        Ok(Self { pool })
    }

    /// Open a private in-memory database
    ///
    /// Every connection to `sqlite::memory:` is its own database, so the pool
    /// is pinned to a single connection that never expires.
    pub async fn in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Run the embedded migrations
    pub async fn run_migrations(&self) -> DbResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;

        Ok(())
    }

    /// Close the connection pool gracefully
    ///
    /// After this is called the connection cannot be used anymore.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
