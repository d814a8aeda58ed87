//! Database module
//!
//! Provides database connectivity, models, repositories, and error handling
//! for workflow entities, their history ledgers, settings and locations.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{DatabaseConnection, DatabasePool};
pub use error::{DatabaseError, DbResult};
