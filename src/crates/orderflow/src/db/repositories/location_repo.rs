//! Warehouse location repository

use sqlx::{Executor, Sqlite};

use crate::db::models::{timestamp_now, WarehouseLocation};

/// Warehouse location repository
pub struct LocationRepository;

impl LocationRepository {
    /// Create a location under an optional parent
    pub async fn create<'e, E>(
        executor: E,
        code: &str,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<WarehouseLocation, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = timestamp_now();
        sqlx::query_as::<_, WarehouseLocation>(
            "INSERT INTO warehouse_locations (code, name, parent_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(code)
        .bind(name)
        .bind(parent_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(executor)
        .await
    }

    /// Get a location by ID
    pub async fn get_by_id<'e, E>(
        executor: E,
        id: i64,
    ) -> Result<Option<WarehouseLocation>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, WarehouseLocation>("SELECT * FROM warehouse_locations WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Direct children of a location, or the roots when `parent_id` is `None`
    pub async fn list_children<'e, E>(
        executor: E,
        parent_id: Option<i64>,
    ) -> Result<Vec<WarehouseLocation>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, WarehouseLocation>(
            "SELECT * FROM warehouse_locations WHERE parent_id IS ? ORDER BY code ASC",
        )
        .bind(parent_id)
        .fetch_all(executor)
        .await
    }

    /// Take the wizard lock if free or already held by `session_id`
    ///
    /// # Returns
    /// Whether the lock is now held by `session_id`
    pub async fn try_lock<'e, E>(
        executor: E,
        id: i64,
        session_id: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = timestamp_now();
        let result = sqlx::query(
            "UPDATE warehouse_locations
             SET wizard_locked = 1, wizard_lock_owner = ?,
                 wizard_locked_at = COALESCE(
                     CASE WHEN wizard_lock_owner = ? THEN wizard_locked_at END, ?),
                 updated_at = ?
             WHERE id = ? AND (wizard_locked = 0 OR wizard_lock_owner = ?)",
        )
        .bind(session_id)
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .bind(session_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Clear the wizard lock if held by `session_id`
    ///
    /// # Returns
    /// Whether a lock was released
    pub async fn unlock<'e, E>(executor: E, id: i64, session_id: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE warehouse_locations
             SET wizard_locked = 0, wizard_lock_owner = NULL, wizard_locked_at = NULL,
                 updated_at = ?
             WHERE id = ? AND wizard_locked = 1 AND wizard_lock_owner = ?",
        )
        .bind(timestamp_now())
        .bind(id)
        .bind(session_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Clear the wizard lock regardless of owner
    pub async fn force_unlock<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE warehouse_locations
             SET wizard_locked = 0, wizard_lock_owner = NULL, wizard_locked_at = NULL,
                 updated_at = ?
             WHERE id = ? AND wizard_locked = 1",
        )
        .bind(timestamp_now())
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Clear every wizard lock held by a session
    ///
    /// # Returns
    /// Number of locations released
    pub async fn unlock_session<'e, E>(executor: E, session_id: &str) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE warehouse_locations
             SET wizard_locked = 0, wizard_lock_owner = NULL, wizard_locked_at = NULL,
                 updated_at = ?
             WHERE wizard_locked = 1 AND wizard_lock_owner = ?",
        )
        .bind(timestamp_now())
        .bind(session_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::DatabaseConnection;

    async fn setup() -> DatabaseConnection {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        conn.run_migrations().await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_location_tree() {
        let db = setup().await;
        let root = LocationRepository::create(db.pool(), "A", "Aisle A", None).await.unwrap();
        LocationRepository::create(db.pool(), "A-02", "Rack 2", Some(root.id)).await.unwrap();
        LocationRepository::create(db.pool(), "A-01", "Rack 1", Some(root.id)).await.unwrap();

        let roots = LocationRepository::list_children(db.pool(), None).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].code, "A");

        let racks = LocationRepository::list_children(db.pool(), Some(root.id)).await.unwrap();
        let codes: Vec<_> = racks.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["A-01", "A-02"]);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_and_reentrant() {
        let db = setup().await;
        let loc = LocationRepository::create(db.pool(), "B", "Aisle B", None).await.unwrap();

        assert!(LocationRepository::try_lock(db.pool(), loc.id, "s1").await.unwrap());
        assert!(LocationRepository::try_lock(db.pool(), loc.id, "s1").await.unwrap());
        assert!(!LocationRepository::try_lock(db.pool(), loc.id, "s2").await.unwrap());

        assert!(!LocationRepository::unlock(db.pool(), loc.id, "s2").await.unwrap());
        assert!(LocationRepository::unlock(db.pool(), loc.id, "s1").await.unwrap());
        assert!(LocationRepository::try_lock(db.pool(), loc.id, "s2").await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_session_releases_all() {
        let db = setup().await;
        let a = LocationRepository::create(db.pool(), "C", "Aisle C", None).await.unwrap();
        let b = LocationRepository::create(db.pool(), "D", "Aisle D", None).await.unwrap();

        LocationRepository::try_lock(db.pool(), a.id, "s1").await.unwrap();
        LocationRepository::try_lock(db.pool(), b.id, "s1").await.unwrap();

        assert_eq!(LocationRepository::unlock_session(db.pool(), "s1").await.unwrap(), 2);
        let a = LocationRepository::get_by_id(db.pool(), a.id).await.unwrap().unwrap();
        assert!(!a.wizard_locked);
        assert_eq!(a.wizard_lock_owner, None);
    }
}
