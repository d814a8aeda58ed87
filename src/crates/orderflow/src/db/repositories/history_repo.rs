//! History ledger repository
//!
//! Append-only: there is deliberately no update or delete, and the tables
//! carry triggers that abort either statement.

use sqlx::{Executor, Sqlite};

use crate::db::models::{timestamp_now, HistoryAction, HistoryEntry};
use crate::workflow::status::{EntityKind, Status};

/// History repository for the per-kind ledgers
pub struct HistoryRepository;

impl HistoryRepository {
    /// Append one ledger row stamped with the current time
    ///
    /// # Arguments
    /// * `executor` - Pool or open transaction
    /// * `kind` - Entity kind (selects the ledger)
    /// * `entity_id` - Owning entity; must exist
    /// * `action` - What produced the row
    /// * `status` - Status recorded on the row
    /// * `actor` - Who performed the action
    /// * `notes` - Optional free text
    pub async fn append<'e, E>(
        executor: E,
        kind: EntityKind,
        entity_id: i64,
        action: HistoryAction,
        status: &Status,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<HistoryEntry, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "INSERT INTO {} (entity_id, action, status, actor, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
            kind.history_table()
        );

        sqlx::query_as::<_, HistoryEntry>(&sql)
            .bind(entity_id)
            .bind(action.as_str())
            .bind(status.to_string())
            .bind(actor)
            .bind(notes)
            .bind(timestamp_now())
            .fetch_one(executor)
            .await
    }

    /// All rows of one entity, newest first
    pub async fn list_for_entity<'e, E>(
        executor: E,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<Vec<HistoryEntry>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT * FROM {} WHERE entity_id = ? ORDER BY created_at DESC, id DESC",
            kind.history_table()
        );
        sqlx::query_as::<_, HistoryEntry>(&sql)
            .bind(entity_id)
            .fetch_all(executor)
            .await
    }

    /// Number of rows recorded for one entity
    pub async fn count_for_entity<'e, E>(
        executor: E,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE entity_id = ?",
            kind.history_table()
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(entity_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
