//! Workflow settings repository

use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::db::error::{DatabaseError, DbResult};
use crate::db::models::{timestamp_now, WorkflowSettingsRecord};
use crate::workflow::settings::WorkflowSettings;
use crate::workflow::status::EntityKind;

/// Settings repository: one row per entity kind
pub struct SettingsRepository;

impl SettingsRepository {
    /// Load the settings row of a kind, creating the default row when missing
    pub async fn load(
        conn: &mut SqliteConnection,
        kind: EntityKind,
    ) -> Result<WorkflowSettingsRecord, sqlx::Error> {
        let existing = sqlx::query_as::<_, WorkflowSettingsRecord>(
            "SELECT * FROM workflow_settings WHERE kind = ?",
        )
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(record) = existing {
            return Ok(record);
        }

        tracing::info!("Creating default workflow settings for {}", kind);
        sqlx::query_as::<_, WorkflowSettingsRecord>(
            "INSERT INTO workflow_settings (kind, updated_at) VALUES (?, ?) RETURNING *",
        )
        .bind(kind.as_str())
        .bind(timestamp_now())
        .fetch_one(&mut *conn)
        .await
    }

    /// Persist everything except the sequence counter
    pub async fn save<'e, E>(executor: E, settings: &WorkflowSettings) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let aliases = encode_json(&settings.status_aliases)?;
        let custom = encode_json(&settings.custom_statuses)?;
        let machines = encode_json(&settings.machines)?;
        let shifts = encode_json(&settings.shifts)?;

        let result = sqlx::query(
            "UPDATE workflow_settings
             SET warehouse_step_enabled = ?, require_assignment_before_start = ?,
                 status_aliases = ?, custom_statuses = ?, machines = ?, shifts = ?,
                 updated_at = ?
             WHERE kind = ?",
        )
        .bind(settings.warehouse_step_enabled)
        .bind(settings.require_assignment_before_start)
        .bind(aliases)
        .bind(custom)
        .bind(machines)
        .bind(shifts)
        .bind(timestamp_now())
        .bind(settings.kind.as_str())
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found(format!(
                "workflow_settings kind={}",
                settings.kind
            )));
        }

        Ok(())
    }

    /// Take the next sequence number and advance the counter
    ///
    /// A single statement, so two callers never receive the same number.
    /// Callers commit this on its own; a failed creation afterwards leaves a
    /// gap rather than a reused number.
    pub async fn reserve_sequence(
        conn: &mut SqliteConnection,
        kind: EntityKind,
    ) -> Result<i64, sqlx::Error> {
        Self::load(&mut *conn, kind).await?;

        let (reserved,): (i64,) = sqlx::query_as(
            "UPDATE workflow_settings
             SET next_sequence = next_sequence + 1
             WHERE kind = ?
             RETURNING next_sequence - 1",
        )
        .bind(kind.as_str())
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!("Reserved sequence {} for {}", reserved, kind);
        Ok(reserved)
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string(value)
        .map_err(|e| DatabaseError::type_error(format!("settings column: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::DatabaseConnection;
    use crate::workflow::settings::CustomStatus;

    async fn setup() -> DatabaseConnection {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        conn.run_migrations().await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_seeded_defaults() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let record = SettingsRepository::load(&mut conn, EntityKind::PurchaseRequest)
            .await
            .unwrap();
        let settings = WorkflowSettings::from_record(&record).unwrap();
        assert_eq!(settings, WorkflowSettings::defaults(EntityKind::PurchaseRequest));
    }

    #[tokio::test]
    async fn test_missing_row_is_recreated() {
        let db = setup().await;
        sqlx::query("DELETE FROM workflow_settings")
            .execute(db.pool())
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let record = SettingsRepository::load(&mut conn, EntityKind::ProductionOrder)
            .await
            .unwrap();
        assert_eq!(record.kind, "production_order");
        assert_eq!(record.next_sequence, 1);
    }

    #[tokio::test]
    async fn test_reserve_sequence_is_monotonic_per_kind() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = SettingsRepository::reserve_sequence(&mut conn, EntityKind::PurchaseRequest)
            .await
            .unwrap();
        let b = SettingsRepository::reserve_sequence(&mut conn, EntityKind::PurchaseRequest)
            .await
            .unwrap();
        let other = SettingsRepository::reserve_sequence(&mut conn, EntityKind::ProductionOrder)
            .await
            .unwrap();

        assert_eq!((a, b), (1, 2));
        assert_eq!(other, 1);
    }

    #[tokio::test]
    async fn test_save_keeps_counter() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        SettingsRepository::reserve_sequence(&mut conn, EntityKind::ProductionOrder)
            .await
            .unwrap();

        let mut settings = WorkflowSettings::defaults(EntityKind::ProductionOrder);
        settings.next_sequence = 1;
        settings.machines = vec!["Press-1".to_string()];
        settings.custom_statuses = vec![CustomStatus::new("painting", "Painting")];
        SettingsRepository::save(&mut *conn, &settings).await.unwrap();

        let record = SettingsRepository::load(&mut conn, EntityKind::ProductionOrder)
            .await
            .unwrap();
        let reloaded = WorkflowSettings::from_record(&record).unwrap();
        assert_eq!(reloaded.next_sequence, 2);
        assert_eq!(reloaded.machines, vec!["Press-1"]);
        assert_eq!(reloaded.custom_statuses.len(), 1);
    }

    #[tokio::test]
    async fn test_save_without_row_is_not_found() {
        let db = setup().await;
        sqlx::query("DELETE FROM workflow_settings WHERE kind = ?")
            .bind(EntityKind::PurchaseRequest.as_str())
            .execute(db.pool())
            .await
            .unwrap();

        let settings = WorkflowSettings::defaults(EntityKind::PurchaseRequest);
        let err = SettingsRepository::save(db.pool(), &settings).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
