//! Entity repository for purchase requests and production orders

use sqlx::{Executor, QueryBuilder, Sqlite};

use crate::db::models::WorkflowEntity;
use crate::workflow::payload::{non_blank, EntityFilter, ListView, NewEntity};
use crate::workflow::status::{EntityKind, Status};

/// Entity repository; the kind selects the table
pub struct EntityRepository;

impl EntityRepository {
    /// Insert a new entity in its initial status
    ///
    /// # Arguments
    /// * `executor` - Pool or open transaction
    /// * `kind` - Entity kind (selects the table)
    /// * `consecutive` - Reserved consecutive code
    /// * `new` - Validated subject fields
    /// * `required_date` - Normalized required date
    /// * `requested_by` - Creator
    /// * `now` - Write timestamp
    ///
    /// # Returns
    /// Created entity or database error
    #[allow(clippy::too_many_arguments)]
    pub async fn insert<'e, E>(
        executor: E,
        kind: EntityKind,
        consecutive: &str,
        new: &NewEntity,
        required_date: &str,
        initial: &Status,
        requested_by: &str,
        now: &str,
    ) -> Result<WorkflowEntity, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "INSERT INTO {} (consecutive, status, item, description, quantity, counterparty,
                 category, required_date, priority, notes, requested_by,
                 last_status_update_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
            kind.entity_table()
        );

        sqlx::query_as::<_, WorkflowEntity>(&sql)
            .bind(consecutive)
            .bind(initial.to_string())
            .bind(new.item.trim())
            .bind(non_blank(new.description.as_deref()))
            .bind(new.quantity)
            .bind(new.counterparty.trim())
            .bind(non_blank(new.category.as_deref()))
            .bind(required_date)
            .bind(non_blank(new.priority.as_deref()))
            .bind(non_blank(new.notes.as_deref()))
            .bind(requested_by)
            .bind(requested_by)
            .bind(now)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Get an entity by ID
    ///
    /// # Returns
    /// Entity if found, None if not found, or database error
    pub async fn get_by_id<'e, E>(
        executor: E,
        kind: EntityKind,
        id: i64,
    ) -> Result<Option<WorkflowEntity>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT * FROM {} WHERE id = ?", kind.entity_table());
        sqlx::query_as::<_, WorkflowEntity>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Get an entity by its consecutive code
    pub async fn get_by_consecutive<'e, E>(
        executor: E,
        kind: EntityKind,
        consecutive: &str,
    ) -> Result<Option<WorkflowEntity>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT * FROM {} WHERE consecutive = ?",
            kind.entity_table()
        );
        sqlx::query_as::<_, WorkflowEntity>(&sql)
            .bind(consecutive)
            .fetch_optional(executor)
            .await
    }

    /// List entities matching a filter, newest first
    ///
    /// Pagination is applied to the archived view only.
    pub async fn list<'e, E>(
        executor: E,
        kind: EntityKind,
        filter: &EntityFilter,
    ) -> Result<Vec<WorkflowEntity>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT * FROM {} WHERE 1 = 1", kind.entity_table()));
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, id DESC");

        if filter.view == ListView::Archived {
            if let Some(page) = filter.page {
                builder
                    .push(" LIMIT ")
                    .push_bind(i64::from(page.limit))
                    .push(" OFFSET ")
                    .push_bind(i64::from(page.offset));
            }
        }

        builder
            .build_query_as::<WorkflowEntity>()
            .fetch_all(executor)
            .await
    }

    /// Count entities matching a filter, ignoring pagination
    pub async fn count<'e, E>(
        executor: E,
        kind: EntityKind,
        filter: &EntityFilter,
    ) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT COUNT(*) FROM {} WHERE 1 = 1",
            kind.entity_table()
        ));
        push_filters(&mut builder, filter);

        let (count,) = builder
            .build_query_as::<(i64,)>()
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// Count entities currently holding a status
    pub async fn count_with_status<'e, E>(
        executor: E,
        kind: EntityKind,
        status: &Status,
    ) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE status = ? OR previous_status = ?",
            kind.entity_table()
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(status.to_string())
            .bind(status.to_string())
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    /// Persist the status-related columns of an entity
    ///
    /// Only the workflow engine calls this, inside the same transaction as the
    /// matching history append.
    pub async fn save_workflow_state<'e, E>(
        executor: E,
        kind: EntityKind,
        entity: &WorkflowEntity,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "UPDATE {} SET status = ?, previous_status = ?, approved_by = ?,
                 last_status_update_by = ?, last_status_update_notes = ?,
                 received_in_warehouse_by = ?, received_date = ?,
                 delivered_quantity = ?, defective_quantity = ?,
                 package_number = ?, ticket_number = ?, reopened = ?, updated_at = ?
             WHERE id = ?",
            kind.entity_table()
        );

        sqlx::query(&sql)
            .bind(&entity.status)
            .bind(&entity.previous_status)
            .bind(&entity.approved_by)
            .bind(&entity.last_status_update_by)
            .bind(&entity.last_status_update_notes)
            .bind(&entity.received_in_warehouse_by)
            .bind(&entity.received_date)
            .bind(entity.delivered_quantity)
            .bind(entity.defective_quantity)
            .bind(&entity.package_number)
            .bind(&entity.ticket_number)
            .bind(entity.reopened)
            .bind(&entity.updated_at)
            .bind(entity.id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Persist the non-status columns of an entity
    pub async fn save_details<'e, E>(
        executor: E,
        kind: EntityKind,
        entity: &WorkflowEntity,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "UPDATE {} SET description = ?, quantity = ?, category = ?, required_date = ?,
                 priority = ?, assigned_resource = ?, shift = ?, scheduled_start = ?,
                 scheduled_end = ?, notes = ?, modified_after_approval = ?, updated_at = ?
             WHERE id = ?",
            kind.entity_table()
        );

        sqlx::query(&sql)
            .bind(&entity.description)
            .bind(entity.quantity)
            .bind(&entity.category)
            .bind(&entity.required_date)
            .bind(&entity.priority)
            .bind(&entity.assigned_resource)
            .bind(&entity.shift)
            .bind(&entity.scheduled_start)
            .bind(&entity.scheduled_end)
            .bind(&entity.notes)
            .bind(entity.modified_after_approval)
            .bind(&entity.updated_at)
            .bind(entity.id)
            .execute(executor)
            .await?;

        Ok(())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &EntityFilter) {
    match filter.view {
        ListView::Active => {
            builder.push(" AND status NOT IN (");
            push_terminal_list(builder);
        }
        ListView::Archived => {
            builder.push(" AND status IN (");
            push_terminal_list(builder);
        }
        ListView::All => {}
    }

    if let Some(status) = &filter.status {
        builder.push(" AND status = ").push_bind(status.to_string());
    }

    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        builder.push(" AND category = ").push_bind(category.to_string());
    }

    if let Some(from) = &filter.from_date {
        builder.push(" AND required_date >= ").push_bind(from.clone());
    }

    if let Some(to) = &filter.to_date {
        builder.push(" AND required_date <= ").push_bind(to.clone());
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        builder.push(" AND (");
        let columns = ["consecutive", "item", "counterparty", "COALESCE(description, '')"];
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push(format!("LOWER({}) LIKE ", column))
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'");
        }
        builder.push(")");
    }
}

fn push_terminal_list(builder: &mut QueryBuilder<'_, Sqlite>) {
    let mut separated = builder.separated(", ");
    for status in Status::terminal_statuses() {
        separated.push_bind(status.to_string());
    }
    separated.push_unseparated(")");
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::DatabaseConnection;
    use crate::db::models::timestamp_now;

    async fn setup() -> DatabaseConnection {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        conn.run_migrations().await.unwrap();
        conn
    }

    async fn insert(conn: &DatabaseConnection, code: &str, counterparty: &str) -> WorkflowEntity {
        let new = NewEntity::new("Bolt M8", 100.0, counterparty, "2024-03-10");
        EntityRepository::insert(
            conn.pool(),
            EntityKind::PurchaseRequest,
            code,
            &new,
            "2024-03-10",
            &Status::PENDING,
            "maria",
            &timestamp_now(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let conn = setup().await;
        let created = insert(&conn, "SC-00001", "ACME").await;

        assert_eq!(created.consecutive, "SC-00001");
        assert_eq!(created.status, "pending");
        assert_eq!(created.requested_by, "maria");
        assert!(!created.reopened);

        let fetched = EntityRepository::get_by_id(
            conn.pool(),
            EntityKind::PurchaseRequest,
            created.id,
        )
        .await
        .unwrap();
        assert_eq!(fetched, Some(created.clone()));

        let by_code = EntityRepository::get_by_consecutive(
            conn.pool(),
            EntityKind::PurchaseRequest,
            "SC-00001",
        )
        .await
        .unwrap();
        assert_eq!(by_code.map(|e| e.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_kinds_use_separate_tables() {
        let conn = setup().await;
        let created = insert(&conn, "SC-00001", "ACME").await;

        let other = EntityRepository::get_by_id(
            conn.pool(),
            EntityKind::ProductionOrder,
            created.id,
        )
        .await
        .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_consecutive_is_rejected() {
        let conn = setup().await;
        insert(&conn, "SC-00001", "ACME").await;

        let new = NewEntity::new("Nut M8", 5.0, "ACME", "2024-03-10");
        let err = EntityRepository::insert(
            conn.pool(),
            EntityKind::PurchaseRequest,
            "SC-00001",
            &new,
            "2024-03-10",
            &Status::PENDING,
            "maria",
            &timestamp_now(),
        )
        .await
        .unwrap_err();

        let err: crate::db::DatabaseError = err.into();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let conn = setup().await;
        insert(&conn, "SC-00001", "100% Cotton").await;
        insert(&conn, "SC-00002", "Cotton Co").await;

        let filter = EntityFilter::all().with_search("100%");
        let found = EntityRepository::list(conn.pool(), EntityKind::PurchaseRequest, &filter)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].counterparty, "100% Cotton");

        let filter = EntityFilter::all().with_search("cotton");
        let count = EntityRepository::count(conn.pool(), EntityKind::PurchaseRequest, &filter)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c\\"), "a\\_b\\%c\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
