//! Workflow engine
//!
//! The only path that changes an entity's status. Each operation runs in its
//! own transaction: the entity update and its history row are committed
//! together or not at all. Settings are read inside that transaction, so
//! admin changes take effect on the next call.

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::db::models::{timestamp_now, HistoryAction, HistoryEntry, WorkflowEntity};
use crate::db::repositories::{EntityRepository, HistoryRepository, SettingsRepository};
use crate::db::DatabasePool;
use crate::error::{Result, WorkflowError};
use crate::notify::{NotificationEvent, Notifier, TracingNotifier};
use crate::workflow::definition::WorkflowDefinition;
use crate::workflow::payload::{
    non_blank, parse_date, DetailPatch, EntityFilter, NewEntity, TransitionPayload,
};
use crate::workflow::settings::WorkflowSettings;
use crate::workflow::status::{EntityKind, Status};

/// Status workflow engine for purchase requests and production orders
#[derive(Clone)]
pub struct WorkflowEngine {
    pool: DatabasePool,
    notifier: Arc<dyn Notifier>,
    link_base: String,
}

impl WorkflowEngine {
    /// Create an engine that logs notifications through tracing
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            notifier: Arc::new(TracingNotifier),
            link_base: String::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Prefix for notification links, e.g. `https://erp.example.com`
    pub fn with_link_base(mut self, link_base: impl Into<String>) -> Self {
        self.link_base = link_base.into();
        self
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Create an entity in the initial status
    ///
    /// The sequence number is reserved and committed before the entity is
    /// written, so a failed insert leaves a gap and never a reused code.
    pub async fn create(
        &self,
        kind: EntityKind,
        new: &NewEntity,
        created_by: &str,
    ) -> Result<WorkflowEntity> {
        let actor = require_actor(created_by)?;
        let required_date = new.validate()?;

        let sequence = {
            let mut conn = self.pool.acquire().await?;
            SettingsRepository::reserve_sequence(&mut conn, kind).await?
        };
        let consecutive = kind.consecutive_code(sequence);

        let mut tx = self.pool.begin().await?;
        let settings = load_settings(&mut tx, kind).await?;
        let definition = WorkflowDefinition::for_kind(kind, &settings);
        let now = timestamp_now();

        let entity = EntityRepository::insert(
            &mut *tx,
            kind,
            &consecutive,
            new,
            &required_date,
            &definition.initial,
            actor,
            &now,
        )
        .await?;

        HistoryRepository::append(
            &mut *tx,
            kind,
            entity.id,
            HistoryAction::Created,
            &definition.initial,
            actor,
            Some("created"),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            kind = %kind,
            id = entity.id,
            consecutive = %entity.consecutive,
            actor = %actor,
            "Created {}",
            kind.label()
        );
        Ok(entity)
    }

    /// Get an entity by ID
    pub async fn get_by_id(&self, kind: EntityKind, id: i64) -> Result<WorkflowEntity> {
        tracing::debug!(kind = %kind, id, "Loading entity");
        EntityRepository::get_by_id(&self.pool, kind, id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(kind.label(), id))
    }

    /// Look an entity up by its consecutive code
    pub async fn find_by_consecutive(
        &self,
        kind: EntityKind,
        consecutive: &str,
    ) -> Result<Option<WorkflowEntity>> {
        tracing::debug!(kind = %kind, consecutive = %consecutive, "Looking up entity");
        Ok(EntityRepository::get_by_consecutive(&self.pool, kind, consecutive.trim()).await?)
    }

    /// List entities, newest first
    pub async fn list(
        &self,
        kind: EntityKind,
        filter: &EntityFilter,
    ) -> Result<Vec<WorkflowEntity>> {
        let filter = filter.normalized()?;
        tracing::debug!(kind = %kind, view = ?filter.view, "Listing entities");
        Ok(EntityRepository::list(&self.pool, kind, &filter).await?)
    }

    /// Count entities matching a filter, ignoring pagination
    pub async fn count(&self, kind: EntityKind, filter: &EntityFilter) -> Result<i64> {
        let filter = filter.normalized()?;
        Ok(EntityRepository::count(&self.pool, kind, &filter).await?)
    }

    /// Statuses reachable from the entity's current status
    pub async fn allowed_transitions(&self, kind: EntityKind, id: i64) -> Result<Vec<Status>> {
        let mut conn = self.pool.acquire().await?;
        let settings = load_settings(&mut conn, kind).await?;
        let entity = fetch(&mut conn, kind, id).await?;

        let definition = WorkflowDefinition::for_kind(kind, &settings);
        Ok(definition.targets_from(&entity.current_status()?))
    }

    /// Move an entity to `target`
    ///
    /// # Errors
    /// * `NotFound` - unknown id
    /// * `InvalidTransition` - target not reachable from the current status
    /// * `Validation` - payload misses what the target status requires
    pub async fn transition(
        &self,
        kind: EntityKind,
        id: i64,
        target: &Status,
        payload: &TransitionPayload,
        actor: &str,
    ) -> Result<WorkflowEntity> {
        let actor = require_actor(actor)?;

        let mut tx = self.pool.begin().await?;
        let settings = load_settings(&mut tx, kind).await?;
        let entity = fetch(&mut tx, kind, id).await?;

        let definition = WorkflowDefinition::for_kind(kind, &settings);
        let now = timestamp_now();
        let next = definition.apply(&entity, target, payload, actor, &now)?;

        EntityRepository::save_workflow_state(&mut *tx, kind, &next).await?;
        HistoryRepository::append(
            &mut *tx,
            kind,
            id,
            HistoryAction::Transition,
            target,
            actor,
            payload.notes(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            kind = %kind,
            id,
            from = %entity.status,
            to = %target,
            actor = %actor,
            "Status changed"
        );
        self.notify_requester(kind, &next, &settings, actor).await;
        Ok(next)
    }

    /// Send a terminal entity back to pending
    pub async fn reopen(
        &self,
        kind: EntityKind,
        id: i64,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<WorkflowEntity> {
        let actor = require_actor(actor)?;

        let mut tx = self.pool.begin().await?;
        let settings = load_settings(&mut tx, kind).await?;
        let entity = fetch(&mut tx, kind, id).await?;

        let definition = WorkflowDefinition::for_kind(kind, &settings);
        let now = timestamp_now();
        let next = definition.reopen(&entity, actor, notes, &now)?;

        EntityRepository::save_workflow_state(&mut *tx, kind, &next).await?;
        HistoryRepository::append(
            &mut *tx,
            kind,
            id,
            HistoryAction::Reopen,
            &definition.initial,
            actor,
            Some(non_blank(notes).unwrap_or("reopened")),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(kind = %kind, id, from = %entity.status, actor = %actor, "Reopened");
        self.notify_requester(kind, &next, &settings, actor).await;
        Ok(next)
    }

    /// Turn down a cancellation request, restoring the status held before it
    pub async fn reject_cancellation(
        &self,
        kind: EntityKind,
        id: i64,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<WorkflowEntity> {
        let actor = require_actor(actor)?;

        let mut tx = self.pool.begin().await?;
        let settings = load_settings(&mut tx, kind).await?;
        let entity = fetch(&mut tx, kind, id).await?;

        let definition = WorkflowDefinition::for_kind(kind, &settings);
        let now = timestamp_now();
        let next = definition.reject_cancellation(&entity, actor, notes, &now)?;
        let restored = next.current_status()?;

        EntityRepository::save_workflow_state(&mut *tx, kind, &next).await?;
        HistoryRepository::append(
            &mut *tx,
            kind,
            id,
            HistoryAction::CancellationRejected,
            &restored,
            actor,
            non_blank(notes),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            kind = %kind,
            id,
            restored = %restored,
            actor = %actor,
            "Cancellation rejected"
        );
        self.notify_requester(kind, &next, &settings, actor).await;
        Ok(next)
    }

    /// Record a note without changing the status
    pub async fn add_note(
        &self,
        kind: EntityKind,
        id: i64,
        actor: &str,
        notes: &str,
    ) -> Result<HistoryEntry> {
        let actor = require_actor(actor)?;
        let notes = non_blank(Some(notes))
            .ok_or_else(|| WorkflowError::validation("notes must not be empty"))?;

        let mut tx = self.pool.begin().await?;
        let entity = fetch(&mut tx, kind, id).await?;
        let entry = HistoryRepository::append(
            &mut *tx,
            kind,
            id,
            HistoryAction::Note,
            &entity.current_status()?,
            actor,
            Some(notes),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(kind = %kind, id, actor = %actor, "Note added");
        Ok(entry)
    }

    /// Edit non-status fields
    ///
    /// Terminal entities are read-only until reopened. Changing an
    /// approval-sensitive field after approval marks the entity as modified
    /// since approval; the flag never clears. Every effective edit appends an
    /// `edit` history row naming the changed fields.
    pub async fn update_details(
        &self,
        kind: EntityKind,
        id: i64,
        patch: &DetailPatch,
        actor: &str,
    ) -> Result<WorkflowEntity> {
        let actor = require_actor(actor)?;
        if patch.is_empty() {
            return Err(WorkflowError::validation("no fields to update"));
        }

        let mut tx = self.pool.begin().await?;
        let settings = load_settings(&mut tx, kind).await?;
        let entity = fetch(&mut tx, kind, id).await?;
        let status = entity.current_status()?;
        if status.is_terminal() {
            return Err(WorkflowError::InvalidState(format!(
                "{} is {} and cannot be edited; reopen it first",
                entity.consecutive, status
            )));
        }

        let mut next = entity.clone();
        let changes = apply_patch(&mut next, patch, &settings)?;
        if changes.is_empty() {
            tracing::debug!(kind = %kind, id, "Detail patch changed nothing");
            return Ok(entity);
        }

        let sensitive = changes.iter().any(|field| APPROVAL_SENSITIVE.contains(field));
        if sensitive && next.approved_by.is_some() && status != Status::PENDING {
            next.modified_after_approval = true;
        }
        next.updated_at = timestamp_now();

        EntityRepository::save_details(&mut *tx, kind, &next).await?;
        let summary = format!("edited: {}", changes.join(", "));
        HistoryRepository::append(
            &mut *tx,
            kind,
            id,
            HistoryAction::Edit,
            &status,
            actor,
            Some(&summary),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            kind = %kind,
            id,
            actor = %actor,
            fields = %changes.join(","),
            "Details updated"
        );
        Ok(next)
    }

    /// History of an entity, newest first
    pub async fn history(&self, kind: EntityKind, id: i64) -> Result<Vec<HistoryEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, kind, id).await?;
        Ok(HistoryRepository::list_for_entity(&mut *conn, kind, id).await?)
    }

    /// Current settings of a kind
    pub async fn settings(&self, kind: EntityKind) -> Result<WorkflowSettings> {
        let mut conn = self.pool.acquire().await?;
        load_settings(&mut conn, kind).await
    }

    /// Replace the settings of a kind; the sequence counter is left alone
    pub async fn update_settings(
        &self,
        kind: EntityKind,
        mut settings: WorkflowSettings,
        actor: &str,
    ) -> Result<WorkflowSettings> {
        let actor = require_actor(actor)?;
        settings.kind = kind;
        settings.validate()?;

        let mut tx = self.pool.begin().await?;
        let current = load_settings(&mut tx, kind).await?;

        for removed in current
            .custom_statuses
            .iter()
            .filter(|c| settings.custom_status(&c.id).is_none())
        {
            let held =
                EntityRepository::count_with_status(&mut *tx, kind, &removed.status()).await?;
            if held > 0 {
                return Err(WorkflowError::validation(format!(
                    "custom status '{}' is still used by {} entities",
                    removed.id, held
                )));
            }
        }

        SettingsRepository::save(&mut *tx, &settings).await?;
        let saved = load_settings(&mut tx, kind).await?;
        tx.commit().await?;

        tracing::info!(kind = %kind, actor = %actor, "Workflow settings updated");
        Ok(saved)
    }

    async fn notify_requester(
        &self,
        kind: EntityKind,
        entity: &WorkflowEntity,
        settings: &WorkflowSettings,
        actor: &str,
    ) {
        if entity.requested_by == actor {
            return;
        }

        let label = entity
            .current_status()
            .map(|status| settings.label_for(&status))
            .unwrap_or_else(|_| entity.status.clone());
        let event = NotificationEvent {
            target_user_id: entity.requested_by.clone(),
            message: format!("{} is now {} ({})", entity.consecutive, label, actor),
            link: entity_link(&self.link_base, kind, entity.id),
        };

        if let Err(e) = self.notifier.notify(&event).await {
            tracing::warn!(
                kind = %kind,
                id = entity.id,
                target_user = %event.target_user_id,
                "Failed to deliver notification: {}",
                e
            );
        }
    }
}

/// Fields whose change after approval raises the modified-since-approval flag
const APPROVAL_SENSITIVE: &[&str] = &[
    "quantity",
    "required_date",
    "priority",
    "assigned_resource",
    "scheduled_start",
    "scheduled_end",
];

fn require_actor(actor: &str) -> Result<&str> {
    non_blank(Some(actor)).ok_or_else(|| WorkflowError::validation("actor is required"))
}

async fn load_settings(conn: &mut SqliteConnection, kind: EntityKind) -> Result<WorkflowSettings> {
    let record = SettingsRepository::load(conn, kind).await?;
    WorkflowSettings::from_record(&record)
}

async fn fetch(conn: &mut SqliteConnection, kind: EntityKind, id: i64) -> Result<WorkflowEntity> {
    EntityRepository::get_by_id(&mut *conn, kind, id)
        .await?
        .ok_or_else(|| WorkflowError::not_found(kind.label(), id))
}

fn entity_link(base: &str, kind: EntityKind, id: i64) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), kind.route(), id)
}

/// Copy a patch onto an entity; returns the names of fields that changed
fn apply_patch(
    entity: &mut WorkflowEntity,
    patch: &DetailPatch,
    settings: &WorkflowSettings,
) -> Result<Vec<&'static str>> {
    let mut changes = Vec::new();

    if let Some(description) = &patch.description {
        let value = non_blank(Some(description)).map(str::to_string);
        if value != entity.description {
            entity.description = value;
            changes.push("description");
        }
    }

    if let Some(quantity) = patch.quantity {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(WorkflowError::validation("quantity must be greater than zero"));
        }
        if quantity != entity.quantity {
            entity.quantity = quantity;
            changes.push("quantity");
        }
    }

    if let Some(category) = &patch.category {
        let value = non_blank(Some(category)).map(str::to_string);
        if value != entity.category {
            entity.category = value;
            changes.push("category");
        }
    }

    if let Some(required_date) = &patch.required_date {
        let value = parse_date("required date", required_date)?;
        if value != entity.required_date {
            entity.required_date = value;
            changes.push("required_date");
        }
    }

    if let Some(priority) = &patch.priority {
        let value = non_blank(Some(priority)).map(str::to_string);
        if value != entity.priority {
            entity.priority = value;
            changes.push("priority");
        }
    }

    if let Some(resource) = &patch.assigned_resource {
        let value = non_blank(Some(resource)).map(str::to_string);
        if let Some(machine) = value.as_deref() {
            if !settings.machines.iter().any(|m| m == machine) {
                return Err(WorkflowError::validation(format!(
                    "'{}' is not a configured machine",
                    machine
                )));
            }
        }
        if value != entity.assigned_resource {
            entity.assigned_resource = value;
            changes.push("assigned_resource");
        }
    }

    if let Some(shift) = &patch.shift {
        let value = non_blank(Some(shift)).map(str::to_string);
        if let Some(name) = value.as_deref() {
            if !settings.shifts.iter().any(|s| s == name) {
                return Err(WorkflowError::validation(format!(
                    "'{}' is not a configured shift",
                    name
                )));
            }
        }
        if value != entity.shift {
            entity.shift = value;
            changes.push("shift");
        }
    }

    if let Some(start) = &patch.scheduled_start {
        let value = optional_date("scheduled start", start)?;
        if value != entity.scheduled_start {
            entity.scheduled_start = value;
            changes.push("scheduled_start");
        }
    }

    if let Some(end) = &patch.scheduled_end {
        let value = optional_date("scheduled end", end)?;
        if value != entity.scheduled_end {
            entity.scheduled_end = value;
            changes.push("scheduled_end");
        }
    }

    if let (Some(start), Some(end)) = (&entity.scheduled_start, &entity.scheduled_end) {
        if start > end {
            return Err(WorkflowError::validation(
                "scheduled start must not be after scheduled end",
            ));
        }
    }

    if let Some(notes) = &patch.notes {
        let value = non_blank(Some(notes)).map(str::to_string);
        if value != entity.notes {
            entity.notes = value;
            changes.push("notes");
        }
    }

    Ok(changes)
}

/// Blank clears the date
fn optional_date(field: &str, value: &str) -> Result<Option<String>> {
    match non_blank(Some(value)) {
        Some(date) => parse_date(field, date).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_link() {
        assert_eq!(
            entity_link("", EntityKind::ProductionOrder, 7),
            "/production-orders/7"
        );
        assert_eq!(
            entity_link("https://erp.example.com/", EntityKind::PurchaseRequest, 3),
            "https://erp.example.com/purchase-requests/3"
        );
    }

    #[test]
    fn test_require_actor() {
        assert_eq!(require_actor(" alice ").unwrap(), "alice");
        assert!(require_actor("   ").unwrap_err().is_validation());
    }

    #[test]
    fn test_optional_date() {
        assert_eq!(optional_date("start", "").unwrap(), None);
        assert_eq!(
            optional_date("start", "2024-03-01").unwrap().as_deref(),
            Some("2024-03-01")
        );
        assert!(optional_date("start", "03/01/2024").is_err());
    }
}
