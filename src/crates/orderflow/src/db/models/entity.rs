//! Workflow entity model for database persistence

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;
use crate::workflow::status::Status;

/// A purchase request or production order row
///
/// Both kinds share one column layout; the kind is implied by the table the
/// row was read from. Status changes go through the workflow engine only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowEntity {
    /// System-assigned identifier
    pub id: i64,

    /// Human-readable code such as `SC-00001`, immutable after creation
    pub consecutive: String,

    /// Current status (builtin slug or `custom:<id>`)
    pub status: String,

    pub item: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub delivered_quantity: Option<f64>,
    pub defective_quantity: Option<f64>,

    /// Client or customer
    pub counterparty: String,

    /// Classification used for filtering
    pub category: Option<String>,

    /// Required or delivery date (YYYY-MM-DD)
    pub required_date: String,

    pub priority: Option<String>,

    /// Machine or other resource assigned to the work
    pub assigned_resource: Option<String>,
    pub shift: Option<String>,
    pub scheduled_start: Option<String>,
    pub scheduled_end: Option<String>,
    pub notes: Option<String>,

    /// Creator, immutable
    pub requested_by: String,

    /// Set the first time the entity is approved, never cleared
    pub approved_by: Option<String>,

    pub last_status_update_by: Option<String>,
    pub last_status_update_notes: Option<String>,
    pub received_in_warehouse_by: Option<String>,
    pub received_date: Option<String>,
    pub package_number: Option<String>,
    pub ticket_number: Option<String>,

    /// Sticky once an entity has been reopened
    pub reopened: bool,

    /// Sticky once approval-sensitive details changed after approval
    pub modified_after_approval: bool,

    /// Status to restore when a cancellation request is rejected
    pub previous_status: Option<String>,

    pub created_at: String,
    pub updated_at: String,
}

impl WorkflowEntity {
    /// Parsed current status
    pub fn current_status(&self) -> Result<Status> {
        Status::parse(&self.status)
    }

    /// Parsed reversal status
    pub fn previous(&self) -> Result<Option<Status>> {
        self.previous_status
            .as_deref()
            .map(Status::parse)
            .transpose()
    }

    /// Terminal entities belong to the archived view
    pub fn is_archived(&self) -> bool {
        Status::parse(&self.status)
            .map(|s| s.is_terminal())
            .unwrap_or(false)
    }
}
