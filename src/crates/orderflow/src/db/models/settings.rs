//! Workflow settings row

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Raw `workflow_settings` row; list-valued columns hold JSON text
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowSettingsRecord {
    /// Entity kind key (`purchase_request`, `production_order`)
    pub kind: String,

    pub next_sequence: i64,
    pub warehouse_step_enabled: bool,
    pub require_assignment_before_start: bool,

    /// JSON object: status string -> { label, color }
    pub status_aliases: String,

    /// JSON array of { id, label, color }
    pub custom_statuses: String,

    /// JSON array of machine names
    pub machines: String,

    /// JSON array of shift names
    pub shifts: String,

    pub updated_at: String,
}
