//! Database models
//!
//! Row types for workflow entities, their history ledgers, per-kind settings
//! and warehouse locations. Timestamps are RFC 3339 strings and calendar
//! dates are `YYYY-MM-DD` strings (TEXT in SQLite).

pub mod entity;
pub mod history;
pub mod location;
pub mod settings;

pub use entity::WorkflowEntity;
pub use history::{HistoryAction, HistoryEntry};
pub use location::WarehouseLocation;
pub use settings::WorkflowSettingsRecord;

/// Current UTC time with fixed precision so text ordering matches time ordering
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
