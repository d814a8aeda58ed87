//! History ledger model

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One immutable ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
    pub id: i64,

    /// Owning entity (purchase request or production order, by table)
    pub entity_id: i64,

    /// What produced the row (see [`HistoryAction`])
    pub action: String,

    /// Status the entity moved into, or its unchanged status for notes and edits
    pub status: String,

    pub actor: String,
    pub notes: Option<String>,

    /// Server-assigned write time (RFC 3339)
    pub created_at: String,
}

/// Kind of ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryAction {
    Created,
    Transition,
    Reopen,
    CancellationRejected,
    Note,
    Edit,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::Transition => "transition",
            HistoryAction::Reopen => "reopen",
            HistoryAction::CancellationRejected => "cancellation-rejected",
            HistoryAction::Note => "note",
            HistoryAction::Edit => "edit",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
