//! Per-kind workflow settings
//!
//! Feature toggles, status aliases, admin-defined custom statuses and the
//! machine/shift catalogs of the production order domain.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::models::WorkflowSettingsRecord;
use crate::error::{Result, WorkflowError};
use crate::workflow::status::{BuiltinStatus, EntityKind, Status};

/// Display override for a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAlias {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Admin-defined status (production orders only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomStatus {
    /// Slug stored as `custom:<id>`
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CustomStatus {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            color: None,
        }
    }

    pub fn status(&self) -> Status {
        Status::custom(self.id.clone())
    }
}

/// Typed view of a `workflow_settings` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub kind: EntityKind,
    /// Next consecutive number; only advanced by sequence reservation
    pub next_sequence: i64,
    /// Whether the received-in-warehouse step exists
    pub warehouse_step_enabled: bool,
    /// Production orders need an assigned machine before starting
    pub require_assignment_before_start: bool,
    /// Keyed by persisted status string
    #[serde(default)]
    pub status_aliases: BTreeMap<String, StatusAlias>,
    #[serde(default)]
    pub custom_statuses: Vec<CustomStatus>,
    #[serde(default)]
    pub machines: Vec<String>,
    #[serde(default)]
    pub shifts: Vec<String>,
}

impl WorkflowSettings {
    /// Settings of a freshly migrated database
    pub fn defaults(kind: EntityKind) -> Self {
        Self {
            kind,
            next_sequence: 1,
            warehouse_step_enabled: true,
            require_assignment_before_start: false,
            status_aliases: BTreeMap::new(),
            custom_statuses: Vec::new(),
            machines: Vec::new(),
            shifts: Vec::new(),
        }
    }

    pub fn from_record(record: &WorkflowSettingsRecord) -> Result<Self> {
        Ok(Self {
            kind: record.kind.parse()?,
            next_sequence: record.next_sequence,
            warehouse_step_enabled: record.warehouse_step_enabled,
            require_assignment_before_start: record.require_assignment_before_start,
            status_aliases: serde_json::from_str(&record.status_aliases)?,
            custom_statuses: serde_json::from_str(&record.custom_statuses)?,
            machines: serde_json::from_str(&record.machines)?,
            shifts: serde_json::from_str(&record.shifts)?,
        })
    }

    pub fn custom_status(&self, id: &str) -> Option<&CustomStatus> {
        self.custom_statuses.iter().find(|c| c.id == id)
    }

    /// Whether the status belongs to this kind's enumeration
    pub fn is_configured_custom(&self, status: &Status) -> bool {
        match status {
            Status::Custom(id) => self.custom_status(id).is_some(),
            Status::Builtin(_) => false,
        }
    }

    /// Alias label, then custom label, then the builtin default
    pub fn label_for(&self, status: &Status) -> String {
        if let Some(alias) = self.status_aliases.get(&status.to_string()) {
            return alias.label.clone();
        }
        match status {
            Status::Builtin(b) => b.default_label().to_string(),
            Status::Custom(id) => self
                .custom_status(id)
                .map(|c| c.label.clone())
                .unwrap_or_else(|| id.clone()),
        }
    }

    pub fn color_for(&self, status: &Status) -> Option<String> {
        if let Some(color) = self
            .status_aliases
            .get(&status.to_string())
            .and_then(|alias| alias.color.clone())
        {
            return Some(color);
        }
        match status {
            Status::Custom(id) => self.custom_status(id).and_then(|c| c.color.clone()),
            Status::Builtin(_) => None,
        }
    }

    /// Structural checks that do not need the database
    pub fn validate(&self) -> Result<()> {
        if self.kind == EntityKind::PurchaseRequest {
            if !self.custom_statuses.is_empty() {
                return Err(WorkflowError::validation(
                    "custom statuses are only supported for production orders",
                ));
            }
            if !self.machines.is_empty() || !self.shifts.is_empty() {
                return Err(WorkflowError::validation(
                    "machine and shift catalogs are only supported for production orders",
                ));
            }
        }

        let slug = Regex::new(r"^[a-z0-9][a-z0-9-]*$")
            .map_err(|e| WorkflowError::Config(e.to_string()))?;
        let mut seen = BTreeSet::new();
        for custom in &self.custom_statuses {
            if !slug.is_match(&custom.id) {
                return Err(WorkflowError::validation(format!(
                    "custom status id '{}' must be a lowercase slug",
                    custom.id
                )));
            }
            if BuiltinStatus::ALL.iter().any(|b| b.as_str() == custom.id) {
                return Err(WorkflowError::validation(format!(
                    "custom status id '{}' collides with a builtin status",
                    custom.id
                )));
            }
            if custom.label.trim().is_empty() {
                return Err(WorkflowError::validation(format!(
                    "custom status '{}' needs a label",
                    custom.id
                )));
            }
            if !seen.insert(custom.id.as_str()) {
                return Err(WorkflowError::validation(format!(
                    "duplicate custom status id '{}'",
                    custom.id
                )));
            }
        }

        for key in self.status_aliases.keys() {
            Status::parse(key)?;
        }

        Ok(())
    }
}
