//! Inputs accepted by the workflow engine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};
use crate::workflow::status::Status;

/// Subject fields of a new purchase request or production order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntity {
    pub item: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: f64,
    pub counterparty: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Required or delivery date (YYYY-MM-DD)
    #[serde(default)]
    pub required_date: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewEntity {
    pub fn new(
        item: impl Into<String>,
        quantity: f64,
        counterparty: impl Into<String>,
        required_date: impl Into<String>,
    ) -> Self {
        Self {
            item: item.into(),
            quantity,
            counterparty: counterparty.into(),
            required_date: Some(required_date.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Check required subject fields; returns the normalized required date
    pub fn validate(&self) -> Result<String> {
        if self.item.trim().is_empty() {
            return Err(WorkflowError::validation("item is required"));
        }
        if self.counterparty.trim().is_empty() {
            return Err(WorkflowError::validation("counterparty is required"));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(WorkflowError::validation("quantity must be greater than zero"));
        }
        let required_date = self
            .required_date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| WorkflowError::validation("required date is required"))?;
        parse_date("required date", required_date)
    }
}

/// Optional fields accompanying a status change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub delivered_quantity: Option<f64>,
    #[serde(default)]
    pub defective_quantity: Option<f64>,
    #[serde(default)]
    pub package_number: Option<String>,
    #[serde(default)]
    pub ticket_number: Option<String>,
}

impl TransitionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_delivered_quantity(mut self, quantity: f64) -> Self {
        self.delivered_quantity = Some(quantity);
        self
    }

    pub fn with_defective_quantity(mut self, quantity: f64) -> Self {
        self.defective_quantity = Some(quantity);
        self
    }

    pub fn with_warehouse_receipt(
        mut self,
        package_number: impl Into<String>,
        ticket_number: impl Into<String>,
    ) -> Self {
        self.package_number = Some(package_number.into());
        self.ticket_number = Some(ticket_number.into());
        self
    }

    /// Trimmed notes, `None` when blank
    pub fn notes(&self) -> Option<&str> {
        non_blank(self.notes.as_deref())
    }
}

/// Non-status edits; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub required_date: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assigned_resource: Option<String>,
    #[serde(default)]
    pub shift: Option<String>,
    #[serde(default)]
    pub scheduled_start: Option<String>,
    #[serde(default)]
    pub scheduled_end: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DetailPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_none()
            && self.category.is_none()
            && self.required_date.is_none()
            && self.priority.is_none()
            && self.assigned_resource.is_none()
            && self.shift.is_none()
            && self.scheduled_start.is_none()
            && self.scheduled_end.is_none()
            && self.notes.is_none()
    }
}

/// Active (non-terminal) or archived (terminal) slice of a list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListView {
    #[default]
    Active,
    Archived,
    All,
}

/// Offset pagination, honored for the archived view only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

/// List filter for [`crate::WorkflowEngine::list`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Free text over code, item, counterparty and description
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub category: Option<String>,
    /// Inclusive lower bound on the required date
    #[serde(default)]
    pub from_date: Option<String>,
    /// Inclusive upper bound on the required date
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default)]
    pub view: ListView,
    #[serde(default)]
    pub page: Option<Page>,
}

impl EntityFilter {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn archived() -> Self {
        Self {
            view: ListView::Archived,
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self {
            view: ListView::All,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_date = Some(from.into());
        self.to_date = Some(to.into());
        self
    }

    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.page = Some(Page { limit, offset });
        self
    }

    /// Check the date bounds and return a copy with them in canonical form
    ///
    /// Dates are compared as text in storage, so only canonical values may
    /// reach the query.
    pub fn normalized(&self) -> Result<Self> {
        let mut filter = self.clone();
        filter.from_date = self
            .from_date
            .as_deref()
            .map(|from| parse_date("from date", from))
            .transpose()?;
        filter.to_date = self
            .to_date
            .as_deref()
            .map(|to| parse_date("to date", to))
            .transpose()?;
        Ok(filter)
    }
}

/// Validate a calendar date and return it in canonical `YYYY-MM-DD` form
pub(crate) fn parse_date(field: &str, value: &str) -> Result<String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| WorkflowError::validation(format!("{} must be a YYYY-MM-DD date", field)))
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
