//! Entity kinds and statuses
//!
//! A status is either one of the builtin slugs shared by both workflows or an
//! admin-defined custom status, persisted as `custom:<id>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

const CUSTOM_PREFIX: &str = "custom:";

/// The two workflow domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Purchase request (`SC-00001`)
    PurchaseRequest,
    /// Production order (`OP-00001`)
    ProductionOrder,
}

impl EntityKind {
    /// Settings key and serialized name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::PurchaseRequest => "purchase_request",
            EntityKind::ProductionOrder => "production_order",
        }
    }

    pub fn entity_table(&self) -> &'static str {
        match self {
            EntityKind::PurchaseRequest => "purchase_requests",
            EntityKind::ProductionOrder => "production_orders",
        }
    }

    pub fn history_table(&self) -> &'static str {
        match self {
            EntityKind::PurchaseRequest => "purchase_request_history",
            EntityKind::ProductionOrder => "production_order_history",
        }
    }

    /// Prefix of the consecutive code
    pub fn code_prefix(&self) -> &'static str {
        match self {
            EntityKind::PurchaseRequest => "SC",
            EntityKind::ProductionOrder => "OP",
        }
    }

    /// Route segment used in notification links
    pub fn route(&self) -> &'static str {
        match self {
            EntityKind::PurchaseRequest => "purchase-requests",
            EntityKind::ProductionOrder => "production-orders",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::PurchaseRequest => "Purchase request",
            EntityKind::ProductionOrder => "Production order",
        }
    }

    /// Format a sequence number as a consecutive code, e.g. `SC-00042`
    pub fn consecutive_code(&self, sequence: i64) -> String {
        format!("{}-{:05}", self.code_prefix(), sequence)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase_request" | "purchase-request" => Ok(EntityKind::PurchaseRequest),
            "production_order" | "production-order" => Ok(EntityKind::ProductionOrder),
            other => Err(WorkflowError::Validation(format!(
                "unknown entity kind: {}",
                other
            ))),
        }
    }
}

/// Statuses known to the code base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinStatus {
    Pending,
    Approved,
    Ordered,
    InProgress,
    OnHold,
    Completed,
    Received,
    ReceivedInWarehouse,
    Canceled,
    CancellationRequest,
}

impl BuiltinStatus {
    pub const ALL: [BuiltinStatus; 10] = [
        BuiltinStatus::Pending,
        BuiltinStatus::Approved,
        BuiltinStatus::Ordered,
        BuiltinStatus::InProgress,
        BuiltinStatus::OnHold,
        BuiltinStatus::Completed,
        BuiltinStatus::Received,
        BuiltinStatus::ReceivedInWarehouse,
        BuiltinStatus::Canceled,
        BuiltinStatus::CancellationRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinStatus::Pending => "pending",
            BuiltinStatus::Approved => "approved",
            BuiltinStatus::Ordered => "ordered",
            BuiltinStatus::InProgress => "in-progress",
            BuiltinStatus::OnHold => "on-hold",
            BuiltinStatus::Completed => "completed",
            BuiltinStatus::Received => "received",
            BuiltinStatus::ReceivedInWarehouse => "received-in-warehouse",
            BuiltinStatus::Canceled => "canceled",
            BuiltinStatus::CancellationRequest => "cancellation-request",
        }
    }

    /// Default English label, overridable through settings aliases
    pub fn default_label(&self) -> &'static str {
        match self {
            BuiltinStatus::Pending => "Pending",
            BuiltinStatus::Approved => "Approved",
            BuiltinStatus::Ordered => "Ordered",
            BuiltinStatus::InProgress => "In progress",
            BuiltinStatus::OnHold => "On hold",
            BuiltinStatus::Completed => "Completed",
            BuiltinStatus::Received => "Received",
            BuiltinStatus::ReceivedInWarehouse => "Received in warehouse",
            BuiltinStatus::Canceled => "Canceled",
            BuiltinStatus::CancellationRequest => "Cancellation requested",
        }
    }

    fn from_slug(slug: &str) -> Option<Self> {
        BuiltinStatus::ALL.into_iter().find(|s| s.as_str() == slug)
    }
}

/// Workflow status: builtin or admin-defined
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Status {
    Builtin(BuiltinStatus),
    Custom(String),
}

impl Status {
    pub const PENDING: Status = Status::Builtin(BuiltinStatus::Pending);
    pub const APPROVED: Status = Status::Builtin(BuiltinStatus::Approved);
    pub const ORDERED: Status = Status::Builtin(BuiltinStatus::Ordered);
    pub const IN_PROGRESS: Status = Status::Builtin(BuiltinStatus::InProgress);
    pub const ON_HOLD: Status = Status::Builtin(BuiltinStatus::OnHold);
    pub const COMPLETED: Status = Status::Builtin(BuiltinStatus::Completed);
    pub const RECEIVED: Status = Status::Builtin(BuiltinStatus::Received);
    pub const RECEIVED_IN_WAREHOUSE: Status = Status::Builtin(BuiltinStatus::ReceivedInWarehouse);
    pub const CANCELED: Status = Status::Builtin(BuiltinStatus::Canceled);
    pub const CANCELLATION_REQUEST: Status = Status::Builtin(BuiltinStatus::CancellationRequest);

    /// Custom status with the given id
    pub fn custom(id: impl Into<String>) -> Self {
        Status::Custom(id.into())
    }

    /// Parse a persisted status string
    pub fn parse(value: &str) -> Result<Self, WorkflowError> {
        if let Some(id) = value.strip_prefix(CUSTOM_PREFIX) {
            if id.is_empty() {
                return Err(WorkflowError::Validation(
                    "custom status id must not be empty".to_string(),
                ));
            }
            return Ok(Status::Custom(id.to_string()));
        }

        BuiltinStatus::from_slug(value)
            .map(Status::Builtin)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown status: {}", value)))
    }

    pub fn builtin(&self) -> Option<BuiltinStatus> {
        match self {
            Status::Builtin(b) => Some(*b),
            Status::Custom(_) => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Status::Custom(_))
    }

    /// `canceled` or `cancellation-request`
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Status::Builtin(BuiltinStatus::Canceled | BuiltinStatus::CancellationRequest)
        )
    }

    /// Terminal statuses only leave through a reopen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Builtin(
                BuiltinStatus::Completed
                    | BuiltinStatus::Received
                    | BuiltinStatus::ReceivedInWarehouse
                    | BuiltinStatus::Canceled
            )
        )
    }

    /// Every builtin terminal status, used to split active and archived lists
    pub fn terminal_statuses() -> Vec<Status> {
        BuiltinStatus::ALL
            .into_iter()
            .map(Status::Builtin)
            .filter(Status::is_terminal)
            .collect()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Builtin(b) => f.write_str(b.as_str()),
            Status::Custom(id) => write!(f, "{}{}", CUSTOM_PREFIX, id),
        }
    }
}

impl FromStr for Status {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::parse(s)
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for Status {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Status::parse(&value)
    }
}

impl From<BuiltinStatus> for Status {
    fn from(status: BuiltinStatus) -> Self {
        Status::Builtin(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_round_trips_through_slug() {
        for builtin in BuiltinStatus::ALL {
            let parsed = Status::parse(builtin.as_str()).unwrap();
            assert_eq!(parsed, Status::Builtin(builtin));
        }
    }

    #[test]
    fn test_custom_status_parsing() {
        let status = Status::parse("custom:painting").unwrap();
        assert_eq!(status, Status::custom("painting"));
        assert_eq!(status.to_string(), "custom:painting");
        assert!(status.is_custom());
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(Status::parse("shipped").is_err());
        assert!(Status::parse("custom:").is_err());
        assert!(Status::parse("").is_err());
    }

    #[test]
    fn test_terminal_set() {
        let terminal = Status::terminal_statuses();
        assert_eq!(terminal.len(), 4);
        assert!(terminal.contains(&Status::COMPLETED));
        assert!(terminal.contains(&Status::RECEIVED));
        assert!(terminal.contains(&Status::RECEIVED_IN_WAREHOUSE));
        assert!(terminal.contains(&Status::CANCELED));
        assert!(!Status::CANCELLATION_REQUEST.is_terminal());
    }

    #[test]
    fn test_status_serializes_as_string() {
        let json = serde_json::to_string(&Status::IN_PROGRESS).unwrap();
        assert_eq!(json, "\"in-progress\"");

        let back: Status = serde_json::from_str("\"custom:qa\"").unwrap();
        assert_eq!(back, Status::custom("qa"));
    }

    #[test]
    fn test_consecutive_code_format() {
        assert_eq!(EntityKind::PurchaseRequest.consecutive_code(1), "SC-00001");
        assert_eq!(EntityKind::ProductionOrder.consecutive_code(123456), "OP-123456");
    }

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!(
            "purchase-request".parse::<EntityKind>().unwrap(),
            EntityKind::PurchaseRequest
        );
        assert_eq!(
            "production_order".parse::<EntityKind>().unwrap(),
            EntityKind::ProductionOrder
        );
        assert!("invoice".parse::<EntityKind>().is_err());
    }
}
