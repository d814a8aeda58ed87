//! Status workflows for purchase requests and production orders
//!
//! Statuses, per-kind transition tables, engine inputs, admin settings and
//! the engine that applies transitions and keeps the history ledger.

pub mod definition;
pub mod engine;
pub mod payload;
pub mod settings;
pub mod status;

pub use definition::{Effect, Precondition, WorkflowDefinition};
pub use engine::WorkflowEngine;
pub use payload::{DetailPatch, EntityFilter, ListView, NewEntity, Page, TransitionPayload};
pub use settings::{CustomStatus, StatusAlias, WorkflowSettings};
pub use status::{BuiltinStatus, EntityKind, Status};
