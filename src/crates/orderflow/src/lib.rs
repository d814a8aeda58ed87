//! Status workflows and audit ledger for purchase requests and production orders
//!
//! This crate provides the workflow core of a small ERP: entity storage,
//! a table-driven status transition engine, an append-only history ledger,
//! per-kind admin settings, requester notifications and the warehouse
//! wizard lock.
//!
//! ```no_run
//! use orderflow::{
//!     DatabaseConnection, EntityKind, NewEntity, Status, TransitionPayload, WorkflowEngine,
//! };
//!
//! # async fn run() -> orderflow::Result<()> {
//! let db = DatabaseConnection::new("sqlite://orderflow.db").await?;
//! db.run_migrations().await?;
//!
//! let engine = WorkflowEngine::new(db.pool().clone());
//! let order = engine
//!     .create(
//!         EntityKind::ProductionOrder,
//!         &NewEntity::new("Gear housing", 10.0, "Bikes Ltd", "2024-06-01"),
//!         "ana",
//!     )
//!     .await?;
//! engine
//!     .transition(
//!         EntityKind::ProductionOrder,
//!         order.id,
//!         &Status::APPROVED,
//!         &TransitionPayload::new(),
//!         "luis",
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod warehouse;
pub mod workflow;

pub use config::AppConfig;
pub use db::{DatabaseConnection, DatabaseError, DatabasePool};
pub use error::{Result, WorkflowError};
pub use notify::{NoopNotifier, NotificationEvent, Notifier, NotifyError, TracingNotifier};
pub use warehouse::WizardLocks;
pub use workflow::{
    DetailPatch, EntityFilter, EntityKind, NewEntity, Status, TransitionPayload, WorkflowEngine,
    WorkflowSettings,
};

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
