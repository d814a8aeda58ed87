//! Warehouse location model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A node of the warehouse location tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WarehouseLocation {
    pub id: i64,

    /// Unique location code (e.g. `A-01-03`)
    pub code: String,

    pub name: String,

    /// Parent location, `None` for roots
    pub parent_id: Option<i64>,

    /// Advisory lock taken by the rack-population wizard
    pub wizard_locked: bool,

    /// Session holding the wizard lock
    pub wizard_lock_owner: Option<String>,

    pub wizard_locked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
