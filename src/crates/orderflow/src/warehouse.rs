//! Warehouse locations and the rack-population wizard lock
//!
//! The wizard lock is advisory and session scoped. A lock only goes away
//! when its session releases it, the session is torn down, or an admin
//! forces it; there is no expiry.

use crate::db::models::WarehouseLocation;
use crate::db::repositories::LocationRepository;
use crate::db::DatabasePool;
use crate::error::{Result, WorkflowError};
use crate::workflow::payload::non_blank;

/// Location tree access and wizard lock handling
#[derive(Clone)]
pub struct WizardLocks {
    pool: DatabasePool,
}

impl WizardLocks {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a location, optionally under `parent_id`
    pub async fn create_location(
        &self,
        code: &str,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<WarehouseLocation> {
        let code = non_blank(Some(code))
            .ok_or_else(|| WorkflowError::validation("location code is required"))?;
        let name = non_blank(Some(name))
            .ok_or_else(|| WorkflowError::validation("location name is required"))?;
        if let Some(parent) = parent_id {
            self.location(parent).await?;
        }

        let location = LocationRepository::create(&self.pool, code, name, parent_id).await?;
        tracing::info!(id = location.id, code = %location.code, "Created warehouse location");
        Ok(location)
    }

    pub async fn location(&self, id: i64) -> Result<WarehouseLocation> {
        LocationRepository::get_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Warehouse location", id))
    }

    /// Direct children of a location, or the roots
    pub async fn children(&self, parent_id: Option<i64>) -> Result<Vec<WarehouseLocation>> {
        Ok(LocationRepository::list_children(&self.pool, parent_id).await?)
    }

    /// Take the lock for a session; succeeds again for the holder
    pub async fn acquire(&self, location_id: i64, session_id: &str) -> Result<WarehouseLocation> {
        let session = require_session(session_id)?;

        if LocationRepository::try_lock(&self.pool, location_id, session).await? {
            tracing::info!(location_id, session = %session, "Wizard lock acquired");
            return self.location(location_id).await;
        }

        let location = self.location(location_id).await?;
        Err(WorkflowError::LockConflict {
            location_id,
            owner: location.wizard_lock_owner.unwrap_or_default(),
        })
    }

    /// Release a lock held by `session_id`
    ///
    /// Releasing an unlocked location is a no-op; releasing someone else's
    /// lock is a conflict.
    pub async fn release(&self, location_id: i64, session_id: &str) -> Result<()> {
        let session = require_session(session_id)?;

        if LocationRepository::unlock(&self.pool, location_id, session).await? {
            tracing::info!(location_id, session = %session, "Wizard lock released");
            return Ok(());
        }

        let location = self.location(location_id).await?;
        match location.wizard_lock_owner {
            Some(owner) if location.wizard_locked => {
                Err(WorkflowError::LockConflict { location_id, owner })
            }
            _ => Ok(()),
        }
    }

    /// Clear a lock whoever holds it
    pub async fn force_release(&self, location_id: i64, admin: &str) -> Result<()> {
        let admin = non_blank(Some(admin))
            .ok_or_else(|| WorkflowError::validation("actor is required"))?;
        let location = self.location(location_id).await?;

        if LocationRepository::force_unlock(&self.pool, location_id).await? {
            tracing::warn!(
                location_id,
                admin = %admin,
                previous_owner = %location.wizard_lock_owner.unwrap_or_default(),
                "Wizard lock force-released"
            );
        }
        Ok(())
    }

    /// Release every lock held by a session; returns how many were held
    pub async fn release_session(&self, session_id: &str) -> Result<u64> {
        let session = require_session(session_id)?;
        let released = LocationRepository::unlock_session(&self.pool, session).await?;
        if released > 0 {
            tracing::info!(session = %session, released, "Released wizard locks of session");
        }
        Ok(released)
    }
}

fn require_session(session_id: &str) -> Result<&str> {
    non_blank(Some(session_id)).ok_or_else(|| WorkflowError::validation("session id is required"))
}
