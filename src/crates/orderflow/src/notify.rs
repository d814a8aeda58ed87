//! Requester notifications
//!
//! The engine tells the requester when someone else moves their entity.
//! Delivery happens after the change is committed and never undoes it: a
//! failing notifier is logged and otherwise ignored.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Message sent to a requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub target_user_id: String,
    pub message: String,
    /// Deep link to the entity, e.g. `/production-orders/7`
    pub link: String,
}

/// Delivery seam for notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            target_user = %event.target_user_id,
            link = %event.link,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Drops every notification
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> NotificationEvent {
        NotificationEvent {
            target_user_id: "ana".to_string(),
            message: "OP-00001 is now Approved".to_string(),
            link: "/production-orders/1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_builtin_notifiers_accept_events() {
        assert!(TracingNotifier.notify(&event()).await.is_ok());
        assert!(NoopNotifier.notify(&event()).await.is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = NotifyError::Unavailable("smtp down".to_string());
        assert_eq!(err.to_string(), "Notification channel unavailable: smtp down");
    }
}
