use async_trait::async_trait;
use orderflow::{
    DatabaseConnection, EntityKind, NewEntity, NotificationEvent, Notifier, NotifyError, Status,
    TransitionPayload, WorkflowEngine,
};
use std::sync::{Arc, Mutex};

const OP: EntityKind = EntityKind::ProductionOrder;

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("mail relay down".to_string()))
    }
}

async fn setup_engine(notifier: Arc<dyn Notifier>) -> WorkflowEngine {
    let db = DatabaseConnection::in_memory()
        .await
        .expect("Failed to create test database");
    db.run_migrations().await.expect("Failed to run migrations");

    WorkflowEngine::new(db.pool().clone())
        .with_notifier(notifier)
        .with_link_base("https://erp.example.com")
}

fn order() -> NewEntity {
    NewEntity::new("Gear", 10.0, "Bikes Ltd", "2024-06-01")
}

#[tokio::test]
async fn test_requester_notified_when_someone_else_acts() {
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = setup_engine(notifier.clone()).await;
    let entity = engine.create(OP, &order(), "ana").await.unwrap();

    engine
        .transition(OP, entity.id, &Status::APPROVED, &TransitionPayload::new(), "luis")
        .await
        .unwrap();

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target_user_id, "ana");
    assert_eq!(events[0].message, "OP-00001 is now Approved (luis)");
    assert_eq!(
        events[0].link,
        format!("https://erp.example.com/production-orders/{}", entity.id)
    );
}

#[tokio::test]
async fn test_no_notification_for_own_actions_or_failures() {
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = setup_engine(notifier.clone()).await;
    let entity = engine.create(OP, &order(), "ana").await.unwrap();

    engine
        .transition(
            OP,
            entity.id,
            &Status::CANCELLATION_REQUEST,
            &TransitionPayload::new().with_notes("duplicate"),
            "ana",
        )
        .await
        .unwrap();
    assert!(engine
        .transition(OP, entity.id, &Status::APPROVED, &TransitionPayload::new(), "luis")
        .await
        .is_err());
    assert!(notifier.events().is_empty());

    engine
        .reject_cancellation(OP, entity.id, "boss", None)
        .await
        .unwrap();
    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "OP-00001 is now Pending (boss)");
}

#[tokio::test]
async fn test_failing_notifier_does_not_undo_transition() {
    let engine = setup_engine(Arc::new(FailingNotifier)).await;
    let entity = engine.create(OP, &order(), "ana").await.unwrap();

    let approved = engine
        .transition(OP, entity.id, &Status::APPROVED, &TransitionPayload::new(), "luis")
        .await
        .unwrap();
    assert_eq!(approved.status, "approved");

    let stored = engine.get_by_id(OP, entity.id).await.unwrap();
    assert_eq!(stored.status, "approved");
    assert_eq!(engine.history(OP, entity.id).await.unwrap().len(), 2);
}
