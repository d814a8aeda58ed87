use orderflow::workflow::{CustomStatus, DetailPatch, StatusAlias};
use orderflow::{
    DatabaseConnection, EntityKind, NewEntity, NoopNotifier, Status, TransitionPayload,
    WorkflowEngine, WorkflowSettings,
};
use std::sync::Arc;

const PR: EntityKind = EntityKind::PurchaseRequest;
const OP: EntityKind = EntityKind::ProductionOrder;

async fn setup_engine() -> WorkflowEngine {
    let db = DatabaseConnection::in_memory()
        .await
        .expect("Failed to create test database");
    db.run_migrations().await.expect("Failed to run migrations");

    WorkflowEngine::new(db.pool().clone()).with_notifier(Arc::new(NoopNotifier))
}

fn order() -> NewEntity {
    NewEntity::new("Gear", 10.0, "Bikes Ltd", "2024-06-01")
}

async fn start(engine: &WorkflowEngine, id: i64) {
    for target in [Status::APPROVED, Status::IN_PROGRESS] {
        engine
            .transition(OP, id, &target, &TransitionPayload::new(), "luis")
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_default_settings() {
    let engine = setup_engine().await;

    let settings = engine.settings(OP).await.unwrap();
    assert_eq!(settings.next_sequence, 1);
    assert!(settings.warehouse_step_enabled);
    assert!(!settings.require_assignment_before_start);
    assert!(settings.custom_statuses.is_empty());
    assert_eq!(settings.label_for(&Status::IN_PROGRESS), "In progress");
}

#[tokio::test]
async fn test_sequence_counter_advances_and_survives_settings_updates() {
    let engine = setup_engine().await;
    engine.create(OP, &order(), "ana").await.unwrap();

    // A stale document must not roll the counter back
    let mut stale = WorkflowSettings::defaults(OP);
    stale.machines = vec!["Press-1".to_string()];
    let saved = engine.update_settings(OP, stale, "admin").await.unwrap();
    assert_eq!(saved.next_sequence, 2);
    assert_eq!(saved.machines, vec!["Press-1"]);

    let second = engine.create(OP, &order(), "ana").await.unwrap();
    assert_eq!(second.consecutive, "OP-00002");
}

#[tokio::test]
async fn test_disabling_warehouse_step_applies_immediately() {
    let engine = setup_engine().await;
    let entity = engine.create(OP, &order(), "ana").await.unwrap();
    start(&engine, entity.id).await;
    engine
        .transition(
            OP,
            entity.id,
            &Status::COMPLETED,
            &TransitionPayload::new().with_delivered_quantity(10.0),
            "luis",
        )
        .await
        .unwrap();

    let mut settings = engine.settings(OP).await.unwrap();
    settings.warehouse_step_enabled = false;
    engine.update_settings(OP, settings, "admin").await.unwrap();

    let err = engine
        .transition(
            OP,
            entity.id,
            &Status::RECEIVED_IN_WAREHOUSE,
            &TransitionPayload::new().with_warehouse_receipt("PK-1", "T-1"),
            "pedro",
        )
        .await
        .unwrap_err();
    assert!(err.is_invalid_transition());
}

#[tokio::test]
async fn test_assignment_required_before_start() {
    let engine = setup_engine().await;

    let mut settings = engine.settings(OP).await.unwrap();
    settings.require_assignment_before_start = true;
    settings.machines = vec!["CNC-1".to_string()];
    engine.update_settings(OP, settings, "admin").await.unwrap();

    let entity = engine.create(OP, &order(), "ana").await.unwrap();
    engine
        .transition(OP, entity.id, &Status::APPROVED, &TransitionPayload::new(), "luis")
        .await
        .unwrap();

    let err = engine
        .transition(OP, entity.id, &Status::IN_PROGRESS, &TransitionPayload::new(), "luis")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let patch = DetailPatch {
        assigned_resource: Some("CNC-1".to_string()),
        ..Default::default()
    };
    engine.update_details(OP, entity.id, &patch, "luis").await.unwrap();

    let started = engine
        .transition(OP, entity.id, &Status::IN_PROGRESS, &TransitionPayload::new(), "luis")
        .await
        .unwrap();
    assert_eq!(started.status, "in-progress");
    assert_eq!(started.assigned_resource.as_deref(), Some("CNC-1"));
}

#[tokio::test]
async fn test_custom_statuses_in_order_workflow() {
    let engine = setup_engine().await;

    let mut settings = engine.settings(OP).await.unwrap();
    settings.custom_statuses = vec![CustomStatus::new("painting", "Painting")];
    settings.status_aliases.insert(
        "on-hold".to_string(),
        StatusAlias {
            label: "Paused".to_string(),
            color: Some("#999999".to_string()),
        },
    );
    let saved = engine.update_settings(OP, settings, "admin").await.unwrap();
    assert_eq!(saved.label_for(&Status::custom("painting")), "Painting");
    assert_eq!(saved.label_for(&Status::ON_HOLD), "Paused");

    let entity = engine.create(OP, &order(), "ana").await.unwrap();
    start(&engine, entity.id).await;

    let painting = engine
        .transition(OP, entity.id, &Status::custom("painting"), &TransitionPayload::new(), "luis")
        .await
        .unwrap();
    assert_eq!(painting.status, "custom:painting");

    let history = engine.history(OP, entity.id).await.unwrap();
    assert_eq!(history[0].status, "custom:painting");

    // Still held, so it cannot be removed
    let mut without = engine.settings(OP).await.unwrap();
    without.custom_statuses.clear();
    let err = engine
        .update_settings(OP, without.clone(), "admin")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    engine
        .transition(
            OP,
            entity.id,
            &Status::COMPLETED,
            &TransitionPayload::new().with_delivered_quantity(10.0),
            "luis",
        )
        .await
        .unwrap();
    engine.update_settings(OP, without, "admin").await.unwrap();
}

#[tokio::test]
async fn test_custom_status_held_as_previous_status_cannot_be_removed() {
    let engine = setup_engine().await;

    let mut settings = engine.settings(OP).await.unwrap();
    settings.custom_statuses = vec![CustomStatus::new("qa", "Quality check")];
    engine.update_settings(OP, settings, "admin").await.unwrap();

    let entity = engine.create(OP, &order(), "ana").await.unwrap();
    start(&engine, entity.id).await;
    engine
        .transition(OP, entity.id, &Status::custom("qa"), &TransitionPayload::new(), "luis")
        .await
        .unwrap();
    engine
        .transition(
            OP,
            entity.id,
            &Status::CANCELLATION_REQUEST,
            &TransitionPayload::new().with_notes("scrap"),
            "ana",
        )
        .await
        .unwrap();

    let mut without = engine.settings(OP).await.unwrap();
    without.custom_statuses.clear();
    assert!(engine.update_settings(OP, without, "admin").await.unwrap_err().is_validation());

    let restored = engine
        .reject_cancellation(OP, entity.id, "boss", None)
        .await
        .unwrap();
    assert_eq!(restored.status, "custom:qa");
}

#[tokio::test]
async fn test_invalid_settings_rejected() {
    let engine = setup_engine().await;

    let mut custom_on_requests = engine.settings(PR).await.unwrap();
    custom_on_requests.custom_statuses = vec![CustomStatus::new("painting", "Painting")];
    assert!(engine
        .update_settings(PR, custom_on_requests, "admin")
        .await
        .unwrap_err()
        .is_validation());

    let mut builtin_clash = engine.settings(OP).await.unwrap();
    builtin_clash.custom_statuses = vec![CustomStatus::new("approved", "Approved again")];
    assert!(engine
        .update_settings(OP, builtin_clash, "admin")
        .await
        .unwrap_err()
        .is_validation());

    let mut bad_slug = engine.settings(OP).await.unwrap();
    bad_slug.custom_statuses = vec![CustomStatus::new("Needs Paint", "Paint")];
    assert!(engine
        .update_settings(OP, bad_slug, "admin")
        .await
        .unwrap_err()
        .is_validation());

    let unchanged = engine.settings(OP).await.unwrap();
    assert!(unchanged.custom_statuses.is_empty());
}
