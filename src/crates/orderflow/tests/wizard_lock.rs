use orderflow::{DatabaseConnection, WizardLocks, WorkflowError};

async fn setup_locks() -> WizardLocks {
    let db = DatabaseConnection::in_memory()
        .await
        .expect("Failed to create test database");
    db.run_migrations().await.expect("Failed to run migrations");

    WizardLocks::new(db.pool().clone())
}

#[tokio::test]
async fn test_location_tree() {
    let locks = setup_locks().await;
    let aisle = locks.create_location("A", "Aisle A", None).await.unwrap();
    let rack = locks.create_location("A-01", "Rack 1", Some(aisle.id)).await.unwrap();

    let roots = locks.children(None).await.unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, aisle.id);

    let racks = locks.children(Some(aisle.id)).await.unwrap();
    assert_eq!(racks, vec![rack]);

    let err = locks.create_location("Z", "Orphan", Some(999)).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(locks.create_location(" ", "Blank", None).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_duplicate_location_code_is_persistence_error() {
    let locks = setup_locks().await;
    locks.create_location("B", "Aisle B", None).await.unwrap();

    let err = locks.create_location("B", "Aisle B again", None).await.unwrap_err();
    match err {
        WorkflowError::Persistence(db) => assert!(db.is_constraint_violation()),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_acquire_is_exclusive_and_reentrant() {
    let locks = setup_locks().await;
    let location = locks.create_location("C", "Aisle C", None).await.unwrap();

    let held = locks.acquire(location.id, "session-1").await.unwrap();
    assert!(held.wizard_locked);
    assert_eq!(held.wizard_lock_owner.as_deref(), Some("session-1"));

    let again = locks.acquire(location.id, "session-1").await.unwrap();
    assert_eq!(again.wizard_locked_at, held.wizard_locked_at);

    let err = locks.acquire(location.id, "session-2").await.unwrap_err();
    match err {
        WorkflowError::LockConflict { location_id, owner } => {
            assert_eq!(location_id, location.id);
            assert_eq!(owner, "session-1");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_release_rules() {
    let locks = setup_locks().await;
    let location = locks.create_location("D", "Aisle D", None).await.unwrap();

    // Releasing an unlocked location is a no-op
    locks.release(location.id, "session-1").await.unwrap();

    locks.acquire(location.id, "session-1").await.unwrap();
    let err = locks.release(location.id, "session-2").await.unwrap_err();
    assert!(matches!(err, WorkflowError::LockConflict { .. }));

    locks.release(location.id, "session-1").await.unwrap();
    let free = locks.location(location.id).await.unwrap();
    assert!(!free.wizard_locked);
    assert_eq!(free.wizard_lock_owner, None);

    locks.acquire(location.id, "session-2").await.unwrap();
}

#[tokio::test]
async fn test_force_release_and_session_teardown() {
    let locks = setup_locks().await;
    let e = locks.create_location("E", "Aisle E", None).await.unwrap();
    let f = locks.create_location("F", "Aisle F", None).await.unwrap();
    let g = locks.create_location("G", "Aisle G", None).await.unwrap();

    locks.acquire(e.id, "abandoned").await.unwrap();
    locks.force_release(e.id, "admin").await.unwrap();
    assert!(!locks.location(e.id).await.unwrap().wizard_locked);
    assert!(locks.force_release(e.id, "").await.unwrap_err().is_validation());

    locks.acquire(f.id, "session-1").await.unwrap();
    locks.acquire(g.id, "session-1").await.unwrap();
    assert_eq!(locks.release_session("session-1").await.unwrap(), 2);
    assert_eq!(locks.release_session("session-1").await.unwrap(), 0);
    assert!(!locks.location(g.id).await.unwrap().wizard_locked);
}

#[tokio::test]
async fn test_unknown_location() {
    let locks = setup_locks().await;

    assert!(locks.acquire(404, "session-1").await.unwrap_err().is_not_found());
    assert!(locks.release(404, "session-1").await.unwrap_err().is_not_found());
    assert!(locks.force_release(404, "admin").await.unwrap_err().is_not_found());
}
