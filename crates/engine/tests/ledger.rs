mod common;

use common::{engine_with_db, post_training_journal};
use engine::{AlertType, EngineError, EntryDraft, WalletOwner};
use uuid::Uuid;

#[tokio::test]
async fn balanced_journal_posts_and_updates_balances() {
    let (engine, _processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-1").await;

    assert_eq!(engine.student_balance(student_id).await.unwrap(), -15_000);
    assert_eq!(
        engine.instructor_balance(instructor_id).await.unwrap(),
        12_000
    );
    assert_eq!(engine.platform_balance().await.unwrap(), 3_000);

    let verdict = engine.verify_journal_balance(journal_id).await.unwrap();
    assert!(verdict.balanced);
    assert_eq!(verdict.total_cents, 0);
    assert_eq!(verdict.entry_count, 3);
}

#[tokio::test]
async fn unbalanced_journal_is_rejected_and_writes_nothing() {
    let (engine, _processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();

    let student_wallet = engine
        .get_or_create_wallet(WalletOwner::Student { student_id })
        .await
        .unwrap();
    let platform_wallet = engine.get_or_create_wallet(WalletOwner::Platform).await.unwrap();

    let drafts = vec![
        EntryDraft::new(platform_wallet, 500, "training_event"),
        EntryDraft::new(student_wallet, -400, "training_event"),
    ];

    let err = engine
        .post_journal("training_event", "evt-unbalanced", &drafts)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    assert_eq!(engine.student_balance(student_id).await.unwrap(), 0);
    assert_eq!(engine.platform_balance().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_journal_is_rejected() {
    let (engine, _processor, _db) = engine_with_db().await;

    let err = engine
        .post_journal("training_event", "evt-empty", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn reposting_the_same_event_returns_the_existing_journal() {
    let (engine, _processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let first =
        post_training_journal(&engine, student_id, instructor_id, 10_000, 8_000, "evt-dup").await;
    let second =
        post_training_journal(&engine, student_id, instructor_id, 10_000, 8_000, "evt-dup").await;

    assert_eq!(first, second);
    // Balances applied exactly once.
    assert_eq!(engine.student_balance(student_id).await.unwrap(), -10_000);
    assert_eq!(engine.platform_balance().await.unwrap(), 2_000);
}

#[tokio::test]
async fn get_or_create_wallet_is_idempotent() {
    let (engine, _processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();

    let first = engine
        .get_or_create_wallet(WalletOwner::Student { student_id })
        .await
        .unwrap();
    let second = engine
        .get_or_create_wallet(WalletOwner::Student { student_id })
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn wallet_history_joins_journals() {
    let (engine, _processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    post_training_journal(&engine, student_id, instructor_id, 9_000, 7_000, "evt-h1").await;
    post_training_journal(&engine, student_id, instructor_id, 6_000, 5_000, "evt-h2").await;

    let wallet_id = engine
        .get_or_create_wallet(WalletOwner::Student { student_id })
        .await
        .unwrap();
    let history = engine.wallet_ledger_entries(wallet_id, 10, 0).await.unwrap();

    assert_eq!(history.len(), 2);
    for (entry, journal) in &history {
        assert_eq!(entry.wallet_id, wallet_id);
        assert_eq!(journal.event_type, "training_event");
    }
}

#[tokio::test]
async fn reconciliation_matches_when_cache_is_consistent() {
    let (engine, _processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    post_training_journal(&engine, student_id, instructor_id, 20_000, 15_000, "evt-r1").await;

    let drifts = engine.reconcile_wallet_balances().await.unwrap();
    assert!(drifts.is_empty());
}

#[tokio::test]
async fn reconciliation_alerts_on_drift_without_correcting() {
    use sea_orm::{ActiveValue, EntityTrait};

    let (engine, _processor, db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    post_training_journal(&engine, student_id, instructor_id, 20_000, 15_000, "evt-r2").await;

    // Corrupt the cache behind the engine's back.
    let wallet_id = engine
        .get_or_create_wallet(WalletOwner::Student { student_id })
        .await
        .unwrap();
    let tampered = engine::balances::ActiveModel {
        wallet_id: ActiveValue::Set(wallet_id.to_string()),
        balance_cents: ActiveValue::Set(-19_000),
        updated_at: ActiveValue::Set(chrono::Utc::now()),
    };
    engine::balances::Entity::update(tampered)
        .exec(&db)
        .await
        .unwrap();

    let drifts = engine.reconcile_wallet_balances().await.unwrap();
    assert_eq!(drifts.len(), 1);
    assert_eq!(drifts[0].cached_cents, -19_000);
    assert_eq!(drifts[0].computed_cents, -20_000);

    // The cache is not silently repaired.
    assert_eq!(engine.wallet_balance(wallet_id).await.unwrap(), -19_000);

    // An alert was raised, and a second pass does not duplicate it.
    engine.reconcile_wallet_balances().await.unwrap();
    let alerts = engine.unacknowledged_alerts(10).await.unwrap();
    let drift_alerts: Vec<_> = alerts
        .iter()
        .filter(|a| a.alert_type == AlertType::ReconciliationDrift)
        .collect();
    assert_eq!(drift_alerts.len(), 1);
}
