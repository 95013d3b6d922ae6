mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{engine_with_db, engine_with_file_db, onboard_instructor, post_training_journal};
use engine::{
    EngineError, OutboxStatus, ProcessOutcome, ReserveConfig, SettlementStatus, idempotency_key,
};
use sea_orm::{ActiveValue, EntityTrait};
use uuid::Uuid;

#[tokio::test]
async fn enqueue_is_idempotent_per_journal_and_instructor() {
    let (engine, _processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-q1").await;

    let mut outbox_ids = Vec::new();
    for _ in 0..5 {
        let id = engine
            .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
            .await
            .unwrap();
        outbox_ids.push(id);
    }

    outbox_ids.dedup();
    assert_eq!(outbox_ids.len(), 1);

    let entry = engine.outbox_entry(outbox_ids[0]).await.unwrap();
    assert_eq!(entry.status, OutboxStatus::Pending);
    assert_eq!(entry.attempt_count, 0);
    assert_eq!(
        entry.idempotency_key,
        idempotency_key(journal_id, instructor_id)
    );
}

#[tokio::test]
async fn rejects_non_positive_amounts() {
    let (engine, _processor, _db) = engine_with_db().await;

    let err = engine
        .enqueue_instructor_transfer(Uuid::new_v4(), 0, None, Uuid::new_v4(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn successful_processing_creates_a_pending_settlement_transfer() {
    let (engine, processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-p1").await;
    onboard_instructor(&engine, instructor_id).await;

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    let outcome = engine.process_outbox_entry(outbox_id).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed { .. }));
    assert_eq!(processor.create_calls(), 1);

    let entry = engine.outbox_entry(outbox_id).await.unwrap();
    assert_eq!(entry.status, OutboxStatus::Completed);
    assert_eq!(entry.attempt_count, 1);
    assert!(entry.processor_object_id.is_some());
    assert!(entry.completed_at.is_some());

    let transfer = engine
        .instructor_transfer_for_outbox(outbox_id)
        .await
        .unwrap()
        .unwrap();
    // Not "paid" until the settlement callback confirms it.
    assert_eq!(transfer.status, SettlementStatus::Pending);
    assert!(transfer.is_clawback_eligible);
    let window = transfer.clawback_window_ends_at - transfer.created_at;
    assert_eq!(window, ChronoDuration::hours(72));
}

#[tokio::test]
async fn processing_a_completed_entry_is_a_no_op() {
    let (engine, processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-p2").await;
    onboard_instructor(&engine, instructor_id).await;

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    engine.process_outbox_entry(outbox_id).await.unwrap();
    let second = engine.process_outbox_entry(outbox_id).await.unwrap();

    assert_eq!(second, ProcessOutcome::AlreadyHandled);
    assert_eq!(processor.create_calls(), 1);
}

#[tokio::test]
async fn concurrent_workers_make_exactly_one_processor_call() {
    let (engine, processor, _db, path) = engine_with_file_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-c1").await;
    onboard_instructor(&engine, instructor_id).await;

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    let worker_a = engine.clone();
    let worker_b = engine.clone();
    let (left, right) = tokio::join!(
        tokio::spawn(async move { worker_a.process_outbox_entry(outbox_id).await }),
        tokio::spawn(async move { worker_b.process_outbox_entry(outbox_id).await }),
    );

    let outcomes = [left.unwrap().unwrap(), right.unwrap().unwrap()];
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, ProcessOutcome::Completed { .. }))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, ProcessOutcome::AlreadyHandled))
        .count();

    assert_eq!(completed, 1);
    assert_eq!(skipped, 1);
    assert_eq!(processor.create_calls(), 1);

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn failed_attempts_requeue_until_the_limit_then_fail_terminally() {
    let (engine, processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-f1").await;
    onboard_instructor(&engine, instructor_id).await;
    processor.fail_transfers("processor unavailable");

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    // max_attempts is 3 in the test policy; the first two failures requeue.
    for expected_attempt in 1..3 {
        let outcome = engine.process_outbox_entry(outbox_id).await.unwrap();
        match outcome {
            ProcessOutcome::Retrying { attempt, .. } => assert_eq!(attempt, expected_attempt),
            other => panic!("expected Retrying, got {other:?}"),
        }
        let entry = engine.outbox_entry(outbox_id).await.unwrap();
        assert_eq!(entry.status, OutboxStatus::Pending);
        assert_eq!(entry.attempt_count, expected_attempt);
        assert!(entry.next_attempt_at.is_some());
        assert!(entry.failure_message.is_some());
    }

    let outcome = engine.process_outbox_entry(outbox_id).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Failed { .. }));

    let entry = engine.outbox_entry(outbox_id).await.unwrap();
    assert_eq!(entry.status, OutboxStatus::Failed);
    assert_eq!(entry.attempt_count, 3);
    assert_eq!(
        entry.failure_message.as_deref(),
        Some("processor unreachable: processor unavailable")
    );

    // Terminal entries are never picked up again.
    let due = engine.due_outbox_entries(Utc::now(), 10).await.unwrap();
    assert!(due.is_empty());
    assert_eq!(
        engine.process_outbox_entry(outbox_id).await.unwrap(),
        ProcessOutcome::AlreadyHandled
    );
    assert_eq!(processor.create_calls(), 3);
}

#[tokio::test]
async fn missing_payout_onboarding_consumes_an_attempt() {
    let (engine, processor, _db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-f2").await;

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    let outcome = engine.process_outbox_entry(outbox_id).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Retrying { attempt: 1, .. }));
    // No network call was made for an un-onboarded instructor.
    assert_eq!(processor.create_calls(), 0);

    // Once onboarded, the retry succeeds.
    onboard_instructor(&engine, instructor_id).await;
    let outcome = engine.process_outbox_entry(outbox_id).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed { .. }));
}

async fn force_stale_processing(
    db: &sea_orm::DatabaseConnection,
    outbox_id: Uuid,
    minutes_ago: i64,
) {
    let stale = engine::outbox::ActiveModel {
        id: ActiveValue::Set(outbox_id.to_string()),
        status: ActiveValue::Set("processing".to_string()),
        attempt_count: ActiveValue::Set(1),
        last_attempt_at: ActiveValue::Set(Some(Utc::now() - ChronoDuration::minutes(minutes_ago))),
        ..Default::default()
    };
    engine::outbox::Entity::update(stale).exec(db).await.unwrap();
}

#[tokio::test]
async fn stale_recovery_completes_when_the_processor_knows_the_key() {
    let (engine, processor, db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-s1").await;
    onboard_instructor(&engine, instructor_id).await;

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    // Simulate a worker that crashed after the processor call succeeded but
    // before the local record was written.
    force_stale_processing(&db, outbox_id, 30).await;
    processor.register_transfer(&idempotency_key(journal_id, instructor_id), "tr_crash", 12_000);

    let recovered = engine.recover_stale_entries(Utc::now()).await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert!(matches!(recovered[0].1, ProcessOutcome::Completed { .. }));

    let entry = engine.outbox_entry(outbox_id).await.unwrap();
    assert_eq!(entry.status, OutboxStatus::Completed);
    assert_eq!(entry.processor_object_id.as_deref(), Some("tr_crash"));

    let transfer = engine
        .instructor_transfer_for_outbox(outbox_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.processor_transfer_id, "tr_crash");
    assert_eq!(transfer.status, SettlementStatus::Pending);
    // No duplicate network call was made to get here.
    assert_eq!(processor.create_calls(), 0);
}

#[tokio::test]
async fn stale_recovery_requeues_when_the_processor_never_saw_the_call() {
    let (engine, _processor, db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-s2").await;
    onboard_instructor(&engine, instructor_id).await;

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    force_stale_processing(&db, outbox_id, 30).await;

    let recovered = engine.recover_stale_entries(Utc::now()).await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert!(matches!(recovered[0].1, ProcessOutcome::Retrying { .. }));

    let entry = engine.outbox_entry(outbox_id).await.unwrap();
    assert_eq!(entry.status, OutboxStatus::Pending);
    // The crashed attempt stays counted.
    assert_eq!(entry.attempt_count, 1);
}

#[tokio::test]
async fn fresh_processing_entries_are_left_alone_by_recovery() {
    let (engine, _processor, db) = engine_with_db().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-s3").await;
    onboard_instructor(&engine, instructor_id).await;

    let outbox_id = engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    // In-flight right now, not stale.
    force_stale_processing(&db, outbox_id, 0).await;

    let recovered = engine.recover_stale_entries(Utc::now()).await.unwrap();
    assert!(recovered.is_empty());

    let entry = engine.outbox_entry(outbox_id).await.unwrap();
    assert_eq!(entry.status, OutboxStatus::Processing);
}

#[tokio::test]
async fn worker_pass_is_blocked_while_the_reserve_is_critical() {
    let reserve = ReserveConfig {
        minimum_reserve_cents: 100_000,
        warning_threshold_cents: 250_000,
        ..ReserveConfig::default()
    };
    let (engine, processor, _db) = common::engine_with_reserve(reserve).await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    // Platform margin of 3 000 cents is far below the minimum reserve.
    let journal_id =
        post_training_journal(&engine, student_id, instructor_id, 15_000, 12_000, "evt-b1").await;
    onboard_instructor(&engine, instructor_id).await;
    processor.set_balance(3_000);

    engine
        .enqueue_instructor_transfer(instructor_id, 12_000, None, journal_id, false)
        .await
        .unwrap();

    let err = engine.process_due_outbox_entries(10).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientReserve(_)));
    assert_eq!(processor.create_calls(), 0);
}
