#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    Backoff, Engine, EntryDraft, OutboxPolicy, PaymentProcessor, ProcessorBalance, ProcessorError,
    ProcessorTransfer, ReserveConfig, TransferRequest, WalletOwner,
};
use migration::MigratorTrait;

/// Scriptable in-memory stand-in for the payment processor.
///
/// Remembers transfers by idempotency key (so repeated creates with the same
/// key return the same transfer, like the real thing), counts create calls,
/// and can be told to fail.
pub struct FakeProcessor {
    transfers: Mutex<HashMap<String, ProcessorTransfer>>,
    balance: Mutex<ProcessorBalance>,
    fail_with: Mutex<Option<String>>,
    create_calls: AtomicUsize,
}

impl FakeProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            transfers: Mutex::new(HashMap::new()),
            balance: Mutex::new(ProcessorBalance {
                available_cents: 0,
                pending_cents: 0,
            }),
            fail_with: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_balance(&self, available_cents: i64) {
        self.balance.lock().unwrap().available_cents = available_cents;
    }

    pub fn fail_transfers(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn succeed_transfers(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Pretend a transfer already exists processor-side (crash recovery tests).
    pub fn register_transfer(&self, idempotency_key: &str, transfer_id: &str, amount_cents: i64) {
        self.transfers.lock().unwrap().insert(
            idempotency_key.to_string(),
            ProcessorTransfer {
                id: transfer_id.to_string(),
                amount_cents,
                destination_account_id: "acct_test".to_string(),
            },
        );
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<ProcessorTransfer, ProcessorError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(ProcessorError::Transport(message));
        }

        let mut transfers = self.transfers.lock().unwrap();
        if let Some(existing) = transfers.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let transfer = ProcessorTransfer {
            id: format!("tr_{}", transfers.len() + 1),
            amount_cents: request.amount_cents,
            destination_account_id: request.destination_account_id.clone(),
        };
        transfers.insert(request.idempotency_key.clone(), transfer.clone());
        Ok(transfer)
    }

    async fn retrieve_balance(&self) -> Result<ProcessorBalance, ProcessorError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn find_transfer_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ProcessorTransfer>, ProcessorError> {
        Ok(self.transfers.lock().unwrap().get(idempotency_key).cloned())
    }
}

/// Backoff with no delay so retried entries are due immediately.
pub fn instant_backoff() -> Backoff {
    Backoff {
        base: Duration::ZERO,
        cap: Duration::ZERO,
        jitter: 0.0,
    }
}

pub fn test_outbox_policy() -> OutboxPolicy {
    OutboxPolicy {
        max_attempts: 3,
        backoff: instant_backoff(),
        stale_after: Duration::from_secs(300),
    }
}

pub async fn engine_with_db() -> (Engine, Arc<FakeProcessor>, DatabaseConnection) {
    engine_with_reserve(ReserveConfig::default()).await
}

pub async fn engine_with_reserve(
    reserve: ReserveConfig,
) -> (Engine, Arc<FakeProcessor>, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let processor = FakeProcessor::new();
    let engine = Engine::builder()
        .database(db.clone())
        .processor(processor.clone())
        .reserve_config(reserve)
        .outbox_policy(test_outbox_policy())
        .build()
        .unwrap();

    (engine, processor, db)
}

/// File-backed database for tests that hammer the engine from several tasks.
pub async fn engine_with_file_db() -> (
    Engine,
    Arc<FakeProcessor>,
    DatabaseConnection,
    std::path::PathBuf,
) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let processor = FakeProcessor::new();
    let engine = Engine::builder()
        .database(db.clone())
        .processor(processor.clone())
        .outbox_policy(test_outbox_policy())
        .build()
        .unwrap();

    (engine, processor, db, path)
}

/// Post the three-way split a completed training event produces: student
/// pays, instructor earns, the platform keeps the margin.
pub async fn post_training_journal(
    engine: &Engine,
    student_id: Uuid,
    instructor_id: Uuid,
    charge_cents: i64,
    payout_cents: i64,
    event_id: &str,
) -> Uuid {
    let student_wallet = engine
        .get_or_create_wallet(WalletOwner::Student { student_id })
        .await
        .unwrap();
    let instructor_wallet = engine
        .get_or_create_wallet(WalletOwner::Instructor { instructor_id })
        .await
        .unwrap();
    let platform_wallet = engine
        .get_or_create_wallet(WalletOwner::Platform)
        .await
        .unwrap();

    let drafts = vec![
        EntryDraft::new(student_wallet, -charge_cents, "training_event")
            .with_description("Flight - student charge"),
        EntryDraft::new(instructor_wallet, payout_cents, "training_event")
            .with_description("Flight - instructor payout"),
        EntryDraft::new(platform_wallet, charge_cents - payout_cents, "training_event")
            .with_description("Flight - platform margin"),
    ];

    engine
        .post_journal("training_event", event_id, &drafts)
        .await
        .unwrap()
}

/// Enable the instructor's payout account so the worker can pay them.
pub async fn onboard_instructor(engine: &Engine, instructor_id: Uuid) {
    engine
        .payout_account_updated(instructor_id, &format!("acct_{instructor_id}"), true)
        .await
        .unwrap();
}
