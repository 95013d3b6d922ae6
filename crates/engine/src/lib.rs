//! Financial core of the flight-school platform.
//!
//! The engine owns the double-entry ledger, the cached wallet balances, the
//! credit-limit risk scan, the platform reserve monitor and the payout
//! outbox. Everything money-related goes through [`Engine`]; the upstream
//! CRUD world only ever calls [`Engine::post_journal`] and
//! [`Engine::enqueue_instructor_transfer`] and reads back the query surface.

pub use accounts::PayoutAccount;
pub use alerts::{AlertSeverity, AlertType, ReserveAlert};
pub use credit::{
    classify, percent_used, CreditAccountStatus, CreditCheck, CreditLimit, CreditPolicy,
    CreditStatus, StudentCreditRisk,
};
pub use currency::Currency;
pub use entries::{EntryDraft, LedgerEntry};
pub use error::EngineError;
pub use journals::Journal;
pub use ops::{
    DisputeOutcome, Engine, EngineBuilder, JournalBalance, OutboxPolicy, ProcessOutcome,
    ReserveConfig, ReserveHealth, ReserveStatus, WalletDrift,
};
pub use outbox::{idempotency_key, OutboxEntry, OutboxStatus, DEFAULT_MAX_ATTEMPTS};
pub use processor::{
    HttpProcessor, PaymentProcessor, ProcessorBalance, ProcessorConfig, ProcessorError,
    ProcessorTransfer, TransferMetadata, TransferRequest,
};
pub use retry::Backoff;
pub use transfers::{InstructorTransfer, SettlementStatus, CLAWBACK_WINDOW_HOURS};
pub use wallets::{OwnerKind, Wallet, WalletOwner};

pub mod accounts;
pub mod alerts;
pub mod balances;
pub mod credit;
mod currency;
pub mod entries;
mod error;
pub mod journals;
mod ops;
pub mod outbox;
mod processor;
mod retry;
pub mod transfers;
pub mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
