//! The module contains the errors the engine can throw.
//!
//! Terminal payout failure is deliberately *not* an error variant: a payout
//! that exhausts its attempts is recorded as outbox state (`failed` plus the
//! retained failure message) and surfaced through
//! [`ProcessOutcome`](crate::ProcessOutcome).
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Rejected input: unbalanced journal, bad amount, malformed id.
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    /// Transient failure talking to the payment processor.
    #[error("Processor error: {0}")]
    Processor(String),
    /// New payouts are blocked while the platform reserve is critical.
    #[error("Insufficient reserve: {0}")]
    InsufficientReserve(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Processor(a), Self::Processor(b)) => a == b,
            (Self::InsufficientReserve(a), Self::InsufficientReserve(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
