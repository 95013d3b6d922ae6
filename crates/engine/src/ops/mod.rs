use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{CreditPolicy, EngineError, PaymentProcessor, ResultEngine};

mod alerts;
mod callbacks;
mod credit;
mod ledger;
mod outbox;
mod reconcile;
mod reserve;

pub use callbacks::DisputeOutcome;
pub use ledger::JournalBalance;
pub use outbox::{OutboxPolicy, ProcessOutcome};
pub use reconcile::WalletDrift;
pub use reserve::{ReserveConfig, ReserveHealth, ReserveStatus};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The financial core. Holds the database, the injected payment-processor
/// client and the deployment policies; all operations hang off this type.
#[derive(Clone)]
pub struct Engine {
    pub(crate) database: DatabaseConnection,
    pub(crate) processor: Arc<dyn PaymentProcessor>,
    pub(crate) reserve: ReserveConfig,
    pub(crate) credit: CreditPolicy,
    pub(crate) outbox: OutboxPolicy,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("reserve", &self.reserve)
            .field("credit", &self.credit)
            .field("outbox", &self.outbox)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    processor: Option<Arc<dyn PaymentProcessor>>,
    reserve: ReserveConfig,
    credit: CreditPolicy,
    outbox: OutboxPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the required payment-processor client.
    pub fn processor(mut self, processor: Arc<dyn PaymentProcessor>) -> EngineBuilder {
        self.processor = Some(processor);
        self
    }

    pub fn reserve_config(mut self, reserve: ReserveConfig) -> EngineBuilder {
        self.reserve = reserve;
        self
    }

    pub fn credit_policy(mut self, credit: CreditPolicy) -> EngineBuilder {
        self.credit = credit;
        self
    }

    pub fn outbox_policy(mut self, outbox: OutboxPolicy) -> EngineBuilder {
        self.outbox = outbox;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> ResultEngine<Engine> {
        let processor = self.processor.ok_or_else(|| {
            EngineError::Validation("a payment processor client is required".to_string())
        })?;

        Ok(Engine {
            database: self.database,
            processor,
            reserve: self.reserve,
            credit: self.credit,
            outbox: self.outbox,
        })
    }
}
