//! Payment processor contract.
//!
//! The engine never talks to a module-level client: a [`PaymentProcessor`]
//! is injected at build time, so tests substitute a fake and deployments
//! point [`HttpProcessor`] at the real thing.
//!
//! The contract is deliberately narrow: idempotent transfer creation, a
//! balance read, and a lookup by idempotency key. The lookup exists for
//! crash recovery: when a worker dies between "transfer created" and "row
//! written", the next pass asks the processor whether the key already has a
//! transfer instead of blindly retrying.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::Currency;

#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Network-level failure; safe to retry with the same idempotency key.
    #[error("processor unreachable: {0}")]
    Transport(String),
    /// The processor answered and said no.
    #[error("processor rejected request: {0}")]
    Rejected(String),
}

impl From<ProcessorError> for crate::EngineError {
    fn from(err: ProcessorError) -> Self {
        crate::EngineError::Processor(err.to_string())
    }
}

/// Request to create a transfer to an instructor's processor account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub amount_cents: i64,
    pub currency: Currency,
    pub destination_account_id: String,
    pub idempotency_key: String,
    pub metadata: TransferMetadata,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferMetadata {
    pub journal_id: Uuid,
    pub instructor_id: Uuid,
    pub outbox_id: Uuid,
    pub flight_session_id: Option<Uuid>,
}

/// A transfer as the processor reports it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProcessorTransfer {
    pub id: String,
    pub amount_cents: i64,
    pub destination_account_id: String,
}

/// The processor's view of the platform's money.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ProcessorBalance {
    pub available_cents: i64,
    pub pending_cents: i64,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a transfer. Calling twice with the same idempotency key must
    /// return the same transfer, not create a second one.
    async fn create_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<ProcessorTransfer, ProcessorError>;

    /// The platform balance as the processor sees it.
    async fn retrieve_balance(&self) -> Result<ProcessorBalance, ProcessorError>;

    /// Look up a transfer by the idempotency key it was created with.
    async fn find_transfer_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ProcessorTransfer>, ProcessorError>;
}

/// Connection settings for the HTTP processor client.
#[derive(Clone, Debug, Deserialize)]
pub struct ProcessorConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout_secs: u64,
}

/// reqwest-backed [`PaymentProcessor`] with a bounded request timeout.
pub struct HttpProcessor {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct TransferList {
    data: Vec<ProcessorTransfer>,
}

impl HttpProcessor {
    pub fn new(config: &ProcessorConfig) -> Result<Self, ProcessorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ProcessorError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProcessorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProcessorError::Rejected(format!("{status}: {body}")))
    }
}

#[async_trait]
impl PaymentProcessor for HttpProcessor {
    async fn create_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<ProcessorTransfer, ProcessorError> {
        let response = self
            .client
            .post(self.url("/v1/transfers"))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(|err| ProcessorError::Transport(err.to_string()))?;

        Self::check(response)
            .await?
            .json::<ProcessorTransfer>()
            .await
            .map_err(|err| ProcessorError::Transport(err.to_string()))
    }

    async fn retrieve_balance(&self) -> Result<ProcessorBalance, ProcessorError> {
        let response = self
            .client
            .get(self.url("/v1/balance"))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|err| ProcessorError::Transport(err.to_string()))?;

        Self::check(response)
            .await?
            .json::<ProcessorBalance>()
            .await
            .map_err(|err| ProcessorError::Transport(err.to_string()))
    }

    async fn find_transfer_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ProcessorTransfer>, ProcessorError> {
        let response = self
            .client
            .get(self.url("/v1/transfers"))
            .bearer_auth(&self.secret_key)
            .query(&[("idempotency_key", idempotency_key)])
            .send()
            .await
            .map_err(|err| ProcessorError::Transport(err.to_string()))?;

        let list = Self::check(response)
            .await?
            .json::<TransferList>()
            .await
            .map_err(|err| ProcessorError::Transport(err.to_string()))?;

        Ok(list.data.into_iter().next())
    }
}
