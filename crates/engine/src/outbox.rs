//! Payment outbox.
//!
//! An outbox entry is the durable intent to pay an instructor, written before
//! any network call so the payout survives crashes and duplicate triggers.
//! At most one entry exists per `(journal, instructor)` pair, enforced by the
//! unique idempotency key.
//!
//! State machine: `pending → processing → completed`, or
//! `processing → pending` (retry with backoff) while attempts remain, or
//! `processing → failed` (terminal, operator action required).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError};

/// Default attempt ceiling for new entries.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Deterministic idempotency key for a payout: one per (journal, instructor).
///
/// The same key is sent to the processor, so duplication is impossible even
/// if the local record is lost between the network call and the commit.
pub fn idempotency_key(journal_id: Uuid, instructor_id: Uuid) -> String {
    format!("transfer_{journal_id}_{instructor_id}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl TryFrom<&str> for OutboxStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::Validation(format!(
                "invalid outbox status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub idempotency_key: String,
    pub instructor_id: Uuid,
    pub journal_id: Uuid,
    pub flight_session_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: Currency,
    /// Request flag kept for audit; processing always creates a standard
    /// transfer and never auto-triggers the instant variant.
    pub is_instant_payout: bool,
    pub status: OutboxStatus,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub failure_message: Option<String>,
    /// External transfer id once completed.
    pub processor_object_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn new(
        instructor_id: Uuid,
        journal_id: Uuid,
        flight_session_id: Option<Uuid>,
        amount_cents: i64,
        is_instant_payout: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            idempotency_key: idempotency_key(journal_id, instructor_id),
            instructor_id,
            journal_id,
            flight_session_id,
            amount_cents,
            currency: Currency::Usd,
            is_instant_payout,
            status: OutboxStatus::Pending,
            attempt_count: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            next_attempt_at: None,
            last_attempt_at: None,
            failure_message: None,
            processor_object_id: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn attempts_remaining(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub idempotency_key: String,
    pub instructor_id: String,
    pub journal_id: String,
    pub flight_session_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub is_instant_payout: bool,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_attempt_at: Option<DateTimeUtc>,
    pub last_attempt_at: Option<DateTimeUtc>,
    pub failure_message: Option<String>,
    pub processor_object_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::transfers::Entity")]
    Transfer,
}

impl Related<super::transfers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transfer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&OutboxEntry> for ActiveModel {
    fn from(entry: &OutboxEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            idempotency_key: ActiveValue::Set(entry.idempotency_key.clone()),
            instructor_id: ActiveValue::Set(entry.instructor_id.to_string()),
            journal_id: ActiveValue::Set(entry.journal_id.to_string()),
            flight_session_id: ActiveValue::Set(
                entry.flight_session_id.map(|id| id.to_string()),
            ),
            amount_cents: ActiveValue::Set(entry.amount_cents),
            currency: ActiveValue::Set(entry.currency.code().to_string()),
            is_instant_payout: ActiveValue::Set(entry.is_instant_payout),
            status: ActiveValue::Set(entry.status.as_str().to_string()),
            attempt_count: ActiveValue::Set(entry.attempt_count),
            max_attempts: ActiveValue::Set(entry.max_attempts),
            next_attempt_at: ActiveValue::Set(entry.next_attempt_at),
            last_attempt_at: ActiveValue::Set(entry.last_attempt_at),
            failure_message: ActiveValue::Set(entry.failure_message.clone()),
            processor_object_id: ActiveValue::Set(entry.processor_object_id.clone()),
            created_at: ActiveValue::Set(entry.created_at),
            completed_at: ActiveValue::Set(entry.completed_at),
        }
    }
}

impl TryFrom<Model> for OutboxEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("outbox entry not exists".to_string()))?,
            idempotency_key: model.idempotency_key,
            instructor_id: Uuid::parse_str(&model.instructor_id)
                .map_err(|_| EngineError::Validation("invalid instructor id".to_string()))?,
            journal_id: Uuid::parse_str(&model.journal_id)
                .map_err(|_| EngineError::Validation("invalid journal id".to_string()))?,
            flight_session_id: model
                .flight_session_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| EngineError::Validation("invalid flight session id".to_string()))?,
            amount_cents: model.amount_cents,
            currency: Currency::try_from(model.currency.as_str()).unwrap_or_default(),
            is_instant_payout: model.is_instant_payout,
            status: OutboxStatus::try_from(model.status.as_str())?,
            attempt_count: model.attempt_count,
            max_attempts: model.max_attempts,
            next_attempt_at: model.next_attempt_at,
            last_attempt_at: model.last_attempt_at,
            failure_message: model.failure_message,
            processor_object_id: model.processor_object_id,
            created_at: model.created_at,
            completed_at: model.completed_at,
        })
    }
}
