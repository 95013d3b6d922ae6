//! Instructor transfers.
//!
//! One row per external payout created from a completed outbox entry.
//! Settlement status is distinct from outbox status: the outbox says "we
//! asked the processor", settlement says "the processor confirmed". A
//! transfer is born `pending` and only becomes `paid` on the asynchronous
//! settlement callback.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError};

/// Hours after creation during which a dispute is reflected as an offsetting
/// journal.
pub const CLAWBACK_WINDOW_HOURS: i64 = 72;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Paid,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for SettlementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::Validation(format!(
                "invalid settlement status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorTransfer {
    pub id: Uuid,
    pub outbox_id: Uuid,
    pub instructor_id: Uuid,
    pub journal_id: Uuid,
    pub flight_session_id: Option<Uuid>,
    pub processor_transfer_id: String,
    pub processor_account_id: String,
    pub amount_cents: i64,
    pub currency: Currency,
    pub status: SettlementStatus,
    pub failure_message: Option<String>,
    pub is_clawback_eligible: bool,
    pub clawback_window_ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InstructorTransfer {
    /// Build the local record for a transfer the processor accepted.
    ///
    /// Settlement starts `pending`; the clawback window opens now.
    pub fn accepted(
        outbox: &crate::OutboxEntry,
        processor_transfer_id: &str,
        processor_account_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbox_id: outbox.id,
            instructor_id: outbox.instructor_id,
            journal_id: outbox.journal_id,
            flight_session_id: outbox.flight_session_id,
            processor_transfer_id: processor_transfer_id.to_string(),
            processor_account_id: processor_account_id.to_string(),
            amount_cents: outbox.amount_cents,
            currency: outbox.currency,
            status: SettlementStatus::Pending,
            failure_message: None,
            is_clawback_eligible: true,
            clawback_window_ends_at: now + chrono::Duration::hours(CLAWBACK_WINDOW_HOURS),
            created_at: now,
        }
    }

    pub fn clawback_window_open(&self, now: DateTime<Utc>) -> bool {
        self.is_clawback_eligible && now <= self.clawback_window_ends_at
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "instructor_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub outbox_id: String,
    pub instructor_id: String,
    pub journal_id: String,
    pub flight_session_id: Option<String>,
    pub processor_transfer_id: String,
    pub processor_account_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub failure_message: Option<String>,
    pub is_clawback_eligible: bool,
    pub clawback_window_ends_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::outbox::Entity",
        from = "Column::OutboxId",
        to = "super::outbox::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Outbox,
}

impl Related<super::outbox::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Outbox.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&InstructorTransfer> for ActiveModel {
    fn from(transfer: &InstructorTransfer) -> Self {
        Self {
            id: ActiveValue::Set(transfer.id.to_string()),
            outbox_id: ActiveValue::Set(transfer.outbox_id.to_string()),
            instructor_id: ActiveValue::Set(transfer.instructor_id.to_string()),
            journal_id: ActiveValue::Set(transfer.journal_id.to_string()),
            flight_session_id: ActiveValue::Set(
                transfer.flight_session_id.map(|id| id.to_string()),
            ),
            processor_transfer_id: ActiveValue::Set(transfer.processor_transfer_id.clone()),
            processor_account_id: ActiveValue::Set(transfer.processor_account_id.clone()),
            amount_cents: ActiveValue::Set(transfer.amount_cents),
            currency: ActiveValue::Set(transfer.currency.code().to_string()),
            status: ActiveValue::Set(transfer.status.as_str().to_string()),
            failure_message: ActiveValue::Set(transfer.failure_message.clone()),
            is_clawback_eligible: ActiveValue::Set(transfer.is_clawback_eligible),
            clawback_window_ends_at: ActiveValue::Set(transfer.clawback_window_ends_at),
            created_at: ActiveValue::Set(transfer.created_at),
        }
    }
}

impl TryFrom<Model> for InstructorTransfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("transfer not exists".to_string()))?,
            outbox_id: Uuid::parse_str(&model.outbox_id)
                .map_err(|_| EngineError::Validation("invalid outbox id".to_string()))?,
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
            processor_transfer_id: model.processor_transfer_id,
            processor_account_id: model.processor_account_id,
            amount_cents: model.amount_cents,
            currency: Currency::try_from(model.currency.as_str()).unwrap_or_default(),
            status: SettlementStatus::try_from(model.status.as_str())?,
            failure_message: model.failure_message,
            is_clawback_eligible: model.is_clawback_eligible,
            clawback_window_ends_at: model.clawback_window_ends_at,
            created_at: model.created_at,
        })
    }
}
