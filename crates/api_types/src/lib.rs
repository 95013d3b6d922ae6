use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
}

pub mod journal {
    use super::*;

    /// One signed entry line of a journal to post.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryNew {
        pub wallet_id: Uuid,
        pub amount_cents: i64,
        pub ref_type: String,
        pub description: Option<String>,
        pub metadata: Option<serde_json::Value>,
    }

    /// Request body for posting a journal.
    ///
    /// `(event_type, event_id)` identify the triggering domain event;
    /// re-posting the same pair returns the existing journal.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct JournalNew {
        pub event_type: String,
        pub event_id: String,
        pub entries: Vec<EntryNew>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct JournalCreated {
        pub journal_id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryView {
        pub journal_id: Uuid,
        pub wallet_id: Uuid,
        pub amount_cents: i64,
        pub ref_type: String,
        pub description: Option<String>,
        pub event_type: String,
        pub event_id: String,
        pub created_at: DateTime<Utc>,
    }
}

pub mod transfer {
    use super::*;

    /// Request body for enqueueing an instructor payout.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferEnqueue {
        pub instructor_id: Uuid,
        pub amount_cents: i64,
        pub journal_id: Uuid,
        pub flight_session_id: Option<Uuid>,
        #[serde(default)]
        pub is_instant_payout: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferEnqueued {
        pub outbox_id: Uuid,
    }
}

pub mod reserve {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ReserveHealth {
        Healthy,
        Warning,
        Critical,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReserveStatusView {
        pub current_reserve_cents: i64,
        pub processor_available_cents: i64,
        pub minimum_required_cents: i64,
        pub drift_cents: i64,
        pub health: ReserveHealth,
        pub should_block_transfers: bool,
        pub message: String,
    }
}

pub mod alert {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AlertView {
        pub id: Uuid,
        pub alert_type: String,
        pub severity: String,
        pub message: String,
        pub platform_balance_cents: Option<i64>,
        pub drift_cents: Option<i64>,
        pub threshold_cents: Option<i64>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AlertAcknowledge {
        pub acknowledged_by: String,
        pub notes: Option<String>,
    }
}

pub mod credit {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum CreditStatus {
        Warning,
        Urgent,
        Exceeded,
    }

    /// One row of the credit-risk scan, most severe first.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct CreditRiskView {
        pub student_id: Uuid,
        pub balance_cents: i64,
        pub limit_cents: i64,
        pub percent_used: f64,
        pub status: CreditStatus,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CreditCheckRequest {
        pub proposed_charge_cents: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CreditCheckView {
        pub allowed: bool,
        pub current_balance_cents: i64,
        pub new_balance_cents: i64,
        pub limit_cents: i64,
        pub warning: Option<String>,
        pub blocked_reason: Option<String>,
    }
}

pub mod balance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub wallet_id: Uuid,
        pub balance_cents: i64,
        pub currency: Currency,
    }
}

pub mod callback {
    use super::*;

    /// Asynchronous events from the payment processor.
    ///
    /// A closed union: an unknown `type` fails to parse rather than falling
    /// through a stringly-typed switch.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum ProcessorEvent {
        /// Settlement confirmed; money left the platform.
        TransferPaid { transfer_id: String },
        /// Settlement failed after the transfer was accepted.
        TransferFailed { transfer_id: String, message: String },
        /// A charge backing a payout was disputed.
        ChargeDisputeCreated {
            transfer_id: String,
            dispute_id: String,
            reason: String,
        },
        /// An instructor's payout account changed.
        AccountUpdated {
            instructor_id: Uuid,
            account_id: String,
            payouts_enabled: bool,
        },
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CallbackReceived {
        pub received: bool,
    }
}
