//! Student credit limits and risk classification.
//!
//! A limit is a negative number of cents: the debt a student may run up
//! before bookings are blocked. Classification is a pure function of the
//! cached balance and the limit; nothing here writes to the ledger.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

/// Deployment-wide classification thresholds, in percent of the limit used.
///
/// The 80/95 defaults match the dunning bands the admin screens show; the
/// exceeded band is implied by crossing 100 %.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreditPolicy {
    pub warning_pct: f64,
    pub urgent_pct: f64,
    /// Limit assigned when a student is first seen, in cents (negative).
    pub default_limit_cents: i64,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            warning_pct: 80.0,
            urgent_pct: 95.0,
            default_limit_cents: -20_000,
        }
    }
}

/// Account standing of a credit-limit row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditAccountStatus {
    Active,
    Suspended,
}

impl CreditAccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl TryFrom<&str> for CreditAccountStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            other => Err(EngineError::Validation(format!(
                "invalid credit account status: {other}"
            ))),
        }
    }
}

/// Risk band of a balance against a limit.
///
/// Ordered by severity; `Ok` is never surfaced to callers of the risk scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Ok,
    Warning,
    Urgent,
    Exceeded,
}

impl CreditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Urgent => "urgent",
            Self::Exceeded => "exceeded",
        }
    }
}

/// Percent of the credit limit a balance has consumed.
///
/// Defined only for negative limits; a positive (credit) balance uses 0 %.
pub fn percent_used(balance_cents: i64, limit_cents: i64) -> f64 {
    if limit_cents >= 0 {
        return 0.0;
    }
    let pct = (balance_cents as f64 / limit_cents as f64) * 100.0;
    pct.max(0.0)
}

/// Classify a balance against a limit.
///
/// Bands: < warning_pct → ok, warning_pct..urgent_pct → warning,
/// urgent_pct..=100 % → urgent, beyond 100 % (or balance below the limit)
/// → exceeded.
pub fn classify(balance_cents: i64, limit_cents: i64, policy: &CreditPolicy) -> CreditStatus {
    if limit_cents < 0 && balance_cents < limit_cents {
        return CreditStatus::Exceeded;
    }
    let pct = percent_used(balance_cents, limit_cents);
    if pct > 100.0 {
        CreditStatus::Exceeded
    } else if pct >= policy.urgent_pct {
        CreditStatus::Urgent
    } else if pct >= policy.warning_pct {
        CreditStatus::Warning
    } else {
        CreditStatus::Ok
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLimit {
    pub student_id: Uuid,
    pub limit_cents: i64,
    pub status: CreditAccountStatus,
}

impl CreditLimit {
    pub fn new(student_id: Uuid, limit_cents: i64) -> Self {
        Self {
            student_id,
            limit_cents,
            status: CreditAccountStatus::Active,
        }
    }
}

/// Row of the "students near their credit limit" scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentCreditRisk {
    pub student_id: Uuid,
    pub balance_cents: i64,
    pub limit_cents: i64,
    pub percent_used: f64,
    pub status: CreditStatus,
}

/// Result of checking a proposed charge against a student's limit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreditCheck {
    pub allowed: bool,
    pub current_balance_cents: i64,
    pub new_balance_cents: i64,
    pub limit_cents: i64,
    pub warning: Option<String>,
    pub blocked_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "student_credit_limits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: String,
    pub limit_cents: i64,
    pub status: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CreditLimit> for ActiveModel {
    fn from(limit: &CreditLimit) -> Self {
        Self {
            student_id: ActiveValue::Set(limit.student_id.to_string()),
            limit_cents: ActiveValue::Set(limit.limit_cents),
            status: ActiveValue::Set(limit.status.as_str().to_string()),
            updated_at: ActiveValue::Set(chrono::Utc::now()),
        }
    }
}

impl TryFrom<Model> for CreditLimit {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            student_id: Uuid::parse_str(&model.student_id)
                .map_err(|_| EngineError::KeyNotFound("credit limit not exists".to_string()))?,
            limit_cents: model.limit_cents,
            status: CreditAccountStatus::try_from(model.status.as_str())?,
        })
    }
}
