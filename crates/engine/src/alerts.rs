//! Reserve and reconciliation alerts.
//!
//! Alert rows are the audit signal for anything the money paths refuse to
//! fix silently: reserve drift, threshold breaches, reconciliation
//! mismatches, late disputes. Delivery (email/push) belongs to an external
//! collaborator; this module only owns alert state.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Ledger balance and processor balance disagree beyond the threshold.
    DriftDetected,
    /// Platform reserve below the warning threshold.
    WarningThreshold,
    /// Platform reserve below the minimum.
    CriticalThreshold,
    /// Cached wallet balance disagrees with the entry sum.
    ReconciliationDrift,
    /// Dispute arrived after the clawback window closed.
    DisputeOutsideWindow,
    /// Processor reported a transfer as failed after acceptance.
    TransferFailed,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DriftDetected => "drift_detected",
            Self::WarningThreshold => "warning_threshold",
            Self::CriticalThreshold => "critical_threshold",
            Self::ReconciliationDrift => "reconciliation_drift",
            Self::DisputeOutsideWindow => "dispute_outside_window",
            Self::TransferFailed => "transfer_failed",
        }
    }
}

impl TryFrom<&str> for AlertType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "drift_detected" => Ok(Self::DriftDetected),
            "warning_threshold" => Ok(Self::WarningThreshold),
            "critical_threshold" => Ok(Self::CriticalThreshold),
            "reconciliation_drift" => Ok(Self::ReconciliationDrift),
            "dispute_outside_window" => Ok(Self::DisputeOutsideWindow),
            "transfer_failed" => Ok(Self::TransferFailed),
            other => Err(EngineError::Validation(format!(
                "invalid alert type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl TryFrom<&str> for AlertSeverity {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(EngineError::Validation(format!(
                "invalid alert severity: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveAlert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub platform_balance_cents: Option<i64>,
    pub drift_cents: Option<i64>,
    pub threshold_cents: Option<i64>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReserveAlert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            message: message.to_string(),
            platform_balance_cents: None,
            drift_cents: None,
            threshold_cents: None,
            acknowledged_at: None,
            acknowledged_by: None,
            resolution_notes: None,
            created_at,
        }
    }

    pub fn with_platform_balance(mut self, cents: i64) -> Self {
        self.platform_balance_cents = Some(cents);
        self
    }

    pub fn with_drift(mut self, cents: i64) -> Self {
        self.drift_cents = Some(cents);
        self
    }

    pub fn with_threshold(mut self, cents: i64) -> Self {
        self.threshold_cents = Some(cents);
        self
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reserve_alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub platform_balance_cents: Option<i64>,
    pub drift_cents: Option<i64>,
    pub threshold_cents: Option<i64>,
    pub acknowledged_at: Option<DateTimeUtc>,
    pub acknowledged_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ReserveAlert> for ActiveModel {
    fn from(alert: &ReserveAlert) -> Self {
        Self {
            id: ActiveValue::Set(alert.id.to_string()),
            alert_type: ActiveValue::Set(alert.alert_type.as_str().to_string()),
            severity: ActiveValue::Set(alert.severity.as_str().to_string()),
            message: ActiveValue::Set(alert.message.clone()),
            platform_balance_cents: ActiveValue::Set(alert.platform_balance_cents),
            drift_cents: ActiveValue::Set(alert.drift_cents),
            threshold_cents: ActiveValue::Set(alert.threshold_cents),
            acknowledged_at: ActiveValue::Set(alert.acknowledged_at),
            acknowledged_by: ActiveValue::Set(alert.acknowledged_by.clone()),
            resolution_notes: ActiveValue::Set(alert.resolution_notes.clone()),
            created_at: ActiveValue::Set(alert.created_at),
        }
    }
}

impl TryFrom<Model> for ReserveAlert {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("alert not exists".to_string()))?,
            alert_type: AlertType::try_from(model.alert_type.as_str())?,
            severity: AlertSeverity::try_from(model.severity.as_str())?,
            message: model.message,
            platform_balance_cents: model.platform_balance_cents,
            drift_cents: model.drift_cents,
            threshold_cents: model.threshold_cents,
            acknowledged_at: model.acknowledged_at,
            acknowledged_by: model.acknowledged_by,
            resolution_notes: model.resolution_notes,
            created_at: model.created_at,
        })
    }
}
