use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{AlertSeverity, AlertType, ReserveAlert, ResultEngine};

use super::Engine;

/// Deployment thresholds for the platform cash reserve.
///
/// All amounts in cents. `warning_threshold_cents` must sit above
/// `minimum_reserve_cents`; drift thresholds compare the ledger's platform
/// balance to what the processor reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub minimum_reserve_cents: i64,
    pub warning_threshold_cents: i64,
    pub drift_warning_cents: i64,
    pub drift_critical_cents: i64,
    pub block_transfers_when_critical: bool,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            minimum_reserve_cents: 100_000,
            warning_threshold_cents: 250_000,
            drift_warning_cents: 1_000,
            drift_critical_cents: 10_000,
            block_transfers_when_critical: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveHealth {
    Healthy,
    Warning,
    Critical,
}

impl ReserveHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Result of one reserve check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStatus {
    pub current_reserve_cents: i64,
    pub processor_available_cents: i64,
    pub minimum_required_cents: i64,
    pub drift_cents: i64,
    pub health: ReserveHealth,
    pub should_block_transfers: bool,
    pub message: String,
}

fn dollars(cents: i64) -> String {
    format!("{:.2}", cents as f64 / 100.0)
}

impl Engine {
    /// Compare the platform wallet's ledger balance to the processor's
    /// reported balance and classify the reserve.
    ///
    /// The ledger is the source of truth for the reserve amount; the
    /// processor figure is used for reconciliation, never summed in. Drift
    /// and threshold breaches persist deduplicated alerts. Only a critical
    /// reading can block payouts, and only if the deployment opted in.
    pub async fn check_platform_reserve(&self) -> ResultEngine<ReserveStatus> {
        let platform_balance_cents = self.platform_balance().await?;
        let processor_balance = self.processor.retrieve_balance().await?;
        let drift_cents = (platform_balance_cents - processor_balance.available_cents).abs();

        let config = &self.reserve;
        if drift_cents >= config.drift_warning_cents {
            let severity = if drift_cents >= config.drift_critical_cents {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            tracing::warn!(
                platform_balance_cents,
                processor_available_cents = processor_balance.available_cents,
                drift_cents,
                "reserve drift detected"
            );
            let alert = ReserveAlert::new(
                AlertType::DriftDetected,
                severity,
                &format!(
                    "Reserve drift: platform ledger shows {}, processor shows {}, drift of {}",
                    dollars(platform_balance_cents),
                    dollars(processor_balance.available_cents),
                    dollars(drift_cents),
                ),
                Utc::now(),
            )
            .with_platform_balance(platform_balance_cents)
            .with_drift(drift_cents);
            self.insert_alert_deduped(alert).await?;
        }

        let reserve_critical = platform_balance_cents < config.minimum_reserve_cents;
        let drift_critical = drift_cents >= config.drift_critical_cents;
        let reserve_low = platform_balance_cents < config.warning_threshold_cents;
        let drift_high = drift_cents >= config.drift_warning_cents;

        let (health, message) = if reserve_critical || drift_critical {
            let message = if reserve_critical {
                let alert = ReserveAlert::new(
                    AlertType::CriticalThreshold,
                    AlertSeverity::Critical,
                    &format!(
                        "CRITICAL: Platform reserve at {}, below minimum of {}",
                        dollars(platform_balance_cents),
                        dollars(config.minimum_reserve_cents),
                    ),
                    Utc::now(),
                )
                .with_platform_balance(platform_balance_cents)
                .with_threshold(config.minimum_reserve_cents);
                self.insert_alert_deduped(alert).await?;
                format!(
                    "CRITICAL: Platform reserve at {}, below minimum of {}",
                    dollars(platform_balance_cents),
                    dollars(config.minimum_reserve_cents),
                )
            } else {
                format!(
                    "CRITICAL: Reserve drift of {} exceeds the hard ceiling",
                    dollars(drift_cents)
                )
            };
            (ReserveHealth::Critical, message)
        } else if reserve_low || drift_high {
            let message = if reserve_low {
                let alert = ReserveAlert::new(
                    AlertType::WarningThreshold,
                    AlertSeverity::Warning,
                    &format!(
                        "WARNING: Platform reserve at {}, below threshold of {}",
                        dollars(platform_balance_cents),
                        dollars(config.warning_threshold_cents),
                    ),
                    Utc::now(),
                )
                .with_platform_balance(platform_balance_cents)
                .with_threshold(config.warning_threshold_cents);
                self.insert_alert_deduped(alert).await?;
                format!(
                    "WARNING: Platform reserve at {}, below threshold of {}",
                    dollars(platform_balance_cents),
                    dollars(config.warning_threshold_cents),
                )
            } else {
                format!("WARNING: Reserve drift of {}", dollars(drift_cents))
            };
            (ReserveHealth::Warning, message)
        } else {
            (
                ReserveHealth::Healthy,
                "Platform reserve is healthy".to_string(),
            )
        };

        let should_block_transfers =
            health == ReserveHealth::Critical && config.block_transfers_when_critical;

        Ok(ReserveStatus {
            current_reserve_cents: platform_balance_cents,
            processor_available_cents: processor_balance.available_cents,
            minimum_required_cents: config.minimum_reserve_cents,
            drift_cents,
            health,
            should_block_transfers,
            message,
        })
    }
}
