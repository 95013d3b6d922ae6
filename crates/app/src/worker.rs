//! Background loops: the outbox worker and the balance reconciliation pass.
//!
//! Correctness under several concurrent workers does not live here; it
//! lives in the engine's status-guarded claim. These loops only decide how
//! often to look for work.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use engine::{Engine, EngineError, ProcessOutcome};

#[derive(Debug, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_secs: u64,
}

fn default_poll_secs() -> u64 {
    30
}

fn default_batch_size() -> u64 {
    25
}

fn default_reconcile_secs() -> u64 {
    3_600
}

/// Poll the outbox: recover crashed attempts, then drain due entries.
///
/// A critical reserve reading skips the whole batch; entries stay `pending`
/// and are picked up once the reserve recovers.
pub async fn run_outbox_worker(engine: Engine, settings: WorkerSettings) {
    tracing::info!(
        poll_secs = settings.poll_secs,
        batch_size = settings.batch_size,
        "outbox worker started"
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(settings.poll_secs));

    loop {
        ticker.tick().await;

        match engine.recover_stale_entries(Utc::now()).await {
            Ok(recovered) if !recovered.is_empty() => {
                tracing::info!(count = recovered.len(), "recovered stale outbox entries");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "stale-entry recovery failed");
            }
        }

        match engine.process_due_outbox_entries(settings.batch_size).await {
            Ok(outcomes) => {
                for (outbox_id, outcome) in outcomes {
                    match outcome {
                        ProcessOutcome::Completed { transfer_id } => {
                            tracing::info!(%outbox_id, %transfer_id, "payout dispatched");
                        }
                        ProcessOutcome::AlreadyHandled => {
                            tracing::debug!(%outbox_id, "entry already handled");
                        }
                        ProcessOutcome::Retrying {
                            attempt,
                            next_attempt_at,
                        } => {
                            tracing::warn!(
                                %outbox_id,
                                attempt,
                                %next_attempt_at,
                                "payout attempt failed, rescheduled"
                            );
                        }
                        ProcessOutcome::Failed { message } => {
                            tracing::error!(%outbox_id, error = %message, "payout failed terminally");
                        }
                    }
                }
            }
            Err(EngineError::InsufficientReserve(message)) => {
                tracing::warn!(reason = %message, "payouts blocked by reserve status");
            }
            Err(err) => {
                tracing::error!(error = %err, "outbox pass failed");
            }
        }
    }
}

/// Periodically recompute wallet balances from the ledger and alert on
/// drift. Drift is never auto-corrected.
pub async fn run_reconciliation(engine: Engine, reconcile_secs: u64) {
    tracing::info!(reconcile_secs, "reconciliation loop started");
    let mut ticker = tokio::time::interval(Duration::from_secs(reconcile_secs));

    loop {
        ticker.tick().await;

        match engine.reconcile_wallet_balances().await {
            Ok(drifts) if drifts.is_empty() => {
                tracing::debug!("reconciliation passed, all balances match");
            }
            Ok(drifts) => {
                tracing::warn!(count = drifts.len(), "reconciliation found drifting wallets");
            }
            Err(err) => {
                tracing::error!(error = %err, "reconciliation failed");
            }
        }
    }
}
