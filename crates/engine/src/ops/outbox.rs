use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Backoff, EngineError, InstructorTransfer, OutboxEntry, OutboxStatus, ProcessorTransfer,
    ResultEngine, TransferMetadata, TransferRequest, accounts, outbox, transfers,
};

use super::{Engine, with_tx};

/// Retry and staleness policy for the payment outbox.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxPolicy {
    pub max_attempts: i32,
    pub backoff: Backoff,
    /// How long an entry may sit in `processing` before recovery treats its
    /// worker as crashed and re-queries the processor.
    pub stale_after: Duration,
}

impl Default for OutboxPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            stale_after: Duration::from_secs(600),
        }
    }
}

/// What one processing pass did to one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessOutcome {
    /// Transfer accepted by the processor; settlement confirmation pending.
    Completed { transfer_id: Uuid },
    /// Entry was not `pending`: another worker owns it or it is done.
    AlreadyHandled,
    /// Attempt failed; the entry went back to `pending` with a backoff.
    Retrying {
        attempt: i32,
        next_attempt_at: DateTime<Utc>,
    },
    /// Attempts exhausted. Terminal; an operator has to look.
    Failed { message: String },
}

impl Engine {
    /// Durably record the intent to pay an instructor for a posted journal.
    ///
    /// Exactly one outbox row exists per `(journal, instructor)` pair no
    /// matter how many times the triggering event fires: a second call hits
    /// the unique idempotency key and returns the existing row's id.
    pub async fn enqueue_instructor_transfer(
        &self,
        instructor_id: Uuid,
        amount_cents: i64,
        flight_session_id: Option<Uuid>,
        journal_id: Uuid,
        is_instant_payout: bool,
    ) -> ResultEngine<Uuid> {
        if amount_cents <= 0 {
            return Err(EngineError::Validation(
                "transfer amount_cents must be > 0".to_string(),
            ));
        }

        let mut entry = OutboxEntry::new(
            instructor_id,
            journal_id,
            flight_session_id,
            amount_cents,
            is_instant_payout,
            Utc::now(),
        );
        entry.max_attempts = self.outbox.max_attempts;

        if let Err(err) = outbox::ActiveModel::from(&entry).insert(&self.database).await {
            // Unique violation on the idempotency key: already enqueued.
            if let Some(existing) = self.find_outbox_by_key(&entry.idempotency_key).await? {
                tracing::info!(
                    idempotency_key = %entry.idempotency_key,
                    outbox_id = %existing,
                    "transfer already enqueued"
                );
                return Ok(existing);
            }
            return Err(err.into());
        }

        Ok(entry.id)
    }

    async fn find_outbox_by_key(&self, idempotency_key: &str) -> ResultEngine<Option<Uuid>> {
        let model = outbox::Entity::find()
            .filter(outbox::Column::IdempotencyKey.eq(idempotency_key))
            .one(&self.database)
            .await?;

        match model {
            Some(model) => Uuid::parse_str(&model.id)
                .map(Some)
                .map_err(|_| EngineError::Validation("invalid outbox id".to_string())),
            None => Ok(None),
        }
    }

    pub async fn outbox_entry(&self, outbox_id: Uuid) -> ResultEngine<OutboxEntry> {
        let model = outbox::Entity::find_by_id(outbox_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("outbox entry not exists".to_string()))?;
        OutboxEntry::try_from(model)
    }

    /// Execute one outbox entry against the processor.
    ///
    /// The claim is an optimistic status-guarded update: only a `pending`
    /// entry can move to `processing`, and the attempt counter is bumped in
    /// the same statement, *before* the network call. Two workers racing on
    /// the same entry resolve at the database: the loser sees zero rows
    /// affected and walks away. A crash mid-call therefore leaves a
    /// detectable `processing` row for [`Engine::recover_stale_entries`],
    /// never a silently lost attempt.
    pub async fn process_outbox_entry(&self, outbox_id: Uuid) -> ResultEngine<ProcessOutcome> {
        let entry = self.outbox_entry(outbox_id).await?;
        if entry.status != OutboxStatus::Pending {
            return Ok(ProcessOutcome::AlreadyHandled);
        }

        let now = Utc::now();
        let claimed = outbox::Entity::update_many()
            .col_expr(
                outbox::Column::Status,
                Expr::value(OutboxStatus::Processing.as_str()),
            )
            .col_expr(
                outbox::Column::AttemptCount,
                Expr::col(outbox::Column::AttemptCount).add(1),
            )
            .col_expr(outbox::Column::LastAttemptAt, Expr::value(now))
            .filter(outbox::Column::Id.eq(outbox_id.to_string()))
            .filter(outbox::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .exec(&self.database)
            .await?;

        if claimed.rows_affected == 0 {
            return Ok(ProcessOutcome::AlreadyHandled);
        }

        // Re-read so the recorded attempt count is the one we just claimed.
        let entry = self.outbox_entry(outbox_id).await?;

        let account = match self.enabled_payout_account(entry.instructor_id).await? {
            Some(account) => account,
            None => {
                return self
                    .record_attempt_failure(
                        &entry,
                        "instructor has not completed payout onboarding",
                        now,
                    )
                    .await;
            }
        };

        let request = TransferRequest {
            amount_cents: entry.amount_cents,
            currency: entry.currency,
            destination_account_id: account,
            idempotency_key: entry.idempotency_key.clone(),
            metadata: TransferMetadata {
                journal_id: entry.journal_id,
                instructor_id: entry.instructor_id,
                outbox_id: entry.id,
                flight_session_id: entry.flight_session_id,
            },
        };

        match self.processor.create_transfer(&request).await {
            Ok(transfer) => {
                let transfer_id = self.complete_entry(&entry, &transfer, now).await?;
                tracing::info!(
                    outbox_id = %entry.id,
                    processor_transfer_id = %transfer.id,
                    amount_cents = entry.amount_cents,
                    "transfer accepted by processor"
                );
                Ok(ProcessOutcome::Completed { transfer_id })
            }
            Err(err) => {
                self.record_attempt_failure(&entry, &err.to_string(), now)
                    .await
            }
        }
    }

    async fn enabled_payout_account(&self, instructor_id: Uuid) -> ResultEngine<Option<String>> {
        let model = accounts::Entity::find_by_id(instructor_id.to_string())
            .one(&self.database)
            .await?;
        Ok(model
            .filter(|m| m.payouts_enabled)
            .map(|m| m.processor_account_id))
    }

    /// Write the local transfer record and close the outbox entry.
    ///
    /// Settlement status starts `pending`; money is not "paid" until the
    /// processor's asynchronous confirmation arrives. The clawback window
    /// opens now. Idempotent on re-entry: a transfer row already keyed to
    /// this outbox entry is reused, which is how a crash between the network
    /// call and this write resolves.
    async fn complete_entry(
        &self,
        entry: &OutboxEntry,
        transfer: &ProcessorTransfer,
        now: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let existing = transfers::Entity::find()
                .filter(transfers::Column::OutboxId.eq(entry.id.to_string()))
                .one(&db_tx)
                .await?;

            let transfer_id = match existing {
                Some(model) => Uuid::parse_str(&model.id)
                    .map_err(|_| EngineError::Validation("invalid transfer id".to_string()))?,
                None => {
                    let record = InstructorTransfer::accepted(
                        entry,
                        &transfer.id,
                        &transfer.destination_account_id,
                        now,
                    );
                    transfers::ActiveModel::from(&record).insert(&db_tx).await?;
                    record.id
                }
            };

            let update = outbox::ActiveModel {
                id: ActiveValue::Set(entry.id.to_string()),
                status: ActiveValue::Set(OutboxStatus::Completed.as_str().to_string()),
                processor_object_id: ActiveValue::Set(Some(transfer.id.clone())),
                completed_at: ActiveValue::Set(Some(now)),
                failure_message: ActiveValue::Set(None),
                ..Default::default()
            };
            update.update(&db_tx).await?;

            Ok(transfer_id)
        })
    }

    async fn record_attempt_failure(
        &self,
        entry: &OutboxEntry,
        message: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<ProcessOutcome> {
        if entry.attempts_remaining() {
            let delay = self.outbox.backoff.delay_for_attempt(entry.attempt_count as u32);
            let next_attempt_at =
                now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

            let update = outbox::ActiveModel {
                id: ActiveValue::Set(entry.id.to_string()),
                status: ActiveValue::Set(OutboxStatus::Pending.as_str().to_string()),
                failure_message: ActiveValue::Set(Some(message.to_string())),
                next_attempt_at: ActiveValue::Set(Some(next_attempt_at)),
                ..Default::default()
            };
            update.update(&self.database).await?;

            tracing::warn!(
                outbox_id = %entry.id,
                attempt = entry.attempt_count,
                max_attempts = entry.max_attempts,
                error = message,
                "transfer attempt failed, will retry"
            );
            Ok(ProcessOutcome::Retrying {
                attempt: entry.attempt_count,
                next_attempt_at,
            })
        } else {
            let update = outbox::ActiveModel {
                id: ActiveValue::Set(entry.id.to_string()),
                status: ActiveValue::Set(OutboxStatus::Failed.as_str().to_string()),
                failure_message: ActiveValue::Set(Some(message.to_string())),
                ..Default::default()
            };
            update.update(&self.database).await?;

            tracing::error!(
                outbox_id = %entry.id,
                attempts = entry.attempt_count,
                error = message,
                "transfer failed terminally, operator action required"
            );
            Ok(ProcessOutcome::Failed {
                message: message.to_string(),
            })
        }
    }

    /// Pending entries whose backoff has elapsed, oldest first.
    pub async fn due_outbox_entries(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> ResultEngine<Vec<Uuid>> {
        let models = outbox::Entity::find()
            .filter(outbox::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .filter(
                Condition::any()
                    .add(outbox::Column::NextAttemptAt.is_null())
                    .add(outbox::Column::NextAttemptAt.lte(now)),
            )
            .order_by_asc(outbox::Column::CreatedAt)
            .limit(limit)
            .all(&self.database)
            .await?;

        let mut ids = Vec::with_capacity(models.len());
        for model in models {
            ids.push(
                Uuid::parse_str(&model.id)
                    .map_err(|_| EngineError::Validation("invalid outbox id".to_string()))?,
            );
        }
        Ok(ids)
    }

    /// One worker pass: gate on the reserve, then drain due entries.
    ///
    /// Processor failures are outcomes, not errors; a single bad entry
    /// cannot stall the batch.
    pub async fn process_due_outbox_entries(
        &self,
        limit: u64,
    ) -> ResultEngine<Vec<(Uuid, ProcessOutcome)>> {
        let reserve = self.check_platform_reserve().await?;
        if reserve.should_block_transfers {
            return Err(EngineError::InsufficientReserve(reserve.message));
        }

        let due = self.due_outbox_entries(Utc::now(), limit).await?;
        let mut outcomes = Vec::with_capacity(due.len());
        for outbox_id in due {
            let outcome = self.process_outbox_entry(outbox_id).await?;
            outcomes.push((outbox_id, outcome));
        }
        Ok(outcomes)
    }

    /// Resolve entries stuck in `processing` by a crashed worker.
    ///
    /// The processor is queried with the entry's idempotency key: if a
    /// transfer exists the crash happened after the call succeeded, so the
    /// entry completes; if not, the attempt is already counted and the entry
    /// goes back to `pending` (or terminally `failed` once attempts ran out).
    pub async fn recover_stale_entries(
        &self,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<(Uuid, ProcessOutcome)>> {
        let stale_after = chrono::Duration::from_std(self.outbox.stale_after)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = now - stale_after;

        let models = outbox::Entity::find()
            .filter(outbox::Column::Status.eq(OutboxStatus::Processing.as_str()))
            .filter(outbox::Column::LastAttemptAt.lte(cutoff))
            .order_by_asc(outbox::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut outcomes = Vec::new();
        for model in models {
            let entry = OutboxEntry::try_from(model)?;
            let outcome = match self
                .processor
                .find_transfer_by_key(&entry.idempotency_key)
                .await
            {
                Ok(Some(transfer)) => {
                    let transfer_id = self.complete_entry(&entry, &transfer, now).await?;
                    tracing::info!(
                        outbox_id = %entry.id,
                        processor_transfer_id = %transfer.id,
                        "recovered stale entry: processor already holds the transfer"
                    );
                    ProcessOutcome::Completed { transfer_id }
                }
                Ok(None) => {
                    self.record_attempt_failure(
                        &entry,
                        "attempt outcome unknown: worker crashed before the processor call",
                        now,
                    )
                    .await?
                }
                Err(err) => {
                    // Leave it in `processing`; the next recovery pass retries.
                    tracing::warn!(
                        outbox_id = %entry.id,
                        error = %err,
                        "could not query processor while recovering stale entry"
                    );
                    continue;
                }
            };
            outcomes.push((entry.id, outcome));
        }
        Ok(outcomes)
    }

    /// The local transfer record created from an outbox entry, if any.
    pub async fn instructor_transfer_for_outbox(
        &self,
        outbox_id: Uuid,
    ) -> ResultEngine<Option<InstructorTransfer>> {
        let model = transfers::Entity::find()
            .filter(transfers::Column::OutboxId.eq(outbox_id.to_string()))
            .one(&self.database)
            .await?;
        model.map(InstructorTransfer::try_from).transpose()
    }
}
