use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AlertSeverity, AlertType, EngineError, EntryDraft, InstructorTransfer, PayoutAccount,
    ReserveAlert, ResultEngine, SettlementStatus, WalletOwner, accounts, transfers,
};

use super::Engine;

/// What a dispute callback did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeOutcome {
    /// Clawback window still open: an offsetting journal was posted.
    Offset { journal_id: Uuid },
    /// Window closed: alert raised for operator action, ledger untouched.
    OutsideWindow,
}

impl Engine {
    async fn transfer_by_processor_id(
        &self,
        processor_transfer_id: &str,
    ) -> ResultEngine<InstructorTransfer> {
        let model = transfers::Entity::find()
            .filter(transfers::Column::ProcessorTransferId.eq(processor_transfer_id))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transfer not exists".to_string()))?;
        InstructorTransfer::try_from(model)
    }

    /// Settlement confirmation: the processor paid the transfer out.
    ///
    /// Idempotent; replays of the callback are no-ops.
    pub async fn transfer_paid(&self, processor_transfer_id: &str) -> ResultEngine<()> {
        let transfer = self.transfer_by_processor_id(processor_transfer_id).await?;
        if transfer.status == SettlementStatus::Paid {
            return Ok(());
        }

        let update = transfers::ActiveModel {
            id: ActiveValue::Set(transfer.id.to_string()),
            status: ActiveValue::Set(SettlementStatus::Paid.as_str().to_string()),
            ..Default::default()
        };
        update.update(&self.database).await?;

        tracing::info!(
            processor_transfer_id,
            transfer_id = %transfer.id,
            "transfer settled"
        );
        Ok(())
    }

    /// Settlement failure after acceptance. The transfer record keeps the
    /// processor's message and an alert is raised; the completed outbox
    /// entry is left alone, settled work is never reversed from here.
    pub async fn transfer_failed(
        &self,
        processor_transfer_id: &str,
        message: &str,
    ) -> ResultEngine<()> {
        let transfer = self.transfer_by_processor_id(processor_transfer_id).await?;
        if transfer.status == SettlementStatus::Failed {
            return Ok(());
        }

        let update = transfers::ActiveModel {
            id: ActiveValue::Set(transfer.id.to_string()),
            status: ActiveValue::Set(SettlementStatus::Failed.as_str().to_string()),
            failure_message: ActiveValue::Set(Some(message.to_string())),
            ..Default::default()
        };
        update.update(&self.database).await?;

        tracing::error!(
            processor_transfer_id,
            transfer_id = %transfer.id,
            error = message,
            "transfer failed at settlement"
        );
        self.insert_alert(ReserveAlert::new(
            AlertType::TransferFailed,
            AlertSeverity::Warning,
            &format!("Transfer {processor_transfer_id} failed at settlement: {message}"),
            Utc::now(),
        ))
        .await?;
        Ok(())
    }

    /// A dispute landed on a paid-out transfer.
    ///
    /// Inside the clawback window the money moves back through the ledger as
    /// a new offsetting journal keyed by the dispute id; the original
    /// journal and transfer rows stay immutable, and a replayed callback
    /// posts nothing twice. Outside the window nothing is reversed
    /// automatically; a critical alert hands the case to an operator.
    pub async fn dispute_created(
        &self,
        processor_transfer_id: &str,
        dispute_id: &str,
        reason: &str,
    ) -> ResultEngine<DisputeOutcome> {
        let transfer = self.transfer_by_processor_id(processor_transfer_id).await?;
        let now = Utc::now();

        if !transfer.clawback_window_open(now) {
            tracing::error!(
                processor_transfer_id,
                dispute_id,
                reason,
                "dispute arrived outside the clawback window"
            );
            self.insert_alert(ReserveAlert::new(
                AlertType::DisputeOutsideWindow,
                AlertSeverity::Critical,
                &format!(
                    "Dispute {dispute_id} on transfer {processor_transfer_id} arrived after \
                     the clawback window closed ({reason})"
                ),
                now,
            ))
            .await?;
            return Ok(DisputeOutcome::OutsideWindow);
        }

        let instructor_wallet = self
            .get_or_create_wallet(WalletOwner::Instructor {
                instructor_id: transfer.instructor_id,
            })
            .await?;
        let platform_wallet = self.get_or_create_wallet(WalletOwner::Platform).await?;

        let metadata = serde_json::json!({
            "dispute_id": dispute_id,
            "processor_transfer_id": processor_transfer_id,
            "reason": reason,
        });
        let drafts = vec![
            EntryDraft::new(instructor_wallet, -transfer.amount_cents, "charge_dispute")
                .with_description(&format!("Dispute {dispute_id} - instructor clawback"))
                .with_metadata(metadata.clone()),
            EntryDraft::new(platform_wallet, transfer.amount_cents, "charge_dispute")
                .with_description(&format!("Dispute {dispute_id} - platform recovery"))
                .with_metadata(metadata),
        ];

        let journal_id = self
            .post_journal("charge_dispute", dispute_id, &drafts)
            .await?;

        tracing::warn!(
            processor_transfer_id,
            dispute_id,
            journal_id = %journal_id,
            amount_cents = transfer.amount_cents,
            "dispute recorded as offsetting journal"
        );
        Ok(DisputeOutcome::Offset { journal_id })
    }

    /// The processor updated an instructor's payout account.
    pub async fn payout_account_updated(
        &self,
        instructor_id: Uuid,
        processor_account_id: &str,
        payouts_enabled: bool,
    ) -> ResultEngine<()> {
        let account = PayoutAccount {
            instructor_id,
            processor_account_id: processor_account_id.to_string(),
            payouts_enabled,
        };

        let existing = accounts::Entity::find_by_id(instructor_id.to_string())
            .one(&self.database)
            .await?;

        if existing.is_some() {
            let update = accounts::ActiveModel {
                instructor_id: ActiveValue::Set(instructor_id.to_string()),
                processor_account_id: ActiveValue::Set(processor_account_id.to_string()),
                payouts_enabled: ActiveValue::Set(payouts_enabled),
                updated_at: ActiveValue::Set(Utc::now()),
            };
            update.update(&self.database).await?;
        } else {
            accounts::ActiveModel::from(&account)
                .insert(&self.database)
                .await?;
        }

        tracing::info!(
            instructor_id = %instructor_id,
            processor_account_id,
            payouts_enabled,
            "payout account updated"
        );
        Ok(())
    }
}
