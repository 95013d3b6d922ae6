use sea_orm::{ActiveValue, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    CreditAccountStatus, CreditCheck, CreditLimit, CreditStatus, ResultEngine, StudentCreditRisk,
    WalletOwner, classify, credit, percent_used,
};

use super::Engine;

fn dollars(cents: i64) -> String {
    format!("{:.2}", cents as f64 / 100.0)
}

impl Engine {
    /// Student balance without creating a wallet: the credit paths are
    /// read-only by contract, and a student who never moved money simply
    /// has a zero balance.
    async fn student_balance_readonly(&self, student_id: Uuid) -> ResultEngine<i64> {
        match self.find_wallet(WalletOwner::Student { student_id }).await? {
            Some(wallet_id) => self.wallet_balance(wallet_id).await,
            None => Ok(0),
        }
    }

    /// The student's credit-limit row, created with the deployment default
    /// on first contact.
    pub async fn credit_limit(&self, student_id: Uuid) -> ResultEngine<CreditLimit> {
        if let Some(model) = credit::Entity::find_by_id(student_id.to_string())
            .one(&self.database)
            .await?
        {
            return CreditLimit::try_from(model);
        }

        let limit = CreditLimit::new(student_id, self.credit.default_limit_cents);
        match credit::ActiveModel::from(&limit).insert(&self.database).await {
            Ok(_) => Ok(limit),
            // Concurrent first contact: someone else inserted the row.
            Err(_) => {
                let model = credit::Entity::find_by_id(student_id.to_string())
                    .one(&self.database)
                    .await?
                    .ok_or_else(|| {
                        crate::EngineError::KeyNotFound("credit limit not exists".to_string())
                    })?;
                CreditLimit::try_from(model)
            }
        }
    }

    pub async fn update_credit_limit(
        &self,
        student_id: Uuid,
        new_limit_cents: i64,
    ) -> ResultEngine<()> {
        // Touch the row first so updating an unseen student still works.
        self.credit_limit(student_id).await?;

        let update = credit::ActiveModel {
            student_id: ActiveValue::Set(student_id.to_string()),
            limit_cents: ActiveValue::Set(new_limit_cents),
            updated_at: ActiveValue::Set(chrono::Utc::now()),
            ..Default::default()
        };
        update.update(&self.database).await?;
        Ok(())
    }

    pub async fn set_credit_account_status(
        &self,
        student_id: Uuid,
        status: CreditAccountStatus,
    ) -> ResultEngine<()> {
        self.credit_limit(student_id).await?;

        let update = credit::ActiveModel {
            student_id: ActiveValue::Set(student_id.to_string()),
            status: ActiveValue::Set(status.as_str().to_string()),
            updated_at: ActiveValue::Set(chrono::Utc::now()),
            ..Default::default()
        };
        update.update(&self.database).await?;
        Ok(())
    }

    /// Can this student afford a proposed charge?
    ///
    /// Read-only; the scheduling component consults this before confirming a
    /// booking. A suspended account blocks regardless of balance. The answer
    /// carries a warning once the *resulting* balance would cross the
    /// warning or urgent band.
    pub async fn check_credit_limit(
        &self,
        student_id: Uuid,
        proposed_charge_cents: i64,
    ) -> ResultEngine<CreditCheck> {
        let limit = self.credit_limit(student_id).await?;
        let current_balance_cents = self.student_balance_readonly(student_id).await?;
        let new_balance_cents = current_balance_cents - proposed_charge_cents;

        if limit.status == CreditAccountStatus::Suspended {
            return Ok(CreditCheck {
                allowed: false,
                current_balance_cents,
                new_balance_cents,
                limit_cents: limit.limit_cents,
                warning: None,
                blocked_reason: Some("Account suspended".to_string()),
            });
        }

        if new_balance_cents < limit.limit_cents {
            return Ok(CreditCheck {
                allowed: false,
                current_balance_cents,
                new_balance_cents,
                limit_cents: limit.limit_cents,
                warning: None,
                blocked_reason: Some(format!(
                    "Credit limit exceeded. Balance would be {}, limit is {}",
                    dollars(new_balance_cents),
                    dollars(limit.limit_cents),
                )),
            });
        }

        let warning = match classify(new_balance_cents, limit.limit_cents, &self.credit) {
            CreditStatus::Urgent | CreditStatus::Exceeded => Some(format!(
                "URGENT: Close to credit limit ({}%). Balance after charge: {}, limit: {}",
                self.credit.urgent_pct,
                dollars(new_balance_cents),
                dollars(limit.limit_cents),
            )),
            CreditStatus::Warning => Some(format!(
                "Approaching credit limit ({}%). Balance after charge: {}, limit: {}",
                self.credit.warning_pct,
                dollars(new_balance_cents),
                dollars(limit.limit_cents),
            )),
            CreditStatus::Ok => None,
        };

        Ok(CreditCheck {
            allowed: true,
            current_balance_cents,
            new_balance_cents,
            limit_cents: limit.limit_cents,
            warning,
            blocked_reason: None,
        })
    }

    /// Every active student whose classification is not ok, most severe
    /// first (then by percent used). Side-effect-free.
    pub async fn students_near_credit_limit(&self) -> ResultEngine<Vec<StudentCreditRisk>> {
        let limit_models = credit::Entity::find()
            .filter(credit::Column::Status.eq(CreditAccountStatus::Active.as_str()))
            .all(&self.database)
            .await?;

        let mut results = Vec::new();
        for model in limit_models {
            let limit = CreditLimit::try_from(model)?;
            let balance_cents = self.student_balance_readonly(limit.student_id).await?;
            let status = classify(balance_cents, limit.limit_cents, &self.credit);
            if status == CreditStatus::Ok {
                continue;
            }

            results.push(StudentCreditRisk {
                student_id: limit.student_id,
                balance_cents,
                limit_cents: limit.limit_cents,
                percent_used: percent_used(balance_cents, limit.limit_cents),
                status,
            });
        }

        results.sort_by(|a, b| {
            b.status.cmp(&a.status).then(
                b.percent_used
                    .partial_cmp(&a.percent_used)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        Ok(results)
    }
}
