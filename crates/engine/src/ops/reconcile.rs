use chrono::Utc;
use sea_orm::{Statement, prelude::*};
use uuid::Uuid;

use crate::{AlertSeverity, AlertType, ReserveAlert, ResultEngine, balances};

use super::Engine;

/// One wallet whose cached balance disagrees with its entry sum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalletDrift {
    pub wallet_id: Uuid,
    pub cached_cents: i64,
    pub computed_cents: i64,
}

impl Engine {
    /// Recompute every wallet balance from the ledger and compare it to the
    /// cache.
    ///
    /// A mismatch is an audit signal, not a repair job: it raises a
    /// deduplicated `reconciliation_drift` alert and leaves the cache
    /// untouched so an operator can see what happened. Returns the drifting
    /// wallets.
    pub async fn reconcile_wallet_balances(&self) -> ResultEngine<Vec<WalletDrift>> {
        let balance_models = balances::Entity::find().all(&self.database).await?;

        let backend = self.database.get_database_backend();
        let mut drifts = Vec::new();

        for model in balance_models {
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT COALESCE(SUM(amount_cents), 0) AS sum \
                 FROM ledger_entries \
                 WHERE wallet_id = ?",
                vec![model.wallet_id.clone().into()],
            );
            let row = self.database.query_one(stmt).await?;
            let computed_cents: i64 = row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0);

            if computed_cents != model.balance_cents {
                let wallet_id = Uuid::parse_str(&model.wallet_id).unwrap_or_default();
                tracing::warn!(
                    wallet_id = %model.wallet_id,
                    cached_cents = model.balance_cents,
                    computed_cents,
                    "wallet balance drifted from ledger"
                );

                let drift_cents = model.balance_cents - computed_cents;
                let alert = ReserveAlert::new(
                    AlertType::ReconciliationDrift,
                    AlertSeverity::Warning,
                    &format!(
                        "Wallet {} cache shows {} cents, ledger sums to {} cents",
                        model.wallet_id, model.balance_cents, computed_cents
                    ),
                    Utc::now(),
                )
                .with_drift(drift_cents);
                self.insert_alert_deduped(alert).await?;

                drifts.push(WalletDrift {
                    wallet_id,
                    cached_cents: model.balance_cents,
                    computed_cents,
                });
            }
        }

        Ok(drifts)
    }
}
