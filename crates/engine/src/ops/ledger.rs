use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, EntryDraft, Journal, LedgerEntry, ResultEngine, Wallet, WalletOwner, balances,
    entries, journals, wallets,
};

use super::{Engine, with_tx};

/// Zero-sum verdict for one journal, used by reconciliation and audits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JournalBalance {
    pub balanced: bool,
    pub total_cents: i64,
    pub entry_count: usize,
}

impl Engine {
    /// Post a balanced journal and apply it to the cached wallet balances,
    /// all inside one database transaction.
    ///
    /// `(event_type, event_id)` is the idempotency key: re-posting the same
    /// domain event returns the existing journal id instead of writing a
    /// duplicate. The triggering event may be delivered any number of times
    /// (UI double-submit, webhook replay); the ledger records it once.
    pub async fn post_journal(
        &self,
        event_type: &str,
        event_id: &str,
        drafts: &[EntryDraft],
    ) -> ResultEngine<Uuid> {
        if drafts.is_empty() {
            return Err(EngineError::Validation(
                "cannot post an empty journal".to_string(),
            ));
        }

        // Sum over i128 so a pathological set of i64 entries cannot wrap.
        let total: i128 = drafts.iter().map(|d| d.amount_cents as i128).sum();
        if total != 0 {
            return Err(EngineError::Validation(format!(
                "journal entries do not balance: total {total} cents (must be 0)"
            )));
        }

        with_tx!(self, |db_tx| {
            if let Some(existing) = find_journal_by_event(&db_tx, event_type, event_id).await? {
                return Ok(existing);
            }

            let journal = Journal::new(event_type, event_id, Utc::now());
            if let Err(err) = journals::ActiveModel::from(&journal).insert(&db_tx).await {
                // Unique violation on (event_type, event_id): someone posted
                // the same event between our check and the insert.
                if let Some(existing) =
                    find_journal_by_event(&db_tx, event_type, event_id).await?
                {
                    return Ok(existing);
                }
                return Err(err.into());
            }

            let mut deltas: HashMap<Uuid, i64> = HashMap::new();
            for draft in drafts {
                let entry = LedgerEntry::new(journal.id, draft);
                entries::ActiveModel::from(&entry).insert(&db_tx).await?;
                *deltas.entry(draft.wallet_id).or_insert(0) += draft.amount_cents;
            }

            for (wallet_id, delta) in deltas {
                self.apply_balance_delta(&db_tx, wallet_id, delta).await?;
            }

            Ok(journal.id)
        })
    }

    async fn apply_balance_delta(
        &self,
        db_tx: &DatabaseTransaction,
        wallet_id: Uuid,
        delta_cents: i64,
    ) -> ResultEngine<()> {
        let balance_model = balances::Entity::find_by_id(wallet_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("wallet not exists".to_string()))?;

        let updated = balances::ActiveModel {
            wallet_id: ActiveValue::Set(wallet_id.to_string()),
            balance_cents: ActiveValue::Set(balance_model.balance_cents + delta_cents),
            updated_at: ActiveValue::Set(Utc::now()),
        };
        updated.update(db_tx).await?;
        Ok(())
    }

    /// Find the wallet for an owner, creating it (with a zero balance row)
    /// on first contact. Safe against concurrent first contact: a unique
    /// index on `(owner_type, owner_id)` turns the race into a re-read.
    pub async fn get_or_create_wallet(&self, owner: WalletOwner) -> ResultEngine<Uuid> {
        if let Some(existing) = self.find_wallet(owner).await? {
            return Ok(existing);
        }

        let wallet = Wallet::new(owner);
        let db_tx = self.database.begin().await?;

        if let Err(err) = wallets::ActiveModel::from(&wallet).insert(&db_tx).await {
            db_tx.rollback().await?;
            return match self.find_wallet(owner).await? {
                Some(existing) => Ok(existing),
                None => Err(err.into()),
            };
        }

        let balance = balances::ActiveModel {
            wallet_id: ActiveValue::Set(wallet.id.to_string()),
            balance_cents: ActiveValue::Set(0),
            updated_at: ActiveValue::Set(Utc::now()),
        };
        balance.insert(&db_tx).await?;

        db_tx.commit().await?;
        Ok(wallet.id)
    }

    pub(crate) async fn find_wallet(&self, owner: WalletOwner) -> ResultEngine<Option<Uuid>> {
        let mut query = wallets::Entity::find()
            .filter(wallets::Column::OwnerType.eq(owner.kind().as_str()));
        query = match owner.owner_id() {
            Some(owner_id) => query.filter(wallets::Column::OwnerId.eq(owner_id.to_string())),
            None => query.filter(wallets::Column::OwnerId.is_null()),
        };

        match query.one(&self.database).await? {
            Some(model) => {
                let id = Uuid::parse_str(&model.id)
                    .map_err(|_| EngineError::Validation("invalid wallet id".to_string()))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Cached balance of a wallet, in cents.
    pub async fn wallet_balance(&self, wallet_id: Uuid) -> ResultEngine<i64> {
        let model = balances::Entity::find_by_id(wallet_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("wallet not exists".to_string()))?;
        Ok(model.balance_cents)
    }

    pub async fn student_balance(&self, student_id: Uuid) -> ResultEngine<i64> {
        let wallet_id = self
            .get_or_create_wallet(WalletOwner::Student { student_id })
            .await?;
        self.wallet_balance(wallet_id).await
    }

    pub async fn instructor_balance(&self, instructor_id: Uuid) -> ResultEngine<i64> {
        let wallet_id = self
            .get_or_create_wallet(WalletOwner::Instructor { instructor_id })
            .await?;
        self.wallet_balance(wallet_id).await
    }

    pub async fn platform_balance(&self) -> ResultEngine<i64> {
        let wallet_id = self.get_or_create_wallet(WalletOwner::Platform).await?;
        self.wallet_balance(wallet_id).await
    }

    /// Recent ledger entries for a wallet (transaction history), newest
    /// journal first.
    pub async fn wallet_ledger_entries(
        &self,
        wallet_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> ResultEngine<Vec<(LedgerEntry, Journal)>> {
        let query = entries::Entity::find()
            .filter(entries::Column::WalletId.eq(wallet_id.to_string()))
            .order_by_desc(journals::Column::CreatedAt)
            .limit(limit)
            .offset(offset);

        let rows: Vec<(entries::Model, Option<journals::Model>)> = query
            .find_also_related(journals::Entity)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (entry_model, journal_model) in rows {
            let Some(journal_model) = journal_model else {
                continue;
            };
            out.push((
                LedgerEntry::try_from(entry_model)?,
                Journal::try_from(journal_model)?,
            ));
        }
        Ok(out)
    }

    /// A journal with all of its entries.
    pub async fn journal_details(
        &self,
        journal_id: Uuid,
    ) -> ResultEngine<(Journal, Vec<LedgerEntry>)> {
        let journal_model = journals::Entity::find_by_id(journal_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("journal not exists".to_string()))?;

        let entry_models = entries::Entity::find()
            .filter(entries::Column::JournalId.eq(journal_id.to_string()))
            .all(&self.database)
            .await?;

        let journal = Journal::try_from(journal_model)?;
        let mut entries_out = Vec::with_capacity(entry_models.len());
        for model in entry_models {
            entries_out.push(LedgerEntry::try_from(model)?);
        }
        Ok((journal, entries_out))
    }

    /// Re-check the zero-sum invariant of a posted journal.
    pub async fn verify_journal_balance(&self, journal_id: Uuid) -> ResultEngine<JournalBalance> {
        let entry_models = entries::Entity::find()
            .filter(entries::Column::JournalId.eq(journal_id.to_string()))
            .all(&self.database)
            .await?;

        let total: i128 = entry_models.iter().map(|e| e.amount_cents as i128).sum();
        Ok(JournalBalance {
            balanced: total == 0,
            total_cents: total as i64,
            entry_count: entry_models.len(),
        })
    }
}

async fn find_journal_by_event(
    db_tx: &DatabaseTransaction,
    event_type: &str,
    event_id: &str,
) -> ResultEngine<Option<Uuid>> {
    let existing = journals::Entity::find()
        .filter(journals::Column::EventType.eq(event_type))
        .filter(journals::Column::EventId.eq(event_id))
        .one(db_tx)
        .await?;

    match existing {
        Some(model) => Uuid::parse_str(&model.id)
            .map(Some)
            .map_err(|_| EngineError::Validation("invalid journal id".to_string())),
        None => Ok(None),
    }
}
