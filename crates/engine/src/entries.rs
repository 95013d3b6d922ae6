//! Ledger entries.
//!
//! A [`LedgerEntry`] is a single signed balance change applied to one wallet
//! as part of a [`Journal`](crate::Journal).
//!
//! Amounts are stored as signed integer **cents**:
//! - positive values increase the wallet balance
//! - negative values decrease the wallet balance
//!
//! For any journal the entry amounts sum to exactly zero; *every* change to
//! balances happens via entries.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub wallet_id: Uuid,
    pub amount_cents: i64,
    pub ref_type: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl LedgerEntry {
    pub fn new(journal_id: Uuid, draft: &EntryDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            journal_id,
            wallet_id: draft.wallet_id,
            amount_cents: draft.amount_cents,
            ref_type: draft.ref_type.clone(),
            description: draft.description.clone(),
            metadata: draft.metadata.clone(),
        }
    }
}

/// Caller-supplied entry line, before it is attached to a journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub wallet_id: Uuid,
    pub amount_cents: i64,
    pub ref_type: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl EntryDraft {
    pub fn new(wallet_id: Uuid, amount_cents: i64, ref_type: &str) -> Self {
        Self {
            wallet_id,
            amount_cents,
            ref_type: ref_type.to_string(),
            description: None,
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub journal_id: String,
    pub wallet_id: String,
    pub amount_cents: i64,
    pub ref_type: String,
    pub description: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journals::Entity",
        from = "Column::JournalId",
        to = "super::journals::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Journals,
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallets,
}

impl Related<super::journals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journals.def()
    }
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LedgerEntry> for ActiveModel {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            journal_id: ActiveValue::Set(entry.journal_id.to_string()),
            wallet_id: ActiveValue::Set(entry.wallet_id.to_string()),
            amount_cents: ActiveValue::Set(entry.amount_cents),
            ref_type: ActiveValue::Set(entry.ref_type.clone()),
            description: ActiveValue::Set(entry.description.clone()),
            metadata: ActiveValue::Set(entry.metadata.as_ref().map(|m| m.to_string())),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let metadata = model
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|_| EngineError::Validation("invalid entry metadata".to_string()))?;

        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::Validation("invalid entry id".to_string()))?,
            journal_id: Uuid::parse_str(&model.journal_id)
                .map_err(|_| EngineError::KeyNotFound("journal not exists".to_string()))?,
            wallet_id: Uuid::parse_str(&model.wallet_id)
                .map_err(|_| EngineError::KeyNotFound("wallet not exists".to_string()))?,
            amount_cents: model.amount_cents,
            ref_type: model.ref_type,
            description: model.description,
            metadata,
        })
    }
}
