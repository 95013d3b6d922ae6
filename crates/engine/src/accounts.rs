//! Payout accounts.
//!
//! Local mirror of an instructor's account at the payment processor. The
//! worker refuses to pay an instructor whose account is missing or not yet
//! enabled for payouts; the `account.updated` callback keeps the flag fresh.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutAccount {
    pub instructor_id: Uuid,
    pub processor_account_id: String,
    pub payouts_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payout_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub instructor_id: String,
    pub processor_account_id: String,
    pub payouts_enabled: bool,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PayoutAccount> for ActiveModel {
    fn from(account: &PayoutAccount) -> Self {
        Self {
            instructor_id: ActiveValue::Set(account.instructor_id.to_string()),
            processor_account_id: ActiveValue::Set(account.processor_account_id.clone()),
            payouts_enabled: ActiveValue::Set(account.payouts_enabled),
            updated_at: ActiveValue::Set(chrono::Utc::now()),
        }
    }
}

impl TryFrom<Model> for PayoutAccount {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            instructor_id: Uuid::parse_str(&model.instructor_id)
                .map_err(|_| EngineError::KeyNotFound("payout account not exists".to_string()))?,
            processor_account_id: model.processor_account_id,
            payouts_enabled: model.payouts_enabled,
        })
    }
}
