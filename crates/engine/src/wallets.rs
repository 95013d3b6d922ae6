//! Wallets.
//!
//! A wallet is an account bucket (the platform, a student, or an instructor)
//! whose balance is the sum of its ledger entries. Wallet rows are created
//! lazily the first time money touches an owner and are never deleted.
//!
//! There is exactly one platform wallet; it is the only wallet with a null
//! `owner_id`.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Platform,
    Student,
    Instructor,
}

impl OwnerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Student => "student",
            Self::Instructor => "instructor",
        }
    }
}

impl TryFrom<&str> for OwnerKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "platform" => Ok(Self::Platform),
            "student" => Ok(Self::Student),
            "instructor" => Ok(Self::Instructor),
            other => Err(EngineError::Validation(format!(
                "invalid wallet owner kind: {other}"
            ))),
        }
    }
}

/// Who a wallet belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "owner", rename_all = "snake_case")]
pub enum WalletOwner {
    Platform,
    Student { student_id: Uuid },
    Instructor { instructor_id: Uuid },
}

impl WalletOwner {
    pub fn kind(self) -> OwnerKind {
        match self {
            Self::Platform => OwnerKind::Platform,
            Self::Student { .. } => OwnerKind::Student,
            Self::Instructor { .. } => OwnerKind::Instructor,
        }
    }

    pub fn owner_id(self) -> Option<Uuid> {
        match self {
            Self::Platform => None,
            Self::Student { student_id } => Some(student_id),
            Self::Instructor { instructor_id } => Some(instructor_id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub owner: WalletOwner,
}

impl Wallet {
    pub fn new(owner: WalletOwner) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_type: String,
    pub owner_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    Entries,
    #[sea_orm(has_one = "super::balances::Entity")]
    Balance,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl Related<super::balances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Balance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Wallet> for ActiveModel {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: ActiveValue::Set(wallet.id.to_string()),
            owner_type: ActiveValue::Set(wallet.owner.kind().as_str().to_string()),
            owner_id: ActiveValue::Set(wallet.owner.owner_id().map(|id| id.to_string())),
            created_at: ActiveValue::Set(chrono::Utc::now()),
        }
    }
}

impl TryFrom<Model> for Wallet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&model.id)
            .map_err(|_| EngineError::KeyNotFound("wallet not exists".to_string()))?;
        let kind = OwnerKind::try_from(model.owner_type.as_str())?;
        let owner_id = model
            .owner_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| EngineError::Validation("invalid wallet owner id".to_string()))?;

        let owner = match (kind, owner_id) {
            (OwnerKind::Platform, None) => WalletOwner::Platform,
            (OwnerKind::Student, Some(student_id)) => WalletOwner::Student { student_id },
            (OwnerKind::Instructor, Some(instructor_id)) => {
                WalletOwner::Instructor { instructor_id }
            }
            _ => {
                return Err(EngineError::Validation(
                    "wallet owner id does not match owner kind".to_string(),
                ));
            }
        };

        Ok(Self { id, owner })
    }
}
