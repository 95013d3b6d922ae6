//! Journals.
//!
//! A [`Journal`] is an atomic, balanced set of ledger entries representing
//! one financial event. Journals are immutable once posted; corrections are
//! new offsetting journals, never edits.
//!
//! `(event_type, event_id)` identifies the triggering domain event and is
//! unique, which makes journal posting idempotent: re-posting the same event
//! returns the existing journal.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub id: Uuid,
    pub event_type: String,
    pub event_id: String,
    pub created_at: DateTime<Utc>,
}

impl Journal {
    pub fn new(event_type: &str, event_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            event_id: event_id.to_string(),
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "journals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub event_type: String,
    pub event_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    Entries,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Journal> for ActiveModel {
    fn from(journal: &Journal) -> Self {
        Self {
            id: ActiveValue::Set(journal.id.to_string()),
            event_type: ActiveValue::Set(journal.event_type.clone()),
            event_id: ActiveValue::Set(journal.event_id.clone()),
            created_at: ActiveValue::Set(journal.created_at),
        }
    }
}

impl TryFrom<Model> for Journal {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("journal not exists".to_string()))?,
            event_type: model.event_type,
            event_id: model.event_id,
            created_at: model.created_at,
        })
    }
}
