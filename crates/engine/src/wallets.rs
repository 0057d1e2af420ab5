//! The module contains the `Wallet` struct and its entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, util::parse_uuid};

/// A user's spendable balance.
///
/// There is at most one wallet per user. `balance` never goes negative and is
/// only changed together with an appended ledger entry; `version` is the
/// sequence number of the latest entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: String,
    pub balance: i64,
    pub currency: Currency,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: String, currency: Currency) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: 0,
            currency,
            is_active: true,
            version: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub user_id: String,
    pub balance: i64,
    pub currency: String,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ledger::Entity")]
    Entries,
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Wallet> for ActiveModel {
    fn from(value: &Wallet) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            balance: ActiveValue::Set(value.balance),
            currency: ActiveValue::Set(value.currency.code().to_string()),
            is_active: ActiveValue::Set(value.is_active),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Wallet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet")?,
            user_id: model.user_id,
            balance: model.balance,
            currency: Currency::try_from(model.currency.as_str())?,
            is_active: model.is_active,
            version: model.version,
            created_at: model.created_at,
        })
    }
}
