//! Commission read model.
//!
//! One row per agreement, copied from it at creation time for reporting. The
//! agreement stays the source of truth; `status` follows the agreement's.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Agreement, AgreementStatus, EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub agreement_id: Uuid,
    pub shipment_id: Uuid,
    pub carrier_id: String,
    pub agreed_price_minor: i64,
    pub commission_minor: i64,
    pub carrier_receives_minor: i64,
    pub status: AgreementStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Agreement> for Commission {
    fn from(agreement: &Agreement) -> Self {
        Self {
            id: Uuid::new_v4(),
            agreement_id: agreement.id,
            shipment_id: agreement.shipment_id,
            carrier_id: agreement.carrier_id.clone(),
            agreed_price_minor: agreement.agreed_price_minor,
            commission_minor: agreement.commission_minor,
            carrier_receives_minor: agreement.carrier_receives_minor,
            status: agreement.status,
            created_at: agreement.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "commissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub agreement_id: String,
    pub shipment_id: String,
    pub carrier_id: String,
    pub agreed_price_minor: i64,
    pub commission_minor: i64,
    pub carrier_receives_minor: i64,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::agreements::Entity",
        from = "Column::AgreementId",
        to = "super::agreements::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Agreements,
}

impl Related<super::agreements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agreements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Commission> for ActiveModel {
    fn from(value: &Commission) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            agreement_id: ActiveValue::Set(value.agreement_id.to_string()),
            shipment_id: ActiveValue::Set(value.shipment_id.to_string()),
            carrier_id: ActiveValue::Set(value.carrier_id.clone()),
            agreed_price_minor: ActiveValue::Set(value.agreed_price_minor),
            commission_minor: ActiveValue::Set(value.commission_minor),
            carrier_receives_minor: ActiveValue::Set(value.carrier_receives_minor),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Commission {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "commission")?,
            agreement_id: parse_uuid(&model.agreement_id, "agreement")?,
            shipment_id: parse_uuid(&model.shipment_id, "shipment")?,
            carrier_id: model.carrier_id,
            agreed_price_minor: model.agreed_price_minor,
            commission_minor: model.commission_minor,
            carrier_receives_minor: model.carrier_receives_minor,
            status: AgreementStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
        })
    }
}
