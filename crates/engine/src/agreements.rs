//! Agreements: the binding result of accepting one offer.
//!
//! Monetary fields are written once at creation; only `status` moves
//! afterwards (`accepted` → `completed` on delivery, `accepted` → `rejected`
//! when the shipment is cancelled).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CommissionBreakdown, EngineError, Offer, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl AgreementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn complete(self) -> ResultEngine<Self> {
        match self {
            Self::Accepted => Ok(Self::Completed),
            other => Err(EngineError::InvalidState(format!(
                "agreement is {}",
                other.as_str()
            ))),
        }
    }

    pub fn reject(self) -> ResultEngine<Self> {
        match self {
            Self::Pending | Self::Accepted => Ok(Self::Rejected),
            other => Err(EngineError::InvalidState(format!(
                "agreement is {}",
                other.as_str()
            ))),
        }
    }
}

impl TryFrom<&str> for AgreementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid agreement status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub shipment_id: Uuid,
    pub sender_id: String,
    pub carrier_id: String,
    pub agreed_price_minor: i64,
    pub commission_minor: i64,
    pub carrier_receives_minor: i64,
    pub commission_rate_ppm: u32,
    pub status: AgreementStatus,
    pub created_at: DateTime<Utc>,
}

impl Agreement {
    /// Builds the agreement for `offer`, already `accepted`.
    pub(crate) fn from_offer(
        offer: &Offer,
        sender_id: &str,
        split: &CommissionBreakdown,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            offer_id: offer.id,
            shipment_id: offer.shipment_id,
            sender_id: sender_id.to_string(),
            carrier_id: offer.carrier_id.clone(),
            agreed_price_minor: split.agreed_price_minor,
            commission_minor: split.commission_minor,
            carrier_receives_minor: split.carrier_receives_minor,
            commission_rate_ppm: split.rate.ppm(),
            status: AgreementStatus::Accepted,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "agreements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub offer_id: String,
    #[sea_orm(unique)]
    pub shipment_id: String,
    pub sender_id: String,
    pub carrier_id: String,
    pub agreed_price_minor: i64,
    pub commission_minor: i64,
    pub carrier_receives_minor: i64,
    pub commission_rate_ppm: i64,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::commissions::Entity")]
    Commissions,
}

impl Related<super::commissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Agreement> for ActiveModel {
    fn from(value: &Agreement) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            offer_id: ActiveValue::Set(value.offer_id.to_string()),
            shipment_id: ActiveValue::Set(value.shipment_id.to_string()),
            sender_id: ActiveValue::Set(value.sender_id.clone()),
            carrier_id: ActiveValue::Set(value.carrier_id.clone()),
            agreed_price_minor: ActiveValue::Set(value.agreed_price_minor),
            commission_minor: ActiveValue::Set(value.commission_minor),
            carrier_receives_minor: ActiveValue::Set(value.carrier_receives_minor),
            commission_rate_ppm: ActiveValue::Set(i64::from(value.commission_rate_ppm)),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Agreement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "agreement")?,
            offer_id: parse_uuid(&model.offer_id, "offer")?,
            shipment_id: parse_uuid(&model.shipment_id, "shipment")?,
            sender_id: model.sender_id,
            carrier_id: model.carrier_id,
            agreed_price_minor: model.agreed_price_minor,
            commission_minor: model.commission_minor,
            carrier_receives_minor: model.carrier_receives_minor,
            commission_rate_ppm: u32::try_from(model.commission_rate_ppm).map_err(|_| {
                EngineError::InvalidInput("invalid stored commission rate".to_string())
            })?,
            status: AgreementStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_accepted_agreements_complete() {
        assert_eq!(
            AgreementStatus::Accepted.complete().unwrap(),
            AgreementStatus::Completed
        );
        assert!(AgreementStatus::Rejected.complete().is_err());
        assert!(AgreementStatus::Completed.reject().is_err());
    }
}
