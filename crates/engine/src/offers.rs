//! Carrier offers against a shipment.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl OfferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Every decision is taken from `pending`; all other states are final.
    pub fn ensure_pending(self) -> ResultEngine<()> {
        if self != Self::Pending {
            return Err(EngineError::InvalidState(format!(
                "offer is {}",
                self.as_str()
            )));
        }
        Ok(())
    }
}

impl TryFrom<&str> for OfferStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidInput(format!(
                "invalid offer status: {other}"
            ))),
        }
    }
}

/// A carrier's bid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub carrier_id: String,
    pub price_minor: i64,
    pub message: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub shipment_id: String,
    pub carrier_id: String,
    pub price_minor: i64,
    pub message: Option<String>,
    pub estimated_delivery: DateTimeUtc,
    pub expires_at: Option<DateTimeUtc>,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipments::Entity",
        from = "Column::ShipmentId",
        to = "super::shipments::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Shipments,
}

impl Related<super::shipments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Offer> for ActiveModel {
    fn from(value: &Offer) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            shipment_id: ActiveValue::Set(value.shipment_id.to_string()),
            carrier_id: ActiveValue::Set(value.carrier_id.clone()),
            price_minor: ActiveValue::Set(value.price_minor),
            message: ActiveValue::Set(value.message.clone()),
            estimated_delivery: ActiveValue::Set(value.estimated_delivery),
            expires_at: ActiveValue::Set(value.expires_at),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Offer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "offer")?,
            shipment_id: parse_uuid(&model.shipment_id, "shipment")?,
            carrier_id: model.carrier_id,
            price_minor: model.price_minor,
            message: model.message,
            estimated_delivery: model.estimated_delivery,
            expires_at: model.expires_at,
            status: OfferStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_offers_can_be_decided() {
        assert!(OfferStatus::Pending.ensure_pending().is_ok());
        for status in [
            OfferStatus::Accepted,
            OfferStatus::Rejected,
            OfferStatus::Expired,
            OfferStatus::Cancelled,
        ] {
            assert_eq!(
                status.ensure_pending(),
                Err(EngineError::InvalidState(format!(
                    "offer is {}",
                    status.as_str()
                )))
            );
        }
    }
}
