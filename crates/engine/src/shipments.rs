//! Shipments and their lifecycle.
//!
//! A shipment starts `pending`, moves to `offers_received` on the first offer,
//! to `accepted` when an agreement is formed, then `in_transit` and
//! `delivered`. `cancelled` is reachable from every non-terminal state.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    OffersReceived,
    Accepted,
    InTransit,
    Delivered,
    Cancelled,
}

/// Something that happened to a shipment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShipmentEvent {
    OfferReceived,
    Accept,
    Pickup,
    Deliver,
    Cancel,
}

impl ShipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OffersReceived => "offers_received",
            Self::Accepted => "accepted",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// `true` while carriers may still bid.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::OffersReceived)
    }

    /// Returns the status reached by applying `event`, or the error describing
    /// why the transition is illegal.
    pub fn apply(self, event: ShipmentEvent) -> ResultEngine<ShipmentStatus> {
        match (self, event) {
            (Self::Pending | Self::OffersReceived, ShipmentEvent::OfferReceived) => {
                Ok(Self::OffersReceived)
            }
            (Self::OffersReceived, ShipmentEvent::Accept) => Ok(Self::Accepted),
            (Self::Accepted | Self::InTransit | Self::Delivered, ShipmentEvent::Accept) => Err(
                EngineError::AlreadyAccepted("shipment already has an agreement".to_string()),
            ),
            (Self::Accepted, ShipmentEvent::Pickup) => Ok(Self::InTransit),
            (Self::InTransit, ShipmentEvent::Deliver) => Ok(Self::Delivered),
            (status, ShipmentEvent::Cancel) if !status.is_terminal() => Ok(Self::Cancelled),
            (status, event) => Err(EngineError::InvalidState(format!(
                "shipment is {}: cannot apply {event:?}",
                status.as_str()
            ))),
        }
    }
}

impl TryFrom<&str> for ShipmentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "offers_received" => Ok(Self::OffersReceived),
            "accepted" => Ok(Self::Accepted),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidInput(format!(
                "invalid shipment status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl TryFrom<&str> for Priority {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(EngineError::InvalidInput(format!(
                "invalid priority: {other}"
            ))),
        }
    }
}

/// A posted transport request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub owner_id: String,
    pub origin: String,
    pub destination: String,
    pub weight_grams: i64,
    pub volume_cm3: Option<i64>,
    /// Declared price in minor units.
    pub price_minor: i64,
    pub status: ShipmentStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub origin: String,
    pub destination: String,
    pub weight_grams: i64,
    pub volume_cm3: Option<i64>,
    pub price_minor: i64,
    pub status: String,
    pub priority: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::offers::Entity")]
    Offers,
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Shipment> for ActiveModel {
    fn from(value: &Shipment) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            owner_id: ActiveValue::Set(value.owner_id.clone()),
            origin: ActiveValue::Set(value.origin.clone()),
            destination: ActiveValue::Set(value.destination.clone()),
            weight_grams: ActiveValue::Set(value.weight_grams),
            volume_cm3: ActiveValue::Set(value.volume_cm3),
            price_minor: ActiveValue::Set(value.price_minor),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            priority: ActiveValue::Set(value.priority.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Shipment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "shipment")?,
            owner_id: model.owner_id,
            origin: model.origin,
            destination: model.destination,
            weight_grams: model.weight_grams,
            volume_cm3: model.volume_cm3,
            price_minor: model.price_minor,
            status: ShipmentStatus::try_from(model.status.as_str())?,
            priority: Priority::try_from(model.priority.as_str())?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ShipmentEvent::*;
    use ShipmentStatus::*;

    #[test]
    fn happy_path() {
        let status = Pending.apply(OfferReceived).unwrap();
        assert_eq!(status, OffersReceived);
        let status = status.apply(Accept).unwrap();
        assert_eq!(status, Accepted);
        let status = status.apply(Pickup).unwrap();
        assert_eq!(status, InTransit);
        assert_eq!(status.apply(Deliver).unwrap(), Delivered);
    }

    #[test]
    fn offer_received_is_idempotent() {
        assert_eq!(OffersReceived.apply(OfferReceived).unwrap(), OffersReceived);
    }

    #[test]
    fn offers_only_while_open() {
        for status in [Accepted, InTransit, Delivered, Cancelled] {
            assert!(matches!(
                status.apply(OfferReceived),
                Err(EngineError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn second_acceptance_is_already_accepted() {
        for status in [Accepted, InTransit, Delivered] {
            assert!(matches!(
                status.apply(Accept),
                Err(EngineError::AlreadyAccepted(_))
            ));
        }
        assert!(matches!(
            Pending.apply(Accept),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            Cancelled.apply(Accept),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn cancel_from_any_non_terminal_state() {
        for status in [Pending, OffersReceived, Accepted, InTransit] {
            assert_eq!(status.apply(Cancel).unwrap(), Cancelled);
        }
        assert!(Delivered.apply(Cancel).is_err());
        assert!(Cancelled.apply(Cancel).is_err());
    }

    #[test]
    fn tracking_steps_cannot_be_skipped() {
        assert!(OffersReceived.apply(Pickup).is_err());
        assert!(Accepted.apply(Deliver).is_err());
        assert!(Pending.apply(Deliver).is_err());
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [Pending, OffersReceived, Accepted, InTransit, Delivered, Cancelled] {
            assert_eq!(ShipmentStatus::try_from(status.as_str()).unwrap(), status);
        }
        assert!(ShipmentStatus::try_from("shipped").is_err());
    }
}
