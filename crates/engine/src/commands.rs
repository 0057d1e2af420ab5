//! Command structs for engine operations.
//!
//! These types group parameters for the write operations with many optional
//! fields, keeping call sites readable.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Priority;

/// Post a new shipment.
#[derive(Clone, Debug)]
pub struct CreateShipmentCmd {
    pub owner_id: String,
    pub origin: String,
    pub destination: String,
    pub weight_grams: i64,
    pub volume_cm3: Option<i64>,
    pub price_minor: i64,
    pub priority: Priority,
}

impl CreateShipmentCmd {
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        weight_grams: i64,
        price_minor: i64,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            origin: origin.into(),
            destination: destination.into(),
            weight_grams,
            volume_cm3: None,
            price_minor,
            priority: Priority::Normal,
        }
    }

    #[must_use]
    pub fn volume_cm3(mut self, volume_cm3: i64) -> Self {
        self.volume_cm3 = Some(volume_cm3);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Submit a carrier's offer against a shipment.
#[derive(Clone, Debug)]
pub struct SubmitOfferCmd {
    pub shipment_id: Uuid,
    pub carrier_id: String,
    pub price_minor: i64,
    pub estimated_delivery: DateTime<Utc>,
    pub message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubmitOfferCmd {
    #[must_use]
    pub fn new(
        shipment_id: Uuid,
        carrier_id: impl Into<String>,
        price_minor: i64,
        estimated_delivery: DateTime<Utc>,
    ) -> Self {
        Self {
            shipment_id,
            carrier_id: carrier_id.into(),
            price_minor,
            estimated_delivery,
            message: None,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Who is cancelling a shipment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelActor {
    /// The sender; must own the shipment.
    Owner(String),
    /// An administrative action, allowed on any shipment.
    Admin,
}
