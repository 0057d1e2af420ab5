use chrono::{DateTime, Utc};
use uuid::Uuid;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr};

use crate::{
    EngineError, Offer, OfferStatus, ResultEngine, ShipmentEvent, SubmitOfferCmd, offers,
    util::{ensure_positive_amount, normalize_optional_text, normalize_required},
};

use super::{Engine, with_tx};

impl Engine {
    pub(super) async fn load_offer(
        &self,
        db_tx: &DatabaseTransaction,
        offer_id: Uuid,
    ) -> ResultEngine<Offer> {
        let model = offers::Entity::find_by_id(offer_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("offer not exists".to_string()))?;
        Offer::try_from(model)
    }

    /// Compare-and-set on the offer status. Losing the race reports the status
    /// the offer ended up in.
    pub(super) async fn set_offer_status(
        &self,
        db_tx: &DatabaseTransaction,
        offer_id: Uuid,
        from: OfferStatus,
        to: OfferStatus,
    ) -> ResultEngine<()> {
        let result = offers::Entity::update_many()
            .col_expr(offers::Column::Status, Expr::value(to.as_str()))
            .col_expr(offers::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(offers::Column::Id.eq(offer_id.to_string()))
            .filter(offers::Column::Status.eq(from.as_str()))
            .exec(db_tx)
            .await?;
        if result.rows_affected == 0 {
            let current = self.load_offer(db_tx, offer_id).await?;
            return Err(EngineError::InvalidState(format!(
                "offer is {}",
                current.status.as_str()
            )));
        }
        Ok(())
    }

    /// Submit a carrier's bid; the first offer moves the shipment to
    /// `offers_received`.
    pub async fn submit_offer(&self, cmd: SubmitOfferCmd) -> ResultEngine<Uuid> {
        ensure_positive_amount(cmd.price_minor, "price")?;
        let carrier_id = normalize_required(&cmd.carrier_id, "carrier id")?;

        with_tx!(self, |db_tx| {
            let shipment = self.load_shipment(&db_tx, cmd.shipment_id).await?;
            if shipment.owner_id == carrier_id {
                return Err(EngineError::InvalidInput(
                    "cannot bid on own shipment".to_string(),
                ));
            }
            self.transition_shipment(&db_tx, shipment.id, ShipmentEvent::OfferReceived)
                .await?;

            let now = Utc::now();
            let offer = Offer {
                id: Uuid::new_v4(),
                shipment_id: shipment.id,
                carrier_id: carrier_id.clone(),
                price_minor: cmd.price_minor,
                message: normalize_optional_text(cmd.message.as_deref()),
                estimated_delivery: cmd.estimated_delivery,
                expires_at: cmd.expires_at,
                status: OfferStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            offers::ActiveModel::from(&offer).insert(&db_tx).await?;
            tracing::info!(
                offer_id = %offer.id,
                shipment_id = %offer.shipment_id,
                carrier_id = %offer.carrier_id,
                price_minor = offer.price_minor,
                "offer submitted"
            );
            Ok(offer.id)
        })
    }

    /// Return an [`Offer`] (snapshot from DB).
    pub async fn offer(&self, offer_id: Uuid) -> ResultEngine<Offer> {
        with_tx!(self, read |db_tx| self.load_offer(&db_tx, offer_id).await)
    }

    /// Every offer on the shipment, oldest first.
    pub async fn list_offers(&self, shipment_id: Uuid) -> ResultEngine<Vec<Offer>> {
        with_tx!(self, read |db_tx| {
            offers::Entity::find()
                .filter(offers::Column::ShipmentId.eq(shipment_id.to_string()))
                .order_by_asc(offers::Column::CreatedAt)
                .order_by_asc(offers::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Offer::try_from)
                .collect()
        })
    }

    /// The sender turns an offer down while the shipment is still open.
    pub async fn reject_offer(&self, offer_id: Uuid, sender_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let offer = self.load_offer(&db_tx, offer_id).await?;
            let shipment = self.load_shipment(&db_tx, offer.shipment_id).await?;
            if shipment.owner_id != sender_id {
                return Err(EngineError::NotFound("offer not exists".to_string()));
            }
            if !shipment.status.is_open() {
                return Err(EngineError::InvalidState(format!(
                    "shipment is {}",
                    shipment.status.as_str()
                )));
            }
            offer.status.ensure_pending()?;
            self.set_offer_status(&db_tx, offer_id, OfferStatus::Pending, OfferStatus::Rejected)
                .await?;
            tracing::info!(%offer_id, shipment_id = %shipment.id, "offer rejected");
            Ok(())
        })
    }

    /// The carrier withdraws its own pending offer.
    pub async fn cancel_offer(&self, offer_id: Uuid, carrier_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let offer = self.load_offer(&db_tx, offer_id).await?;
            if offer.carrier_id != carrier_id {
                return Err(EngineError::NotFound("offer not exists".to_string()));
            }
            offer.status.ensure_pending()?;
            self.set_offer_status(&db_tx, offer_id, OfferStatus::Pending, OfferStatus::Cancelled)
                .await?;
            tracing::info!(%offer_id, carrier_id, "offer cancelled");
            Ok(())
        })
    }

    /// Marks every pending offer whose `expires_at` is at or before `as_of` as
    /// `expired`. Returns how many offers changed.
    pub async fn expire_offers(&self, as_of: DateTime<Utc>) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            let result = offers::Entity::update_many()
                .col_expr(
                    offers::Column::Status,
                    Expr::value(OfferStatus::Expired.as_str()),
                )
                .col_expr(offers::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
                .filter(offers::Column::ExpiresAt.is_not_null())
                .filter(offers::Column::ExpiresAt.lte(as_of))
                .exec(&db_tx)
                .await?;
            if result.rows_affected > 0 {
                tracing::info!(expired = result.rows_affected, %as_of, "offers expired");
            }
            Ok(result.rows_affected)
        })
    }
}
