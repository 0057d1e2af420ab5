use chrono::Utc;
use uuid::Uuid;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr};

use crate::{
    AgreementStatus, CancelActor, CreateShipmentCmd, EngineError, EntryKind, OfferStatus,
    ResultEngine, Shipment, ShipmentEvent, ShipmentStatus, agreements, commissions, offers,
    shipments,
    util::{ensure_positive_amount, normalize_required},
};

use super::{Engine, with_tx, wallets::Posting};

/// Reloads after a lost conditional update before giving up.
const TRANSITION_ATTEMPTS: usize = 4;

impl Engine {
    pub(super) async fn load_shipment(
        &self,
        db_tx: &DatabaseTransaction,
        shipment_id: Uuid,
    ) -> ResultEngine<Shipment> {
        let model = shipments::Entity::find_by_id(shipment_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("shipment not exists".to_string()))?;
        Shipment::try_from(model)
    }

    /// Applies `event` to the stored shipment with a compare-and-set on its
    /// status.
    ///
    /// When another writer moved the shipment first, the row is reloaded and
    /// `event` re-applied to the new status, so the caller gets the error the
    /// winner's state implies (e.g. `AlreadyAccepted` for a second `Accept`).
    pub(super) async fn transition_shipment(
        &self,
        db_tx: &DatabaseTransaction,
        shipment_id: Uuid,
        event: ShipmentEvent,
    ) -> ResultEngine<Shipment> {
        for _ in 0..TRANSITION_ATTEMPTS {
            let mut shipment = self.load_shipment(db_tx, shipment_id).await?;
            let from = shipment.status;
            let to = from.apply(event)?;
            if to == from {
                return Ok(shipment);
            }

            let now = Utc::now();
            let result = shipments::Entity::update_many()
                .col_expr(shipments::Column::Status, Expr::value(to.as_str()))
                .col_expr(shipments::Column::UpdatedAt, Expr::value(now))
                .filter(shipments::Column::Id.eq(shipment_id.to_string()))
                .filter(shipments::Column::Status.eq(from.as_str()))
                .exec(db_tx)
                .await?;
            if result.rows_affected == 1 {
                shipment.status = to;
                shipment.updated_at = now;
                return Ok(shipment);
            }
            tracing::debug!(%shipment_id, ?event, "shipment moved concurrently, reloading");
        }
        Err(EngineError::InvalidState(
            "shipment keeps changing concurrently".to_string(),
        ))
    }

    /// Moves an agreement and its commission row to `status`.
    pub(super) async fn set_agreement_status(
        &self,
        db_tx: &DatabaseTransaction,
        agreement_id: &str,
        status: AgreementStatus,
    ) -> ResultEngine<()> {
        agreements::Entity::update_many()
            .col_expr(agreements::Column::Status, Expr::value(status.as_str()))
            .filter(agreements::Column::Id.eq(agreement_id))
            .exec(db_tx)
            .await?;
        commissions::Entity::update_many()
            .col_expr(commissions::Column::Status, Expr::value(status.as_str()))
            .filter(commissions::Column::AgreementId.eq(agreement_id))
            .exec(db_tx)
            .await?;
        Ok(())
    }

    /// The agreement of a shipment, checked against the acting carrier.
    async fn carrier_agreement(
        &self,
        db_tx: &DatabaseTransaction,
        shipment_id: Uuid,
        carrier_id: &str,
    ) -> ResultEngine<agreements::Model> {
        agreements::Entity::find()
            .filter(agreements::Column::ShipmentId.eq(shipment_id.to_string()))
            .filter(agreements::Column::CarrierId.eq(carrier_id))
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("shipment not exists".to_string()))
    }

    /// Post a new shipment in `pending`.
    pub async fn create_shipment(&self, cmd: CreateShipmentCmd) -> ResultEngine<Uuid> {
        let owner_id = normalize_required(&cmd.owner_id, "owner id")?;
        let origin = normalize_required(&cmd.origin, "origin")?;
        let destination = normalize_required(&cmd.destination, "destination")?;
        ensure_positive_amount(cmd.weight_grams, "weight")?;
        ensure_positive_amount(cmd.price_minor, "price")?;
        if let Some(volume) = cmd.volume_cm3 {
            ensure_positive_amount(volume, "volume")?;
        }

        let now = Utc::now();
        let shipment = Shipment {
            id: Uuid::new_v4(),
            owner_id,
            origin,
            destination,
            weight_grams: cmd.weight_grams,
            volume_cm3: cmd.volume_cm3,
            price_minor: cmd.price_minor,
            status: ShipmentStatus::Pending,
            priority: cmd.priority,
            created_at: now,
            updated_at: now,
        };
        with_tx!(self, |db_tx| {
            shipments::ActiveModel::from(&shipment)
                .insert(&db_tx)
                .await?;
            tracing::info!(shipment_id = %shipment.id, owner_id = %shipment.owner_id, "shipment created");
            Ok(shipment.id)
        })
    }

    /// Return a [`Shipment`] (snapshot from DB).
    pub async fn shipment(&self, shipment_id: Uuid) -> ResultEngine<Shipment> {
        with_tx!(self, read |db_tx| self.load_shipment(&db_tx, shipment_id).await)
    }

    /// Shipments posted by `owner_id`, newest first.
    pub async fn shipments_for_owner(&self, owner_id: &str) -> ResultEngine<Vec<Shipment>> {
        with_tx!(self, read |db_tx| {
            shipments::Entity::find()
                .filter(shipments::Column::OwnerId.eq(owner_id))
                .order_by_desc(shipments::Column::CreatedAt)
                .order_by_desc(shipments::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Shipment::try_from)
                .collect()
        })
    }

    /// Cancel a shipment from any non-terminal status.
    ///
    /// Pending offers are cancelled with it. If an agreement was already
    /// formed, its commission goes back to the carrier as a `refund` entry and
    /// the agreement is rejected. The refund is credited even when the
    /// carrier's wallet is frozen.
    pub async fn cancel_shipment(&self, shipment_id: Uuid, actor: CancelActor) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let shipment = self.load_shipment(&db_tx, shipment_id).await?;
            if let CancelActor::Owner(user_id) = &actor
                && shipment.owner_id != *user_id
            {
                return Err(EngineError::NotFound("shipment not exists".to_string()));
            }

            self.transition_shipment(&db_tx, shipment_id, ShipmentEvent::Cancel)
                .await?;

            let cancelled = offers::Entity::update_many()
                .col_expr(
                    offers::Column::Status,
                    Expr::value(OfferStatus::Cancelled.as_str()),
                )
                .col_expr(offers::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(offers::Column::ShipmentId.eq(shipment_id.to_string()))
                .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
                .exec(&db_tx)
                .await?
                .rows_affected;

            let agreement = agreements::Entity::find()
                .filter(agreements::Column::ShipmentId.eq(shipment_id.to_string()))
                .one(&db_tx)
                .await?;
            if let Some(agreement) = agreement {
                let status = AgreementStatus::try_from(agreement.status.as_str())?.reject()?;
                self.set_agreement_status(&db_tx, &agreement.id, status)
                    .await?;
                if agreement.commission_minor > 0 {
                    let description = format!("commission refund for shipment {shipment_id}");
                    self.post_entry(
                        &db_tx,
                        Posting {
                            user_id: &agreement.carrier_id,
                            kind: EntryKind::Refund,
                            amount_minor: agreement.commission_minor,
                            method: None,
                            description: Some(&description),
                            reference_id: Some(agreement.id.clone()),
                            allow_inactive: true,
                        },
                    )
                    .await?;
                }
            }

            tracing::info!(%shipment_id, ?actor, cancelled_offers = cancelled, "shipment cancelled");
            Ok(())
        })
    }

    /// The agreed carrier picked the cargo up.
    pub async fn confirm_pickup(&self, shipment_id: Uuid, carrier_id: &str) -> ResultEngine<Shipment> {
        with_tx!(self, |db_tx| {
            self.carrier_agreement(&db_tx, shipment_id, carrier_id)
                .await?;
            let shipment = self
                .transition_shipment(&db_tx, shipment_id, ShipmentEvent::Pickup)
                .await?;
            tracing::info!(%shipment_id, carrier_id, "shipment picked up");
            Ok(shipment)
        })
    }

    /// The agreed carrier delivered; the agreement completes.
    pub async fn confirm_delivery(
        &self,
        shipment_id: Uuid,
        carrier_id: &str,
    ) -> ResultEngine<Shipment> {
        with_tx!(self, |db_tx| {
            let agreement = self
                .carrier_agreement(&db_tx, shipment_id, carrier_id)
                .await?;
            let shipment = self
                .transition_shipment(&db_tx, shipment_id, ShipmentEvent::Deliver)
                .await?;
            let status = AgreementStatus::try_from(agreement.status.as_str())?.complete()?;
            self.set_agreement_status(&db_tx, &agreement.id, status)
                .await?;
            tracing::info!(%shipment_id, carrier_id, agreement_id = %agreement.id, "shipment delivered");
            Ok(shipment)
        })
    }
}

