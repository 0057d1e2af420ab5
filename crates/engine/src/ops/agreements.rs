use chrono::Utc;
use uuid::Uuid;

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*, sea_query::Expr};

use crate::{
    Agreement, Commission, EngineError, EntryKind, Offer, OfferStatus, ResultEngine,
    ShipmentEvent, agreements, commission, commissions, offers,
};

use super::{Engine, with_tx, wallets::Posting};

impl Engine {
    /// Accept `offer_id` on behalf of the shipment's sender.
    pub async fn accept_offer(&self, offer_id: Uuid, sender_id: &str) -> ResultEngine<Agreement> {
        with_tx!(self, |db_tx| {
            let offer = self.load_offer(&db_tx, offer_id).await?;
            let shipment = self.load_shipment(&db_tx, offer.shipment_id).await?;
            if shipment.owner_id != sender_id {
                return Err(EngineError::NotFound("offer not exists".to_string()));
            }
            self.form_agreement_in_tx(&db_tx, offer, &shipment.owner_id)
                .await
        })
    }

    /// Turn a pending offer into an agreement and collect the commission.
    pub async fn form_agreement(&self, offer_id: Uuid) -> ResultEngine<Agreement> {
        with_tx!(self, |db_tx| {
            let offer = self.load_offer(&db_tx, offer_id).await?;
            let shipment = self.load_shipment(&db_tx, offer.shipment_id).await?;
            self.form_agreement_in_tx(&db_tx, offer, &shipment.owner_id)
                .await
        })
    }

    /// Agreement formation.
    ///
    /// The shipment's `Accept` transition goes first: it is the gate that lets
    /// exactly one acceptance per shipment through, and the loser of a race
    /// must see `AlreadyAccepted` even though its offer was just rejected by
    /// the winner.
    async fn form_agreement_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        offer: Offer,
        sender_id: &str,
    ) -> ResultEngine<Agreement> {
        self.transition_shipment(db_tx, offer.shipment_id, ShipmentEvent::Accept)
            .await?;
        offer.status.ensure_pending()?;

        let rate = self.commission_rates.current_commission_rate();
        let split = commission::calculate(offer.price_minor, rate)?;

        self.set_offer_status(db_tx, offer.id, OfferStatus::Pending, OfferStatus::Accepted)
            .await?;
        let rejected = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Rejected.as_str()),
            )
            .col_expr(offers::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(offers::Column::ShipmentId.eq(offer.shipment_id.to_string()))
            .filter(offers::Column::Id.ne(offer.id.to_string()))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .exec(db_tx)
            .await?
            .rows_affected;

        let agreement = Agreement::from_offer(&offer, sender_id, &split, Utc::now());
        agreements::ActiveModel::from(&agreement)
            .insert(db_tx)
            .await?;
        commissions::ActiveModel::from(&Commission::from(&agreement))
            .insert(db_tx)
            .await?;

        if split.commission_minor > 0 {
            let description = format!("commission {rate} for shipment {}", offer.shipment_id);
            self.post_entry(
                db_tx,
                Posting {
                    user_id: &agreement.carrier_id,
                    kind: EntryKind::Commission,
                    amount_minor: split.commission_minor,
                    method: None,
                    description: Some(&description),
                    reference_id: Some(agreement.id.to_string()),
                    allow_inactive: false,
                },
            )
            .await?;
        }

        tracing::info!(
            agreement_id = %agreement.id,
            shipment_id = %agreement.shipment_id,
            carrier_id = %agreement.carrier_id,
            agreed_price_minor = agreement.agreed_price_minor,
            commission_minor = agreement.commission_minor,
            rejected_offers = rejected,
            "agreement formed"
        );
        Ok(agreement)
    }

    /// Return an [`Agreement`] (snapshot from DB).
    pub async fn agreement(&self, agreement_id: Uuid) -> ResultEngine<Agreement> {
        with_tx!(self, read |db_tx| {
            let model = agreements::Entity::find_by_id(agreement_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("agreement not exists".to_string()))?;
            Agreement::try_from(model)
        })
    }

    pub async fn agreement_for_shipment(&self, shipment_id: Uuid) -> ResultEngine<Option<Agreement>> {
        with_tx!(self, read |db_tx| {
            agreements::Entity::find()
                .filter(agreements::Column::ShipmentId.eq(shipment_id.to_string()))
                .one(&db_tx)
                .await?
                .map(Agreement::try_from)
                .transpose()
        })
    }

    pub async fn commission_for_agreement(
        &self,
        agreement_id: Uuid,
    ) -> ResultEngine<Option<Commission>> {
        with_tx!(self, read |db_tx| {
            commissions::Entity::find()
                .filter(commissions::Column::AgreementId.eq(agreement_id.to_string()))
                .one(&db_tx)
                .await?
                .map(Commission::try_from)
                .transpose()
        })
    }
}
