//! Marketplace transaction engine.
//!
//! Turns a posted [`Shipment`] into a priced, accepted, commissioned
//! engagement: carriers submit [`Offer`]s, the sender accepts one, and
//! agreement formation splits the price ([`commission::calculate`]) and debits
//! the carrier's [`Wallet`] through the append-only ledger, all in one
//! database transaction.

pub use agreements::{Agreement, AgreementStatus};
pub use commands::{CancelActor, CreateShipmentCmd, SubmitOfferCmd};
pub use commission::{
    CommissionBreakdown, CommissionRate, CommissionRateSource, FixedCommissionRate,
};
pub use commissions::Commission;
pub use currency::Currency;
pub use error::EngineError;
pub use ledger::{Entry, EntryKind, EntryStatus, LedgerReport};
pub use money::Money;
pub use offers::{Offer, OfferStatus};
pub use ops::{Engine, EngineBuilder};
pub use pool::PoolSettings;
pub use shipments::{Priority, Shipment, ShipmentEvent, ShipmentStatus};
pub use wallets::Wallet;

mod agreements;
mod commands;
pub mod commission;
mod commissions;
mod currency;
mod error;
mod ledger;
mod money;
mod offers;
mod ops;
pub mod pool;
mod shipments;
mod util;
mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
