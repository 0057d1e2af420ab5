//! Ledger entries.
//!
//! An [`Entry`] is an immutable, balance-affecting record stored in the
//! `transactions` table. Entries of one wallet form a chain ordered by
//! `sequence`:
//!
//! - `balance_after = balance_before + amount` for credits,
//! - `balance_after = balance_before - amount` for debits,
//! - each entry's `balance_before` is the previous entry's `balance_after`
//!   (0 for the first one).
//!
//! Replaying the chain from 0 therefore reproduces the wallet balance.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    Payment,
    Refund,
    Commission,
    Bonus,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Payment => "payment",
            Self::Refund => "refund",
            Self::Commission => "commission",
            Self::Bonus => "bonus",
        }
    }

    /// `true` if the entry adds to the balance.
    #[must_use]
    pub fn is_credit(self) -> bool {
        matches!(self, Self::Deposit | Self::Refund | Self::Bonus)
    }

    /// Signed balance change for an entry of `amount_minor`.
    #[must_use]
    pub fn signed(self, amount_minor: i64) -> i64 {
        if self.is_credit() {
            amount_minor
        } else {
            -amount_minor
        }
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "payment" => Ok(Self::Payment),
            "refund" => Ok(Self::Refund),
            "commission" => Ok(Self::Commission),
            "bonus" => Ok(Self::Bonus),
            other => Err(EngineError::InvalidInput(format!(
                "invalid entry kind: {other}"
            ))),
        }
    }
}

/// Entries only exist once committed, so `completed` is the one stored state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Completed,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for EntryStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "completed" => Ok(Self::Completed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid entry status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub sequence: i64,
    pub kind: EntryKind,
    /// Always positive; the direction comes from `kind`.
    pub amount_minor: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: EntryStatus,
    pub method: Option<String>,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// `true` if `balance_after` follows from `balance_before` and the amount.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.balance_before + self.kind.signed(self.amount_minor) == self.balance_after
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub wallet_id: String,
    pub sequence: i64,
    pub kind: String,
    pub amount_minor: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: String,
    pub method: Option<String>,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Entry> for ActiveModel {
    fn from(entry: &Entry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            wallet_id: ActiveValue::Set(entry.wallet_id.to_string()),
            sequence: ActiveValue::Set(entry.sequence),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(entry.amount_minor),
            balance_before: ActiveValue::Set(entry.balance_before),
            balance_after: ActiveValue::Set(entry.balance_after),
            status: ActiveValue::Set(entry.status.as_str().to_string()),
            method: ActiveValue::Set(entry.method.clone()),
            description: ActiveValue::Set(entry.description.clone()),
            reference_id: ActiveValue::Set(entry.reference_id.clone()),
            created_at: ActiveValue::Set(entry.created_at),
        }
    }
}

impl TryFrom<Model> for Entry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "entry")?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            sequence: model.sequence,
            kind: EntryKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            balance_before: model.balance_before,
            balance_after: model.balance_after,
            status: EntryStatus::try_from(model.status.as_str())?,
            method: model.method,
            description: model.description,
            reference_id: model.reference_id,
            created_at: model.created_at,
        })
    }
}

/// Outcome of replaying a wallet's ledger from zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub wallet_id: Uuid,
    pub entries: usize,
    pub replayed_balance: i64,
    pub stored_balance: i64,
    /// Sequence of the first entry whose balances break the chain.
    pub first_mismatch: Option<i64>,
}

impl LedgerReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.first_mismatch.is_none() && self.replayed_balance == self.stored_balance
    }
}

/// Replays `entries` (in sequence order) from a zero balance.
pub fn replay(wallet_id: Uuid, stored_balance: i64, entries: &[Entry]) -> LedgerReport {
    let mut running = 0_i64;
    let mut first_mismatch = None;
    for entry in entries {
        if first_mismatch.is_none() && (entry.balance_before != running || !entry.is_balanced()) {
            first_mismatch = Some(entry.sequence);
        }
        running += entry.kind.signed(entry.amount_minor);
    }

    LedgerReport {
        wallet_id,
        entries: entries.len(),
        replayed_balance: running,
        stored_balance,
        first_mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sequence: i64, kind: EntryKind, amount_minor: i64, before: i64, after: i64) -> Entry {
        Entry {
            id: Uuid::new_v4(),
            wallet_id: Uuid::nil(),
            sequence,
            kind,
            amount_minor,
            balance_before: before,
            balance_after: after,
            status: EntryStatus::Completed,
            method: None,
            description: None,
            reference_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn credits_and_debits_are_signed_by_kind() {
        assert_eq!(EntryKind::Deposit.signed(100), 100);
        assert_eq!(EntryKind::Refund.signed(100), 100);
        assert_eq!(EntryKind::Bonus.signed(100), 100);
        assert_eq!(EntryKind::Withdrawal.signed(100), -100);
        assert_eq!(EntryKind::Payment.signed(100), -100);
        assert_eq!(EntryKind::Commission.signed(100), -100);
    }

    #[test]
    fn replay_reproduces_balance() {
        let entries = vec![
            entry(1, EntryKind::Deposit, 10_000, 0, 10_000),
            entry(2, EntryKind::Withdrawal, 3_000, 10_000, 7_000),
            entry(3, EntryKind::Commission, 1_000, 7_000, 6_000),
        ];
        let report = replay(Uuid::nil(), 6_000, &entries);
        assert!(report.is_consistent());
        assert_eq!(report.entries, 3);
    }

    #[test]
    fn replay_flags_broken_chain() {
        let entries = vec![
            entry(1, EntryKind::Deposit, 10_000, 0, 10_000),
            entry(2, EntryKind::Withdrawal, 3_000, 9_000, 6_000),
        ];
        let report = replay(Uuid::nil(), 7_000, &entries);
        assert_eq!(report.first_mismatch, Some(2));
        assert!(!report.is_consistent());
    }

    #[test]
    fn replay_flags_drifted_stored_balance() {
        let entries = vec![entry(1, EntryKind::Deposit, 500, 0, 500)];
        let report = replay(Uuid::nil(), 499, &entries);
        assert_eq!(report.first_mismatch, None);
        assert!(!report.is_consistent());
    }
}
