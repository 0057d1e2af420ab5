use chrono::Utc;
use uuid::Uuid;

use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*, sea_query::Expr,
};

use crate::{
    CommissionRate, EngineError, Entry, EntryKind, EntryStatus, LedgerReport, ResultEngine,
    Wallet, commission, ledger,
    util::{ensure_positive_amount, normalize_optional_text, normalize_required},
    wallets,
};

use super::{Engine, with_tx};

/// One balance change to book against a user's wallet.
pub(super) struct Posting<'a> {
    pub user_id: &'a str,
    pub kind: EntryKind,
    pub amount_minor: i64,
    pub method: Option<&'a str>,
    pub description: Option<&'a str>,
    pub reference_id: Option<String>,
    /// Credit even a frozen wallet. Only for money the marketplace gives back.
    pub allow_inactive: bool,
}

fn ensure_no_overflow(balance: i64, delta: i64) -> ResultEngine<()> {
    balance.checked_add(delta).map(|_| ()).ok_or_else(|| {
        EngineError::InvalidInput(format!("balance {balance} cannot absorb {delta}"))
    })
}

impl Engine {
    async fn find_wallet(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Option<wallets::Model>> {
        wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id.to_string()))
            .one(db_tx)
            .await
            .map_err(Into::into)
    }

    async fn require_wallet(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<wallets::Model> {
        self.find_wallet(db_tx, user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("wallet".to_string()))
    }

    async fn find_or_open_wallet(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<wallets::Model> {
        if let Some(model) = self.find_wallet(db_tx, user_id).await? {
            return Ok(model);
        }

        let wallet = Wallet::new(user_id.to_string(), self.currency);
        match wallets::ActiveModel::from(&wallet).insert(db_tx).await {
            Ok(model) => {
                tracing::info!(user_id, wallet_id = %wallet.id, "opened wallet");
                Ok(model)
            }
            // Lost the race against another opener: use theirs.
            Err(err) => match self.find_wallet(db_tx, user_id).await? {
                Some(model) => Ok(model),
                None => Err(err.into()),
            },
        }
    }

    /// Applies `posting` to the wallet and appends its ledger entry.
    ///
    /// The balance check and the balance update are one conditional `UPDATE`
    /// (`balance >= amount` for debits), so two concurrent debits can never
    /// both pass against the same funds.
    pub(super) async fn post_entry(
        &self,
        db_tx: &DatabaseTransaction,
        posting: Posting<'_>,
    ) -> ResultEngine<Entry> {
        ensure_positive_amount(posting.amount_minor, "amount")?;
        let user_id = normalize_required(posting.user_id, "user id")?;

        let wallet_model = if posting.kind.is_credit() {
            self.find_or_open_wallet(db_tx, &user_id).await?
        } else {
            self.find_wallet(db_tx, &user_id).await?.ok_or_else(|| {
                EngineError::InsufficientFunds(format!(
                    "balance 0, needed {}",
                    posting.amount_minor
                ))
            })?
        };
        let allow_inactive = posting.allow_inactive && posting.kind.is_credit();
        if !wallet_model.is_active && !allow_inactive {
            return Err(EngineError::InvalidState("wallet is inactive".to_string()));
        }

        let delta = posting.kind.signed(posting.amount_minor);
        ensure_no_overflow(wallet_model.balance, delta)?;
        let mut update = wallets::Entity::update_many()
            .col_expr(
                wallets::Column::Balance,
                Expr::col(wallets::Column::Balance).add(delta),
            )
            .col_expr(
                wallets::Column::Version,
                Expr::col(wallets::Column::Version).add(1),
            )
            .filter(wallets::Column::Id.eq(wallet_model.id.clone()));
        if !allow_inactive {
            update = update.filter(wallets::Column::IsActive.eq(true));
        }
        if delta < 0 {
            update = update.filter(wallets::Column::Balance.gte(posting.amount_minor));
        } else {
            update = update.filter(wallets::Column::Balance.lte(i64::MAX - delta));
        }
        let result = update.exec(db_tx).await?;

        if result.rows_affected == 0 {
            let current = wallets::Entity::find_by_id(wallet_model.id.clone())
                .one(db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("wallet".to_string()))?;
            if !current.is_active && !allow_inactive {
                return Err(EngineError::InvalidState("wallet is inactive".to_string()));
            }
            ensure_no_overflow(current.balance, delta)?;
            return Err(EngineError::InsufficientFunds(format!(
                "balance {}, needed {}",
                current.balance, posting.amount_minor
            )));
        }

        let updated = wallets::Entity::find_by_id(wallet_model.id.clone())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("wallet".to_string()))?;
        let wallet = Wallet::try_from(updated)?;

        let entry = Entry {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            sequence: wallet.version,
            kind: posting.kind,
            amount_minor: posting.amount_minor,
            balance_before: wallet.balance - delta,
            balance_after: wallet.balance,
            status: EntryStatus::Completed,
            method: normalize_optional_text(posting.method),
            description: normalize_optional_text(posting.description),
            reference_id: posting.reference_id,
            created_at: Utc::now(),
        };
        ledger::ActiveModel::from(&entry).insert(db_tx).await?;

        tracing::debug!(
            user_id = %user_id,
            kind = entry.kind.as_str(),
            amount_minor = entry.amount_minor,
            balance_after = entry.balance_after,
            sequence = entry.sequence,
            "ledger entry posted"
        );
        Ok(entry)
    }

    async fn post(&self, posting: Posting<'_>) -> ResultEngine<Entry> {
        with_tx!(self, |db_tx| self.post_entry(&db_tx, posting).await)
    }

    /// Current balance; 0 if the user has no wallet yet.
    pub async fn balance(&self, user_id: &str) -> ResultEngine<i64> {
        with_tx!(self, read |db_tx| {
            Ok(self
                .find_wallet(&db_tx, user_id)
                .await?
                .map_or(0, |model| model.balance))
        })
    }

    /// Wallet snapshot, if the user has one.
    pub async fn wallet(&self, user_id: &str) -> ResultEngine<Option<Wallet>> {
        with_tx!(self, read |db_tx| {
            self.find_wallet(&db_tx, user_id)
                .await?
                .map(Wallet::try_from)
                .transpose()
        })
    }

    /// Create an empty wallet for `user_id` unless one exists.
    pub async fn open_wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        let user_id = normalize_required(user_id, "user id")?;
        with_tx!(self, |db_tx| {
            Wallet::try_from(self.find_or_open_wallet(&db_tx, &user_id).await?)
        })
    }

    /// Credit money coming in from the payment provider.
    pub async fn deposit(&self, user_id: &str, amount_minor: i64, method: &str) -> ResultEngine<Entry> {
        self.post(Posting {
            user_id,
            kind: EntryKind::Deposit,
            amount_minor,
            method: Some(method),
            description: None,
            reference_id: None,
            allow_inactive: false,
        })
        .await
    }

    /// Debit a payout; fails with `InsufficientFunds` rather than going negative.
    pub async fn withdraw(
        &self,
        user_id: &str,
        amount_minor: i64,
        description: &str,
    ) -> ResultEngine<Entry> {
        self.post(Posting {
            user_id,
            kind: EntryKind::Withdrawal,
            amount_minor,
            method: None,
            description: Some(description),
            reference_id: None,
            allow_inactive: false,
        })
        .await
    }

    /// Debit a purchase paid from the wallet.
    pub async fn payment(
        &self,
        user_id: &str,
        amount_minor: i64,
        description: &str,
    ) -> ResultEngine<Entry> {
        self.post(Posting {
            user_id,
            kind: EntryKind::Payment,
            amount_minor,
            method: None,
            description: Some(description),
            reference_id: None,
            allow_inactive: false,
        })
        .await
    }

    pub async fn refund(
        &self,
        user_id: &str,
        amount_minor: i64,
        description: &str,
    ) -> ResultEngine<Entry> {
        self.post(Posting {
            user_id,
            kind: EntryKind::Refund,
            amount_minor,
            method: None,
            description: Some(description),
            reference_id: None,
            allow_inactive: false,
        })
        .await
    }

    pub async fn bonus(
        &self,
        user_id: &str,
        amount_minor: i64,
        description: &str,
    ) -> ResultEngine<Entry> {
        self.post(Posting {
            user_id,
            kind: EntryKind::Bonus,
            amount_minor,
            method: None,
            description: Some(description),
            reference_id: None,
            allow_inactive: false,
        })
        .await
    }

    /// Debit the commission owed on `agreed_price_minor` at `rate`.
    pub async fn deduct_commission(
        &self,
        user_id: &str,
        agreed_price_minor: i64,
        rate: CommissionRate,
    ) -> ResultEngine<Entry> {
        let split = commission::calculate(agreed_price_minor, rate)?;
        let description = format!("commission {rate} on {agreed_price_minor}");
        self.post(Posting {
            user_id,
            kind: EntryKind::Commission,
            amount_minor: split.commission_minor,
            method: None,
            description: Some(&description),
            reference_id: None,
            allow_inactive: false,
        })
        .await
    }

    /// Ledger entries, most recent first, at most `limit`.
    pub async fn transaction_history(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Entry>> {
        if limit == 0 {
            return Err(EngineError::InvalidInput("limit must be > 0".to_string()));
        }
        with_tx!(self, read |db_tx| {
            let Some(wallet_model) = self.find_wallet(&db_tx, user_id).await? else {
                return Ok(Vec::new());
            };
            let models = ledger::Entity::find()
                .filter(ledger::Column::WalletId.eq(wallet_model.id))
                .order_by_desc(ledger::Column::Sequence)
                .limit(limit)
                .all(&db_tx)
                .await?;
            models.into_iter().map(Entry::try_from).collect()
        })
    }

    /// Activates or freezes a wallet. Frozen wallets reject every posting.
    pub async fn set_wallet_active(&self, user_id: &str, active: bool) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_wallet(&db_tx, user_id).await?;
            let mut active_model: wallets::ActiveModel = model.into();
            active_model.is_active = sea_orm::ActiveValue::Set(active);
            active_model.update(&db_tx).await?;
            tracing::info!(user_id, active, "wallet activity changed");
            Ok(())
        })
    }

    /// Replays the wallet's ledger from zero and compares it with the stored
    /// balance.
    pub async fn verify_ledger(&self, user_id: &str) -> ResultEngine<LedgerReport> {
        with_tx!(self, read |db_tx| {
            let wallet = Wallet::try_from(self.require_wallet(&db_tx, user_id).await?)?;
            let entries = ledger::Entity::find()
                .filter(ledger::Column::WalletId.eq(wallet.id.to_string()))
                .order_by_asc(ledger::Column::Sequence)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Entry::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            let report = ledger::replay(wallet.id, wallet.balance, &entries);
            if !report.is_consistent() {
                tracing::warn!(user_id, ?report, "ledger replay mismatch");
            }
            Ok(report)
        })
    }
}
