use std::sync::Arc;

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, TransactionTrait,
};

use crate::{CommissionRate, CommissionRateSource, Currency, FixedCommissionRate, ResultEngine};

mod agreements;
mod offers;
mod shipments;
mod wallets;

/// Run a block inside a DB transaction, committing on success and rolling
/// back on error.
///
/// The `read` form retries connection acquisition (see
/// [`EngineBuilder::read_retries`]); writes never retry. The write form holds
/// the database write lock from its first statement (see [`Engine::begin`]).
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.begin().await?;
        $crate::ops::finish_tx!($tx, $body)
    }};
    ($self:expr, read |$tx:ident| $body:expr) => {{
        let $tx = $self.begin_read().await?;
        $crate::ops::finish_tx!($tx, $body)
    }};
}

macro_rules! finish_tx {
    ($tx:ident, $body:expr) => {{
        let result: $crate::ResultEngine<_> = async { $body }.await;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::warn!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

/// Touches no row but makes SQLite acquire its write lock.
const WRITE_LOCK_SQL: &str = "UPDATE wallets SET version = version WHERE 0";

pub(crate) use finish_tx;
pub(crate) use with_tx;

/// Entry point of every marketplace operation.
///
/// The engine holds no domain state of its own: each operation runs to
/// completion inside one database transaction on the injected pool.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    commission_rates: Arc<dyn CommissionRateSource>,
    currency: Currency,
    read_retries: u32,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Currency new wallets are opened in.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Opens a write transaction.
    ///
    /// SQLite starts transactions deferred: a writer that reads first holds
    /// only a shared lock, and when two such writers both try to upgrade, the
    /// loser fails with `SQLITE_BUSY` instead of waiting. An empty `UPDATE` as
    /// the first statement takes the reserved lock up front, so racing writers
    /// queue on the busy timeout and then see the winner's committed rows.
    async fn begin(&self) -> ResultEngine<DatabaseTransaction> {
        let db_tx = self.database.begin().await?;
        if db_tx.get_database_backend() == DbBackend::Sqlite {
            db_tx.execute_unprepared(WRITE_LOCK_SQL).await?;
        }
        Ok(db_tx)
    }

    async fn begin_read(&self) -> ResultEngine<DatabaseTransaction> {
        let mut attempt = 0;
        loop {
            match self.database.begin().await {
                Ok(tx) => return Ok(tx),
                Err(DbErr::ConnectionAcquire(err)) if attempt < self.read_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, "connection acquire failed, retrying: {err}");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    commission_rates: Option<Arc<dyn CommissionRateSource>>,
    currency: Currency,
    read_retries: Option<u32>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Where agreement formation reads the commission rate from.
    ///
    /// Defaults to a fixed [`CommissionRate::DEFAULT`].
    pub fn commission_rates(mut self, source: Arc<dyn CommissionRateSource>) -> EngineBuilder {
        self.commission_rates = Some(source);
        self
    }

    /// Shorthand for a fixed rate.
    pub fn commission_rate(self, rate: CommissionRate) -> EngineBuilder {
        self.commission_rates(Arc::new(FixedCommissionRate(rate)))
    }

    pub fn currency(mut self, currency: Currency) -> EngineBuilder {
        self.currency = currency;
        self
    }

    /// How many extra times read-only operations try to acquire a connection.
    pub fn read_retries(mut self, retries: u32) -> EngineBuilder {
        self.read_retries = Some(retries);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            commission_rates: self
                .commission_rates
                .unwrap_or_else(|| Arc::new(FixedCommissionRate(CommissionRate::DEFAULT))),
            currency: self.currency,
            read_retries: self.read_retries.unwrap_or(3),
        })
    }
}
