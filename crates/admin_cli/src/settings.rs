//! Settings for the admin binary. Configuration is read from an optional
//! `settings.toml` and overridden by `NAKLIYE__SECTION__KEY` environment
//! variables.

use config::{Config, ConfigError, Environment, File};
use engine::{CommissionRate, Currency, PoolSettings};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

impl Database {
    pub fn pool(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout_secs: self.acquire_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pricing {
    /// Decimal fraction, e.g. `0.01`.
    pub commission_rate: String,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub pricing: Pricing,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let pool = PoolSettings::default();
        let mut builder = Config::builder()
            .set_default("app.level", "info")?
            .set_default("database.url", "sqlite:./nakliye.db?mode=rwc")?
            .set_default("database.max_connections", i64::from(pool.max_connections))?
            .set_default(
                "database.acquire_timeout_secs",
                pool.acquire_timeout_secs.to_string(),
            )?
            .set_default("pricing.commission_rate", CommissionRate::DEFAULT.to_string())?
            .set_default("pricing.currency", Currency::default().code())?;
        if let Some(idle) = pool.idle_timeout_secs {
            builder = builder.set_default("database.idle_timeout_secs", idle.to_string())?;
        }

        let settings = builder
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("NAKLIYE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn commission_rate(&self) -> Result<CommissionRate, engine::EngineError> {
        self.pricing.commission_rate.parse()
    }

    pub fn currency(&self) -> Result<Currency, engine::EngineError> {
        Currency::try_from(self.pricing.currency.as_str())
    }
}
