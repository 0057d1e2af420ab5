//! Connection pool set-up.
//!
//! The pool is built once at process start and handed to
//! [`EngineBuilder::database`](crate::EngineBuilder::database). It caps the
//! number of concurrent handles, bounds how long a request waits for one, and
//! closes handles that stay idle.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Deserialize;

use crate::ResultEngine;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// How long a request waits for a free handle before failing with
    /// `ResourceExhausted`.
    pub acquire_timeout_secs: u64,
    /// Idle handles are closed after this long. `None` keeps them open.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_secs: 5,
            idle_timeout_secs: Some(600),
        }
    }
}

impl PoolSettings {
    pub fn connect_options(&self, url: &str) -> ConnectOptions {
        let mut options = ConnectOptions::new(url.to_owned());
        options
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .sqlx_logging(false);
        if let Some(idle) = self.idle_timeout_secs {
            options.idle_timeout(Duration::from_secs(idle));
        }
        options
    }
}

/// Open the pooled connection for `url`.
pub async fn connect(url: &str, settings: &PoolSettings) -> ResultEngine<DatabaseConnection> {
    tracing::info!(
        max_connections = settings.max_connections,
        acquire_timeout_secs = settings.acquire_timeout_secs,
        "opening database pool"
    );
    Ok(Database::connect(settings.connect_options(url)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_carry_limits() {
        let settings = PoolSettings {
            max_connections: 3,
            acquire_timeout_secs: 2,
            idle_timeout_secs: None,
        };
        let options = settings.connect_options("sqlite::memory:");
        assert_eq!(options.get_max_connections(), Some(3));
        assert_eq!(options.get_acquire_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(options.get_idle_timeout(), None);
    }
}
