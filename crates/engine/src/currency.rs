use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO currency code a wallet is kept in.
///
/// The marketplace settles in a single currency (configured at start-up,
/// default `TRY`), but wallets persist their currency so a deployment can
/// switch without rewriting history.
///
/// ## Minor units
///
/// Amounts are `i64` minor units (see [`Money`](crate::Money)). All supported
/// currencies use 2 fraction digits, so `10.50 TRY` ⇄ `1050`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Try,
    Eur,
    Usd,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Try => "TRY",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRY" => Ok(Currency::Try),
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            other => Err(EngineError::InvalidInput(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!(Currency::try_from("try").unwrap(), Currency::Try);
        assert_eq!(Currency::try_from(" EUR ").unwrap(), Currency::Eur);
        assert!(Currency::try_from("GBP").is_err());
    }
}
