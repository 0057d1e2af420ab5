//! Commission calculation.
//!
//! [`calculate`] is pure: it maps an agreed price and an explicit
//! [`CommissionRate`] to the platform's cut and the carrier's payout. Where the
//! rate comes from is the business of a [`CommissionRateSource`], injected into
//! the engine at construction time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

const PPM_SCALE: u32 = 1_000_000;

/// Commission rate in parts per million (`0.01` = 10 000 ppm).
///
/// Always in `[0, 1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// The platform default: 1%.
    pub const DEFAULT: CommissionRate = CommissionRate(10_000);

    pub fn from_ppm(ppm: u32) -> ResultEngine<Self> {
        if ppm >= PPM_SCALE {
            return Err(EngineError::InvalidInput(
                "commission rate must be < 1".to_string(),
            ));
        }
        Ok(Self(ppm))
    }

    #[must_use]
    pub const fn ppm(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for CommissionRate {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_ppm(value)
    }
}

impl From<CommissionRate> for u32 {
    fn from(value: CommissionRate) -> Self {
        value.0
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fraction = format!("{:06}", self.0);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            f.write_str("0")
        } else {
            write!(f, "0.{fraction}")
        }
    }
}

impl FromStr for CommissionRate {
    type Err = EngineError;

    /// Parses a decimal fraction such as `0.01` or `0.0125` (at most six
    /// fraction digits).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidInput(format!("invalid commission rate: {s}"));

        let trimmed = s.trim();
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 6
        {
            return Err(invalid());
        }
        if !whole.is_empty() && whole.chars().any(|c| c != '0') {
            return Err(EngineError::InvalidInput(
                "commission rate must be < 1".to_string(),
            ));
        }

        let ppm = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<6}").parse::<u32>().map_err(|_| invalid())?
        };
        Self::from_ppm(ppm)
    }
}

/// Result of splitting an agreed price.
///
/// `agreed_price_minor == commission_minor + carrier_receives_minor` always
/// holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub agreed_price_minor: i64,
    pub rate: CommissionRate,
    pub commission_minor: i64,
    pub carrier_receives_minor: i64,
}

/// Splits `agreed_price_minor` into commission and carrier payout.
///
/// The commission is rounded half-up to the minor unit.
pub fn calculate(agreed_price_minor: i64, rate: CommissionRate) -> ResultEngine<CommissionBreakdown> {
    if agreed_price_minor <= 0 {
        return Err(EngineError::InvalidInput(
            "agreed price must be > 0".to_string(),
        ));
    }

    let scaled = i128::from(agreed_price_minor) * i128::from(rate.ppm());
    let commission = (scaled + i128::from(PPM_SCALE / 2)) / i128::from(PPM_SCALE);
    // rate < 1 keeps the commission within the price.
    let commission_minor = i64::try_from(commission)
        .map_err(|_| EngineError::InvalidInput("agreed price too large".to_string()))?;

    Ok(CommissionBreakdown {
        agreed_price_minor,
        rate,
        commission_minor,
        carrier_receives_minor: agreed_price_minor - commission_minor,
    })
}

/// Supplies the commission rate in force.
///
/// Implemented by the pricing/configuration collaborator.
pub trait CommissionRateSource: Send + Sync + fmt::Debug {
    fn current_commission_rate(&self) -> CommissionRate;
}

/// A rate fixed at start-up (read from settings).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedCommissionRate(pub CommissionRate);

impl CommissionRateSource for FixedCommissionRate {
    fn current_commission_rate(&self) -> CommissionRate {
        self.0
    }
}
