//! USD amounts with cent precision
//!
//! Scryfall reports prices as decimal strings ("3.50"). They are held as whole
//! cents so that comparing a fetched price against a stored one never trips
//! over floating point rounding.

use std::fmt;
use std::str::FromStr;

/// Cents per dollar
pub const CENTS_PER_USD: u64 = 100;

/// A nonnegative US dollar amount, stored as whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Usd(u64);

impl Usd {
    pub const fn from_cents(cents: u64) -> Self {
        Usd(cents)
    }

    /// Convert a dollar value, rounding to the nearest cent.
    ///
    /// Returns `None` for negative, NaN or infinite input.
    pub fn from_dollars(dollars: f64) -> Option<Self> {
        if !dollars.is_finite() || dollars < 0.0 {
            return None;
        }
        Some(Usd((dollars * CENTS_PER_USD as f64).round() as u64))
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    /// Dollar value as stored in the `price REAL` column
    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / CENTS_PER_USD as f64
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${}.{:02}",
            self.0 / CENTS_PER_USD,
            self.0 % CENTS_PER_USD
        )
    }
}

/// Error returned when a price string is not a nonnegative decimal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid USD amount: {0:?}")]
pub struct ParseUsdError(String);

impl FromStr for Usd {
    type Err = ParseUsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('$');
        trimmed
            .parse::<f64>()
            .ok()
            .and_then(Usd::from_dollars)
            .ok_or_else(|| ParseUsdError(s.to_string()))
    }
}
