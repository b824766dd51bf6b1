//! Type-safe price representation using decimal arithmetic.
//!
//! The association sells in a single currency, so a [`Price`] is a plain
//! non-negative decimal amount in the currency's standard unit (euros, not
//! cents). Negative amounts are rejected at construction and on deserialize.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),
    /// The input is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
}

/// A non-negative amount of money.
///
/// ## Examples
///
/// ```
/// use amicale_core::Price;
///
/// let unit = Price::parse("20").unwrap();
/// assert_eq!((unit * 3).to_string(), "€60.00");
/// assert!(Price::parse("-1").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), 2))
    }

    /// Parse a price from its decimal string form (e.g. `"19.99"`).
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Invalid` if the string is not a decimal number,
    /// or `PriceError::Negative` if it is below zero.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount = s
            .trim()
            .parse::<Decimal>()
            .map_err(|e| PriceError::Invalid(e.to_string()))?;
        Self::new(amount)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "€{:.2}", self.0)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_negative() {
        assert!(matches!(
            Price::new(Decimal::new(-1, 0)),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_price_accepts_zero() {
        assert_eq!(Price::parse("0").unwrap(), Price::ZERO);
    }

    #[test]
    fn test_price_multiplication_and_sum() {
        let a = Price::parse("20").unwrap() * 3;
        let b = Price::from_cents(1_050) * 2;
        let total: Price = [a, b].into_iter().sum();
        assert_eq!(total.amount(), Decimal::new(8100, 2));
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(1_999).to_string(), "€19.99");
    }

    #[test]
    fn test_price_deserializes_from_number_and_string() {
        let from_number: Price = serde_json::from_str("12.5").unwrap();
        let from_string: Price = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(from_number.amount(), from_string.amount());
    }

    #[test]
    fn test_price_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<Price>("\"-3\"").is_err());
    }
}
