//! Lossless decimal amounts for WAX prices and balances.
//!
//! The ledger expects quantities rendered with exactly eight fractional digits
//! and the token symbol (`"14.00000000 WAX"`); the indexer reports listing
//! prices as integer base units plus a precision.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Token precision of WAX on chain.
pub const WAX_PRECISION: u32 = 8;

/// Symbol of the settlement token.
pub const WAX_SYMBOL: &str = "WAX";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("invalid decimal '{0}'")]
    Invalid(String),
    #[error("invalid token quantity '{0}'")]
    InvalidQuantity(String),
}

/// Lossless decimal amount backed by rust_decimal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Decimal(RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    pub fn from_str_canonical(s: &str) -> Result<Self, DecimalError> {
        RustDecimal::from_str(s.trim())
            .map(Decimal)
            .map_err(|_| DecimalError::Invalid(s.to_string()))
    }

    /// Convert an integer amount of base units (e.g. `"1400000000"`) at the
    /// given precision into a decimal amount (`14`).
    pub fn from_base_units(units: &str, precision: u32) -> Result<Self, DecimalError> {
        let raw = units
            .trim()
            .parse::<i128>()
            .map_err(|_| DecimalError::Invalid(units.to_string()))?;
        RustDecimal::try_from_i128_with_scale(raw, precision)
            .map(|d| Decimal(d.normalize()))
            .map_err(|_| DecimalError::Invalid(units.to_string()))
    }

    /// Parse a ledger quantity such as `"12.50000000 WAX"`.
    pub fn from_quantity(quantity: &str) -> Result<Self, DecimalError> {
        let mut parts = quantity.split_whitespace();
        let amount = parts
            .next()
            .ok_or_else(|| DecimalError::InvalidQuantity(quantity.to_string()))?;
        match parts.next() {
            Some(symbol) if symbol == WAX_SYMBOL => {}
            _ => return Err(DecimalError::InvalidQuantity(quantity.to_string())),
        }
        RustDecimal::from_str(amount)
            .map(|d| Decimal(d.normalize()))
            .map_err(|_| DecimalError::InvalidQuantity(quantity.to_string()))
    }

    /// Render as a ledger quantity: eight fractional digits plus the symbol.
    pub fn to_wax_quantity(&self) -> String {
        let mut value = self.0.round_dp(WAX_PRECISION);
        value.rescale(WAX_PRECISION);
        format!("{} {}", value, WAX_SYMBOL)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wax_quantity_has_eight_digits() {
        let price = Decimal::from_str_canonical("14").unwrap();
        assert_eq!(price.to_wax_quantity(), "14.00000000 WAX");

        let price = Decimal::from_str_canonical("1.5").unwrap();
        assert_eq!(price.to_wax_quantity(), "1.50000000 WAX");
    }

    #[test]
    fn test_wax_quantity_rounds_excess_precision() {
        let price = Decimal::from_str_canonical("0.123456789").unwrap();
        assert_eq!(price.to_wax_quantity(), "0.12345679 WAX");
    }

    #[test]
    fn test_from_base_units() {
        let price = Decimal::from_base_units("1400000000", WAX_PRECISION).unwrap();
        assert_eq!(price.to_canonical_string(), "14");

        let price = Decimal::from_base_units("12345", WAX_PRECISION).unwrap();
        assert_eq!(price.to_canonical_string(), "0.00012345");
    }

    #[test]
    fn test_from_base_units_rejects_garbage() {
        assert!(matches!(
            Decimal::from_base_units("12.5", WAX_PRECISION),
            Err(DecimalError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_quantity() {
        let balance = Decimal::from_quantity("152.34000000 WAX").unwrap();
        assert_eq!(balance.to_canonical_string(), "152.34");

        assert!(Decimal::from_quantity("152.34 EOS").is_err());
        assert!(Decimal::from_quantity("").is_err());
    }

    #[test]
    fn test_arithmetic_and_ordering() {
        let a = Decimal::from_str_canonical("10.5").unwrap();
        let b = Decimal::from_str_canonical("2.5").unwrap();
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a + b).to_canonical_string(), "13");
        assert!(b < a);
        assert!((b - a).is_negative());
    }

    #[test]
    fn test_json_accepts_string_and_number() {
        let from_str: Decimal = serde_json::from_str("\"750\"").unwrap();
        let from_num: Decimal = serde_json::from_str("750").unwrap();
        assert_eq!(from_str, from_num);
    }
}
