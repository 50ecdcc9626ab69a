//! Value object trait and the fixed-point `Quantity` value.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" a value
/// object, create a new one with the new values.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A quantity of stock expressed as a fixed-point decimal.
///
/// Ledger balances, movement amounts and request quantities all use this type so
/// repeated additive updates never drift the way binary floating point would.
/// Arithmetic on the ledger path is always checked (`checked_add` & friends);
/// overflow surfaces as `None` rather than a panic.
///
/// Serialized as a normalized decimal string (`"40"`, `"2.5"`); deserializes from
/// either a string or a JSON number.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);
    pub const ONE: Quantity = Quantity(Decimal::ONE);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Whole-unit quantity.
    pub fn units(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Truncate toward zero, dropping any fractional part.
    pub fn trunc(&self) -> Self {
        Self(self.0.trunc())
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(&self, factor: Decimal) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    pub fn checked_div(&self, divisor: Decimal) -> Option<Self> {
        self.0.checked_div(divisor).map(Self)
    }

    /// Sum a sequence of quantities, `None` on overflow.
    pub fn checked_sum<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Quantity>,
    {
        values
            .into_iter()
            .try_fold(Quantity::ZERO, |acc, q| acc.checked_add(q))
    }
}

impl core::ops::Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Self::Output {
        Quantity(-self.0)
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::validation(format!("invalid quantity '{s}': {e}")))
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.normalize())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize>::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn display_is_normalized() {
        assert_eq!(Quantity::new(dec!(40.00)).to_string(), "40");
        assert_eq!(Quantity::new(dec!(2.50)).to_string(), "2.5");
    }

    #[test]
    fn serializes_as_string_and_accepts_numbers() {
        let q = Quantity::new(dec!(12.50));
        assert_eq!(serde_json::to_string(&q).unwrap(), "\"12.5\"");

        let from_str: Quantity = serde_json::from_str("\"7.25\"").unwrap();
        assert_eq!(from_str, Quantity::new(dec!(7.25)));

        let from_int: Quantity = serde_json::from_str("40").unwrap();
        assert_eq!(from_int, Quantity::units(40));
    }

    #[test]
    fn equal_values_with_different_scale_compare_equal() {
        assert_eq!(Quantity::new(dec!(1.0)), Quantity::new(dec!(1)));
    }

    #[test]
    fn trunc_goes_toward_zero() {
        assert_eq!(Quantity::new(dec!(2.9)).trunc(), Quantity::units(2));
        assert_eq!(Quantity::new(dec!(-2.9)).trunc(), Quantity::units(-2));
    }

    #[test]
    fn checked_sum_reports_overflow() {
        let huge = Quantity::new(Decimal::MAX);
        assert_eq!(Quantity::checked_sum([huge, Quantity::ONE]), None);
        assert_eq!(
            Quantity::checked_sum([Quantity::units(2), Quantity::units(3)]),
            Some(Quantity::units(5))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("twelve".parse::<Quantity>().is_err());
        assert_eq!(" 3.5 ".parse::<Quantity>().unwrap(), Quantity::new(dec!(3.5)));
    }
}
