//! Fixed-point decimal type with 4 decimal places precision.
//!
//! Every amount the allocator touches (fees, balances, deposits, ledger
//! amounts) goes through `Decimal4`, so the calculator never compares
//! floating-point values.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

/// A decimal type that maintains exactly 4 decimal places of precision.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use deposit_allocator::Decimal4;
///
/// let fee = Decimal4::from_str("12.5").unwrap();
/// assert_eq!(fee.to_string(), "12.5000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal4(Decimal);

impl Decimal4 {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 4;

    /// Zero value.
    pub const ZERO: Self = Decimal4(Decimal::ZERO);

    /// Largest magnitude, in whole units, accepted for a fee, balance or
    /// deposit. Sums and products of in-range amounts stay far below the
    /// 96-bit mantissa, so arithmetic on them cannot overflow.
    pub const MAX_WHOLE_UNITS: i64 = 1_000_000_000_000_000_000;

    /// Creates a new `Decimal4` from a `Decimal`, normalizing to 4 decimal places.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        Decimal4(normalized)
    }

    /// Builds an amount from a count of ten-thousandths (`12345` is `1.2345`).
    pub fn from_scaled(units: i64) -> Self {
        Decimal4(Decimal::new(units, Self::SCALE))
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if this value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        *self > Self::ZERO
    }

    /// Returns `true` if this value is strictly less than zero.
    pub fn is_negative(&self) -> bool {
        *self < Self::ZERO
    }

    /// `MAX_WHOLE_UNITS` as an amount.
    pub fn max_value() -> Self {
        Decimal4::from(Self::MAX_WHOLE_UNITS)
    }

    /// Returns `true` if `|self| <= MAX_WHOLE_UNITS`.
    pub fn in_range(&self) -> bool {
        self.abs() <= Self::max_value()
    }

    pub fn abs(self) -> Self {
        Decimal4::new(self.0.abs())
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// How many whole `divisor`s fit into `self`, as an integral amount.
    ///
    /// Returns zero when `divisor` is not positive or `self` is negative.
    pub fn whole_multiples(self, divisor: Self) -> Self {
        if !divisor.is_positive() || self.is_negative() {
            return Self::ZERO;
        }
        let mut count = (self.0 / divisor.0).floor();
        // the quotient is rounded to 28 digits and may land on the next integer
        if count * divisor.0 > self.0 {
            count -= Decimal::ONE;
        }
        Decimal4::new(count)
    }

    /// Returns the inner `rust_decimal::Decimal`.
    pub fn into_inner(self) -> Decimal {
        self.0
    }
}

impl FromStr for Decimal4 {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed)?;
        Ok(Decimal4::new(decimal))
    }
}

impl From<i64> for Decimal4 {
    fn from(value: i64) -> Self {
        Decimal4::new(Decimal::from(value))
    }
}

impl fmt::Display for Decimal4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl Add for Decimal4 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Decimal4::new(self.0 + rhs.0)
    }
}

impl AddAssign for Decimal4 {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Sub for Decimal4 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Decimal4::new(self.0 - rhs.0)
    }
}

impl SubAssign for Decimal4 {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Mul for Decimal4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Decimal4::new(self.0 * rhs.0)
    }
}

impl Neg for Decimal4 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Decimal4::new(-self.0)
    }
}

impl Sum for Decimal4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Decimal4::ZERO, |acc, value| acc + value)
    }
}

impl<'a> Sum<&'a Decimal4> for Decimal4 {
    fn sum<I: Iterator<Item = &'a Decimal4>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Decimal4 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:.4}", self.0))
    }
}

impl<'de> Deserialize<'de> for Decimal4 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Decimal4::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal4 {
        Decimal4::from_str(s).unwrap()
    }

    #[test]
    fn test_from_str_normalizes_scale() {
        assert_eq!(dec("1.0").to_string(), "1.0000");
        assert_eq!(dec("1.1234").to_string(), "1.1234");
        assert_eq!(dec("  2.5  ").to_string(), "2.5000");
    }

    #[test]
    fn test_arithmetic_preserves_scale() {
        let a = dec("1.5");
        let b = dec("2.5");

        assert_eq!((a + b).to_string(), "4.0000");
        assert_eq!((b - a).to_string(), "1.0000");
        assert_eq!((a * dec("3")).to_string(), "4.5000");
        assert_eq!((-a).to_string(), "-1.5000");
    }

    #[test]
    fn test_sign_helpers() {
        assert!(Decimal4::ZERO.is_zero());
        assert!(!Decimal4::ZERO.is_positive());
        assert!(!Decimal4::ZERO.is_negative());
        assert!(dec("-0.0001").is_negative());
        assert_eq!(dec("-30").abs(), dec("30"));
        assert_eq!(dec("7").min(dec("3")), dec("3"));
    }

    #[test]
    fn test_whole_multiples_floors() {
        assert_eq!(dec("100").whole_multiples(dec("40")), dec("2"));
        assert_eq!(dec("80").whole_multiples(dec("40")), dec("2"));
        assert_eq!(dec("39.9999").whole_multiples(dec("40")), Decimal4::ZERO);
        assert_eq!(dec("1").whole_multiples(dec("0.0003")), dec("3333"));
    }

    #[test]
    fn test_whole_multiples_guards_zero_divisor() {
        assert_eq!(dec("100").whole_multiples(Decimal4::ZERO), Decimal4::ZERO);
        assert_eq!(dec("-5").whole_multiples(dec("1")), Decimal4::ZERO);
    }

    #[test]
    fn test_sum_and_scaled_constructor() {
        let total: Decimal4 = [dec("1.25"), dec("2.5"), Decimal4::from_scaled(2500)]
            .iter()
            .sum();
        assert_eq!(total.to_string(), "4.0000");
        assert_eq!(Decimal4::from(3).to_string(), "3.0000");
    }

    #[test]
    fn test_range_bound() {
        assert!(Decimal4::max_value().in_range());
        assert!((-Decimal4::max_value()).in_range());
        assert!(!(Decimal4::max_value() + dec("0.0001")).in_range());
        assert!(!dec("50000000000000000000000000000").in_range());
        // two in-range values add without overflow
        let doubled = Decimal4::max_value() + Decimal4::max_value();
        assert_eq!(doubled, Decimal4::from(2 * Decimal4::MAX_WHOLE_UNITS));
    }
}
