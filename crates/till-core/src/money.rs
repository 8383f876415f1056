//! # Money Module
//!
//! Fixed-precision money, exchange rates and the rounding rule every stored
//! amount passes through.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Front ends send amounts as floats:                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: convert ONCE at the boundary, then integer cents        │
//! │    Money::from_decimal("amount", 19.99)? → Money(1999)                  │
//! │    every sum, split and conversion after that is exact i64/i128 math  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Currencies, One Rate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Base currency: USD        Local currency: VES                          │
//! │                                                                         │
//! │  ExchangeRate = VES per 1 USD, 4 decimals (36.5000 → 365_000)          │
//! │                                                                         │
//! │    VES 365.00 ──to_base──► USD 10.00                                   │
//! │    USD 10.00  ──to_local─► VES 365.00                                  │
//! │                                                                         │
//! │  The rate is captured when the operation happens and frozen on the     │
//! │  journal entry. Later rate changes never touch historical records.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::{round2, ExchangeRate, Money};
//!
//! let price = Money::from_decimal("price", 10.995).unwrap();
//! assert_eq!(price.cents(), 1100); // half-up
//!
//! let rate = ExchangeRate::from_decimal(36.5).unwrap();
//! let ves = Money::from_cents(36_500);
//! assert_eq!(rate.to_base(ves).cents(), 1000);
//!
//! assert_eq!(round2(1.005), 1.01);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::types::TaxRate;

// =============================================================================
// Rounding
// =============================================================================

/// Scale used to strip binary noise before the half-up step.
///
/// `1.005 * 100.0` is `100.49999999999999` in binary; snapping to 1e-6 of a
/// cent first turns it back into `100.5`.
const NOISE_SCALE: f64 = 1_000_000.0;

/// Rounds a decimal to 2 places, half away from zero.
///
/// ## Example
/// ```rust
/// use till_core::money::round2;
///
/// assert_eq!(round2(2.675), 2.68);
/// assert_eq!(round2(-2.675), -2.68);
/// assert_eq!(round2(10.0 / 3.0), 3.33);
/// ```
pub fn round2(x: f64) -> f64 {
    scaled_half_up(x, 100.0) as f64 / 100.0
}

/// Scales `x` by `scale` and rounds half away from zero.
fn scaled_half_up(x: f64, scale: f64) -> i64 {
    let scaled = (x * scale * NOISE_SCALE).round() / NOISE_SCALE;
    scaled.round() as i64
}

/// Narrows an i128 intermediate to i64, saturating at the bounds.
pub(crate) fn saturate(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Integer division rounding half away from zero.
pub(crate) fn div_half_up(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in hundredths of its currency unit.
///
/// The currency is carried next to the amount (on `Payment`, `Change`, a drawer
/// quadrant), never inside it. Customer quadrants and sale totals are always in
/// the base currency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Largest magnitude accepted from a caller: one trillion units.
    ///
    /// Sums of many such amounts still fit in an i64 of cents.
    pub const MAX_INPUT: Money = Money(100_000_000_000_000);

    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a caller-supplied decimal, rejecting NaN, infinities and
    /// anything beyond [`Money::MAX_INPUT`].
    ///
    /// This is the only place a float becomes money. The value is rounded to
    /// two decimals half-up.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal("amount", 19.99).unwrap().cents(), 1999);
    /// assert!(Money::from_decimal("amount", f64::NAN).is_err());
    /// assert!(Money::from_decimal("amount", 1e17).is_err());
    /// ```
    pub fn from_decimal(field: &str, value: f64) -> ValidationResult<Self> {
        if !value.is_finite() {
            return Err(ValidationError::non_finite(field));
        }
        let money = Money(scaled_half_up(value, 100.0));
        if !money.within_input_range() {
            return Err(ValidationError::out_of_range(field));
        }
        Ok(money)
    }

    /// True when the magnitude is at most [`Money::MAX_INPUT`].
    #[inline]
    pub const fn within_input_range(&self) -> bool {
        self.0.unsigned_abs() <= Self::MAX_INPUT.0 as u64
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value as a decimal (for display and JSON only).
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.saturating_abs())
    }

    /// Clamps negative values to zero.
    #[inline]
    pub fn floor_zero(self) -> Self {
        Money(self.0.max(0))
    }

    /// Calculates tax at `rate`, rounding half-up.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    /// use till_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(1600));
    /// assert_eq!(tax.cents(), 160);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(saturate(div_half_up(self.0 as i128 * rate.bps() as i128, 10_000)))
    }

    /// Multiplies a unit price by a quantity in milli-units.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    /// use till_core::types::Quantity;
    ///
    /// // 1.250 kg at 3.99/kg = 4.9875 → 4.99
    /// let line = Money::from_cents(399).times_quantity(Quantity::from_milli(1_250));
    /// assert_eq!(line.cents(), 499);
    /// ```
    pub fn times_quantity(&self, quantity: crate::types::Quantity) -> Money {
        Money(saturate(div_half_up(self.0 as i128 * quantity.milli() as i128, 1_000)))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

// Arithmetic saturates instead of wrapping. Inputs are bounded by
// `MAX_INPUT`, so only an absurd cart can reach the edges, and the range
// checks in sale planning reject it there.

/// Plain two-decimal rendering; the currency symbol belongs to the caller.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Local-currency units per one base-currency unit, with four decimals.
///
/// ## Why Scaled Integers?
/// Same reasoning as `TaxRate` basis points: the rate is multiplied into money,
/// so it must be exact. `36.5` is stored as `365_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Fixed-point scale (4 decimals).
    pub const SCALE: i64 = 10_000;

    /// The identity rate, used when no local currency is involved.
    pub const PARITY: ExchangeRate = ExchangeRate(Self::SCALE);

    /// Largest rate accepted from a caller (one billion local per base).
    pub const MAX: ExchangeRate = ExchangeRate(1_000_000_000 * Self::SCALE);

    /// Creates a rate from its scaled representation.
    ///
    /// Returns `None` for zero or negative values.
    pub const fn from_scaled(scaled: i64) -> Option<Self> {
        if scaled > 0 {
            Some(ExchangeRate(scaled))
        } else {
            None
        }
    }

    /// Converts a caller-supplied decimal rate (rounded to 4 places).
    pub fn from_decimal(value: f64) -> ValidationResult<Self> {
        if !value.is_finite() {
            return Err(ValidationError::non_finite("rate"));
        }
        let scaled = scaled_half_up(value, Self::SCALE as f64);
        match Self::from_scaled(scaled) {
            Some(rate) if rate.0 <= Self::MAX.0 => Ok(rate),
            _ => Err(ValidationError::InvalidRate {
                value: value.to_string(),
            }),
        }
    }

    /// Returns the scaled representation.
    #[inline]
    pub const fn scaled(&self) -> i64 {
        self.0
    }

    /// Returns the rate as a decimal (for display only).
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Converts a local-currency amount into the base currency.
    pub fn to_base(&self, local: Money) -> Money {
        Money(saturate(div_half_up(
            local.cents() as i128 * Self::SCALE as i128,
            self.0 as i128,
        )))
    }

    /// Converts a base-currency amount into the local currency.
    pub fn to_local(&self, base: Money) -> Money {
        Money(saturate(div_half_up(
            base.cents() as i128 * self.0 as i128,
            Self::SCALE as i128,
        )))
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quantity;

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(1.004), 1.0);
        assert_eq!(round2(-1.005), -1.01);
        assert_eq!(round2(0.1 + 0.2), 0.3);
    }

    #[test]
    fn test_from_decimal_rejects_non_finite() {
        assert_eq!(
            Money::from_decimal("total", f64::INFINITY),
            Err(ValidationError::non_finite("total"))
        );
        assert!(Money::from_decimal("total", f64::NAN).is_err());
        assert_eq!(Money::from_decimal("total", 30.0).unwrap().cents(), 3000);
    }

    #[test]
    fn test_from_decimal_rejects_huge_amounts() {
        assert_eq!(
            Money::from_decimal("amount", 1e17),
            Err(ValidationError::out_of_range("amount"))
        );
        assert_eq!(
            Money::from_decimal("amount", -1e300),
            Err(ValidationError::out_of_range("amount"))
        );
        assert_eq!(
            Money::from_decimal("amount", 1e12).unwrap(),
            Money::MAX_INPUT
        );
    }

    #[test]
    fn test_arithmetic_saturates() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max + Money::from_cents(1), max);
        let min = Money::from_cents(i64::MIN);
        assert_eq!(min - Money::from_cents(1), min);
        assert_eq!([max, max].into_iter().sum::<Money>(), max);
        assert!(!max.within_input_range());
        assert_eq!(
            max.times_quantity(Quantity::from_units(10)),
            Money::from_cents(i64::MAX)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(2000).to_string(), "20.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_sum_and_neg() {
        let total: Money = [100, 250, -50].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 300);
        assert_eq!((-total).cents(), -300);
        assert_eq!(Money::from_cents(-10).floor_zero(), Money::zero());
    }

    #[test]
    fn test_div_half_up_signs() {
        assert_eq!(div_half_up(5, 2), 3);
        assert_eq!(div_half_up(-5, 2), -3);
        assert_eq!(div_half_up(4, 3), 1);
        assert_eq!(div_half_up(-4, 3), -1);
    }

    #[test]
    fn test_rate_conversion() {
        let rate = ExchangeRate::from_decimal(36.5).unwrap();
        assert_eq!(rate.scaled(), 365_000);
        assert_eq!(rate.to_base(Money::from_cents(36_500)).cents(), 1000);
        assert_eq!(rate.to_local(Money::from_cents(1000)).cents(), 36_500);
        // VES 100.00 at 36.5 = USD 2.739... → 2.74
        assert_eq!(rate.to_base(Money::from_cents(10_000)).cents(), 274);
        assert_eq!(rate.to_string(), "36.5000");
    }

    #[test]
    fn test_rate_rejects_zero_and_nan() {
        assert!(matches!(
            ExchangeRate::from_decimal(0.0),
            Err(ValidationError::InvalidRate { .. })
        ));
        assert!(matches!(
            ExchangeRate::from_decimal(-3.0),
            Err(ValidationError::InvalidRate { .. })
        ));
        assert!(matches!(
            ExchangeRate::from_decimal(f64::NAN),
            Err(ValidationError::NonFinite { .. })
        ));
        assert!(matches!(
            ExchangeRate::from_decimal(1e300),
            Err(ValidationError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_tax_half_up() {
        // 10.00 at 8.25% = 0.825 → 0.83
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_times_quantity() {
        assert_eq!(
            Money::from_cents(299).times_quantity(Quantity::from_units(3)).cents(),
            897
        );
        assert_eq!(
            Money::from_cents(1000).times_quantity(Quantity::from_milli(333)).cents(),
            333
        );
    }
}
