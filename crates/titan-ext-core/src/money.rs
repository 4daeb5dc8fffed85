//! # Money Module
//!
//! The `Money` type for deposit fees, component costs, order totals and
//! cashback amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Deposit fee $0.25 × 3 containers                                       │
//! │                                                                         │
//! │  float:   0.25 * 3 = 0.75 (fine) ... 0.1 * 3 = 0.30000000000000004      │
//! │  integer: 25 * 3 = 75 cents, always                                     │
//! │                                                                         │
//! │  BOM rollup, cashback and charges all stay in integer cents.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use titan_ext_core::money::Money;
//!
//! let fee = Money::from_cents(25);
//! let charge = fee.multiply_quantity(3);
//! assert_eq!(charge.cents(), 75);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so account debits and reversals can be expressed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use titan_ext_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a basis-point rate and rounds half up.
    ///
    /// Used for cashback (`purchases × cashback rate`) and the special
    /// customer discount (`subtotal × discount rate`).
    ///
    /// ## Implementation
    /// Integer math: `(amount × bps + 5000) / 10000`, widened to i128 so
    /// yearly purchase totals cannot overflow.
    ///
    /// ```rust
    /// use titan_ext_core::money::Money;
    /// use titan_ext_core::types::Rate;
    ///
    /// // $10.00 at 8.25% = $0.825 → $0.83
    /// let amount = Money::from_cents(1000).apply_rate(Rate::from_bps(825));
    /// assert_eq!(amount.cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Multiplies money by a quantity, saturating at the i64 bounds.
    ///
    /// Use [`Money::checked_multiply_quantity`] where the result is stored.
    ///
    /// ```rust
    /// use titan_ext_core::money::Money;
    ///
    /// let unit_cost = Money::from_cents(299);
    /// assert_eq!(unit_cost.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies money by a quantity, `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering; the host front-end handles localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::zero()), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 2% of $123.45 = $2.469 → $2.47
        let amount = Money::from_cents(12345).apply_rate(Rate::from_bps(200));
        assert_eq!(amount.cents(), 247);

        // 5% of $0.10 = $0.005 → $0.01
        let amount = Money::from_cents(10).apply_rate(Rate::from_bps(500));
        assert_eq!(amount.cents(), 1);
    }

    #[test]
    fn test_apply_rate_large_totals() {
        // A year of purchases near i64 range must not overflow
        let total = Money::from_cents(9_000_000_000_000_000);
        let amount = total.apply_rate(Rate::from_bps(100));
        assert_eq!(amount.cents(), 90_000_000_000_000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [150, 250, 100].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.cents(), 500);
    }

    #[test]
    fn test_overflow_saturates_or_reports() {
        let large = Money::from_cents(i64::MAX / 2);

        assert_eq!(large.multiply_quantity(3).cents(), i64::MAX);
        assert_eq!((large + large + large).cents(), i64::MAX);
        assert_eq!((-large - large - large).cents(), i64::MIN);
        assert_eq!(large.checked_multiply_quantity(3), None);
        assert_eq!(large.checked_add(large), Some(Money::from_cents(i64::MAX - 1)));
        assert_eq!(large.checked_add(large).and_then(|m| m.checked_add(large)), None);
    }

    #[test]
    fn test_zero_and_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(-100).abs().cents(), 100);
    }
}
