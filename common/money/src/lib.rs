use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Monetary amount in integer minor units (paise). Every money value in the
/// system flows through this type; conversion to a display decimal happens
/// only at rendering/serialization boundaries via [`Money::to_decimal`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
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
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Line total: unit price times quantity. Uses i128 internally so a
    /// hostile quantity cannot wrap.
    pub fn multiply_quantity(&self, qty: i64) -> Money {
        let total = self.0 as i128 * qty as i128;
        Money(total.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Basis-point share of this amount, rounded half-up.
    /// `Money::from_cents(1000).percent_bps(1800)` is 18% of 10.00 = 1.80.
    pub fn percent_bps(&self, bps: i64) -> Money {
        let share = (self.0 as i128 * bps as i128 + 5_000) / 10_000;
        Money(share as i64)
    }

    /// Subtraction clamped at zero; used for "remaining owed" style values
    /// that must never go negative.
    pub fn saturating_sub_floor_zero(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Clamp into `[lo, hi]`.
    pub fn clamp(&self, lo: Money, hi: Money) -> Money {
        Money(self.0.clamp(lo.0, hi.0))
    }

    /// 2-decimal-scale representation for invoices and reports.
    pub fn to_decimal(&self) -> BigDecimal {
        BigDecimal::new(self.0.into(), 2)
    }
}

/// Renders at the 2-decimal display scale, e.g. `295.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Money;
    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_bps_half_up() {
        // 10.00 at 18% = 1.80 exact
        assert_eq!(Money::from_cents(1_000).percent_bps(1_800).cents(), 180);
        // 0.33 at 18% = 0.0594 -> rounds to 0.06
        assert_eq!(Money::from_cents(33).percent_bps(1_800).cents(), 6);
        // midpoint rounds up: 0.25 at 10% = 0.025 -> 0.03
        assert_eq!(Money::from_cents(25).percent_bps(1_000).cents(), 3);
        assert_eq!(Money::zero().percent_bps(1_800).cents(), 0);
    }

    #[test]
    fn line_total_is_exact() {
        assert_eq!(Money::from_cents(10_000).multiply_quantity(2).cents(), 20_000);
        assert_eq!(Money::from_cents(299).multiply_quantity(3).cents(), 897);
    }

    #[test]
    fn floor_zero_subtraction() {
        let total = Money::from_cents(500);
        assert_eq!(total.saturating_sub_floor_zero(Money::from_cents(200)).cents(), 300);
        assert_eq!(total.saturating_sub_floor_zero(Money::from_cents(900)).cents(), 0);
    }

    #[test]
    fn display_and_decimal() {
        assert_eq!(Money::from_cents(29_500).to_string(), "295.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(180).to_decimal().to_string(), "1.80");
    }

    #[test]
    fn serde_roundtrips_as_integer_cents() {
        let m = Money::from_cents(29_500);
        assert_eq!(serde_json::to_string(&m).unwrap(), "29500");
        let back: Money = serde_json::from_str("29500").unwrap();
        assert_eq!(back, m);
    }
}
