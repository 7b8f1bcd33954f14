//! # Money Module
//!
//! `Money` holds an amount in piastres (1/100 of a pound) as an `i64`.
//! `Rate` holds a percentage in basis points and is used for invoice
//! discounts, taxes and margins.
//!
//! ## Exact Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Binary floating point:  3 × 19.99 = 59.97000000000001                 │
//! │  Integer piastres:       3 × 1999  = 5997  →  59.97                    │
//! │                                                                         │
//! │  User input "19.99" ──► rust_decimal ──► 1999 piastres ──► storage     │
//! │                                                                         │
//! │  Floats never enter monetary arithmetic. Rounding happens only when a  │
//! │  Rate is applied, half away from zero, in one place: Rate::apply.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use khalifa_core::money::{Money, Rate};
//!
//! let price: Money = "19.99".parse().unwrap();
//! assert_eq!(price * 3, Money::from_minor(5997));
//!
//! let vat = Rate::from_bps(1400); // 14%
//! assert_eq!(vat.apply(Money::from_minor(10_000)), Money::from_minor(1400));
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Minor units per major unit (piastres per pound).
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units.
///
/// Signed so that credits, refunds and negative balances are representable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a value from minor units (piastres).
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a value from whole pounds.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Returns the raw minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Whole-pound part, truncated toward zero.
    #[inline]
    pub const fn major_part(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Piastre part, always 0-99.
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
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

    /// Multiplies a unit price by a quantity.
    ///
    /// ```rust
    /// use khalifa_core::Money;
    ///
    /// let line = Money::from_minor(1999).times(3);
    /// assert_eq!(line.minor(), 5997);
    /// ```
    #[inline]
    pub const fn times(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Converts an exact decimal amount. More than two fractional digits is
    /// an error rather than a silent rounding, and so is anything beyond
    /// ±[`MAX_MONEY`](crate::MAX_MONEY).
    pub fn from_decimal(value: Decimal) -> Result<Money, ValidationError> {
        let normalized = value.normalize();
        if normalized.scale() > 2 {
            return Err(ValidationError::invalid(
                "amount",
                "at most two decimal places are allowed",
            ));
        }

        let max = crate::MAX_MONEY.minor();
        normalized
            .checked_mul(Decimal::from(MINOR_PER_MAJOR))
            .and_then(|minor| minor.to_i64())
            .filter(|minor| minor.abs() <= max)
            .map(Money)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: -max,
                max,
            })
    }

    /// Exact decimal view, for display layers that need one.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

// =============================================================================
// Parsing and Display
// =============================================================================

impl FromStr for Money {
    type Err = ValidationError;

    /// Parses user-entered amounts such as `"19.99"`, `"-5.5"` or `"1200"`.
    /// Thousands separators are accepted and ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return Err(ValidationError::required("amount"));
        }

        let value = Decimal::from_str(&cleaned)
            .map_err(|e| ValidationError::invalid("amount", e.to_string()))?;
        Money::from_decimal(value)
    }
}

/// Plain `major.minor` rendering. Locale-aware output lives in
/// [`crate::format::format_currency`].
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02}",
            sign,
            self.major_part().abs(),
            self.minor_part()
        )
    }
}

// =============================================================================
// Operators
// =============================================================================

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage in basis points: 1 bps = 0.01%, 1400 bps = 14%.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Whole-percent shorthand: `from_percent(14)` is 14%.
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        Rate(pct * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Share of `amount` at this rate, rounded half away from zero.
    ///
    /// ```rust
    /// use khalifa_core::money::{Money, Rate};
    ///
    /// // 10.00 × 8.25% = 0.825 → 0.83
    /// let share = Rate::from_bps(825).apply(Money::from_minor(1000));
    /// assert_eq!(share.minor(), 83);
    /// ```
    pub fn apply(&self, amount: Money) -> Money {
        let product = amount.minor() as i128 * self.0 as i128;
        let half = Self::FULL_BPS as i128 / 2;
        let rounded = (product.abs() + half) / Self::FULL_BPS as i128;
        let signed = if product < 0 { -rounded } else { rounded };
        Money::from_minor(signed as i64)
    }

    /// Ratio `part / whole` as a rate, rounded to the nearest basis point.
    /// Returns zero when `whole` is not positive.
    pub fn ratio(part: Money, whole: Money) -> i64 {
        if !whole.is_positive() {
            return 0;
        }
        let scaled = part.minor() as i128 * Self::FULL_BPS as i128;
        let whole = whole.minor() as i128;
        let half = whole / 2;
        let rounded = if scaled < 0 {
            -((-scaled + half) / whole)
        } else {
            (scaled + half) / whole
        };
        rounded as i64
    }
}

impl FromStr for Rate {
    type Err = ValidationError;

    /// Parses a percentage such as `"14"` or `"2.5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pct = Decimal::from_str(s.trim().trim_end_matches('%'))
            .map_err(|e| ValidationError::invalid("rate", e.to_string()))?;
        let bps = (pct * Decimal::from(100)).normalize();
        if bps.scale() > 0 {
            return Err(ValidationError::invalid(
                "rate",
                "at most two decimal places are allowed",
            ));
        }
        bps.to_u32()
            .filter(|b| *b <= Self::FULL_BPS)
            .map(Rate)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "rate".to_string(),
                min: 0,
                max: 100,
            })
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}%", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
