//! # Money Module
//!
//! `Money` is an amount of Peruvian soles stored as integer céntimos.
//!
//! ## Why Céntimos?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE RECONCILIATION PROBLEM                                             │
//! │                                                                         │
//! │  With floating point, ten sales of S/ 0.10 do not add up to S/ 1.00:   │
//! │    0.1 + 0.1 + ... (×10) = 0.9999999999999999                          │
//! │                                                                         │
//! │  At closing time the drawer must match the ledger exactly:             │
//! │    current_amount == initial_amount + Σ cash sales                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer céntimos                                        │
//! │    10 × 10 céntimos = 100 céntimos, always                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tambo_core::money::Money;
//!
//! let price = Money::from_cents(500);          // S/ 5.00
//! let line = price.checked_mul_quantity(10);   // Some(S/ 50.00)
//! assert_eq!(line, Some(Money::from_soles(50)));
//! assert_eq!(price.to_string(), "S/ 5.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in céntimos (1/100 of a sol).
///
/// ## Design Decisions
/// - **i64 (signed)**: the ledger never stores negatives, but the type can
///   express a difference (e.g. a reconciliation gap)
/// - **Checked helpers**: sale math goes through `checked_*` so an absurd
///   cart is a validation failure instead of a wrapped total
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► CartLine.unit_price ──► SaleLine.line_total
///                                                  │
///                         SaleTotals { cash, transfer } ◄──┘
///                                  │
///                                  ▼
///                 LedgerDelta ──► RegisterSession counters
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from céntimos.
    ///
    /// ## Example
    /// ```rust
    /// use tambo_core::money::Money;
    ///
    /// let price = Money::from_cents(350); // S/ 3.50
    /// assert_eq!(price.cents(), 350);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole soles.
    #[inline]
    pub const fn from_soles(soles: i64) -> Self {
        Money(soles * 100)
    }

    /// Returns the value in céntimos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole soles portion (truncated toward zero).
    #[inline]
    pub const fn soles(&self) -> i64 {
        self.0 / 100
    }

    /// Céntimos portion, always 0-99.
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
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Addition that reports overflow instead of wrapping.
    ///
    /// ## Example
    /// ```rust
    /// use tambo_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1).checked_add(Money::from_cents(2)), Some(Money::from_cents(3)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    /// ```
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Unit price × quantity, `None` on overflow.
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Chicha morada S/ 5.00
    /// Quantity: 10
    ///      │
    ///      ▼
    /// checked_mul_quantity(10) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: S/ 50.00
    /// ```
    #[inline]
    pub const fn checked_mul_quantity(self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Sums an iterator of amounts, `None` on overflow.
    pub fn checked_sum<I>(iter: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        iter.into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl Money {
    /// Formats with a custom currency symbol: `US$ 12.50`.
    pub fn display_with(&self, symbol: &str) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{} {}.{:02}", sign, symbol, self.soles().abs(), self.cents_part())
    }
}

/// Formats as shown on tickets and the closing screen: `S/ 12.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_with("S/"))
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

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_symbol() {
        assert_eq!(Money::from_cents(1250).display_with("US$"), "US$ 12.50");
        assert_eq!(Money::from_cents(-5).display_with("S/"), "-S/ 0.05");
        assert_eq!(Money::from_cents(1250).to_string(), "S/ 12.50");
    }

    #[test]
    fn test_from_cents_and_parts() {
        let money = Money::from_cents(1250);
        assert_eq!(money.soles(), 12);
        assert_eq!(money.cents_part(), 50);
        assert_eq!(Money::from_soles(5).cents(), 500);
    }

    #[test]
    fn test_display_uses_soles_symbol() {
        assert_eq!(Money::from_cents(5000).to_string(), "S/ 50.00");
        assert_eq!(Money::from_cents(5).to_string(), "S/ 0.05");
        assert_eq!(Money::zero().to_string(), "S/ 0.00");
        assert_eq!(Money::from_cents(-250).to_string(), "-S/ 2.50");
    }

    #[test]
    fn test_checked_mul_quantity_overflow() {
        assert_eq!(
            Money::from_cents(500).checked_mul_quantity(10),
            Some(Money::from_cents(5000))
        );
        assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul_quantity(3), None);
    }

    #[test]
    fn test_checked_sum() {
        let parts = vec![Money::from_cents(100), Money::from_cents(250)];
        assert_eq!(Money::checked_sum(parts), Some(Money::from_cents(350)));
        assert_eq!(
            Money::checked_sum(vec![Money::from_cents(i64::MAX), Money::from_cents(1)]),
            None
        );
    }

    /// Ten sales of ten céntimos reconcile to exactly one sol.
    #[test]
    fn test_repeated_small_sales_reconcile_exactly() {
        let total: Money = std::iter::repeat(Money::from_cents(10)).take(10).sum();
        assert_eq!(total, Money::from_soles(1));
    }
}
