//! # Sale Transaction Builder
//!
//! Turns a cart into an immutable `SaleRecord` plus the `LedgerDelta` its
//! register session must absorb.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart ──► compute_totals ──► ValidationError? stop, nothing computed    │
//! │               │                                                         │
//! │               ▼                                                         │
//! │        compute_promotion (10+1)                                         │
//! │               │                                                         │
//! │               ▼                                                         │
//! │        resolver.resolve(now) ──► business_day                           │
//! │               │                                                         │
//! │               ▼                                                         │
//! │        session open for (operator, business_day)? ── no ──► RegisterClosed
//! │               │ yes                                                     │
//! │               ▼                                                         │
//! │        (SaleRecord, LedgerDelta)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here writes anywhere. The caller persists the record and applies
//! the delta as one unit.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::business_day::BusinessDayResolver;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::promotion::{compute_promotion, promotion_for_paid};
use crate::types::{
    CartLine, LedgerDelta, PaymentBreakdown, RegisterSession, SaleLine, SaleRecord, SaleTotals,
};
use crate::validation::{validate_cart, validate_operator_id};
use crate::MAX_TICKETS_PER_SALE;

fn overflow(field: &str) -> ValidationError {
    ValidationError::Overflow {
        field: field.to_string(),
    }
}

/// Total and per-method subtotals of a cart.
///
/// Fails without computing anything if the cart is empty, a quantity is not
/// positive or a price is negative.
///
/// ## Example
/// ```rust
/// use tambo_core::{compute_totals, CartLine, Money, PaymentMethod};
///
/// let cart = vec![
///     CartLine::new("a", "Chicha", Money::from_cents(1000), 2, PaymentMethod::Cash),
///     CartLine::new("b", "Anticucho", Money::from_cents(2000), 1, PaymentMethod::Transfer),
/// ];
/// let totals = compute_totals(&cart).unwrap();
/// assert_eq!(totals.total, Money::from_cents(4000));
/// assert_eq!(totals.by_method.cash, Money::from_cents(2000));
/// assert_eq!(totals.by_method.transfer, Money::from_cents(2000));
/// ```
pub fn compute_totals(cart: &[CartLine]) -> Result<SaleTotals, ValidationError> {
    validate_cart(cart)?;

    let mut by_method = PaymentBreakdown::default();
    for line in cart {
        let line_total = line.line_total().ok_or_else(|| overflow("line_total"))?;
        let slot = by_method.slot_mut(line.payment_method);
        *slot = slot
            .checked_add(line_total)
            .ok_or_else(|| overflow(line.payment_method.as_str()))?;
    }

    let total = by_method
        .cash
        .checked_add(by_method.transfer)
        .ok_or_else(|| overflow("total"))?;

    Ok(SaleTotals { total, by_method })
}

/// Builds the sale without checking any register session.
///
/// Used for offline sales: the ticket can be printed now and the session is
/// re-validated when the queued sale is replayed.
pub fn prepare_sale(
    cart: &[CartLine],
    operator_id: &str,
    now: DateTime<Utc>,
    resolver: &BusinessDayResolver,
) -> Result<(SaleRecord, LedgerDelta), ValidationError> {
    prepare_sale_with_id(Uuid::new_v4().to_string(), cart, operator_id, now, resolver)
}

/// [`prepare_sale`] with a caller-chosen id.
pub fn prepare_sale_with_id(
    id: String,
    cart: &[CartLine],
    operator_id: &str,
    now: DateTime<Utc>,
    resolver: &BusinessDayResolver,
) -> Result<(SaleRecord, LedgerDelta), ValidationError> {
    let totals = compute_totals(cart)?;
    let promotion = compute_promotion(cart)?;
    validate_operator_id(operator_id)?;

    let mut lines = Vec::with_capacity(cart.len());
    for line in cart {
        lines.push(SaleLine {
            product_id: line.product_id.clone(),
            name_snapshot: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            payment_method: line.payment_method,
            line_total: line.line_total().ok_or_else(|| overflow("line_total"))?,
        });
    }

    let sale = SaleRecord {
        id,
        lines,
        total: totals.total,
        by_method: totals.by_method,
        operator_id: operator_id.to_string(),
        business_day: resolver.resolve(now),
        created_at: now,
        promotion,
    };
    let delta = LedgerDelta::from(&totals);

    Ok((sale, delta))
}

/// Builds a sale against the operator's current register session.
///
/// `session` must be the open session for `(operator_id, resolve(now))`;
/// anything else (none, closed, another operator, yesterday's session) is
/// `RegisterClosed`. The cart is validated first.
pub fn build_sale_record(
    cart: &[CartLine],
    operator_id: &str,
    now: DateTime<Utc>,
    session: Option<&RegisterSession>,
    resolver: &BusinessDayResolver,
) -> CoreResult<(SaleRecord, LedgerDelta)> {
    let (sale, delta) = prepare_sale(cart, operator_id, now, resolver)?;
    ensure_accepts(session, &sale)?;
    Ok((sale, delta))
}

/// Checks that `session` is the open session a sale belongs to.
pub fn ensure_accepts(session: Option<&RegisterSession>, sale: &SaleRecord) -> CoreResult<()> {
    match session {
        Some(s)
            if s.is_open
                && s.operator_id == sale.operator_id
                && s.business_day == sale.business_day =>
        {
            Ok(())
        }
        _ => Err(CoreError::register_closed(
            sale.operator_id.clone(),
            sale.business_day,
        )),
    }
}

/// Re-derives totals from the lines of a record.
///
/// `None` if the record is internally inconsistent, or if its quantities
/// overflow or exceed the per-sale ticket limit.
pub fn verify_sale_record(sale: &SaleRecord) -> Option<()> {
    let line_sum = Money::checked_sum(sale.lines.iter().map(|l| l.line_total))?;
    let method_sum = sale.by_method.cash.checked_add(sale.by_method.transfer)?;
    let paid = sale
        .lines
        .iter()
        .try_fold(0i64, |acc, l| {
            if l.quantity <= 0 {
                return None;
            }
            acc.checked_add(l.quantity)
        })?;
    let promo = promotion_for_paid(paid);
    if promo.total_ticket_count > MAX_TICKETS_PER_SALE {
        return None;
    }
    (line_sum == sale.total && method_sum == sale.total && promo == sale.promotion).then_some(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::open_session;
    use crate::types::PaymentMethod;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // 10:00 in Lima
        Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap()
    }

    fn cash(id: &str, cents: i64, qty: i64) -> CartLine {
        CartLine::new(id, id, Money::from_cents(cents), qty, PaymentMethod::Cash)
    }

    fn transfer(id: &str, cents: i64, qty: i64) -> CartLine {
        CartLine::new(id, id, Money::from_cents(cents), qty, PaymentMethod::Transfer)
    }

    #[test]
    fn test_total_is_sum_of_price_times_quantity() {
        let carts = vec![
            vec![cash("a", 150, 3)],
            vec![cash("a", 0, 7), transfer("b", 999, 2), cash("c", 1, 1)],
            vec![transfer("a", 12_345, 11), transfer("b", 50, 40)],
        ];
        for cart in carts {
            let expected: i64 = cart.iter().map(|l| l.unit_price.cents() * l.quantity).sum();
            let totals = compute_totals(&cart).unwrap();
            assert_eq!(totals.total.cents(), expected);
            assert_eq!(totals.total, totals.by_method.cash + totals.by_method.transfer);
        }
    }

    #[test]
    fn test_mixed_payment_split() {
        let cart = vec![cash("a", 1000, 2), transfer("b", 2000, 1)];
        let totals = compute_totals(&cart).unwrap();
        assert_eq!(totals.total, Money::from_cents(4000));
        assert_eq!(totals.by_method.cash, Money::from_cents(2000));
        assert_eq!(totals.by_method.transfer, Money::from_cents(2000));
    }

    #[test]
    fn test_invalid_carts_are_rejected() {
        assert_eq!(compute_totals(&[]), Err(ValidationError::EmptyCart));
        assert!(compute_totals(&[cash("a", 100, 0)]).is_err());
        assert!(compute_totals(&[cash("a", 100, -2)]).is_err());
        assert!(compute_totals(&[cash("a", -1, 1)]).is_err());
    }

    #[test]
    fn test_overflow_is_a_validation_error() {
        let cart = vec![cash("a", i64::MAX / 2, 2), cash("b", i64::MAX / 2, 2)];
        assert!(matches!(
            compute_totals(&cart),
            Err(ValidationError::Overflow { .. })
        ));
    }

    #[test]
    fn test_build_sale_requires_open_session() {
        let resolver = BusinessDayResolver::peru();
        let cart = vec![cash("a", 500, 10)];

        let err = build_sale_record(&cart, "cajero-1", now(), None, &resolver).unwrap_err();
        assert!(matches!(err, CoreError::RegisterClosed { .. }));

        let session = open_session(None, "cajero-1", now(), &resolver).session;
        let (sale, delta) =
            build_sale_record(&cart, "cajero-1", now(), Some(&session), &resolver).unwrap();
        assert_eq!(sale.total, Money::from_cents(5000));
        assert_eq!(sale.promotion.free_item_count, 1);
        assert_eq!(sale.promotion.total_ticket_count, 11);
        assert_eq!(sale.business_day.to_string(), "2026-03-01");
        assert_eq!(delta.cash_delta, Money::from_cents(5000));
        assert_eq!(delta.transfer_delta, Money::zero());
        assert!(verify_sale_record(&sale).is_some());
    }

    #[test]
    fn test_build_sale_rejects_foreign_or_stale_session() {
        let resolver = BusinessDayResolver::peru();
        let cart = vec![cash("a", 500, 1)];
        let other = open_session(None, "cajero-2", now(), &resolver).session;
        assert!(build_sale_record(&cart, "cajero-1", now(), Some(&other), &resolver).is_err());

        let yesterday = open_session(None, "cajero-1", now() - chrono::Duration::days(1), &resolver)
            .session;
        assert!(build_sale_record(&cart, "cajero-1", now(), Some(&yesterday), &resolver).is_err());
    }

    #[test]
    fn test_validation_precedes_session_check() {
        let resolver = BusinessDayResolver::peru();
        let err = build_sale_record(&[], "cajero-1", now(), None, &resolver).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyCart)));
    }

    #[test]
    fn test_huge_free_line_is_refused_before_building() {
        let resolver = BusinessDayResolver::peru();
        let err = prepare_sale(&[cash("a", 0, i64::MAX / 2)], "cajero-1", now(), &resolver)
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));

        let err = prepare_sale(
            &[cash("a", 0, i64::MAX), cash("b", 0, i64::MAX)],
            "cajero-1",
            now(),
            &resolver,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::Overflow { .. }));
    }

    #[test]
    fn test_verify_rejects_inflated_quantities() {
        let resolver = BusinessDayResolver::peru();
        let (mut sale, _) =
            prepare_sale(&[cash("a", 0, 3), cash("b", 0, 2)], "cajero-1", now(), &resolver)
                .unwrap();
        assert!(verify_sale_record(&sale).is_some());

        sale.lines[0].quantity = i64::MAX;
        sale.lines[1].quantity = i64::MAX;
        assert!(verify_sale_record(&sale).is_none());

        sale.lines[1].quantity = 1;
        assert!(verify_sale_record(&sale).is_none());
    }

    #[test]
    fn test_sale_lines_keep_cart_order_and_snapshots() {
        let resolver = BusinessDayResolver::peru();
        let cart = vec![transfer("b", 2000, 1), cash("a", 1000, 2)];
        let (sale, _) =
            prepare_sale_with_id("s-1".to_string(), &cart, "cajero-1", now(), &resolver).unwrap();
        assert_eq!(sale.id, "s-1");
        assert_eq!(sale.lines[0].product_id, "b");
        assert_eq!(sale.lines[1].line_total, Money::from_cents(2000));
        assert_eq!(sale.created_at, now());
    }
}
