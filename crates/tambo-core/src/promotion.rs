//! # 10+1 Promotion
//!
//! Every ten paid units in one sale earn one free ticket.
//!
//! ```text
//!   paid units:  23
//!   free units:  23 / 10 = 2
//!   tickets:     23 + 2  = 25
//! ```
//!
//! Free tickets carry no price, so which product they are printed under has
//! no effect on money. They are spread round-robin over the cart lines in
//! cart order: the i-th free ticket goes to line `i mod line_count`.

use crate::error::ValidationError;
use crate::types::{CartLine, PromotionSummary};
use crate::validation::validate_ticket_count;
use crate::PROMOTION_THRESHOLD;

/// Computes the promotion for a cart.
///
/// The paid count is the checked sum of quantities; a cart over
/// [`MAX_TICKETS_PER_SALE`](crate::MAX_TICKETS_PER_SALE) is refused rather
/// than clamped.
pub fn compute_promotion(cart: &[CartLine]) -> Result<PromotionSummary, ValidationError> {
    validate_ticket_count(cart).map(promotion_for_paid)
}

/// The 10+1 rule applied to a paid unit count.
///
/// `paid_item_count` is expected within the per-sale ticket limit, as
/// returned by [`validate_ticket_count`].
pub fn promotion_for_paid(paid_item_count: i64) -> PromotionSummary {
    let paid_item_count = paid_item_count.max(0);
    let free_item_count = paid_item_count / PROMOTION_THRESHOLD;
    PromotionSummary {
        paid_item_count,
        free_item_count,
        total_ticket_count: paid_item_count.saturating_add(free_item_count),
    }
}

/// Line index each free ticket is attached to, in free-ticket order.
///
/// ## Example
/// ```rust
/// use tambo_core::{allocate_free_items, CartLine, Money, PaymentMethod};
///
/// let cart = vec![
///     CartLine::new("a", "Chicha", Money::from_cents(500), 15, PaymentMethod::Cash),
///     CartLine::new("b", "Empanada", Money::from_cents(700), 10, PaymentMethod::Transfer),
/// ];
/// assert_eq!(allocate_free_items(cart.len(), 2), vec![0, 1]);
/// assert_eq!(allocate_free_items(2, 3), vec![0, 1, 0]);
/// ```
pub fn allocate_free_items(line_count: usize, free_item_count: i64) -> Vec<usize> {
    if line_count == 0 || free_item_count <= 0 {
        return Vec::new();
    }
    (0..free_item_count as usize).map(|i| i % line_count).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::PaymentMethod;

    fn line(id: &str, qty: i64) -> CartLine {
        CartLine::new(id, id, Money::from_cents(500), qty, PaymentMethod::Cash)
    }

    #[test]
    fn test_twenty_three_items_earn_two_free() {
        let promo = compute_promotion(&[line("a", 23)]).unwrap();
        assert_eq!(promo.paid_item_count, 23);
        assert_eq!(promo.free_item_count, 2);
        assert_eq!(promo.total_ticket_count, 25);
    }

    #[test]
    fn test_threshold_is_exactly_ten() {
        assert_eq!(promotion_for_paid(9).free_item_count, 0);
        assert_eq!(promotion_for_paid(10).free_item_count, 1);
        assert_eq!(promotion_for_paid(19).free_item_count, 1);
        assert_eq!(promotion_for_paid(20).free_item_count, 2);
        assert_eq!(promotion_for_paid(0), PromotionSummary::default());
    }

    #[test]
    fn test_floor_rule_holds_for_all_small_counts() {
        for paid in 0..=500 {
            let promo = promotion_for_paid(paid);
            assert_eq!(promo.free_item_count, paid / 10);
            assert_eq!(promo.total_ticket_count, paid + paid / 10);
        }
    }

    #[test]
    fn test_paid_count_spans_lines() {
        let promo = compute_promotion(&[line("a", 4), line("b", 3), line("c", 3)]).unwrap();
        assert_eq!(promo.paid_item_count, 10);
        assert_eq!(promo.free_item_count, 1);
    }

    #[test]
    fn test_overflowing_quantities_are_refused() {
        assert!(matches!(
            compute_promotion(&[line("a", i64::MAX), line("b", i64::MAX)]),
            Err(ValidationError::Overflow { .. })
        ));
        assert!(compute_promotion(&[line("a", i64::MAX / 2)]).is_err());
    }

    #[test]
    fn test_round_robin_wraps_to_first_line() {
        assert_eq!(allocate_free_items(3, 5), vec![0, 1, 2, 0, 1]);
        assert_eq!(allocate_free_items(1, 3), vec![0, 0, 0]);
        assert!(allocate_free_items(0, 3).is_empty());
        assert!(allocate_free_items(4, 0).is_empty());
    }
}
