//! # Validation Module
//!
//! Input validation for Tambo POS.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Cart editing (Cart)                                          │
//! │  ├── validate_quantity: 1..=999 per line                               │
//! │  └── 100 distinct lines                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Sale builder                                                 │
//! │  └── validate_cart: non-empty, qty > 0, price ≥ 0                      │
//! │           │   (a cart may come from anywhere, not only from Cart)       │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity > 0), CHECK (amounts ≥ 0)                         │
//! │  └── PRIMARY KEY (operator_id, business_day)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing downstream runs if a check here fails; validation never leaves
//! partial state behind.
//!
//! ## Usage
//! ```rust
//! use tambo_core::validation::{validate_cart, validate_quantity};
//! use tambo_core::{CartLine, Money, PaymentMethod};
//!
//! validate_quantity(5).unwrap();
//! let cart = vec![CartLine::new("p-1", "Inca Kola", Money::from_cents(350), 2, PaymentMethod::Cash)];
//! validate_cart(&cart).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::CartLine;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_TICKETS_PER_SALE, PROMOTION_THRESHOLD};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an operator id.
///
/// ## Rules
/// - Must not be blank
/// - At most 64 characters
pub fn validate_operator_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "operator_id".to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "operator_id".to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Example
/// ```rust
/// use tambo_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Chicha morada 500ml").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity typed into the cart.
///
/// ## User Workflow
/// ```text
/// Cashier taps "+" or types 12
///       │
///       ▼
/// validate_quantity(12) ← THIS FUNCTION
///       │
///       ├── qty <= 0?  → "quantity must be positive"
///       ├── qty > 999? → "quantity must be between 1 and 999"
///       └── OK → line updated
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in céntimos. Zero is allowed (courtesy items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates a single line for sale computation.
///
/// Only the ledger rules apply here (qty > 0, price ≥ 0); the 999 cap is a
/// cart-editing limit.
pub fn validate_cart_line(line: &CartLine) -> ValidationResult<()> {
    if line.product_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product_id".to_string(),
        });
    }

    if line.quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    validate_price_cents(line.unit_price.cents())
}

/// Validates a whole cart for sale computation.
pub fn validate_cart(cart: &[CartLine]) -> ValidationResult<()> {
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    cart.iter().try_for_each(validate_cart_line)?;
    validate_ticket_count(cart).map(|_| ())
}

/// Paid units in a cart, checked against [`MAX_TICKETS_PER_SALE`].
///
/// ```text
/// Σ quantity ── overflow? ──► Overflow
///     │
///     ▼
/// paid + paid / 10 > MAX_TICKETS_PER_SALE? ──► OutOfRange
///     │
///     ▼
/// paid
/// ```
pub fn validate_ticket_count(cart: &[CartLine]) -> ValidationResult<i64> {
    let overflow = || ValidationError::Overflow {
        field: "quantity".to_string(),
    };

    let paid = cart
        .iter()
        .try_fold(0i64, |acc, line| acc.checked_add(line.quantity))
        .ok_or_else(overflow)?;
    let tickets = paid
        .checked_add(paid / PROMOTION_THRESHOLD)
        .ok_or_else(overflow)?;

    if tickets > MAX_TICKETS_PER_SALE {
        return Err(ValidationError::OutOfRange {
            field: "tickets".to_string(),
            min: 1,
            max: MAX_TICKETS_PER_SALE,
        });
    }

    Ok(paid)
}

/// Validates that one more line fits in the cart.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a sale id (UUID).
///
/// ## Example
/// ```rust
/// use tambo_core::validation::validate_sale_id;
///
/// assert!(validate_sale_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_sale_id("venta-1").is_err());
/// ```
pub fn validate_sale_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "sale_id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "sale_id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::PaymentMethod;

    fn line(qty: i64, cents: i64) -> CartLine {
        CartLine::new("p-1", "Inca Kola", Money::from_cents(cents), qty, PaymentMethod::Cash)
    }

    #[test]
    fn test_validate_operator_id() {
        assert!(validate_operator_id("cajero-1").is_ok());
        assert!(validate_operator_id("").is_err());
        assert!(validate_operator_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_cart_rejects_empty() {
        assert_eq!(validate_cart(&[]), Err(ValidationError::EmptyCart));
    }

    #[test]
    fn test_validate_cart_rejects_bad_lines() {
        assert!(matches!(
            validate_cart(&[line(0, 100)]),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_cart(&[line(1, 100), line(2, -1)]),
            Err(ValidationError::Negative { .. })
        ));
    }

    #[test]
    fn test_validate_cart_allows_free_items_and_large_quantities() {
        assert!(validate_cart(&[line(1, 0)]).is_ok());
        // The editing cap does not apply to sale computation.
        assert!(validate_cart(&[line(1_500, 10)]).is_ok());
    }

    #[test]
    fn test_validate_cart_bounds_tickets_per_sale() {
        // 4_546 paid + 454 free = 5_000 tickets
        assert!(validate_cart(&[line(4_546, 0)]).is_ok());
        assert!(matches!(
            validate_cart(&[line(4_547, 0)]),
            Err(ValidationError::OutOfRange { max: MAX_TICKETS_PER_SALE, .. })
        ));
        assert!(matches!(
            validate_cart(&[line(i64::MAX / 2, 0)]),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_quantity_sum_overflow_is_reported() {
        assert!(matches!(
            validate_cart(&[line(i64::MAX, 0), line(i64::MAX, 0)]),
            Err(ValidationError::Overflow { .. })
        ));
        assert_eq!(validate_ticket_count(&[line(4, 0), line(7, 0)]), Ok(11));
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(99).is_ok());
        assert!(validate_cart_size(100).is_err());
    }
}
