//! # Cart
//!
//! The client-local cart the cashier edits before pressing "Cobrar".
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier Action            Cart Method            Line Change           │
//! │  ──────────────            ───────────            ───────────           │
//! │  Tap product (Efectivo) ──► add()        ──► push or qty += n           │
//! │  Tap "+"                ──► increment()  ──► qty += 1                   │
//! │  Tap "−"                ──► decrement()  ──► qty -= 1, removed at 0     │
//! │  Type quantity          ──► set_quantity ──► qty = n, removed at 0      │
//! │  Swipe line away        ──► remove()     ──► line removed               │
//! │  After a sale           ──► clear()      ──► empty                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `(product_id, payment_method)`; the same product
//!   paid two ways is two lines
//! - Every line has `1 <= quantity <= MAX_ITEM_QUANTITY`
//! - At most `MAX_CART_ITEMS` lines
//! - Unit price and name are frozen when the line is first added

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::promotion::compute_promotion;
use crate::sale::compute_totals;
use crate::types::{CartLine, PaymentMethod, Product, PromotionSummary, SaleTotals};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Units across all lines.
    pub fn total_units(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    fn position(&self, product_id: &str, method: PaymentMethod) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.product_id == product_id && l.payment_method == method)
    }

    /// Adds a product, or raises the quantity of its existing line.
    pub fn add(&mut self, product: &Product, quantity: i64, method: PaymentMethod) -> CoreResult<()> {
        self.add_line(CartLine::from_product(product, quantity, method))
    }

    /// Adds a prepared line, merging with an existing line for the same
    /// product and method. The existing snapshot wins.
    pub fn add_line(&mut self, line: CartLine) -> CoreResult<()> {
        validate_quantity(line.quantity)?;

        if let Some(i) = self.position(&line.product_id, line.payment_method) {
            let new_qty = self.lines[i].quantity + line.quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            self.lines[i].quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        self.lines.push(line);
        Ok(())
    }

    pub fn increment(&mut self, product_id: &str, method: PaymentMethod) -> CoreResult<()> {
        let i = self
            .position(product_id, method)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))?;
        let new_qty = self.lines[i].quantity + 1;
        self.set_at(i, new_qty)
    }

    /// Lowers a line by one; the line disappears when it reaches zero.
    pub fn decrement(&mut self, product_id: &str, method: PaymentMethod) -> CoreResult<()> {
        let i = self
            .position(product_id, method)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))?;
        let new_qty = self.lines[i].quantity - 1;
        self.set_at(i, new_qty)
    }

    /// Sets a line's quantity; zero removes it.
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        method: PaymentMethod,
        quantity: i64,
    ) -> CoreResult<()> {
        let i = self
            .position(product_id, method)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))?;
        self.set_at(i, quantity)
    }

    fn set_at(&mut self, i: usize, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            self.lines.remove(i);
            return Ok(());
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        validate_quantity(quantity)?;
        self.lines[i].quantity = quantity;
        Ok(())
    }

    /// Switches how a line is paid, merging into an existing line if needed.
    pub fn change_method(
        &mut self,
        product_id: &str,
        from: PaymentMethod,
        to: PaymentMethod,
    ) -> CoreResult<()> {
        if from == to {
            return Ok(());
        }
        let i = self
            .position(product_id, from)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))?;

        if let Some(j) = self.position(product_id, to) {
            let merged = self.lines[i].quantity + self.lines[j].quantity;
            if merged > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            self.lines[j].quantity = merged;
            self.lines.remove(i);
        } else {
            self.lines[i].payment_method = to;
        }
        Ok(())
    }

    pub fn remove(&mut self, product_id: &str, method: PaymentMethod) -> CoreResult<CartLine> {
        let i = self
            .position(product_id, method)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))?;
        Ok(self.lines.remove(i))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Totals for the summary panel.
    pub fn totals(&self) -> CoreResult<SaleTotals> {
        Ok(compute_totals(&self.lines)?)
    }

    /// Free tickets the current cart would earn.
    pub fn promotion(&self) -> CoreResult<PromotionSummary> {
        Ok(compute_promotion(&self.lines)?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
