//! # Tickets
//!
//! A sale prints one ticket per unit, plus one per free promotional unit.
//!
//! ## Derivation
//! ```text
//! Sale: Chicha ×2 (cash), Empanada ×9 (transfer)   → 11 paid, 1 free
//!
//!   #1  Chicha     S/ 5.00  Efectivo
//!   #2  Chicha     S/ 5.00  Efectivo
//!   #3  Empanada   S/ 7.00  Transferencia
//!   ...
//!   #11 Empanada   S/ 7.00  Transferencia
//!   #12 Chicha     GRATIS   (free #0 → line 0 mod 2)
//! ```
//!
//! Paid tickets follow the lines in order and the units within each line.
//! Free tickets come last, attached round-robin by [`allocate_free_items`].

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::promotion::allocate_free_items;
use crate::types::{SaleRecord, Ticket};
use crate::MAX_TICKETS_PER_SALE;

/// Derives every ticket of a sale.
///
/// Deterministic: the same record always yields the same tickets.
pub fn derive_tickets(sale: &SaleRecord, seller_name: &str) -> Vec<Ticket> {
    let of = sale.promotion.total_ticket_count;
    let mut tickets = Vec::with_capacity(of.clamp(0, MAX_TICKETS_PER_SALE) as usize);

    let mut push = |line_idx: usize, is_free: bool| {
        let line = &sale.lines[line_idx];
        let sequence = tickets.len() as i64 + 1;
        tickets.push(Ticket {
            sequence,
            of,
            product_id: line.product_id.clone(),
            product_name: line.name_snapshot.clone(),
            price: if is_free { Money::zero() } else { line.unit_price },
            payment_method: line.payment_method,
            payment_label: line.payment_method.label().to_string(),
            seller_name: seller_name.to_string(),
            is_free,
            sale_id: sale.id.clone(),
            business_day: sale.business_day,
        });
    };

    for (idx, line) in sale.lines.iter().enumerate() {
        for _ in 0..line.quantity {
            push(idx, false);
        }
    }
    for idx in allocate_free_items(sale.lines.len(), sale.promotion.free_item_count) {
        push(idx, true);
    }

    tickets
}

// =============================================================================
// Thermal Layout
// =============================================================================

/// Store details printed at the top of every ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHeader {
    pub name: String,
    pub address_lines: Vec<String>,
    /// Printed before amounts, e.g. `S/`.
    pub currency_symbol: String,
    pub footer: Option<String>,
}

impl Default for StoreHeader {
    fn default() -> Self {
        Self {
            name: "Tambo".to_string(),
            address_lines: Vec::new(),
            currency_symbol: "S/".to_string(),
            footer: Some("Gracias por su compra".to_string()),
        }
    }
}

/// Narrowest layout we lay out for (58mm paper).
pub const MIN_PAPER_WIDTH: usize = 32;

struct TextBuilder {
    width: usize,
    out: String,
}

impl TextBuilder {
    fn new(width: usize) -> Self {
        Self {
            width,
            out: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        let clipped: String = text.chars().take(self.width).collect();
        self.out.push_str(&clipped);
        self.out.push('\n');
    }

    fn center(&mut self, text: &str) {
        let len = text.chars().count().min(self.width);
        let pad = (self.width - len) / 2;
        let padded = format!("{}{}", " ".repeat(pad), text);
        self.line(&padded);
    }

    /// Left text and right text on one row; the left side is clipped first.
    fn line_lr(&mut self, left: &str, right: &str) {
        let right_len = right.chars().count();
        let room = self.width.saturating_sub(right_len + 1);
        let left: String = left.chars().take(room).collect();
        let gap = self.width.saturating_sub(left.chars().count() + right_len);
        let row = format!("{}{}{}", left, " ".repeat(gap.max(1)), right);
        self.line(&row);
    }

    fn separator(&mut self, c: char) {
        let sep: String = std::iter::repeat(c).take(self.width).collect();
        self.line(&sep);
    }
}

/// Renders one ticket as plain text for a thermal printer.
///
/// `width` is the paper width in characters (32, 42 or 48); narrower values
/// are raised to [`MIN_PAPER_WIDTH`].
pub fn render_ticket(ticket: &Ticket, store: &StoreHeader, width: usize) -> String {
    let mut b = TextBuilder::new(width.max(MIN_PAPER_WIDTH));

    b.center(&store.name);
    for address in &store.address_lines {
        b.center(address);
    }
    b.separator('=');

    b.line_lr(
        &format!("Ticket {}/{}", ticket.sequence, ticket.of),
        &ticket.business_day.to_string(),
    );
    let short_id: String = ticket.sale_id.chars().take(8).collect();
    b.line_lr(&format!("Venta {}", short_id), &ticket.payment_label);
    b.separator('-');

    let price = if ticket.is_free {
        "GRATIS".to_string()
    } else {
        ticket.price.display_with(&store.currency_symbol)
    };
    b.line_lr(&ticket.product_name, &price);
    if ticket.is_free {
        b.line("Promocion 10+1");
    }

    b.separator('-');
    b.line(&format!("Vendedor: {}", ticket.seller_name));
    if let Some(footer) = &store.footer {
        b.center(footer);
    }

    b.out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business_day::BusinessDayResolver;
    use crate::sale::prepare_sale_with_id;
    use crate::types::{CartLine, PaymentMethod};
    use chrono::{TimeZone, Utc};

    fn sale(cart: &[CartLine]) -> SaleRecord {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
        prepare_sale_with_id(
            "9b2f6c1e-0000-4000-8000-000000000001".to_string(),
            cart,
            "cajero-1",
            now,
            &BusinessDayResolver::peru(),
        )
        .unwrap()
        .0
    }

    #[test]
    fn test_twenty_three_units_print_twenty_five_tickets() {
        let s = sale(&[CartLine::new("a", "Chicha", Money::from_cents(500), 23, PaymentMethod::Cash)]);
        let tickets = derive_tickets(&s, "Rosa");
        assert_eq!(tickets.len(), 25);
        assert_eq!(tickets.iter().filter(|t| t.is_free).count(), 2);
        assert!(tickets.iter().all(|t| t.of == 25));
        let seqs: Vec<i64> = tickets.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, (1..=25).collect::<Vec<_>>());
    }

    #[test]
    fn test_ten_units_give_eleven_tickets_last_free() {
        let s = sale(&[CartLine::new("a", "Chicha", Money::from_cents(500), 10, PaymentMethod::Cash)]);
        let tickets = derive_tickets(&s, "Rosa");
        assert_eq!(tickets.len(), 11);
        let last = tickets.last().unwrap();
        assert!(last.is_free);
        assert_eq!(last.price, Money::zero());
        assert!(tickets[..10].iter().all(|t| t.price == Money::from_cents(500)));
    }

    #[test]
    fn test_free_tickets_round_robin_over_lines() {
        let s = sale(&[
            CartLine::new("a", "Chicha", Money::from_cents(500), 15, PaymentMethod::Cash),
            CartLine::new("b", "Empanada", Money::from_cents(700), 10, PaymentMethod::Transfer),
        ]);
        let free: Vec<String> = derive_tickets(&s, "Rosa")
            .into_iter()
            .filter(|t| t.is_free)
            .map(|t| t.product_id)
            .collect();
        assert_eq!(free, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_paid_tickets_follow_line_order_and_labels() {
        let s = sale(&[
            CartLine::new("a", "Chicha", Money::from_cents(1000), 2, PaymentMethod::Cash),
            CartLine::new("b", "Anticucho", Money::from_cents(2000), 1, PaymentMethod::Transfer),
        ]);
        let tickets = derive_tickets(&s, "Rosa");
        assert_eq!(tickets.len(), 3);
        assert_eq!(tickets[0].payment_label, "Efectivo");
        assert_eq!(tickets[2].product_name, "Anticucho");
        assert_eq!(tickets[2].payment_label, "Transferencia");
        assert_eq!(tickets[2].seller_name, "Rosa");
    }

    #[test]
    fn test_render_fits_paper_width() {
        let s = sale(&[CartLine::new(
            "a",
            "Chicha morada extra grande con hielo y limon",
            Money::from_cents(500),
            10,
            PaymentMethod::Cash,
        )]);
        let tickets = derive_tickets(&s, "Rosa");
        let store = StoreHeader {
            name: "Bodega Tambo".to_string(),
            address_lines: vec!["Av. Arequipa 123, Lima".to_string()],
            currency_symbol: "S/".to_string(),
            footer: None,
        };

        for width in [32, 42, 48] {
            let text = render_ticket(&tickets[0], &store, width);
            assert!(text.lines().all(|l| l.chars().count() <= width));
            assert!(text.contains("Ticket 1/11"));
            assert!(text.contains("S/ 5.00"));
        }

        let free = render_ticket(tickets.last().unwrap(), &store, 32);
        assert!(free.contains("GRATIS"));
        assert!(free.contains("Promocion 10+1"));
    }
}
