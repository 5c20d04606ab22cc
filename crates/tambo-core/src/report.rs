//! # Daily Reports
//!
//! End-of-day numbers for one operator's business day, and the check that
//! the register session agrees with the sales actually stored.
//!
//! ## Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  session.total_sales    == Σ sale.total                                 │
//! │  session.cash_sales     == Σ sale.by_method.cash                        │
//! │  session.transfer_sales == Σ sale.by_method.transfer                    │
//! │  session.current_amount == session.initial_amount + Σ cash              │
//! │  session.sale_count     == number of sales                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! A mismatch means a sale and its ledger update were not applied together.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::business_day::BusinessDayKey;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentBreakdown, RegisterSession, SaleRecord};

/// Units and revenue of one product over a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductRanking {
    pub product_id: String,
    pub name: String,
    pub units: i64,
    pub revenue: Money,
}

/// Summary of one operator's business day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyReport {
    pub operator_id: String,
    pub business_day: BusinessDayKey,
    pub sale_count: i64,
    pub units_sold: i64,
    pub free_tickets: i64,
    pub total: Money,
    pub by_method: PaymentBreakdown,
    /// Best sellers first (units, then revenue, then name).
    pub products: Vec<ProductRanking>,
}

/// Builds the report from the stored sales of a day.
///
/// Sales belonging to another operator or day are ignored.
pub fn summarize_day(
    operator_id: &str,
    business_day: BusinessDayKey,
    sales: &[SaleRecord],
) -> DailyReport {
    let mut report = DailyReport {
        operator_id: operator_id.to_string(),
        business_day,
        sale_count: 0,
        units_sold: 0,
        free_tickets: 0,
        total: Money::zero(),
        by_method: PaymentBreakdown::default(),
        products: Vec::new(),
    };

    for sale in sales
        .iter()
        .filter(|s| s.operator_id == operator_id && s.business_day == business_day)
    {
        report.sale_count += 1;
        report.units_sold += sale.promotion.paid_item_count;
        report.free_tickets += sale.promotion.free_item_count;
        report.total += sale.total;
        report.by_method.cash += sale.by_method.cash;
        report.by_method.transfer += sale.by_method.transfer;

        for line in &sale.lines {
            match report
                .products
                .iter_mut()
                .find(|p| p.product_id == line.product_id)
            {
                Some(p) => {
                    p.units += line.quantity;
                    p.revenue += line.line_total;
                }
                None => report.products.push(ProductRanking {
                    product_id: line.product_id.clone(),
                    name: line.name_snapshot.clone(),
                    units: line.quantity,
                    revenue: line.line_total,
                }),
            }
        }
    }

    report.products.sort_by(|a, b| {
        b.units
            .cmp(&a.units)
            .then(b.revenue.cmp(&a.revenue))
            .then(a.name.cmp(&b.name))
    });
    report
}

/// Checks a session against the sales stored for its key.
pub fn reconcile(session: &RegisterSession, sales: &[SaleRecord]) -> CoreResult<()> {
    session.check_invariants()?;

    let report = summarize_day(&session.operator_id, session.business_day, sales);
    let mismatch = |what: &str, expected: String, actual: String| -> CoreResult<()> {
        Err(CoreError::consistency(
            session.operator_id.clone(),
            session.business_day,
            format!("{}: session has {}, sales add up to {}", what, expected, actual),
        ))
    };

    if report.sale_count != session.sale_count {
        return mismatch(
            "sale_count",
            session.sale_count.to_string(),
            report.sale_count.to_string(),
        );
    }
    if report.total != session.total_sales {
        return mismatch("total_sales", session.total_sales.to_string(), report.total.to_string());
    }
    if report.by_method.cash != session.cash_sales {
        return mismatch(
            "cash_sales",
            session.cash_sales.to_string(),
            report.by_method.cash.to_string(),
        );
    }
    if report.by_method.transfer != session.transfer_sales {
        return mismatch(
            "transfer_sales",
            session.transfer_sales.to_string(),
            report.by_method.transfer.to_string(),
        );
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
