//! # Register Session State Machine
//!
//! One cash drawer per `(operator_id, business_day)`.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NoSession ──open_session──► Open ──close_session──► Closed (terminal) │
//! │                                │ ▲                       │              │
//! │                    apply_sale  └─┘                       │              │
//! │                                                          │              │
//! │   open_session on Open/Closed  → returns the session unchanged          │
//! │   apply_sale   on Closed       → RegisterClosed, session unchanged      │
//! │   close_session on NoSession   → SessionNotFound                        │
//! │   close_session on Closed      → RegisterClosed                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition returns a new value; a `RegisterSession` is never
//! mutated in place, so a failed transition cannot leave half an update.
//! Each successor carries `version + 1` for the store's optimistic check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::business_day::{BusinessDayKey, BusinessDayResolver};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{LedgerDelta, RegisterSession};

/// Where a session key sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RegisterState {
    NoSession,
    Open,
    Closed,
}

impl RegisterState {
    pub fn of(session: Option<&RegisterSession>) -> Self {
        match session {
            None => RegisterState::NoSession,
            Some(s) if s.is_open => RegisterState::Open,
            Some(_) => RegisterState::Closed,
        }
    }
}

/// Result of [`open_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOutcome {
    pub session: RegisterSession,
    /// `false` when an existing session was returned as-is.
    pub created: bool,
}

/// Opens the register for `resolve(now)`.
///
/// `existing` is whatever the store holds for that key. Opening twice is not
/// an error: the existing session (open or closed) comes back untouched.
pub fn open_session(
    existing: Option<&RegisterSession>,
    operator_id: &str,
    now: DateTime<Utc>,
    resolver: &BusinessDayResolver,
) -> OpenOutcome {
    if let Some(session) = existing {
        return OpenOutcome {
            session: session.clone(),
            created: false,
        };
    }

    OpenOutcome {
        session: RegisterSession {
            operator_id: operator_id.to_string(),
            business_day: resolver.resolve(now),
            is_open: true,
            opened_at: now,
            closed_at: None,
            initial_amount: Money::zero(),
            current_amount: Money::zero(),
            total_sales: Money::zero(),
            cash_sales: Money::zero(),
            transfer_sales: Money::zero(),
            sale_count: 0,
            version: 1,
        },
        created: true,
    }
}

/// Closes an open session.
pub fn close_session(
    existing: Option<&RegisterSession>,
    operator_id: &str,
    business_day: BusinessDayKey,
    now: DateTime<Utc>,
) -> CoreResult<RegisterSession> {
    match existing {
        None => Err(CoreError::SessionNotFound {
            operator_id: operator_id.to_string(),
            business_day,
        }),
        Some(session) => session.close(now),
    }
}

impl RegisterSession {
    pub fn state(&self) -> RegisterState {
        RegisterState::of(Some(self))
    }

    /// Successor state after a committed sale.
    ///
    /// Only `cash_delta` moves cash on hand.
    pub fn apply_sale(&self, delta: &LedgerDelta) -> CoreResult<RegisterSession> {
        if !self.is_open {
            return Err(CoreError::register_closed(
                self.operator_id.clone(),
                self.business_day,
            ));
        }

        for (field, amount) in [
            ("total_delta", delta.total_delta),
            ("cash_delta", delta.cash_delta),
            ("transfer_delta", delta.transfer_delta),
        ] {
            if amount.is_negative() {
                return Err(ValidationError::Negative {
                    field: field.to_string(),
                }
                .into());
            }
        }

        let add = |field: &str, a: Money, b: Money| {
            a.checked_add(b).ok_or_else(|| {
                CoreError::from(ValidationError::Overflow {
                    field: field.to_string(),
                })
            })
        };

        let mut next = self.clone();
        next.total_sales = add("total_sales", self.total_sales, delta.total_delta)?;
        next.cash_sales = add("cash_sales", self.cash_sales, delta.cash_delta)?;
        next.transfer_sales = add("transfer_sales", self.transfer_sales, delta.transfer_delta)?;
        next.current_amount = add("current_amount", self.current_amount, delta.cash_delta)?;
        next.sale_count += 1;
        next.version += 1;
        Ok(next)
    }

    /// Successor state after closing. Counters are kept as the day's record.
    pub fn close(&self, now: DateTime<Utc>) -> CoreResult<RegisterSession> {
        if !self.is_open {
            return Err(CoreError::register_closed(
                self.operator_id.clone(),
                self.business_day,
            ));
        }

        let mut next = self.clone();
        next.is_open = false;
        next.closed_at = Some(now);
        next.version += 1;
        Ok(next)
    }

    /// Checks the internal identities of a session.
    ///
    /// - `total_sales == cash_sales + transfer_sales`
    /// - `current_amount == initial_amount + cash_sales`
    /// - `closed_at` is set iff the session is closed
    pub fn check_invariants(&self) -> CoreResult<()> {
        let fail = |reason: String| -> CoreResult<()> {
            Err(CoreError::consistency(
                self.operator_id.clone(),
                self.business_day,
                reason,
            ))
        };

        if self.cash_sales.checked_add(self.transfer_sales) != Some(self.total_sales) {
            return fail(format!(
                "total_sales {} != cash {} + transfer {}",
                self.total_sales, self.cash_sales, self.transfer_sales
            ));
        }
        if self.initial_amount.checked_add(self.cash_sales) != Some(self.current_amount) {
            return fail(format!(
                "current_amount {} != initial {} + cash {}",
                self.current_amount, self.initial_amount, self.cash_sales
            ));
        }
        if self.is_open == self.closed_at.is_some() {
            return fail("closed_at must be set exactly when the session is closed".to_string());
        }
        Ok(())
    }

    /// Verifies `self` may replace `prev` in the store.
    ///
    /// Rejects a different key, any decreasing counter, a changed opening
    /// amount and re-opening a closed session.
    pub fn ensure_successor_of(&self, prev: &RegisterSession) -> CoreResult<()> {
        let fail = |reason: &str| -> CoreResult<()> {
            Err(CoreError::consistency(
                self.operator_id.clone(),
                self.business_day,
                reason,
            ))
        };

        if self.key() != prev.key() {
            return fail("session key changed");
        }
        if self.initial_amount != prev.initial_amount {
            return fail("initial_amount changed");
        }
        if self.current_amount < prev.current_amount
            || self.total_sales < prev.total_sales
            || self.cash_sales < prev.cash_sales
            || self.transfer_sales < prev.transfer_sales
            || self.sale_count < prev.sale_count
        {
            return fail("counters decreased");
        }
        if !prev.is_open && self.is_open {
            return fail("closed session re-opened");
        }
        if self.version <= prev.version {
            return fail("version did not advance");
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap()
    }

    fn delta(cash: i64, transfer: i64) -> LedgerDelta {
        LedgerDelta {
            total_delta: Money::from_cents(cash + transfer),
            cash_delta: Money::from_cents(cash),
            transfer_delta: Money::from_cents(transfer),
        }
    }

    fn fresh() -> RegisterSession {
        open_session(None, "cajero-1", now(), &BusinessDayResolver::peru()).session
    }

    #[test]
    fn test_open_creates_zeroed_session() {
        let outcome = open_session(None, "cajero-1", now(), &BusinessDayResolver::peru());
        assert!(outcome.created);
        let s = outcome.session;
        assert!(s.is_open);
        assert_eq!(s.business_day.to_string(), "2026-03-01");
        assert_eq!(s.opened_at, now());
        assert_eq!(s.current_amount, Money::zero());
        assert_eq!(s.total_sales, Money::zero());
        assert!(s.closed_at.is_none());
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_open_is_idempotent() {
        let resolver = BusinessDayResolver::peru();
        let s = fresh().apply_sale(&delta(5000, 0)).unwrap();

        let again = open_session(Some(&s), "cajero-1", now(), &resolver);
        assert!(!again.created);
        assert_eq!(again.session, s);
        assert_eq!(again.session.current_amount, Money::from_cents(5000));

        let closed = s.close(now()).unwrap();
        let after_close = open_session(Some(&closed), "cajero-1", now(), &resolver);
        assert_eq!(after_close.session, closed);
        assert_eq!(after_close.session.state(), RegisterState::Closed);
    }

    #[test]
    fn test_apply_sale_cash_only_moves_cash_on_hand() {
        let s = fresh().apply_sale(&delta(2000, 2000)).unwrap();
        assert_eq!(s.total_sales, Money::from_cents(4000));
        assert_eq!(s.cash_sales, Money::from_cents(2000));
        assert_eq!(s.transfer_sales, Money::from_cents(2000));
        assert_eq!(s.current_amount, Money::from_cents(2000));
        assert_eq!(s.sale_count, 1);
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_counters_are_monotonic() {
        let deltas = [delta(0, 0), delta(150, 0), delta(0, 990), delta(7, 3), delta(0, 0)];
        let mut s = fresh();
        for d in &deltas {
            let next = s.apply_sale(d).unwrap();
            assert!(next.current_amount >= s.current_amount);
            assert!(next.total_sales >= s.total_sales);
            assert!(next.cash_sales >= s.cash_sales);
            assert!(next.transfer_sales >= s.transfer_sales);
            next.ensure_successor_of(&s).unwrap();
            next.check_invariants().unwrap();
            s = next;
        }
    }

    #[test]
    fn test_apply_sale_on_closed_session_is_rejected_and_unchanged() {
        let closed = fresh().apply_sale(&delta(100, 0)).unwrap().close(now()).unwrap();
        let before = closed.clone();
        let err = closed.apply_sale(&delta(500, 0)).unwrap_err();
        assert!(matches!(err, CoreError::RegisterClosed { .. }));
        assert_eq!(closed, before);
    }

    #[test]
    fn test_negative_delta_is_rejected() {
        assert!(matches!(
            fresh().apply_sale(&delta(-1, 0)),
            Err(CoreError::Validation(ValidationError::Negative { .. }))
        ));
    }

    #[test]
    fn test_close_transitions() {
        let day = fresh().business_day;
        let err = close_session(None, "cajero-1", day, now()).unwrap_err();
        assert!(matches!(err, CoreError::SessionNotFound { .. }));

        let open = fresh().apply_sale(&delta(300, 200)).unwrap();
        let closed = close_session(Some(&open), "cajero-1", day, now()).unwrap();
        assert!(!closed.is_open);
        assert_eq!(closed.closed_at, Some(now()));
        assert_eq!(closed.total_sales, Money::from_cents(500));
        closed.check_invariants().unwrap();

        let err = close_session(Some(&closed), "cajero-1", day, now()).unwrap_err();
        assert!(matches!(err, CoreError::RegisterClosed { .. }));
    }

    #[test]
    fn test_ensure_successor_detects_regressions() {
        let a = fresh().apply_sale(&delta(500, 0)).unwrap();
        let b = a.apply_sale(&delta(100, 0)).unwrap();
        assert!(a.ensure_successor_of(&b).is_err());

        let mut reopened = b.close(now()).unwrap();
        let closed = reopened.clone();
        reopened.is_open = true;
        reopened.version += 1;
        assert!(matches!(
            reopened.ensure_successor_of(&closed),
            Err(CoreError::Consistency { .. })
        ));
    }

    #[test]
    fn test_check_invariants_detects_tampering() {
        let mut s = fresh().apply_sale(&delta(500, 0)).unwrap();
        s.current_amount = Money::from_cents(400);
        assert!(s.check_invariants().is_err());
    }
}
