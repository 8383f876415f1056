//! # Drawer Math
//!
//! Pure quadrant arithmetic for the cash session.
//!
//! ## Flow Signs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 payment               change                           │
//! │   SALE      quadrant += amount     quadrant -= amount                  │
//! │   REFUND    quadrant -= amount     quadrant += amount                  │
//! │                                                                         │
//! │   credit / wallet mediums have no quadrant and are skipped             │
//! │   cash quadrants may not end below zero unless policy allows it        │
//! │   digital quadrants may go negative (absorbed credit)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::types::{Balances, Change, Payment, Quadrant};

/// Direction of a drawer flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Sale,
    Refund,
}

impl FlowKind {
    fn sign(&self) -> i64 {
        match self {
            FlowKind::Sale => 1,
            FlowKind::Refund => -1,
        }
    }
}

/// Applies payments and change to `balances`.
///
/// ## Errors
/// `InsufficientCash` when a cash quadrant would drop below zero during this
/// flow and `allow_negative_cash` is false.
pub fn apply_flow(
    balances: &Balances,
    kind: FlowKind,
    payments: &[Payment],
    changes: &[Change],
    allow_negative_cash: bool,
) -> ValidationResult<Balances> {
    let sign = kind.sign();
    let mut next = *balances;

    for payment in payments {
        if let Some(quadrant) = payment.quadrant() {
            *next.get_mut(quadrant) += Money::from_cents(sign * payment.amount.cents());
        }
    }
    for change in changes {
        if let Some(quadrant) = change.quadrant() {
            *next.get_mut(quadrant) -= Money::from_cents(sign * change.amount.cents());
        }
    }

    if !allow_negative_cash {
        for quadrant in Quadrant::ALL.into_iter().filter(Quadrant::is_cash) {
            let before = balances.get(quadrant);
            let after = next.get(quadrant);
            if after.is_negative() && after < before {
                return Err(ValidationError::InsufficientCash {
                    quadrant,
                    available: before,
                    required: before - after,
                });
            }
        }
    }

    Ok(next)
}

/// Removes `amount` from one quadrant.
///
/// Cash quadrants are floored at zero; digital quadrants may go negative.
/// Returns the new balances and the amount actually removed.
pub fn withdraw(balances: &Balances, quadrant: Quadrant, amount: Money) -> (Balances, Money) {
    let mut next = *balances;
    let current = balances.get(quadrant);
    let removed = if quadrant.is_cash() {
        amount.min(current.floor_zero())
    } else {
        amount
    };
    *next.get_mut(quadrant) = current - removed;
    (next, removed)
}

// =============================================================================
// Unit Tests
// =============================================================================
