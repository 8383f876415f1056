//! # Reversal Planning
//!
//! Derives the exact inverse of a committed journal entry from the values
//! frozen on it.
//!
//! ```text
//! committed entry                       reversal
//! ───────────────                       ────────
//! stock  -= line.quantity × factor  →   stock  += same, same factor
//! drawer SALE flow (payments/change) →  drawer REFUND flow, same lines
//! account: +debt_created            →   −debt_created
//!          −consumed_wallet         →   +consumed_wallet
//!          change → debt / wallet   →   −applied_to_wallet, +applied_to_debt
//! status COMPLETED                  →   VOID + reason/actor/time
//! ```

use crate::account::AccountEffects;
use crate::error::StateConflict;
use crate::sale::{aggregate_stock, StockRequirement};
use crate::types::{Change, EntryKind, JournalEntry, Payment};

/// What a void must apply, all taken from the frozen entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversalPlan {
    /// Stock to put back, per product, in base units.
    pub restock: Vec<StockRequirement>,
    pub payments: Vec<Payment>,
    pub changes: Vec<Change>,
    /// Customer to restore and the effects to undo.
    pub account: Option<(String, AccountEffects)>,
}

impl ReversalPlan {
    /// True when the entry moved money through the drawer.
    pub fn touches_drawer(&self) -> bool {
        self.payments.iter().any(|p| p.medium.touches_drawer())
            || self.changes.iter().any(|c| c.medium.touches_drawer())
    }
}

/// Builds the reversal for a completed entry.
///
/// ## Errors
/// `NotReversible` for adjustments, which have no recorded inverse.
pub fn plan_reversal(entry: &JournalEntry) -> Result<ReversalPlan, StateConflict> {
    if entry.kind == EntryKind::Adjustment {
        return Err(StateConflict::NotReversible {
            entry_id: entry.id.clone(),
            kind: entry.kind,
        });
    }

    let account = entry.customer_id.as_ref().map(|customer_id| {
        (
            customer_id.clone(),
            AccountEffects {
                debt_created: entry.debt_created,
                consumed_wallet: entry.consumed_wallet,
                applied_to_debt: entry.applied_to_debt,
                applied_to_wallet: entry.applied_to_wallet,
            },
        )
    });

    Ok(ReversalPlan {
        restock: aggregate_stock(&entry.lines),
        payments: entry.payments.clone(),
        changes: entry.changes.clone(),
        account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{ExchangeRate, Money};
    use crate::types::{EntryStatus, LineItem, Quantity, TaxRate, UnitLevel};
    use chrono::Utc;

    fn entry(kind: EntryKind) -> JournalEntry {
        JournalEntry {
            id: "e1".to_string(),
            kind,
            invoice_number: "F-000001".to_string(),
            status: EntryStatus::Completed,
            created_at: Utc::now(),
            actor: "cashier".to_string(),
            session_id: Some("s1".to_string()),
            customer_id: Some("c1".to_string()),
            rate: ExchangeRate::PARITY,
            is_credit: false,
            lines: vec![LineItem {
                product_id: "cola".to_string(),
                name: "Cola".to_string(),
                quantity: Quantity::from_units(2),
                level: UnitLevel::Pack,
                factor: 6,
                unit_price: Money::from_cents(550),
                tax_rate: TaxRate::default(),
                line_total: Money::from_cents(1_100),
                tax: Money::zero(),
            }],
            payments: vec![],
            changes: vec![],
            subtotal: Money::from_cents(1_100),
            tax: Money::zero(),
            igtf: Money::zero(),
            total: Money::from_cents(1_100),
            paid_base: Money::from_cents(1_100),
            change_owed: Money::zero(),
            debt_created: Money::zero(),
            consumed_wallet: Money::zero(),
            applied_to_debt: Money::from_cents(300),
            applied_to_wallet: Money::from_cents(200),
            resulting_debt: None,
            resulting_wallet: None,
            adjusted_quadrant: None,
            adjusted_amount: Money::zero(),
            reason: None,
            void: None,
            closed_session_id: None,
        }
    }

    #[test]
    fn test_reversal_uses_frozen_factor() {
        let plan = plan_reversal(&entry(EntryKind::Sale)).unwrap();
        assert_eq!(plan.restock[0].quantity, Quantity::from_units(12));
        let (customer_id, effects) = plan.account.unwrap();
        assert_eq!(customer_id, "c1");
        assert_eq!(effects.applied_to_debt, Money::from_cents(300));
        assert_eq!(effects.applied_to_wallet, Money::from_cents(200));
    }

    #[test]
    fn test_adjustments_are_not_reversible() {
        assert!(matches!(
            plan_reversal(&entry(EntryKind::Adjustment)),
            Err(StateConflict::NotReversible { .. })
        ));
    }
}
