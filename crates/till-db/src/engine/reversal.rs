//! # Reversal Engine
//!
//! Voids a sale or debt payment by replaying its frozen values backwards.
//!
//! ```text
//! void(entry_id, reason, actor)
//!   │
//!   ├─ unknown id ─────────────► NotFound
//!   ├─ already VOID ───────────► Ok(already_void = true), nothing written
//!   ├─ adjustment ─────────────► Conflict(NotReversible)
//!   │
//!   ▼  one unit
//! restock ─► REFUND flow ─► reverse customer ─► status = VOID
//! ```
//!
//! The refund goes through the drawer that is open now, which may not be the
//! session the entry was recorded in. That session's Z-report counts the void.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::events::LedgerEvent;
use super::{logged, Ledger};
use crate::error::{LedgerError, LedgerResult};
use crate::repository::customer as accounts;
use crate::repository::{cash_session, inventory, journal};
use till_core::reversal::plan_reversal;
use till_core::validation::{validate_actor, validate_reason};
use till_core::{FlowKind, JournalEntry, StateConflict, VoidInfo};

/// Result of a void.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoidOutcome {
    /// The entry as stored after the call.
    pub entry: JournalEntry,
    /// True when the entry was already void and nothing changed.
    pub already_void: bool,
}

impl Ledger {
    /// Voids a journal entry.
    ///
    /// Voiding an entry twice is a no-op that returns the stored entry.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown entry
    /// - `Conflict(NotReversible)` for adjustments
    /// - `Conflict(RegisterClosed)` when the entry moved drawer money and no
    ///   session is open
    /// - `Validation(InsufficientCash)` when the refund would overdraw cash
    pub async fn void_entry(
        &self,
        entry_id: &str,
        reason: &str,
        actor: &str,
    ) -> LedgerResult<VoidOutcome> {
        logged("void_entry", self.void_unit(entry_id, reason, actor).await)
    }

    async fn void_unit(
        &self,
        entry_id: &str,
        reason: &str,
        actor: &str,
    ) -> LedgerResult<VoidOutcome> {
        let reason = validate_reason(reason)?;
        let actor = validate_actor(actor)?;

        let mut unit = self.db.begin_unit().await?;
        let entry = journal::get_in(&mut unit, entry_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))?;

        if entry.is_void() {
            info!(%entry_id, invoice = %entry.invoice_number, "Entry already void");
            return Ok(VoidOutcome {
                entry,
                already_void: true,
            });
        }

        let plan = plan_reversal(&entry)?;

        for requirement in &plan.restock {
            inventory::restore_stock(
                &mut unit,
                &requirement.product_id,
                requirement.quantity,
                &entry.id,
            )
            .await?;
        }

        let session_id = if plan.touches_drawer() {
            let session = self
                .apply_flow_in(&mut unit, FlowKind::Refund, &plan.payments, &plan.changes)
                .await?;
            Some(session.id)
        } else {
            cash_session::current_in(&mut unit).await?.map(|s| s.id)
        };

        if let Some((customer_id, effects)) = &plan.account {
            if accounts::get_in(&mut unit, customer_id).await?.is_none() {
                return Err(LedgerError::not_found("Customer", customer_id));
            }
            accounts::reverse(&mut unit, customer_id, effects).await?;
        }

        let void = VoidInfo {
            reason,
            actor,
            voided_at: Utc::now(),
        };
        journal::mark_void(&mut unit, &entry.id, &void, session_id.as_deref()).await?;

        let entry = journal::get_in(&mut unit, &entry.id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))?;
        unit.commit().await?;

        info!(
            %entry_id,
            invoice = %entry.invoice_number,
            kind = %entry.kind,
            refund_session = ?session_id,
            "Entry voided"
        );
        self.publish(LedgerEvent::EntryVoided {
            entry_id: entry.id.clone(),
            invoice_number: entry.invoice_number.clone(),
            kind: entry.kind,
            reason: void.reason,
            actor: void.actor,
        });

        Ok(VoidOutcome {
            entry,
            already_void: false,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{self, ACTOR};
    use till_core::{
        Balances, Currency, Customer, CustomerQuadrant, DebtPaymentRequest, EntryStatus, Medium,
        Money, OpeningFloat, Quantity, SaleLineInput, SaleRequest, TenderInput, UnitLevel,
    };

    fn change_sale() -> SaleRequest {
        // 1 pack (55.00) + 2 units (20.00) paid with 100 cash: 25 absorbed by c1
        SaleRequest {
            actor: ACTOR.to_string(),
            lines: vec![
                SaleLineInput::new("soda", 1.0).at_level(UnitLevel::Pack),
                SaleLineInput::new("soda", 2.0),
            ],
            payments: vec![TenderInput::new(100.0, Currency::Usd, Medium::Cash)],
            rate: 36.5,
            customer_id: Some("c1".to_string()),
            ..SaleRequest::default()
        }
    }

    async fn snapshot(ledger: &Ledger) -> (Quantity, Balances, Customer) {
        let stock = ledger.db().products().get("soda").await.unwrap().unwrap().stock;
        let balances = ledger
            .session_state()
            .await
            .unwrap()
            .open()
            .unwrap()
            .balances;
        let customer = ledger.db().customers().get("c1").await.unwrap().unwrap();
        (stock, balances, customer)
    }

    async fn ledger_with_debtor() -> Ledger {
        let ledger = fixtures::open_ledger(100.0).await;
        ledger
            .db()
            .customers()
            .insert(&fixtures::customer("c1", 1_000, 0))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_void_then_resale_is_neutral() {
        let ledger = ledger_with_debtor().await;
        let before = snapshot(&ledger).await;

        let first = ledger.commit_sale(&change_sale()).await.unwrap();
        let after_once = snapshot(&ledger).await;
        assert_eq!(after_once.0, Quantity::from_units(92));
        assert_eq!(first.applied_to_debt, Money::from_cents(1_000));
        assert_eq!(first.applied_to_wallet, Money::from_cents(1_500));

        let outcome = ledger.void_entry(&first.id, "wrong customer", ACTOR).await.unwrap();
        assert!(!outcome.already_void);
        assert_eq!(outcome.entry.status, EntryStatus::Void);
        assert_eq!(snapshot(&ledger).await, before);

        ledger.commit_sale(&change_sale()).await.unwrap();
        assert_eq!(snapshot(&ledger).await, after_once);
    }

    #[tokio::test]
    async fn test_void_twice_is_noop() {
        let ledger = ledger_with_debtor().await;
        let entry = ledger.commit_sale(&change_sale()).await.unwrap();

        ledger.void_entry(&entry.id, "typo", ACTOR).await.unwrap();
        let state = snapshot(&ledger).await;

        let outcome = ledger.void_entry(&entry.id, "again", "bob").await.unwrap();
        assert!(outcome.already_void);
        let void = outcome.entry.void.unwrap();
        assert_eq!(void.reason, "typo");
        assert_eq!(void.actor, ACTOR);
        assert_eq!(snapshot(&ledger).await, state);
    }

    #[tokio::test]
    async fn test_void_credit_sale_restores_debt() {
        let ledger = ledger_with_debtor().await;
        let entry = ledger
            .commit_sale(&SaleRequest {
                is_credit: true,
                payments: vec![],
                ..change_sale()
            })
            .await
            .unwrap();
        assert_eq!(entry.debt_created, Money::from_cents(7_500));

        ledger.void_entry(&entry.id, "returned", ACTOR).await.unwrap();
        let customer = ledger.db().customers().get("c1").await.unwrap().unwrap();
        assert_eq!(customer.debt, Money::from_cents(1_000));
        assert_eq!(customer.wallet, Money::zero());
    }

    #[tokio::test]
    async fn test_void_guards() {
        let ledger = ledger_with_debtor().await;

        let err = ledger.void_entry("ghost", "x", ACTOR).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let entry = ledger.commit_sale(&change_sale()).await.unwrap();
        let err = ledger.void_entry(&entry.id, "  ", ACTOR).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let adjustment = ledger
            .adjust_account("c1", CustomerQuadrant::Wallet, "write-off", ACTOR)
            .await
            .unwrap();
        let err = ledger.void_entry(&adjustment.id, "undo", ACTOR).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Conflict(StateConflict::NotReversible { .. })
        ));
    }

    #[tokio::test]
    async fn test_void_needs_open_register_for_drawer_money() {
        let ledger = ledger_with_debtor().await;
        let entry = ledger.commit_sale(&change_sale()).await.unwrap();
        ledger.close_session(ACTOR, Default::default()).await.unwrap();

        let err = ledger.void_entry(&entry.id, "late", ACTOR).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(StateConflict::RegisterClosed)));

        ledger
            .open_session(OpeningFloat::Single(100.0), ACTOR)
            .await
            .unwrap();
        let outcome = ledger.void_entry(&entry.id, "late", ACTOR).await.unwrap();
        assert_eq!(outcome.entry.status, EntryStatus::Void);

        let closed = ledger.close_session(ACTOR, Default::default()).await.unwrap();
        assert_eq!(closed.totals.void_count, 1);
        assert_eq!(closed.totals.sales_count, 0);
    }

    #[tokio::test]
    async fn test_void_debt_payment() {
        let ledger = ledger_with_debtor().await;
        let payment = ledger
            .pay_debt(&DebtPaymentRequest {
                customer_id: "c1".to_string(),
                actor: ACTOR.to_string(),
                payments: vec![TenderInput::new(15.0, Currency::Usd, Medium::Cash)],
                total: 15.0,
                rate: 36.5,
            })
            .await
            .unwrap();
        assert_eq!(payment.resulting_wallet, Some(Money::from_cents(500)));

        ledger.void_entry(&payment.id, "bounced", ACTOR).await.unwrap();
        let (_, balances, customer) = snapshot(&ledger).await;
        assert_eq!(customer.debt, Money::from_cents(1_000));
        assert_eq!(customer.wallet, Money::zero());
        assert_eq!(balances.usd_cash, Money::from_cents(10_000));
    }
}
