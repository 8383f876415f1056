//! # Customer Account Engine
//!
//! Debt payments, administrative adjustments and account creation.
//!
//! ```text
//! pay_debt                                adjust_account
//! ────────                                ──────────────
//! plan_debt_payment (InfiniteCredit...)   validate reason
//! register open?                          zero(debt | wallet)
//! drawer SALE flow with the tenders       A- correlative + entry
//! apply_change(total): debt, then wallet  (no drawer, no session)
//! C- correlative + entry
//! ```
//!
//! Adjustments are administrative. Gating who may call them belongs to the
//! access-control layer in front of the ledger.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::events::LedgerEvent;
use super::{logged, Ledger};
use crate::error::{LedgerError, LedgerResult};
use crate::repository::customer as accounts;
use crate::repository::{cash_session, correlative, journal};
use till_core::debt::plan_debt_payment;
use till_core::validation::{validate_actor, validate_name, validate_reason};
use till_core::{
    Customer, CustomerQuadrant, DebtPaymentRequest, EntryKind, EntryStatus, ExchangeRate,
    FlowKind, JournalEntry, Money, StateConflict,
};

impl Ledger {
    /// Registers a customer with an empty account.
    pub async fn create_customer(&self, name: &str) -> LedgerResult<Customer> {
        let name = validate_name(name)?;
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name,
            debt: Money::zero(),
            wallet: Money::zero(),
        };
        Ok(self.db.customers().insert(&customer).await?)
    }

    /// Applies a payment to a customer's account.
    ///
    /// The amount pays down debt first; anything beyond the debt goes to the
    /// wallet.
    ///
    /// ## Errors
    /// - `Validation(InfiniteCredit)` for any credit tender
    /// - `Validation(PaymentMismatch)` when tenders do not add up to `total`
    /// - `Conflict(RegisterClosed)` with no open session
    /// - `NotFound` for an unknown customer
    pub async fn pay_debt(&self, request: &DebtPaymentRequest) -> LedgerResult<JournalEntry> {
        logged("pay_debt", self.pay_debt_unit(request).await)
    }

    async fn pay_debt_unit(&self, request: &DebtPaymentRequest) -> LedgerResult<JournalEntry> {
        let plan = plan_debt_payment(request, &self.policy)?;
        let actor = validate_actor(&request.actor)?;

        let mut unit = self.db.begin_unit().await?;
        if cash_session::current_in(&mut unit).await?.is_none() {
            return Err(StateConflict::RegisterClosed.into());
        }
        if accounts::get_in(&mut unit, &request.customer_id).await?.is_none() {
            return Err(LedgerError::not_found("Customer", &request.customer_id));
        }

        let session = self
            .apply_flow_in(&mut unit, FlowKind::Sale, &plan.payments, &[])
            .await?;
        let (position, split) =
            accounts::apply_change(&mut unit, &request.customer_id, plan.total).await?;
        let invoice_number = correlative::next(&mut unit, EntryKind::DebtPayment).await?;

        let entry = JournalEntry {
            id: Uuid::new_v4().to_string(),
            kind: EntryKind::DebtPayment,
            invoice_number,
            status: EntryStatus::Completed,
            created_at: Utc::now(),
            actor,
            session_id: Some(session.id),
            customer_id: Some(request.customer_id.clone()),
            rate: plan.rate,
            is_credit: false,
            lines: Vec::new(),
            payments: plan.payments,
            changes: Vec::new(),
            subtotal: plan.total,
            tax: Money::zero(),
            igtf: Money::zero(),
            total: plan.total,
            paid_base: plan.paid_base,
            change_owed: Money::zero(),
            debt_created: Money::zero(),
            consumed_wallet: Money::zero(),
            applied_to_debt: split.applied_to_debt,
            applied_to_wallet: split.applied_to_wallet,
            resulting_debt: Some(position.debt),
            resulting_wallet: Some(position.wallet),
            adjusted_quadrant: None,
            adjusted_amount: Money::zero(),
            reason: None,
            void: None,
            closed_session_id: None,
        };
        journal::insert(&mut unit, &entry).await?;
        unit.commit().await?;

        info!(
            entry_id = %entry.id,
            invoice = %entry.invoice_number,
            customer_id = %request.customer_id,
            amount = %entry.total,
            to_debt = %split.applied_to_debt,
            to_wallet = %split.applied_to_wallet,
            "Debt payment recorded"
        );
        self.publish(LedgerEvent::DebtPaid {
            entry_id: entry.id.clone(),
            invoice_number: entry.invoice_number.clone(),
            customer_id: request.customer_id.clone(),
            amount: entry.total,
            resulting_debt: position.debt,
            resulting_wallet: position.wallet,
        });

        Ok(entry)
    }

    /// Zeroes one quadrant of a customer's account and records why.
    ///
    /// Always writes an adjustment entry, even when the quadrant was already
    /// zero.
    pub async fn adjust_account(
        &self,
        customer_id: &str,
        which: CustomerQuadrant,
        reason: &str,
        actor: &str,
    ) -> LedgerResult<JournalEntry> {
        logged(
            "adjust_account",
            self.adjust_unit(customer_id, which, reason, actor).await,
        )
    }

    async fn adjust_unit(
        &self,
        customer_id: &str,
        which: CustomerQuadrant,
        reason: &str,
        actor: &str,
    ) -> LedgerResult<JournalEntry> {
        let reason = validate_reason(reason)?;
        let actor = validate_actor(actor)?;

        let mut unit = self.db.begin_unit().await?;
        if accounts::get_in(&mut unit, customer_id).await?.is_none() {
            return Err(LedgerError::not_found("Customer", customer_id));
        }

        let (position, cleared) = accounts::zero(&mut unit, customer_id, which).await?;
        let invoice_number = correlative::next(&mut unit, EntryKind::Adjustment).await?;

        let entry = JournalEntry {
            id: Uuid::new_v4().to_string(),
            kind: EntryKind::Adjustment,
            invoice_number,
            status: EntryStatus::Completed,
            created_at: Utc::now(),
            actor,
            session_id: None,
            customer_id: Some(customer_id.to_string()),
            rate: ExchangeRate::PARITY,
            is_credit: false,
            lines: Vec::new(),
            payments: Vec::new(),
            changes: Vec::new(),
            subtotal: Money::zero(),
            tax: Money::zero(),
            igtf: Money::zero(),
            total: Money::zero(),
            paid_base: Money::zero(),
            change_owed: Money::zero(),
            debt_created: Money::zero(),
            consumed_wallet: Money::zero(),
            applied_to_debt: Money::zero(),
            applied_to_wallet: Money::zero(),
            resulting_debt: Some(position.debt),
            resulting_wallet: Some(position.wallet),
            adjusted_quadrant: Some(which),
            adjusted_amount: cleared,
            reason: Some(reason),
            void: None,
            closed_session_id: None,
        };
        journal::insert(&mut unit, &entry).await?;
        unit.commit().await?;

        info!(
            entry_id = %entry.id,
            %customer_id,
            quadrant = %which,
            cleared = %cleared,
            "Customer account adjusted"
        );
        self.publish(LedgerEvent::AccountAdjusted {
            entry_id: entry.id.clone(),
            customer_id: customer_id.to_string(),
            quadrant: which,
            cleared,
        });

        Ok(entry)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
