//! # Sale Engine
//!
//! Commits a sale as one atomic unit.
//!
//! ```text
//! BEGIN IMMEDIATE
//!   ├─ register open?                       RegisterClosed
//!   ├─ read products + customer             NotFound
//!   ├─ plan_sale (ordered guards)           Validation
//!   ├─ stock  −= Σ quantity × factor        (kardex row per product)
//!   ├─ drawer SALE flow (payments, change)  InsufficientCash
//!   ├─ customer: +debt_created −wallet, then absorb unassigned change
//!   ├─ next F- correlative
//!   └─ journal entry (frozen rate, split, IGTF)
//! COMMIT ──► SaleCommitted
//! ```
//!
//! A failure anywhere drops the unit: no stock, drawer, customer, correlative
//! or journal change survives.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::LedgerEvent;
use super::{logged, Ledger};
use crate::error::{LedgerError, LedgerResult};
use crate::repository::customer as accounts;
use crate::repository::{cash_session, correlative, inventory, journal};
use till_core::quote::quote_sale;
use till_core::sale::{plan_sale, Catalog, ChangeSource};
use till_core::validation::validate_actor;
use till_core::{
    Cart, ChangeDeclaration, ChangeSplit, EntryKind, EntryStatus, FlowKind, JournalEntry, Money,
    PaymentStatus, SaleLineInput, SaleRequest, StateConflict, TenderInput,
};

/// Shared working cart. The lock is held for the whole checkout.
pub type CartHandle = Arc<Mutex<Cart>>;

/// Creates an empty shared cart.
pub fn new_cart() -> CartHandle {
    Arc::new(Mutex::new(Cart::new()))
}

/// Everything a checkout needs besides the cart lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutTender {
    pub actor: String,
    pub payments: Vec<TenderInput>,
    pub rate: f64,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub is_credit: bool,
    pub change: Option<ChangeDeclaration>,
    pub igtf: Option<f64>,
}

impl CheckoutTender {
    fn into_request(self, lines: Vec<SaleLineInput>) -> SaleRequest {
        SaleRequest {
            actor: self.actor,
            lines,
            payments: self.payments,
            rate: self.rate,
            customer_id: self.customer_id,
            is_credit: self.is_credit,
            change: self.change,
            igtf: self.igtf,
        }
    }
}

/// Reads the products named by `lines`; a missing one is `NotFound`.
async fn catalog_for(
    conn: &mut sqlx::SqliteConnection,
    lines: &[SaleLineInput],
) -> LedgerResult<Catalog> {
    let ids: Vec<&str> = lines.iter().map(|l| l.product_id.as_str()).collect();
    let catalog = inventory::load_catalog(conn, &ids).await?;
    if let Some(missing) = lines.iter().find(|l| !catalog.contains_key(&l.product_id)) {
        return Err(LedgerError::not_found("Product", &missing.product_id));
    }
    Ok(catalog)
}

impl Ledger {
    /// Commits a sale.
    ///
    /// ## Errors
    /// - `Validation` for any guard, in the order documented on
    ///   [`till_core::ValidationError`]
    /// - `Conflict(RegisterClosed)` with no open session
    /// - `NotFound` for an unknown product or customer
    /// - `Commit` for a storage failure
    pub async fn commit_sale(&self, request: &SaleRequest) -> LedgerResult<JournalEntry> {
        logged("commit_sale", self.commit_sale_unit(request).await)
    }

    async fn commit_sale_unit(&self, request: &SaleRequest) -> LedgerResult<JournalEntry> {
        let actor = validate_actor(&request.actor)?;

        let mut unit = self.db.begin_unit().await?;
        if cash_session::current_in(&mut unit).await?.is_none() {
            return Err(StateConflict::RegisterClosed.into());
        }

        let catalog = catalog_for(&mut unit, &request.lines).await?;
        let customer = match &request.customer_id {
            Some(id) => Some(
                accounts::get_in(&mut unit, id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("Customer", id))?,
            ),
            None => None,
        };

        let plan = plan_sale(request, &catalog, customer.as_ref(), &self.policy)?;

        if plan.change_source == ChangeSource::Overpayment && plan.change_owed.is_positive() {
            warn!(
                change_owed = %plan.change_owed,
                paid = %plan.paid_base,
                total = %plan.total,
                "No change declared, using the overpayment as change owed"
            );
        }
        if !plan.inferred_tenders.is_empty() {
            debug!(tenders = ?plan.inferred_tenders, "Tender tags inferred from labels");
        }

        let entry_id = Uuid::new_v4().to_string();

        for requirement in &plan.stock {
            inventory::decrement_stock(
                &mut unit,
                &requirement.product_id,
                requirement.quantity,
                &entry_id,
            )
            .await?;
        }

        let session = self
            .apply_flow_in(&mut unit, FlowKind::Sale, &plan.payments, &plan.changes)
            .await?;

        let mut split = ChangeSplit::default();
        let mut position = None;
        if let Some(customer_id) = &plan.customer_id {
            let mut after = accounts::apply_charge_and_payment(
                &mut unit,
                customer_id,
                plan.debt_created,
                Money::zero(),
                plan.consumed_wallet,
            )
            .await?;
            if plan.unassigned_change.is_positive() {
                let (absorbed, applied) =
                    accounts::apply_change(&mut unit, customer_id, plan.unassigned_change).await?;
                after = absorbed;
                split = applied;
            }
            position = Some(after);
        }

        let invoice_number = correlative::next(&mut unit, EntryKind::Sale).await?;

        let entry = JournalEntry {
            id: entry_id,
            kind: EntryKind::Sale,
            invoice_number,
            status: EntryStatus::Completed,
            created_at: Utc::now(),
            actor,
            session_id: Some(session.id),
            customer_id: plan.customer_id,
            rate: plan.rate,
            is_credit: plan.is_credit,
            lines: plan.lines,
            payments: plan.payments,
            changes: plan.changes,
            subtotal: plan.subtotal,
            tax: plan.tax,
            igtf: plan.igtf,
            total: plan.total,
            paid_base: plan.paid_base,
            change_owed: plan.change_owed,
            debt_created: plan.debt_created,
            consumed_wallet: plan.consumed_wallet,
            applied_to_debt: split.applied_to_debt,
            applied_to_wallet: split.applied_to_wallet,
            resulting_debt: position.map(|p| p.debt),
            resulting_wallet: position.map(|p| p.wallet),
            adjusted_quadrant: None,
            adjusted_amount: Money::zero(),
            reason: None,
            void: None,
            closed_session_id: None,
        };
        journal::insert(&mut unit, &entry).await?;
        unit.commit().await?;

        info!(
            sale_id = %entry.id,
            invoice = %entry.invoice_number,
            total = %entry.total,
            credit = entry.is_credit,
            "Sale committed"
        );
        self.publish(LedgerEvent::SaleCommitted {
            entry_id: entry.id.clone(),
            invoice_number: entry.invoice_number.clone(),
            total: entry.total,
            customer_id: entry.customer_id.clone(),
        });

        Ok(entry)
    }

    /// Commits the cart's lines and clears the cart on success.
    ///
    /// On any error the cart is left as it was so the cashier can fix the
    /// tender and retry.
    pub async fn checkout(
        &self,
        cart: &CartHandle,
        tender: CheckoutTender,
    ) -> LedgerResult<JournalEntry> {
        let mut cart = cart.lock().await;
        let request = tender.into_request(cart.to_lines());
        let entry = self.commit_sale(&request).await?;
        cart.clear();
        Ok(entry)
    }

    /// Payment status for a cart before checkout, IGTF included.
    pub async fn quote(
        &self,
        lines: &[SaleLineInput],
        tenders: &[TenderInput],
        rate: f64,
    ) -> LedgerResult<PaymentStatus> {
        let mut conn = self.db.pool().acquire().await?;
        let catalog = catalog_for(&mut conn, lines).await?;
        Ok(quote_sale(
            lines,
            tenders,
            rate,
            &catalog,
            self.policy.igtf_rate(),
        )?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::ChannelSink;
    use crate::engine::fixtures::{self, ACTOR};
    use crate::pool::{Database, DbConfig};
    use till_core::{
        ChangeInput, Currency, LedgerPolicy, Medium, OpeningFloat, Quantity, TaxRate,
        UnitLevel, ValidationError,
    };

    fn sale(lines: Vec<SaleLineInput>, payments: Vec<TenderInput>) -> SaleRequest {
        SaleRequest {
            actor: ACTOR.to_string(),
            lines,
            payments,
            rate: 36.5,
            ..SaleRequest::default()
        }
    }

    fn usd_cash(amount: f64) -> TenderInput {
        TenderInput::new(amount, Currency::Usd, Medium::Cash)
    }

    fn hand_back(owed: f64, amount: f64) -> Option<ChangeDeclaration> {
        Some(ChangeDeclaration {
            owed: Some(owed),
            disbursements: vec![ChangeInput {
                amount,
                currency: Currency::Usd,
                medium: Medium::Cash,
            }],
        })
    }

    async fn stock_of(ledger: &Ledger, id: &str) -> Quantity {
        ledger.db().products().get(id).await.unwrap().unwrap().stock
    }

    async fn usd_cash_balance(ledger: &Ledger) -> Money {
        let state = ledger.session_state().await.unwrap();
        state.open().unwrap().balances.usd_cash
    }

    #[tokio::test]
    async fn test_cash_sale_with_change_handed_back() {
        let ledger = fixtures::open_ledger(100.0).await;

        let request = SaleRequest {
            change: hand_back(20.0, 20.0),
            ..sale(vec![SaleLineInput::new("soda", 3.0)], vec![usd_cash(50.0)])
        };
        let entry = ledger.commit_sale(&request).await.unwrap();

        assert_eq!(usd_cash_balance(&ledger).await, Money::from_cents(12_000));
        assert_eq!(entry.total, Money::from_cents(3_000));
        assert_eq!(entry.change_owed, Money::from_cents(2_000));
        assert_eq!(entry.changes.len(), 1);
        assert_eq!(entry.changes[0].amount, Money::from_cents(2_000));
        assert_eq!(entry.invoice_number, "F-000001");
        assert_eq!(stock_of(&ledger, "soda").await, Quantity::from_units(97));

        let stored = ledger.db().journal().get(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.invoice_number, entry.invoice_number);
        assert_eq!(stored.payments, entry.payments);
        assert_eq!(stored.changes, entry.changes);
        assert_eq!(stored.lines, entry.lines);
    }

    #[tokio::test]
    async fn test_unassigned_change_pays_debt_then_wallet() {
        let ledger = fixtures::open_ledger(100.0).await;
        ledger
            .db()
            .customers()
            .insert(&fixtures::customer("c1", 1_000, 0))
            .await
            .unwrap();

        let request = SaleRequest {
            customer_id: Some("c1".to_string()),
            ..sale(vec![SaleLineInput::new("soda", 1.0)], vec![usd_cash(25.0)])
        };
        let entry = ledger.commit_sale(&request).await.unwrap();

        assert_eq!(entry.applied_to_debt, Money::from_cents(1_000));
        assert_eq!(entry.applied_to_wallet, Money::from_cents(500));
        assert_eq!(entry.resulting_debt, Some(Money::zero()));
        assert_eq!(entry.resulting_wallet, Some(Money::from_cents(500)));

        let customer = ledger.db().customers().get("c1").await.unwrap().unwrap();
        assert_eq!(customer.debt, Money::zero());
        assert_eq!(customer.wallet, Money::from_cents(500));
        assert_eq!(usd_cash_balance(&ledger).await, Money::from_cents(12_500));
    }

    #[tokio::test]
    async fn test_negative_payment_mutates_nothing() {
        let ledger = fixtures::open_ledger(100.0).await;
        let before_stock = stock_of(&ledger, "soda").await;
        let before_cash = usd_cash_balance(&ledger).await;

        let request = sale(
            vec![SaleLineInput::new("soda", 1.0)],
            vec![usd_cash(20.0), usd_cash(-10.0)],
        );
        let err = ledger.commit_sale(&request).await.unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::NegativePayment { index: 1, .. })
        ));
        assert_eq!(stock_of(&ledger, "soda").await, before_stock);
        assert_eq!(usd_cash_balance(&ledger).await, before_cash);
        assert_eq!(ledger.db().journal().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_sale_without_customer_is_orphan() {
        let ledger = fixtures::open_ledger(100.0).await;
        let request = SaleRequest {
            is_credit: true,
            ..sale(vec![SaleLineInput::new("soda", 1.0)], vec![])
        };
        let err = ledger.commit_sale(&request).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::OrphanCredit)
        ));
    }

    #[tokio::test]
    async fn test_credit_sale_creates_debt() {
        let ledger = fixtures::open_ledger(0.0).await;
        ledger
            .db()
            .customers()
            .insert(&fixtures::customer("c1", 0, 0))
            .await
            .unwrap();

        let request = SaleRequest {
            customer_id: Some("c1".to_string()),
            is_credit: true,
            ..sale(vec![SaleLineInput::new("soda", 2.0)], vec![usd_cash(5.0)])
        };
        let entry = ledger.commit_sale(&request).await.unwrap();

        assert_eq!(entry.debt_created, Money::from_cents(1_500));
        let customer = ledger.db().customers().get("c1").await.unwrap().unwrap();
        assert_eq!(customer.debt, Money::from_cents(1_500));
        assert_eq!(usd_cash_balance(&ledger).await, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_wallet_tender_consumes_wallet_not_drawer() {
        let ledger = fixtures::open_ledger(0.0).await;
        ledger
            .db()
            .customers()
            .insert(&fixtures::customer("c1", 0, 2_000))
            .await
            .unwrap();

        let request = SaleRequest {
            customer_id: Some("c1".to_string()),
            ..sale(
                vec![SaleLineInput::new("soda", 1.0)],
                vec![TenderInput::new(10.0, Currency::Usd, Medium::Internal)],
            )
        };
        let entry = ledger.commit_sale(&request).await.unwrap();

        assert_eq!(entry.consumed_wallet, Money::from_cents(1_000));
        assert_eq!(usd_cash_balance(&ledger).await, Money::zero());
        let customer = ledger.db().customers().get("c1").await.unwrap().unwrap();
        assert_eq!(customer.wallet, Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn test_stock_guard_aggregates_unit_levels() {
        let ledger = fixtures::open_ledger(0.0).await;

        // 1 case = 4 packs × 6 = 24 units, plus 80 units, against 100 in stock
        let request = sale(
            vec![
                SaleLineInput::new("soda", 1.0).at_level(UnitLevel::Case),
                SaleLineInput::new("soda", 80.0),
            ],
            vec![usd_cash(1_000.0)],
        );
        let err = ledger.commit_sale(&request).await.unwrap_err();
        match err {
            LedgerError::Validation(ValidationError::InsufficientStock { shortfall, .. }) => {
                assert_eq!(shortfall, Quantity::from_units(4));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stock_of(&ledger, "soda").await, Quantity::from_units(100));
    }

    #[tokio::test]
    async fn test_negative_stock_policy_skips_guard() {
        let ledger = fixtures::ledger(LedgerPolicy {
            allow_negative_stock: true,
            ..LedgerPolicy::default()
        })
        .await;
        ledger
            .open_session(OpeningFloat::Single(0.0), ACTOR)
            .await
            .unwrap();

        let request = sale(vec![SaleLineInput::new("cheese", 6.5)], vec![usd_cash(52.0)]);
        ledger.commit_sale(&request).await.unwrap();
        assert_eq!(stock_of(&ledger, "cheese").await, Quantity::from_milli(-1_500));
    }

    #[tokio::test]
    async fn test_lookup_failures() {
        let ledger = fixtures::ledger(LedgerPolicy::default()).await;
        let request = sale(vec![SaleLineInput::new("soda", 1.0)], vec![usd_cash(10.0)]);
        let err = ledger.commit_sale(&request).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(StateConflict::RegisterClosed)));

        ledger
            .open_session(OpeningFloat::Single(0.0), ACTOR)
            .await
            .unwrap();
        let request = sale(vec![SaleLineInput::new("ghost", 1.0)], vec![usd_cash(10.0)]);
        let err = ledger.commit_sale(&request).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let request = SaleRequest {
            customer_id: Some("nobody".to_string()),
            ..sale(vec![SaleLineInput::new("soda", 1.0)], vec![usd_cash(10.0)])
        };
        let err = ledger.commit_sale(&request).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invoice_numbers_skip_nothing_on_failure() {
        let ledger = fixtures::open_ledger(100.0).await;
        let ok = sale(vec![SaleLineInput::new("soda", 1.0)], vec![usd_cash(10.0)]);
        let short = sale(vec![SaleLineInput::new("soda", 1.0)], vec![usd_cash(5.0)]);

        assert_eq!(ledger.commit_sale(&ok).await.unwrap().invoice_number, "F-000001");
        assert!(ledger.commit_sale(&short).await.is_err());
        assert_eq!(ledger.commit_sale(&ok).await.unwrap().invoice_number, "F-000002");
    }

    #[tokio::test]
    async fn test_checkout_clears_cart_only_on_success() {
        let ledger = fixtures::open_ledger(100.0).await;
        let soda = ledger.db().products().get("soda").await.unwrap().unwrap();
        let cart = new_cart();
        cart.lock()
            .await
            .add_item(&soda, UnitLevel::Pack, Quantity::from_units(1), TaxRate::from_bps(0))
            .unwrap();

        let short = CheckoutTender {
            actor: ACTOR.to_string(),
            payments: vec![usd_cash(50.0)],
            rate: 36.5,
            ..CheckoutTender::default()
        };
        assert!(ledger.checkout(&cart, short).await.is_err());
        assert!(!cart.lock().await.is_empty());

        let exact = CheckoutTender {
            actor: ACTOR.to_string(),
            payments: vec![usd_cash(55.0)],
            rate: 36.5,
            ..CheckoutTender::default()
        };
        let entry = ledger.checkout(&cart, exact).await.unwrap();
        assert_eq!(entry.lines[0].factor, 6);
        assert!(cart.lock().await.is_empty());
        assert_eq!(stock_of(&ledger, "soda").await, Quantity::from_units(94));
    }

    #[tokio::test]
    async fn test_quote_reports_igtf() {
        let ledger = fixtures::ledger(LedgerPolicy::default()).await;
        let status = ledger
            .quote(&[SaleLineInput::new("soda", 10.0)], &[usd_cash(100.0)], 36.5)
            .await
            .unwrap();
        assert_eq!(status.total, Money::from_cents(10_000));
        assert_eq!(status.igtf, Money::from_cents(300));
        assert_eq!(status.remaining, Money::from_cents(300));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_share_last_unit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("till.db")).max_connections(10))
            .await
            .unwrap();
        db.products()
            .upsert_snapshot(&[fixtures::soda(1)])
            .await
            .unwrap();
        let ledger = Arc::new(Ledger::new(db, LedgerPolicy::default()));
        ledger
            .open_session(OpeningFloat::Single(0.0), ACTOR)
            .await
            .unwrap();

        let sellers = (0..8).map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                let request = sale(vec![SaleLineInput::new("soda", 1.0)], vec![usd_cash(10.0)]);
                ledger.commit_sale(&request).await
            })
        });
        let results = futures::future::join_all(sellers).await;

        let mut sold = 0;
        let mut short = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => sold += 1,
                Err(LedgerError::Validation(ValidationError::InsufficientStock { shortfall, .. })) => {
                    assert_eq!(shortfall, Quantity::from_units(1));
                    short += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(sold, 1);
        assert_eq!(short, 7);
        assert_eq!(stock_of(&ledger, "soda").await, Quantity::zero());
        assert_eq!(ledger.db().journal().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_publishes_event() {
        let (sink, mut rx) = ChannelSink::new(8);
        let ledger = fixtures::open_ledger(0.0).await.with_sink(Arc::new(sink));

        let request = sale(vec![SaleLineInput::new("soda", 1.0)], vec![usd_cash(10.0)]);
        let entry = ledger.commit_sale(&request).await.unwrap();

        match rx.recv().await {
            Some(LedgerEvent::SaleCommitted { entry_id, .. }) => assert_eq!(entry_id, entry.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
