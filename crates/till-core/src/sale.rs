//! # Sale Planning
//!
//! The pure half of the sale engine. Given the request and a snapshot of the
//! products and customer it touches, it runs every guard and derives what the
//! commit must write. The storage layer takes that snapshot inside the same
//! transaction that applies the plan.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleRequest                                                            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  EmptyCart → NonFinite (every float in the request)                     │
//! │  → NegativePayment (raw tender amounts, before rounding)                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Parse: rate, lines (level, factor, price, tax), tenders, change        │
//! │         amounts beyond the accepted range → OutOfRange                  │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  CreditTender → OrphanCredit                                            │
//! │  → WalletWithoutCustomer → PhantomCredit → Underpaid                    │
//! │  → UnassignedChange → ExcessChange → InsufficientWallet                 │
//! │  → Stock guard (per product, across the whole cart)                     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  SalePlan { lines, payments, changes, totals, debt_created,             │
//! │             consumed_wallet, unassigned_change, stock requirements }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::{ExchangeRate, Money};
use crate::policy::LedgerPolicy;
use crate::tender::{
    change_in_base, check_finite, check_non_negative, normalize_change, normalize_tender,
    ChangeInput, TenderInput,
};
use crate::types::{
    Change, Customer, LineItem, Medium, Payment, Product, Quantity, TaxRate, UnitKind, UnitLevel,
};

/// Products keyed by id, as read inside the commit transaction.
pub type Catalog = HashMap<String, Product>;

// =============================================================================
// Request
// =============================================================================

/// One cart line as sent by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineInput {
    pub product_id: String,
    /// Quantity at `level` (decimal for weighed goods).
    pub quantity: f64,
    #[serde(default)]
    pub level: UnitLevel,
    /// Overrides the catalog price for `level`.
    pub unit_price: Option<f64>,
    /// Line tax in basis points; 0 for exempt goods.
    #[serde(default)]
    pub tax_rate_bps: u32,
}

impl SaleLineInput {
    pub fn new(product_id: impl Into<String>, quantity: f64) -> Self {
        SaleLineInput {
            product_id: product_id.into(),
            quantity,
            ..SaleLineInput::default()
        }
    }

    pub fn at_level(mut self, level: UnitLevel) -> Self {
        self.level = level;
        self
    }

    pub fn priced(mut self, unit_price: f64) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn taxed(mut self, bps: u32) -> Self {
        self.tax_rate_bps = bps;
        self
    }
}

/// How the caller says change was settled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChangeDeclaration {
    /// Change owed in base currency. When absent, the overpayment is used.
    pub owed: Option<f64>,
    /// Change physically handed back.
    #[serde(default)]
    pub disbursements: Vec<ChangeInput>,
}

/// Everything the sale engine needs from the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    /// Cashier or terminal user recorded on the entry.
    pub actor: String,
    pub lines: Vec<SaleLineInput>,
    pub payments: Vec<TenderInput>,
    /// Local units per base unit, from the rate source.
    pub rate: f64,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub is_credit: bool,
    pub change: Option<ChangeDeclaration>,
    /// Declared IGTF in base currency.
    pub igtf: Option<f64>,
}

// =============================================================================
// Plan
// =============================================================================

/// Where `change_owed` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// The caller declared the amount.
    Declared,
    /// Derived as `max(0, paid − total)` because nothing was declared.
    Overpayment,
}

/// Aggregated stock demand for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRequirement {
    pub product_id: String,
    pub name: String,
    pub quantity: Quantity,
}

/// The validated, fully derived sale, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct SalePlan {
    pub rate: ExchangeRate,
    pub customer_id: Option<String>,
    pub is_credit: bool,
    pub lines: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub changes: Vec<Change>,
    pub subtotal: Money,
    pub tax: Money,
    pub igtf: Money,
    /// `subtotal + tax + igtf`.
    pub total: Money,
    pub paid_base: Money,
    pub change_owed: Money,
    pub change_source: ChangeSource,
    /// Change the customer account absorbs (zero without a customer).
    pub unassigned_change: Money,
    pub debt_created: Money,
    pub consumed_wallet: Money,
    pub stock: Vec<StockRequirement>,
    /// Indexes of tenders whose tags came from the label adapter.
    pub inferred_tenders: Vec<usize>,
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Finiteness check over the line fields.
fn check_lines_finite(lines: &[SaleLineInput]) -> ValidationResult<()> {
    for (index, line) in lines.iter().enumerate() {
        if !line.quantity.is_finite() {
            return Err(ValidationError::non_finite(format!("lines[{}].quantity", index)));
        }
        if let Some(price) = line.unit_price {
            if !price.is_finite() {
                return Err(ValidationError::non_finite(format!("lines[{}].unit_price", index)));
            }
        }
    }
    Ok(())
}

/// Prices one cart line against the catalog and freezes its factor.
pub(crate) fn price_line(
    index: usize,
    input: &SaleLineInput,
    catalog: &Catalog,
) -> ValidationResult<LineItem> {
    let product = catalog
        .get(&input.product_id)
        .ok_or_else(|| ValidationError::UnknownProduct {
            product_id: input.product_id.clone(),
        })?;

    let quantity = Quantity::from_decimal(&format!("lines[{}].quantity", index), input.quantity)?;
    if !quantity.is_positive() {
        return Err(ValidationError::InvalidQuantity {
            field: format!("lines[{}].quantity", index),
        });
    }
    if product.unit_kind == UnitKind::Counted && !quantity.is_whole() {
        return Err(ValidationError::FractionalQuantity {
            product: product.name.clone(),
        });
    }

    let factor = product.factor(input.level)?;
    if quantity.times_factor(factor) > Quantity::MAX_INPUT {
        return Err(ValidationError::out_of_range(format!("lines[{}].quantity", index)));
    }
    let unit_price = match input.unit_price {
        Some(price) => Money::from_decimal(&format!("lines[{}].unit_price", index), price)?,
        None => product.price_for(input.level)?,
    };
    if unit_price.is_negative() {
        return Err(ValidationError::NegativeAmount {
            field: format!("lines[{}].unit_price", index),
        });
    }

    let tax_rate = TaxRate::from_bps(input.tax_rate_bps);
    let line_total = unit_price.times_quantity(quantity);
    if !line_total.within_input_range() {
        return Err(ValidationError::out_of_range(format!("lines[{}].total", index)));
    }
    Ok(LineItem {
        product_id: product.id.clone(),
        name: product.name.clone(),
        quantity,
        level: input.level,
        factor,
        unit_price,
        tax_rate,
        line_total,
        tax: line_total.calculate_tax(tax_rate),
    })
}

/// Prices every line of a cart.
pub(crate) fn price_lines(
    lines: &[SaleLineInput],
    catalog: &Catalog,
) -> ValidationResult<Vec<LineItem>> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| price_line(index, line, catalog))
        .collect()
}

/// Sums base-unit demand per product across the whole cart.
pub fn aggregate_stock(lines: &[LineItem]) -> Vec<StockRequirement> {
    let mut demand: BTreeMap<&str, (&str, Quantity)> = BTreeMap::new();
    for line in lines {
        let entry = demand
            .entry(line.product_id.as_str())
            .or_insert((line.name.as_str(), Quantity::zero()));
        entry.1 = entry.1 + line.base_quantity();
    }
    demand
        .into_iter()
        .map(|(product_id, (name, quantity))| StockRequirement {
            product_id: product_id.to_string(),
            name: name.to_string(),
            quantity,
        })
        .collect()
}

// =============================================================================
// Planning
// =============================================================================

/// Stock guard for one product: `requirement` against `available`.
///
/// Skipped entirely when the policy allows negative stock. Remote deltas
/// replayed from other terminals go through this same check.
pub fn check_stock(
    requirement: &StockRequirement,
    available: Quantity,
    policy: &LedgerPolicy,
) -> ValidationResult<()> {
    if policy.allow_negative_stock || requirement.quantity <= available {
        return Ok(());
    }
    Err(ValidationError::InsufficientStock {
        product: requirement.name.clone(),
        shortfall: requirement.quantity - available,
    })
}

/// Runs every guard and derives the commit plan.
///
/// `catalog` must hold every product the request names and `customer` must be
/// the account named by `request.customer_id`, both read in the transaction
/// that will apply the plan.
pub fn plan_sale(
    request: &SaleRequest,
    catalog: &Catalog,
    customer: Option<&Customer>,
    policy: &LedgerPolicy,
) -> ValidationResult<SalePlan> {
    let tolerance = policy.tolerance();

    if request.lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    // every float in the request
    check_lines_finite(&request.lines)?;
    check_finite(&request.payments)?;
    if !request.rate.is_finite() {
        return Err(ValidationError::non_finite("rate"));
    }
    if let Some(igtf) = request.igtf {
        if !igtf.is_finite() {
            return Err(ValidationError::non_finite("igtf"));
        }
    }
    if let Some(change) = &request.change {
        if let Some(owed) = change.owed {
            if !owed.is_finite() {
                return Err(ValidationError::non_finite("change.owed"));
            }
        }
        for (index, disbursement) in change.disbursements.iter().enumerate() {
            if !disbursement.amount.is_finite() {
                return Err(ValidationError::non_finite(format!("change[{}].amount", index)));
            }
        }
    }

    check_non_negative(&request.payments)?;

    // Parse
    let rate = ExchangeRate::from_decimal(request.rate)?;
    let lines = price_lines(&request.lines, catalog)?;
    let mut payments = Vec::with_capacity(request.payments.len());
    let mut inferred_tenders = Vec::new();
    for (index, input) in request.payments.iter().enumerate() {
        let tender = normalize_tender(index, input, rate)?;
        if tender.inferred {
            inferred_tenders.push(index);
        }
        payments.push(tender.payment);
    }
    let igtf = match request.igtf {
        Some(igtf) => Money::from_decimal("igtf", igtf)?,
        None => Money::zero(),
    };
    if igtf.is_negative() {
        return Err(ValidationError::NegativeAmount {
            field: "igtf".to_string(),
        });
    }

    if let Some(index) = payments.iter().position(|p| p.medium == Medium::Credit) {
        return Err(ValidationError::CreditTender { index });
    }

    // credit needs a customer
    if request.is_credit && customer.is_none() {
        return Err(ValidationError::OrphanCredit);
    }
    let consumed_wallet: Money = payments
        .iter()
        .filter(|p| p.medium == Medium::Internal)
        .map(|p| p.base_amount)
        .sum();
    if consumed_wallet.is_positive() && customer.is_none() {
        return Err(ValidationError::WalletWithoutCustomer);
    }

    let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
    let tax: Money = lines.iter().map(|l| l.tax).sum();
    let total = subtotal + tax + igtf;
    let paid_base: Money = payments.iter().map(|p| p.base_amount).sum();
    if !total.within_input_range() {
        return Err(ValidationError::out_of_range("total"));
    }
    if !paid_base.within_input_range() {
        return Err(ValidationError::out_of_range("payments"));
    }
    let outstanding = (total - paid_base).floor_zero();

    // credit must create debt
    if request.is_credit && !outstanding.is_positive() {
        return Err(ValidationError::PhantomCredit {
            paid: paid_base,
            amount_due: total,
        });
    }
    if !request.is_credit && outstanding > tolerance {
        return Err(ValidationError::Underpaid {
            paid: paid_base,
            amount_due: total,
        });
    }

    // Change
    let overpayment = (paid_base - total).floor_zero();
    let declared_owed = match request.change.as_ref().and_then(|c| c.owed) {
        Some(owed) => {
            let owed = Money::from_decimal("change.owed", owed)?;
            if owed.is_negative() {
                return Err(ValidationError::NegativeAmount {
                    field: "change.owed".to_string(),
                });
            }
            Some(owed)
        }
        None => None,
    };
    let (change_owed, change_source) = match declared_owed {
        Some(owed) => (owed, ChangeSource::Declared),
        None => (overpayment, ChangeSource::Overpayment),
    };
    let changes = request
        .change
        .iter()
        .flat_map(|c| c.disbursements.iter())
        .enumerate()
        .map(|(index, input)| normalize_change(index, input))
        .collect::<ValidationResult<Vec<_>>>()?;
    let physical: Money = changes.iter().map(|c| change_in_base(c, rate)).sum();
    let unassigned = change_owed - physical;

    // change must land somewhere
    if unassigned > tolerance && customer.is_none() {
        return Err(ValidationError::UnassignedChange { amount: unassigned });
    }
    // declared change vs overpayment
    if unassigned < -tolerance {
        return Err(ValidationError::ExcessChange {
            declared: physical,
            owed: change_owed,
        });
    }
    if change_owed > overpayment + tolerance {
        return Err(ValidationError::ExcessChange {
            declared: change_owed,
            owed: overpayment,
        });
    }
    let unassigned_change = if customer.is_some() {
        unassigned.floor_zero()
    } else {
        Money::zero()
    };

    if let Some(customer) = customer {
        if consumed_wallet > customer.wallet {
            return Err(ValidationError::InsufficientWallet {
                available: customer.wallet,
                required: consumed_wallet,
            });
        }
    }

    // Stock guard
    let stock = aggregate_stock(&lines);
    for requirement in &stock {
        let available = catalog
            .get(&requirement.product_id)
            .map(|p| p.stock)
            .unwrap_or_default();
        check_stock(requirement, available, policy)?;
    }

    Ok(SalePlan {
        rate,
        customer_id: customer.map(|c| c.id.clone()),
        is_credit: request.is_credit,
        lines,
        payments,
        changes,
        subtotal,
        tax,
        igtf,
        total,
        paid_base,
        change_owed,
        change_source,
        unassigned_change,
        debt_created: if request.is_credit {
            outstanding
        } else {
            Money::zero()
        },
        consumed_wallet,
        stock,
        inferred_tenders,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, PackLevel};

    fn catalog() -> Catalog {
        let cola = Product {
            id: "cola".to_string(),
            name: "Cola 355ml".to_string(),
            price: Money::from_cents(1_000),
            stock: Quantity::from_units(20),
            unit_kind: UnitKind::Counted,
            pack: Some(PackLevel {
                contents: 6,
                price: Money::from_cents(5_500),
            }),
            case: Some(PackLevel {
                contents: 4,
                price: Money::from_cents(20_000),
            }),
        };
        let cheese = Product {
            id: "cheese".to_string(),
            name: "White cheese".to_string(),
            price: Money::from_cents(800),
            stock: Quantity::from_milli(2_500),
            unit_kind: UnitKind::Weighed,
            pack: None,
            case: None,
        };
        [cola, cheese].into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    fn customer(debt: i64, wallet: i64) -> Customer {
        Customer {
            id: "c1".to_string(),
            name: "Ana".to_string(),
            debt: Money::from_cents(debt),
            wallet: Money::from_cents(wallet),
        }
    }

    fn cash_sale(paid: f64, change_back: Option<f64>) -> SaleRequest {
        SaleRequest {
            actor: "cashier".to_string(),
            lines: vec![SaleLineInput::new("cola", 3.0)],
            payments: vec![TenderInput::new(paid, Currency::Usd, Medium::Cash)],
            rate: 36.5,
            change: change_back.map(|amount| ChangeDeclaration {
                owed: None,
                disbursements: vec![ChangeInput {
                    amount,
                    currency: Currency::Usd,
                    medium: Medium::Cash,
                }],
            }),
            ..SaleRequest::default()
        }
    }

    #[test]
    fn test_cash_sale_with_change_plans_cleanly() {
        let plan = plan_sale(&cash_sale(50.0, Some(20.0)), &catalog(), None, &LedgerPolicy::default())
            .unwrap();
        assert_eq!(plan.total, Money::from_cents(3_000));
        assert_eq!(plan.paid_base, Money::from_cents(5_000));
        assert_eq!(plan.change_owed, Money::from_cents(2_000));
        assert_eq!(plan.change_source, ChangeSource::Overpayment);
        assert_eq!(plan.unassigned_change, Money::zero());
        assert_eq!(plan.stock[0].quantity, Quantity::from_units(3));
    }

    #[test]
    fn test_non_finite_checked_before_negative_payment() {
        let mut request = cash_sale(-5.0, None);
        request.lines[0].quantity = f64::NAN;
        assert!(matches!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_negative_payment_rejected() {
        let mut request = cash_sale(50.0, Some(20.0));
        request.payments.push(TenderInput::new(-10.0, Currency::Usd, Medium::Cash));
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::NegativePayment {
                index: 1,
                amount: -10.0,
            })
        );
    }

    #[test]
    fn test_orphan_and_phantom_credit() {
        let mut request = cash_sale(0.0, None);
        request.is_credit = true;
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::OrphanCredit)
        );

        let mut request = cash_sale(30.0, None);
        request.is_credit = true;
        request.customer_id = Some("c1".to_string());
        assert!(matches!(
            plan_sale(&request, &catalog(), Some(&customer(0, 0)), &LedgerPolicy::default()),
            Err(ValidationError::PhantomCredit { .. })
        ));
    }

    #[test]
    fn test_one_cent_credit_is_real_debt() {
        let mut request = cash_sale(9.99, None);
        request.lines = vec![SaleLineInput::new("cola", 1.0)];
        request.is_credit = true;
        request.customer_id = Some("c1".to_string());
        let plan = plan_sale(&request, &catalog(), Some(&customer(0, 0)), &LedgerPolicy::default())
            .unwrap();
        assert_eq!(plan.debt_created, Money::from_cents(1));
    }

    #[test]
    fn test_sub_cent_negative_payment_rejected() {
        let mut request = cash_sale(30.0, None);
        request.payments.push(TenderInput::new(-0.004, Currency::Usd, Medium::Cash));
        assert!(matches!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::NegativePayment { index: 1, .. })
        ));
    }

    #[test]
    fn test_negative_payment_checked_before_line_parsing() {
        let mut request = cash_sale(-5.0, None);
        request.lines = vec![SaleLineInput::new("cola", 1.5)];
        assert!(matches!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::NegativePayment { index: 0, .. })
        ));
    }

    #[test]
    fn test_huge_finite_amounts_rejected_without_panic() {
        let mut request = cash_sale(0.0, None);
        request.payments = vec![
            TenderInput::new(1e17, Currency::Usd, Medium::Cash),
            TenderInput::new(1e17, Currency::Usd, Medium::Cash),
        ];
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::OutOfRange {
                field: "payments[0].amount".to_string()
            })
        );

        // Each tender fits, the sum of many does not
        let mut request = cash_sale(0.0, None);
        request.payments = vec![TenderInput::new(9e11, Currency::Usd, Medium::Cash); 3];
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::OutOfRange {
                field: "payments".to_string()
            })
        );

        let mut request = cash_sale(30.0, None);
        request.lines = vec![SaleLineInput::new("cola", 1e15)];
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::OutOfRange {
                field: "lines[0].quantity".to_string()
            })
        );

        let mut request = cash_sale(30.0, None);
        request.lines = vec![SaleLineInput::new("cola", 1e8).priced(1e11)];
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::OutOfRange {
                field: "lines[0].total".to_string()
            })
        );
    }

    #[test]
    fn test_credit_sale_creates_outstanding_debt() {
        let mut request = cash_sale(10.0, None);
        request.is_credit = true;
        request.customer_id = Some("c1".to_string());
        let plan = plan_sale(&request, &catalog(), Some(&customer(0, 0)), &LedgerPolicy::default())
            .unwrap();
        assert_eq!(plan.debt_created, Money::from_cents(2_000));
    }

    #[test]
    fn test_credit_tender_rejected() {
        let mut request = cash_sale(30.0, None);
        request.payments = vec![TenderInput::labelled(30.0, "Fiado")];
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::CreditTender { index: 0 })
        );
    }

    #[test]
    fn test_unassigned_change_without_customer() {
        assert_eq!(
            plan_sale(&cash_sale(50.0, None), &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::UnassignedChange {
                amount: Money::from_cents(2_000)
            })
        );
    }

    #[test]
    fn test_unassigned_change_goes_to_customer() {
        let mut request = cash_sale(50.0, Some(5.0));
        request.customer_id = Some("c1".to_string());
        let plan = plan_sale(&request, &catalog(), Some(&customer(1_000, 0)), &LedgerPolicy::default())
            .unwrap();
        assert_eq!(plan.unassigned_change, Money::from_cents(1_500));
    }

    #[test]
    fn test_excess_change_rejected() {
        assert_eq!(
            plan_sale(&cash_sale(50.0, Some(25.0)), &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::ExcessChange {
                declared: Money::from_cents(2_500),
                owed: Money::from_cents(2_000),
            })
        );

        // Declaring more owed change than was overpaid is also excess
        let mut request = cash_sale(50.0, Some(30.0));
        request.change.as_mut().unwrap().owed = Some(30.0);
        assert!(matches!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::ExcessChange { .. })
        ));
    }

    #[test]
    fn test_change_within_tolerance_passes() {
        // Change handed back in VES rounds to 19.99 at this rate
        let mut request = cash_sale(50.0, None);
        request.change = Some(ChangeDeclaration {
            owed: None,
            disbursements: vec![ChangeInput {
                amount: 729.65,
                currency: Currency::Ves,
                medium: Medium::Cash,
            }],
        });
        assert!(plan_sale(&request, &catalog(), None, &LedgerPolicy::default()).is_ok());
    }

    #[test]
    fn test_wallet_tender_guards() {
        let mut request = cash_sale(20.0, None);
        request.payments.push(TenderInput::new(10.0, Currency::Usd, Medium::Internal));
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::WalletWithoutCustomer)
        );

        request.customer_id = Some("c1".to_string());
        assert!(matches!(
            plan_sale(&request, &catalog(), Some(&customer(0, 500)), &LedgerPolicy::default()),
            Err(ValidationError::InsufficientWallet { .. })
        ));

        let plan = plan_sale(&request, &catalog(), Some(&customer(0, 1_500)), &LedgerPolicy::default())
            .unwrap();
        assert_eq!(plan.consumed_wallet, Money::from_cents(1_000));
    }

    #[test]
    fn test_stock_aggregates_across_levels() {
        // 1 case (24) is already more than the 20 in stock
        let mut request = cash_sale(230.0, None);
        request.lines = vec![
            SaleLineInput::new("cola", 1.0).at_level(UnitLevel::Case),
            SaleLineInput::new("cola", 3.0),
        ];
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::InsufficientStock {
                product: "Cola 355ml".to_string(),
                shortfall: Quantity::from_units(7),
            })
        );

        let lenient = LedgerPolicy {
            allow_negative_stock: true,
            ..LedgerPolicy::default()
        };
        let plan = plan_sale(&request, &catalog(), None, &lenient).unwrap();
        assert_eq!(plan.stock.len(), 1);
        assert_eq!(plan.stock[0].quantity, Quantity::from_units(27));
    }

    #[test]
    fn test_weighed_lines_and_tax() {
        let mut request = cash_sale(0.0, None);
        request.lines = vec![SaleLineInput::new("cheese", 1.25).taxed(1_600)];
        request.payments = vec![TenderInput::new(11.6, Currency::Usd, Medium::Digital)];
        let plan = plan_sale(&request, &catalog(), None, &LedgerPolicy::default()).unwrap();
        assert_eq!(plan.subtotal, Money::from_cents(1_000));
        assert_eq!(plan.tax, Money::from_cents(160));
        assert_eq!(plan.total, Money::from_cents(1_160));
    }

    #[test]
    fn test_fractional_counted_quantity_rejected() {
        let mut request = cash_sale(15.0, None);
        request.lines = vec![SaleLineInput::new("cola", 1.5)];
        assert!(matches!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::FractionalQuantity { .. })
        ));
    }

    #[test]
    fn test_underpaid_cash_sale_rejected() {
        assert!(matches!(
            plan_sale(&cash_sale(20.0, None), &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::Underpaid { .. })
        ));
    }

    #[test]
    fn test_empty_cart() {
        let mut request = cash_sale(0.0, None);
        request.lines.clear();
        assert_eq!(
            plan_sale(&request, &catalog(), None, &LedgerPolicy::default()),
            Err(ValidationError::EmptyCart)
        );
    }
}
