//! # Payment Quote
//!
//! What the checkout screen shows while tenders are being entered: amount
//! due, IGTF, what is still missing and what is owed back.
//!
//! ## IGTF Base
//! ```text
//! IGTF is charged on the part of the bill settled with foreign cash
//! (USD + cash medium), never on more than that tender covers:
//!
//!   igtf_base = min( max(0, total − non_igtf_paid), igtf_paid )
//!   igtf      = igtf_base × rate
//!
//! Example: total 100, 40 by Pago Móvil, 70 USD cash, 3%
//!   igtf_base = min(60, 70) = 60   →   igtf = 1.80
//! ```
//!
//! The sale engine never recomputes IGTF. The front end quotes it here and
//! declares it on the request.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationResult;
use crate::money::{ExchangeRate, Money};
use crate::sale::{price_lines, Catalog, SaleLineInput};
use crate::tender::{check_finite, normalize_tender, TenderInput};
use crate::types::{Currency, Medium, Payment, TaxRate};

/// Result of a quote, all amounts in base currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentStatus {
    /// Lines plus tax, before IGTF.
    pub total: Money,
    pub igtf_base: Money,
    pub igtf: Money,
    /// `total + igtf`.
    pub amount_due: Money,
    pub paid: Money,
    pub remaining: Money,
    pub change: Money,
}

/// True for tenders that attract IGTF.
pub fn attracts_igtf(payment: &Payment) -> bool {
    payment.currency == Currency::Usd && payment.medium == Medium::Cash
}

impl PaymentStatus {
    /// Quotes `payments` against a pre-IGTF `total`.
    pub fn compute(total: Money, payments: &[Payment], igtf_rate: TaxRate) -> Self {
        let (igtf_paid, other_paid) = payments.iter().fold(
            (Money::zero(), Money::zero()),
            |(igtf_paid, other_paid), payment| {
                if attracts_igtf(payment) {
                    (igtf_paid + payment.base_amount, other_paid)
                } else {
                    (igtf_paid, other_paid + payment.base_amount)
                }
            },
        );
        let igtf_base = (total - other_paid).floor_zero().min(igtf_paid);
        let igtf = igtf_base.calculate_tax(igtf_rate);
        let amount_due = total + igtf;
        let paid = igtf_paid + other_paid;

        PaymentStatus {
            total,
            igtf_base,
            igtf,
            amount_due,
            paid,
            remaining: (amount_due - paid).floor_zero(),
            change: (paid - amount_due).floor_zero(),
        }
    }
}

/// Quotes a cart and its tenders before checkout.
pub fn quote_sale(
    lines: &[SaleLineInput],
    tenders: &[TenderInput],
    rate: f64,
    catalog: &Catalog,
    igtf_rate: TaxRate,
) -> ValidationResult<PaymentStatus> {
    check_finite(tenders)?;
    let rate = ExchangeRate::from_decimal(rate)?;
    let lines = price_lines(lines, catalog)?;
    let payments = tenders
        .iter()
        .enumerate()
        .map(|(index, tender)| normalize_tender(index, tender, rate).map(|t| t.payment))
        .collect::<ValidationResult<Vec<_>>>()?;
    let total: Money = lines.iter().map(|l| l.line_total + l.tax).sum();
    Ok(PaymentStatus::compute(total, &payments, igtf_rate))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Product, Quantity, UnitKind};

    fn usd(cents: i64, medium: Medium) -> Payment {
        Payment {
            amount: Money::from_cents(cents),
            currency: Currency::Usd,
            medium,
            rate: ExchangeRate::PARITY,
            base_amount: Money::from_cents(cents),
            reference: None,
        }
    }

    #[test]
    fn test_igtf_only_on_foreign_cash_share() {
        let payments = [usd(4_000, Medium::Digital), usd(7_000, Medium::Cash)];
        let status = PaymentStatus::compute(Money::from_cents(10_000), &payments, TaxRate::from_bps(300));
        assert_eq!(status.igtf_base, Money::from_cents(6_000));
        assert_eq!(status.igtf, Money::from_cents(180));
        assert_eq!(status.amount_due, Money::from_cents(10_180));
        assert_eq!(status.change, Money::from_cents(820));
        assert_eq!(status.remaining, Money::zero());
    }

    #[test]
    fn test_no_igtf_without_foreign_cash() {
        let payments = [usd(5_000, Medium::Digital)];
        let status = PaymentStatus::compute(Money::from_cents(10_000), &payments, TaxRate::from_bps(300));
        assert_eq!(status.igtf, Money::zero());
        assert_eq!(status.remaining, Money::from_cents(5_000));
    }

    #[test]
    fn test_quote_sale_prices_cart() {
        let product = Product {
            id: "rice".to_string(),
            name: "Rice 1kg".to_string(),
            price: Money::from_cents(250),
            stock: Quantity::from_units(10),
            unit_kind: UnitKind::Counted,
            pack: None,
            case: None,
        };
        let catalog: Catalog = [(product.id.clone(), product)].into_iter().collect();
        let status = quote_sale(
            &[SaleLineInput::new("rice", 4.0)],
            &[TenderInput::new(10.0, Currency::Usd, Medium::Cash)],
            36.5,
            &catalog,
            TaxRate::from_bps(300),
        )
        .unwrap();
        assert_eq!(status.total, Money::from_cents(1_000));
        assert_eq!(status.igtf, Money::from_cents(30));
        assert_eq!(status.remaining, Money::from_cents(30));
    }
}
