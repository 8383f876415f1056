//! # Debt Payment Planning
//!
//! Guards for a customer paying down debt outside of a sale.
//!
//! ```text
//! DebtPaymentRequest
//!      │
//!      ▼
//! InfiniteCredit (any credit tender, checked before anything else)
//!      │
//!      ▼
//! NonFinite → NegativePayment → total > 0 → rate → wallet tender refused
//!      │
//!      ▼
//! PaymentMismatch (tenders present and Σ base ≠ total beyond tolerance)
//!      │
//!      ▼
//! DebtPaymentPlan { total, rate, payments, paid_base }
//! ```
//!
//! How `total` splits between debt and wallet is decided later, against the
//! customer row read inside the commit unit.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::{ExchangeRate, Money};
use crate::policy::LedgerPolicy;
use crate::tender::{
    check_finite, check_non_negative, classify_label, normalize_tender, TenderInput,
};
use crate::types::{Medium, Payment};
use crate::validation::validate_positive_amount;

/// A debt payment as sent by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtPaymentRequest {
    pub customer_id: String,
    pub actor: String,
    /// Tenders received. May be empty when the amount is recorded without
    /// itemizing how it was paid.
    #[serde(default)]
    pub payments: Vec<TenderInput>,
    /// Amount applied to the account, base currency.
    pub total: f64,
    pub rate: f64,
}

/// Validated debt payment, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct DebtPaymentPlan {
    pub total: Money,
    pub rate: ExchangeRate,
    pub payments: Vec<Payment>,
    pub paid_base: Money,
    /// Tenders whose tags came from the label fallback.
    pub inferred_tenders: Vec<usize>,
}

fn tender_medium(tender: &TenderInput) -> Medium {
    tender
        .medium
        .unwrap_or_else(|| classify_label(tender.label.as_deref().unwrap_or_default()).1)
}

/// Validates a debt payment.
pub fn plan_debt_payment(
    request: &DebtPaymentRequest,
    policy: &LedgerPolicy,
) -> ValidationResult<DebtPaymentPlan> {
    // Debt is never settled with more debt, whatever else is wrong.
    if request
        .payments
        .iter()
        .any(|tender| tender_medium(tender) == Medium::Credit)
    {
        return Err(ValidationError::InfiniteCredit);
    }

    check_finite(&request.payments)?;
    if !request.rate.is_finite() {
        return Err(ValidationError::non_finite("rate"));
    }
    check_non_negative(&request.payments)?;
    let total = validate_positive_amount("total", request.total)?;
    let rate = ExchangeRate::from_decimal(request.rate)?;

    let mut payments = Vec::with_capacity(request.payments.len());
    let mut inferred_tenders = Vec::new();
    for (index, input) in request.payments.iter().enumerate() {
        let tender = normalize_tender(index, input, rate)?;
        if tender.payment.medium == Medium::Internal {
            return Err(ValidationError::NotADrawerMedium {
                medium: Medium::Internal,
            });
        }
        if tender.inferred {
            inferred_tenders.push(index);
        }
        payments.push(tender.payment);
    }

    let paid_base: Money = payments.iter().map(|p| p.base_amount).sum();
    if !payments.is_empty() && (paid_base - total).abs() > policy.tolerance() {
        return Err(ValidationError::PaymentMismatch {
            declared: total,
            tendered: paid_base,
        });
    }

    Ok(DebtPaymentPlan {
        total,
        rate,
        paid_base: if payments.is_empty() { total } else { paid_base },
        payments,
        inferred_tenders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;

    fn request(payments: Vec<TenderInput>, total: f64) -> DebtPaymentRequest {
        DebtPaymentRequest {
            customer_id: "c1".to_string(),
            actor: "ana".to_string(),
            payments,
            total,
            rate: 36.5,
        }
    }

    #[test]
    fn test_credit_tender_always_rejected() {
        let policy = LedgerPolicy::default();
        let cases = vec![
            request(vec![TenderInput::new(10.0, Currency::Usd, Medium::Credit)], 10.0),
            request(vec![TenderInput::new(-5.0, Currency::Usd, Medium::Credit)], 10.0),
            request(vec![TenderInput::new(f64::NAN, Currency::Usd, Medium::Credit)], 0.0),
            request(vec![TenderInput::labelled(10.0, "Fiado")], 10.0),
        ];
        for case in cases {
            assert_eq!(
                plan_debt_payment(&case, &policy),
                Err(ValidationError::InfiniteCredit)
            );
        }
    }

    #[test]
    fn test_mixed_currency_payment_matches_total() {
        let policy = LedgerPolicy::default();
        let plan = plan_debt_payment(
            &request(
                vec![
                    TenderInput::new(5.0, Currency::Usd, Medium::Cash),
                    TenderInput::new(182.5, Currency::Ves, Medium::Digital),
                ],
                10.0,
            ),
            &policy,
        )
        .unwrap();
        assert_eq!(plan.total, Money::from_cents(1_000));
        assert_eq!(plan.paid_base, Money::from_cents(1_000));
        assert_eq!(plan.payments.len(), 2);
    }

    #[test]
    fn test_mismatch_and_invalid_total() {
        let policy = LedgerPolicy::default();
        let err = plan_debt_payment(
            &request(vec![TenderInput::new(8.0, Currency::Usd, Medium::Cash)], 10.0),
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::PaymentMismatch { .. }));

        let err = plan_debt_payment(&request(vec![], 0.0), &policy).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAmount { .. }));

        let err = plan_debt_payment(
            &request(vec![TenderInput::new(10.0, Currency::Usd, Medium::Internal)], 10.0),
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NotADrawerMedium { .. }));
    }

    #[test]
    fn test_sub_cent_negative_tender_rejected() {
        let err = plan_debt_payment(
            &request(
                vec![
                    TenderInput::new(10.0, Currency::Usd, Medium::Cash),
                    TenderInput::new(-0.004, Currency::Usd, Medium::Cash),
                ],
                10.0,
            ),
            &LedgerPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NegativePayment { index: 1, .. }));
    }

    #[test]
    fn test_untendered_payment_uses_total() {
        let plan = plan_debt_payment(&request(vec![], 12.25), &LedgerPolicy::default()).unwrap();
        assert_eq!(plan.paid_base, Money::from_cents(1_225));
        assert!(plan.payments.is_empty());
    }
}
