//! # Tender Normalization
//!
//! Turns what the front end sends into canonical [`Payment`] and [`Change`]
//! values.
//!
//! ## Canonical Shape
//! ```text
//! TenderInput { amount, currency?, medium?, rate?, label?, reference? }
//!        │
//!        ├── currency + medium given ─────────► use them
//!        └── missing ──► classify_label(label) ► fallback tags (flagged)
//!        │
//!        ▼
//! Payment { amount, currency, medium, rate, base_amount, reference }
//! ```
//!
//! Callers are expected to send explicit tags. The label adapter exists for
//! older front ends that only send a method name like "Pago Móvil".

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::{ExchangeRate, Money};
use crate::types::{Change, Currency, Medium, Payment};

// =============================================================================
// Inputs
// =============================================================================

/// A payment line as declared by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderInput {
    /// Amount in the tender's own currency.
    pub amount: f64,
    pub currency: Option<Currency>,
    pub medium: Option<Medium>,
    /// Rate this tender was taken at; defaults to the operation rate.
    pub rate: Option<f64>,
    /// Free-text method name, only consulted when tags are missing.
    pub label: Option<String>,
    pub reference: Option<String>,
}

impl TenderInput {
    /// An explicitly tagged tender.
    pub fn new(amount: f64, currency: Currency, medium: Medium) -> Self {
        TenderInput {
            amount,
            currency: Some(currency),
            medium: Some(medium),
            ..TenderInput::default()
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// A tender that only carries a method label.
    pub fn labelled(amount: f64, label: impl Into<String>) -> Self {
        TenderInput {
            amount,
            label: Some(label.into()),
            ..TenderInput::default()
        }
    }
}

/// A change disbursement as declared by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChangeInput {
    pub amount: f64,
    pub currency: Currency,
    pub medium: Medium,
}

// =============================================================================
// Label Fallback Adapter
// =============================================================================

/// Guesses `{currency, medium}` from a free-text payment method name.
///
/// Boundary adapter only: the ledger never relies on it when tags are given.
///
/// ## Mapping
/// ```text
/// zelle, panama, binance, zinli, paypal      → USD digital
/// punto, biopago, pago movil, transferencia  → VES digital
/// (bs | bolivar) + (efectivo | cash)         → VES cash
/// credito, fiado                             → USD credit
/// anything else                              → USD cash
/// ```
pub fn classify_label(label: &str) -> (Currency, Medium) {
    let label = fold_accents(&label.to_lowercase());
    let has = |needles: &[&str]| needles.iter().any(|needle| label.contains(needle));

    if has(&["zelle", "panama", "binance", "zinli", "paypal"]) {
        (Currency::Usd, Medium::Digital)
    } else if has(&["punto", "biopago", "pago movil", "pagomovil", "transferencia"]) {
        (Currency::Ves, Medium::Digital)
    } else if has(&["bs", "bolivar"]) && has(&["efectivo", "cash"]) {
        (Currency::Ves, Medium::Cash)
    } else if has(&["credito", "fiado"]) {
        (Currency::Usd, Medium::Credit)
    } else {
        (Currency::Usd, Medium::Cash)
    }
}

fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect()
}

// =============================================================================
// Normalization
// =============================================================================

/// A tender after finiteness checks, still carrying its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTender {
    pub payment: Payment,
    /// True when currency/medium came from [`classify_label`].
    pub inferred: bool,
}

/// Checks every numeric field of a tender list for NaN/infinity.
pub fn check_finite(tenders: &[TenderInput]) -> ValidationResult<()> {
    for (index, tender) in tenders.iter().enumerate() {
        if !tender.amount.is_finite() {
            return Err(ValidationError::non_finite(format!("payments[{}].amount", index)));
        }
        if let Some(rate) = tender.rate {
            if !rate.is_finite() {
                return Err(ValidationError::non_finite(format!("payments[{}].rate", index)));
            }
        }
    }
    Ok(())
}

/// Rejects any tender whose amount is below zero, before rounding.
///
/// `-0.004` rounds to zero cents, so the sign must be read from the raw float.
pub fn check_non_negative(tenders: &[TenderInput]) -> ValidationResult<()> {
    match tenders.iter().position(|tender| tender.amount < 0.0) {
        Some(index) => Err(ValidationError::NegativePayment {
            index,
            amount: tenders[index].amount,
        }),
        None => Ok(()),
    }
}

/// Normalizes one tender.
///
/// The base amount uses the tender's own rate, so one operation may mix
/// tenders taken at different rates.
pub fn normalize_tender(
    index: usize,
    input: &TenderInput,
    default_rate: ExchangeRate,
) -> ValidationResult<NormalizedTender> {
    let amount = Money::from_decimal(&format!("payments[{}].amount", index), input.amount)?;
    let rate = match input.rate {
        Some(rate) => ExchangeRate::from_decimal(rate)?,
        None => default_rate,
    };

    let (currency, medium, inferred) = match (input.currency, input.medium) {
        (Some(currency), Some(medium)) => (currency, medium, false),
        (currency, medium) => {
            let (guessed_currency, guessed_medium) =
                classify_label(input.label.as_deref().unwrap_or_default());
            (
                currency.unwrap_or(guessed_currency),
                medium.unwrap_or(guessed_medium),
                true,
            )
        }
    };

    let base_amount = if currency.is_base() {
        amount
    } else {
        rate.to_base(amount)
    };

    Ok(NormalizedTender {
        payment: Payment {
            amount,
            currency,
            medium,
            rate,
            base_amount,
            reference: input
                .reference
                .as_ref()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        },
        inferred,
    })
}

/// Normalizes a declared change disbursement.
///
/// Change always leaves the drawer, so wallet and credit mediums are refused.
pub fn normalize_change(index: usize, input: &ChangeInput) -> ValidationResult<Change> {
    let field = format!("change[{}].amount", index);
    let amount = Money::from_decimal(&field, input.amount)?;
    if amount.is_negative() {
        return Err(ValidationError::NegativeAmount { field });
    }
    if !input.medium.touches_drawer() {
        return Err(ValidationError::NotADrawerMedium {
            medium: input.medium,
        });
    }
    Ok(Change {
        amount,
        currency: input.currency,
        medium: input.medium,
    })
}

/// Base-currency value of a change disbursement at `rate`.
pub fn change_in_base(change: &Change, rate: ExchangeRate) -> Money {
    if change.currency.is_base() {
        change.amount
    } else {
        rate.to_base(change.amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
