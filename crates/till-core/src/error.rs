//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── ValidationError  - A guard rejected the request (never retried)   │
//! │  └── StateConflict    - Register / entry lifecycle does not allow it   │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  ├── DbError          - SQLite / pool failures                         │
//! │  └── LedgerError      - What callers of the engines see                │
//! │                                                                         │
//! │  Flow: ValidationError ─┐                                              │
//! │        StateConflict  ──┼──► LedgerError ──► caller shows message      │
//! │        DbError ─────────┘   (Commit)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. One variant per guard, so callers can present a specific message
//! 2. Include context in error messages (product name, shortfall, quadrant)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::money::Money;
use crate::types::{EntryKind, Medium, Quadrant, Quantity, UnitLevel};

// =============================================================================
// Validation Error
// =============================================================================

/// A request was rejected before any mutation happened.
///
/// The sale guards are evaluated in a fixed order and the first failure wins:
///
/// ```text
/// EmptyCart → NonFinite → NegativePayment → (parse) → CreditTender
///   → OrphanCredit → WalletWithoutCustomer → PhantomCredit → Underpaid
///   → UnassignedChange → ExcessChange → InsufficientWallet → InsufficientStock
/// ```
///
/// The parse stage turns the request into integer amounts and can fail with
/// `OutOfRange`, `InvalidRate`, `InvalidQuantity`, `FractionalQuantity`,
/// `UnknownUnitLevel` or `NegativeAmount`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The cart holds no line items.
    #[error("Cart is empty")]
    EmptyCart,

    /// An amount, quantity or rate is NaN or infinite.
    ///
    /// ## When This Occurs
    /// - A front end divided by zero while computing a total
    /// - A payment field was left blank and parsed as NaN
    #[error("{field} is not a finite number")]
    NonFinite { field: String },

    /// A payment carries a negative amount, checked before any rounding.
    #[error("Payment #{index} has a negative amount ({amount})")]
    NegativePayment { index: usize, amount: f64 },

    /// A finite amount or quantity is too large to be stored exactly.
    #[error("{field} is outside the accepted range")]
    OutOfRange { field: String },

    /// A sale tender uses the credit medium; credit is expressed through the
    /// credit flag and never as a tender line.
    #[error("Payment #{index} uses the credit medium; mark the sale as credit instead")]
    CreditTender { index: usize },

    /// A credit sale has no customer to owe the debt.
    #[error("Credit sale requires a customer")]
    OrphanCredit,

    /// A wallet tender has no customer to draw from.
    #[error("Wallet payment requires a customer")]
    WalletWithoutCustomer,

    /// A credit sale would not create any debt.
    #[error("Credit sale creates no debt: paid {paid} of {amount_due}")]
    PhantomCredit { paid: Money, amount_due: Money },

    /// A cash (non-credit) sale is not fully paid.
    #[error("Sale is underpaid: paid {paid} of {amount_due}")]
    Underpaid { paid: Money, amount_due: Money },

    /// Change is owed, nobody takes it physically and there is no customer
    /// wallet to absorb it.
    #[error("Change of {amount} is not handed back and there is no customer to absorb it")]
    UnassignedChange { amount: Money },

    /// More change is declared than is actually owed.
    #[error("Declared change {declared} exceeds change owed {owed}")]
    ExcessChange { declared: Money, owed: Money },

    /// A wallet tender exceeds the customer's wallet balance.
    #[error("Wallet balance {available} is lower than the {required} requested")]
    InsufficientWallet { available: Money, required: Money },

    /// Not enough stock for a product across the whole cart.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: 1 case (24 u) + 3 units of COLA, stock = 20 u
    ///      │
    ///      ▼
    /// aggregate per product: 27 u required
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Cola 355ml", shortfall: 7 }
    /// ```
    #[error("Insufficient stock for {product}: short by {shortfall}")]
    InsufficientStock { product: String, shortfall: Quantity },

    /// A drawer flow would push a physical cash quadrant below zero.
    #[error("Not enough cash in {quadrant}: available {available}, required {required}")]
    InsufficientCash {
        quadrant: Quadrant,
        available: Money,
        required: Money,
    },

    /// A debt payment tried to settle debt with more credit.
    #[error("Debt cannot be paid with the credit medium")]
    InfiniteCredit,

    /// An amount that must be strictly positive is zero or negative.
    #[error("{field} must be greater than zero")]
    InvalidAmount { field: String },

    /// An amount that may be zero is negative (prices, change lines, IGTF).
    #[error("{field} must not be negative")]
    NegativeAmount { field: String },

    /// An exchange rate is zero, negative or too large to represent.
    #[error("Exchange rate {value} is invalid")]
    InvalidRate { value: String },

    /// A quantity is zero or negative.
    #[error("{field} must be a positive quantity")]
    InvalidQuantity { field: String },

    /// A counted product sold by the unit was given a fractional quantity.
    #[error("{product} is sold in whole units")]
    FractionalQuantity { product: String },

    /// A cart line names a product missing from the snapshot.
    #[error("Unknown product {product_id}")]
    UnknownProduct { product_id: String },

    /// The product does not define the requested unit level.
    #[error("{product} is not sold by the {level}")]
    UnknownUnitLevel { product: String, level: UnitLevel },

    /// A withdrawal named a medium that has no drawer quadrant.
    #[error("{medium} has no drawer quadrant")]
    NotADrawerMedium { medium: Medium },

    /// Debt payment tenders do not add up to the declared total.
    #[error("Tendered {tendered} does not match the declared payment {declared}")]
    PaymentMismatch { declared: Money, tendered: Money },

    /// A mandatory reason was not supplied.
    #[error("A reason is required")]
    MissingReason,

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::NonFinite`].
    pub fn non_finite(field: impl Into<String>) -> Self {
        ValidationError::NonFinite {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::OutOfRange`].
    pub fn out_of_range(field: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidAmount`].
    pub fn invalid_amount(field: impl Into<String>) -> Self {
        ValidationError::InvalidAmount {
            field: field.into(),
        }
    }
}

// =============================================================================
// State Conflict
// =============================================================================

/// The aggregate is not in a lifecycle state that allows the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateConflict {
    /// `open` was called while a session is already open.
    #[error("Register is already open (session {session_id})")]
    AlreadyOpen { session_id: String },

    /// A drawer flow or withdrawal needs an open session.
    #[error("Register is closed")]
    RegisterClosed,

    /// `close` found no open session.
    #[error("Register is already closed")]
    AlreadyClosed,

    /// The journal entry kind has no inverse.
    #[error("{kind} entry {entry_id} cannot be voided")]
    NotReversible { entry_id: String, kind: EntryKind },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_message_names_product_and_shortfall() {
        let err = ValidationError::InsufficientStock {
            product: "Cola 355ml".to_string(),
            shortfall: Quantity::from_milli(7_000),
        };
        assert_eq!(err.to_string(), "Insufficient stock for Cola 355ml: short by 7");
    }

    #[test]
    fn test_change_messages() {
        let err = ValidationError::ExcessChange {
            declared: Money::from_cents(2500),
            owed: Money::from_cents(2000),
        };
        assert_eq!(err.to_string(), "Declared change 25.00 exceeds change owed 20.00");
    }

    #[test]
    fn test_state_conflict_messages() {
        let err = StateConflict::NotReversible {
            entry_id: "abc".to_string(),
            kind: EntryKind::Adjustment,
        };
        assert_eq!(err.to_string(), "adjustment entry abc cannot be voided");
        assert_eq!(StateConflict::AlreadyClosed.to_string(), "Register is already closed");
    }
}
