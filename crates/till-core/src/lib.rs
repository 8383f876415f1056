//! # till-core: Pure Ledger Logic
//!
//! Everything the sales & cash ledger decides, as pure functions with zero
//! I/O. The storage crate reads a snapshot inside a transaction, asks this
//! crate what to do, and writes the answer in the same transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Till Data Flow                                 │
//! │                                                                         │
//! │  POS front end ──► till-db engines ──► BEGIN IMMEDIATE                 │
//! │                          │                  │                          │
//! │                          │       read products / session / customer    │
//! │                          ▼                  │                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-core (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   sale::plan_sale ──► ordered guards + stock ──► SalePlan       │   │
//! │  │   reversal::plan_reversal ──► ReversalPlan                      │   │
//! │  │   account::AccountPosition ──► debt/wallet normalization        │   │
//! │  │   drawer::apply_flow / withdraw ──► quadrant balances           │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                          │                                              │
//! │                          ▼                                              │
//! │                    write + COMMIT (or ROLLBACK on any error)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money, exchange rates, half-up rounding
//! - [`types`] - Domain types (Product, CashSession, Customer, JournalEntry)
//! - [`error`] - Validation and state-conflict errors
//! - [`validation`] - Field validators
//! - [`tender`] - Payment/change normalization and the label fallback
//! - [`account`] - Customer debt/wallet math
//! - [`drawer`] - Cash-session quadrant math
//! - [`sale`] - Sale guards and planning
//! - [`reversal`] - Void planning
//! - [`debt`] - Debt payment guards
//! - [`quote`] - Checkout payment status with IGTF
//! - [`cart`] - Working cart
//! - [`policy`] - Deployment switches
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same snapshot + same request = same plan
//! 2. **No I/O**: database, network and file system access are FORBIDDEN here
//! 3. **Integer Money**: floats are converted once, at the boundary
//! 4. **Explicit Errors**: one typed variant per guard, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod account;
pub mod cart;
pub mod debt;
pub mod drawer;
pub mod error;
pub mod money;
pub mod policy;
pub mod quote;
pub mod reversal;
pub mod sale;
pub mod tender;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use account::{AccountPosition, ChangeSplit};
pub use cart::Cart;
pub use debt::DebtPaymentRequest;
pub use drawer::FlowKind;
pub use error::{StateConflict, ValidationError, ValidationResult};
pub use money::{round2, ExchangeRate, Money};
pub use policy::LedgerPolicy;
pub use quote::PaymentStatus;
pub use sale::{ChangeDeclaration, SaleLineInput, SaleRequest};
pub use tender::{ChangeInput, TenderInput};
pub use types::*;
