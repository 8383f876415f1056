//! # till-db: Storage Layer and Ledger Engines
//!
//! Every operation that moves goods, money or debt runs here, inside one
//! SQLite `BEGIN IMMEDIATE` unit that either commits whole or leaves no trace.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Data Flow                                   │
//! │                                                                         │
//! │  POS front end / replication agent                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    Ledger     │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (engine/)    │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ commit_sale   │───►│ inventory     │    │ 001_ledger_  │  │   │
//! │  │   │ void_entry    │    │ cash_session  │    │              │  │   │
//! │  │   │ pay_debt      │    │ customer      │    │              │  │   │
//! │  │   │ close_session │    │ journal       │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ pure plans                                          │   │
//! │  │           ▼                                                     │   │
//! │  │       till-core                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ~/.local/share/till/till.db                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `ledger.toml` and environment overrides
//! - [`pool`] - Connection pool and atomic units
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and ledger error types
//! - [`repository`] - SQL per aggregate
//! - [`engine`] - The [`Ledger`] operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Ledger, LedgerConfig};
//! use till_core::{OpeningFloat, SaleRequest};
//!
//! let config = LedgerConfig::load(None)?;
//! let ledger = Ledger::open(&config).await?;
//!
//! ledger.open_session(OpeningFloat::Single(100.0), "ana").await?;
//! let entry = ledger.commit_sale(&request).await?;
//! println!("{}", entry.invoice_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::LedgerConfig;
pub use engine::{
    new_cart, CartHandle, ChannelSink, CheckoutTender, EventSink, Ledger, LedgerEvent, TracingSink,
    VoidOutcome,
};
pub use error::{ConfigError, DbError, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig, Unit};

// Repository re-exports for convenience
pub use repository::cash_session::CashSessionRepository;
pub use repository::customer::CustomerRepository;
pub use repository::inventory::{InventoryRepository, MovementKind, StockMovement};
pub use repository::journal::JournalRepository;
