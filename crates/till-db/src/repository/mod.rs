//! # Repository Module
//!
//! SQL for the ledger tables, isolated from the engines.
//!
//! ## Two Entry Points per Repository
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Access Pattern                            │
//! │                                                                         │
//! │  Pool-level (reads, admin writes)       Unit-level (engines)           │
//! │  ─────────────────────────────────      ───────────────────────────    │
//! │  db.customers().get(id)                 customer::lock_in(&mut *unit)  │
//! │  db.journal().list(50)                  journal::insert(&mut *unit, …) │
//! │  db.sessions().history(10)              cash_session::close(&mut *unit)│
//! │       │                                        │                        │
//! │       │  own connection                        │  caller's BEGIN        │
//! │       ▼                                        ▼  IMMEDIATE unit        │
//! │  SQLite Database ◄─────────────────────────────┘                        │
//! │                                                                         │
//! │  Unit-level functions take `&mut SqliteConnection`, never commit and   │
//! │  never open their own transaction, so an engine can chain them and     │
//! │  roll everything back with one drop.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`](inventory::InventoryRepository) - Products, stock, kardex
//! - [`CashSessionRepository`](cash_session::CashSessionRepository) - Drawer and Z-reports
//! - [`CustomerRepository`](customer::CustomerRepository) - Debt / wallet accounts
//! - [`JournalRepository`](journal::JournalRepository) - Sales, payments, adjustments
//! - [`correlative`] - Invoice counters

pub mod cash_session;
pub mod correlative;
pub mod customer;
pub mod inventory;
pub mod journal;
