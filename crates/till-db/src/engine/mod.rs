//! # Ledger Engines
//!
//! Every mutating ledger operation, each one a single atomic unit.
//!
//! ## Shape of an Operation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Ledger::commit_sale(request)                                           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  begin_unit()  ── BEGIN IMMEDIATE, write lock held from here           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  read snapshot (session, products, customer) on the unit connection    │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  till-core plan (pure guards)  ── Err ──► drop unit = ROLLBACK         │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  writes (stock, drawer, customer, correlative, journal)                 │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  COMMIT ──► sink.publish(event)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`session`] - Drawer open / flow / withdraw / close
//! - [`sale`] - Sale commit, cart checkout and quotes
//! - [`reversal`] - Voids
//! - [`debt`] - Customer accounts: debt payments and adjustments
//! - [`stock`] - Remote stock deltas
//! - [`events`] - Post-commit event sinks

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::pool::Database;
use till_core::LedgerPolicy;

pub mod debt;
pub mod events;
pub mod reversal;
pub mod sale;
pub mod session;
pub mod stock;

pub use events::{ChannelSink, EventSink, LedgerEvent, TracingSink};
pub use reversal::VoidOutcome;
pub use sale::{new_cart, CartHandle, CheckoutTender};

// =============================================================================
// Ledger
// =============================================================================

/// Handle to the ledger: database, deployment policy and event sink.
///
/// Cheap to clone; clones share the pool and the sink.
#[derive(Clone)]
pub struct Ledger {
    db: Database,
    policy: LedgerPolicy,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("db", &self.db)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Creates a ledger that logs its events through `tracing`.
    pub fn new(db: Database, policy: LedgerPolicy) -> Self {
        Ledger {
            db,
            policy,
            sink: Arc::new(TracingSink),
        }
    }

    /// Connects to the configured database and applies the configured policy.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Ledger::new(db, config.policy()))
    }

    /// Replaces the event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Hands an event to the sink. Only called after COMMIT.
    pub(crate) fn publish(&self, event: LedgerEvent) {
        self.sink.publish(&event);
    }
}

// =============================================================================
// Outcome Logging
// =============================================================================

/// Logs a failed operation: rejections at `debug`, storage failures at `error`.
pub(crate) fn logged<T>(operation: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
    if let Err(err) = &result {
        match err {
            LedgerError::Commit(cause) => {
                error!(operation, error = %cause, "Ledger unit failed and was rolled back");
            }
            rejected => {
                debug!(operation, kind = rejected.kind(), error = %rejected, "Ledger operation rejected");
            }
        }
    }
    result
}

// =============================================================================
// Test Fixtures
// =============================================================================
