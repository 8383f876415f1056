//! # Ledger Events
//!
//! Fire-and-forget notifications published after a unit commits.
//!
//! ```text
//! engine ──► COMMIT ──► sink.publish(&event)
//!                           │
//!                           ├── TracingSink  → structured log line
//!                           └── ChannelSink  → mpsc (try_send, never waits)
//! ```
//!
//! A sink never sees an event for a rolled-back unit, and nothing it does
//! can fail or undo the commit that produced the event.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use till_core::{Balances, CustomerQuadrant, EntryKind, Money};

// =============================================================================
// Events
// =============================================================================

/// What happened, after it is durable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    SessionOpened {
        session_id: String,
        opened_by: String,
        opening: Balances,
    },
    SessionClosed {
        closed_id: String,
        session_id: String,
        final_balances: Balances,
        sales_count: i64,
        gross_sales: Money,
    },
    SaleCommitted {
        entry_id: String,
        invoice_number: String,
        total: Money,
        customer_id: Option<String>,
    },
    EntryVoided {
        entry_id: String,
        invoice_number: String,
        kind: EntryKind,
        reason: String,
        actor: String,
    },
    DebtPaid {
        entry_id: String,
        invoice_number: String,
        customer_id: String,
        amount: Money,
        resulting_debt: Money,
        resulting_wallet: Money,
    },
    AccountAdjusted {
        entry_id: String,
        customer_id: String,
        quadrant: CustomerQuadrant,
        cleared: Money,
    },
}

impl LedgerEvent {
    /// Event name as it appears in logs and serialized payloads.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::SessionOpened { .. } => "session_opened",
            LedgerEvent::SessionClosed { .. } => "session_closed",
            LedgerEvent::SaleCommitted { .. } => "sale_committed",
            LedgerEvent::EntryVoided { .. } => "entry_voided",
            LedgerEvent::DebtPaid { .. } => "debt_paid",
            LedgerEvent::AccountAdjusted { .. } => "account_adjusted",
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Receives ledger events (reporting, audit, UI refresh).
///
/// Implementations must return quickly and must not panic.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &LedgerEvent);
}

/// Default sink: one `info` line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::SaleCommitted {
                entry_id,
                invoice_number,
                total,
                ..
            } => info!(%entry_id, invoice = %invoice_number, %total, "Sale committed"),
            LedgerEvent::EntryVoided {
                entry_id,
                invoice_number,
                kind,
                actor,
                ..
            } => info!(%entry_id, invoice = %invoice_number, %kind, %actor, "Entry voided"),
            other => info!(event = other.name(), "Ledger event"),
        }
    }
}

/// Forwards events to a bounded channel.
///
/// `try_send` only: a full or closed channel drops the event with a warning.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<LedgerEvent>,
}

impl ChannelSink {
    /// Creates the sink and the receiving end.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LedgerEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelSink { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &LedgerEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!(event = event.name(), error = %e, "Dropping ledger event");
        }
    }
}
