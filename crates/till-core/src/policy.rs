//! # Ledger Policy
//!
//! Deployment switches the engines consult. Loaded from the `[policy]` table
//! of the ledger config file.
//!
//! ```toml
//! [policy]
//! allow_negative_stock = false
//! allow_negative_cash = false
//! change_tolerance_cents = 1
//! igtf_rate_bps = 300
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::TaxRate;

/// Rules that differ between stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// Skip the stock guard (stores that sell before receiving).
    #[serde(default)]
    pub allow_negative_stock: bool,

    /// Let drawer flows push a cash quadrant below zero.
    #[serde(default)]
    pub allow_negative_cash: bool,

    /// Rounding slack for change and underpayment checks, in cents.
    #[serde(default = "default_change_tolerance")]
    pub change_tolerance_cents: i64,

    /// IGTF rate used by payment quotes, in basis points.
    #[serde(default = "default_igtf_rate")]
    pub igtf_rate_bps: u32,
}

fn default_change_tolerance() -> i64 {
    1
}

fn default_igtf_rate() -> u32 {
    300
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        LedgerPolicy {
            allow_negative_stock: false,
            allow_negative_cash: false,
            change_tolerance_cents: default_change_tolerance(),
            igtf_rate_bps: default_igtf_rate(),
        }
    }
}

impl LedgerPolicy {
    pub fn tolerance(&self) -> Money {
        Money::from_cents(self.change_tolerance_cents.max(0))
    }

    pub fn igtf_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.igtf_rate_bps)
    }
}
