//! # Customer Account Math
//!
//! Pure debt/wallet arithmetic for the customer ledger.
//!
//! ## The Exclusivity Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A customer either OWES (debt > 0) or IS OWED (wallet > 0), never both │
//! │                                                                         │
//! │        net = wallet − debt                                              │
//! │                                                                         │
//! │        net ≥ 0  →  wallet = net,  debt = 0                              │
//! │        net < 0  →  debt = |net|,  wallet = 0                            │
//! │                                                                         │
//! │  Every mutating operation below ends in `normalize`. Intermediate      │
//! │  steps may go negative; only the normalized result is stored.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because the stored state depends only on `net`, applying an operation and
//! then its reversal lands on exactly the same position, whatever happened to
//! the customer in between.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Customer, CustomerQuadrant};

// =============================================================================
// Position
// =============================================================================

/// A customer's debt and wallet, always stored normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountPosition {
    pub debt: Money,
    pub wallet: Money,
}

/// How absorbed change was split between debt and wallet.
///
/// Persisted on the journal entry so a void can invert it exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChangeSplit {
    pub applied_to_debt: Money,
    pub applied_to_wallet: Money,
}

/// Frozen amounts a reversal undoes, in the order they were applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountEffects {
    pub debt_created: Money,
    pub consumed_wallet: Money,
    pub applied_to_debt: Money,
    pub applied_to_wallet: Money,
}

/// Nets debt against wallet so at most one of them is positive.
///
/// ## Example
/// ```rust
/// use till_core::account::normalize;
/// use till_core::money::Money;
///
/// let (debt, wallet) = normalize(Money::from_cents(1000), Money::from_cents(300));
/// assert_eq!(debt.cents(), 700);
/// assert!(wallet.is_zero());
/// ```
pub fn normalize(debt: Money, wallet: Money) -> (Money, Money) {
    let net = wallet - debt;
    if net.is_negative() {
        (net.abs(), Money::zero())
    } else {
        (Money::zero(), net)
    }
}

impl AccountPosition {
    pub fn new(debt: Money, wallet: Money) -> Self {
        AccountPosition { debt, wallet }.normalized()
    }

    /// `wallet − debt`.
    pub fn net(&self) -> Money {
        self.wallet - self.debt
    }

    pub fn normalized(self) -> Self {
        let (debt, wallet) = normalize(self.debt, self.wallet);
        AccountPosition { debt, wallet }
    }

    /// Charges new debt and consumes wallet tenders, then re-normalizes.
    ///
    /// `payment_toward_debt` reduces debt directly; `wallet_consumed` is the
    /// base-currency value of wallet-sourced tenders.
    pub fn apply_charge_and_payment(
        self,
        debt_delta: Money,
        payment_toward_debt: Money,
        wallet_consumed: Money,
    ) -> Self {
        AccountPosition {
            debt: self.debt + debt_delta - payment_toward_debt,
            wallet: self.wallet - wallet_consumed,
        }
        .normalized()
    }

    /// Absorbs change that was not handed back: pays debt first, the rest
    /// goes to the wallet.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::account::AccountPosition;
    /// use till_core::money::Money;
    ///
    /// let before = AccountPosition::new(Money::from_cents(1000), Money::zero());
    /// let (after, split) = before.apply_change(Money::from_cents(1500));
    /// assert_eq!(split.applied_to_debt.cents(), 1000);
    /// assert_eq!(split.applied_to_wallet.cents(), 500);
    /// assert_eq!(after.wallet.cents(), 500);
    /// assert!(after.debt.is_zero());
    /// ```
    pub fn apply_change(self, amount: Money) -> (Self, ChangeSplit) {
        let amount = amount.floor_zero();
        let applied_to_debt = amount.min(self.debt.floor_zero());
        let applied_to_wallet = amount - applied_to_debt;
        let after = AccountPosition {
            debt: self.debt - applied_to_debt,
            wallet: self.wallet + applied_to_wallet,
        }
        .normalized();
        (
            after,
            ChangeSplit {
                applied_to_debt,
                applied_to_wallet,
            },
        )
    }

    /// Sets one quadrant to zero; returns the new position and the amount
    /// that was cleared.
    pub fn zero(self, which: CustomerQuadrant) -> (Self, Money) {
        match which {
            CustomerQuadrant::Debt => (
                AccountPosition {
                    debt: Money::zero(),
                    ..self
                },
                self.debt,
            ),
            CustomerQuadrant::Wallet => (
                AccountPosition {
                    wallet: Money::zero(),
                    ..self
                },
                self.wallet,
            ),
        }
    }

    /// Undoes a commit step by step, then re-normalizes.
    ///
    /// ```text
    /// debt   -= debt_created
    /// wallet += consumed_wallet
    /// wallet -= applied_to_wallet
    /// debt   += applied_to_debt
    /// ```
    pub fn reverse(self, effects: &AccountEffects) -> Self {
        let mut debt = self.debt;
        let mut wallet = self.wallet;
        debt -= effects.debt_created;
        wallet += effects.consumed_wallet;
        wallet -= effects.applied_to_wallet;
        debt += effects.applied_to_debt;
        AccountPosition { debt, wallet }.normalized()
    }
}

impl From<&Customer> for AccountPosition {
    fn from(customer: &Customer) -> Self {
        AccountPosition::new(customer.debt, customer.wallet)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    fn assert_exclusive(position: AccountPosition) {
        assert!(position.debt.is_zero() || position.wallet.is_zero());
        assert!(!position.debt.is_negative());
        assert!(!position.wallet.is_negative());
    }

    #[test]
    fn test_normalize_nets_both_sides() {
        assert_eq!(normalize(usd(500), usd(800)), (usd(0), usd(300)));
        assert_eq!(normalize(usd(800), usd(500)), (usd(300), usd(0)));
        assert_eq!(normalize(usd(500), usd(500)), (usd(0), usd(0)));
    }

    #[test]
    fn test_change_pays_debt_then_wallet() {
        let (after, split) = AccountPosition::new(usd(1000), usd(0)).apply_change(usd(1500));
        assert_eq!(split.applied_to_debt, usd(1000));
        assert_eq!(split.applied_to_wallet, usd(500));
        assert_eq!(after, AccountPosition::new(usd(0), usd(500)));

        let (after, split) = AccountPosition::new(usd(2000), usd(0)).apply_change(usd(500));
        assert_eq!(split.applied_to_wallet, usd(0));
        assert_eq!(after.debt, usd(1500));
    }

    #[test]
    fn test_charge_and_wallet_consumption() {
        let start = AccountPosition::new(usd(0), usd(1000));
        let after = start.apply_charge_and_payment(usd(0), usd(0), usd(400));
        assert_eq!(after, AccountPosition::new(usd(0), usd(600)));

        // New debt larger than the wallet nets against it
        let after = start.apply_charge_and_payment(usd(1500), usd(0), usd(0));
        assert_eq!(after, AccountPosition::new(usd(500), usd(0)));
        assert_exclusive(after);
    }

    #[test]
    fn test_reverse_restores_position() {
        let start = AccountPosition::new(usd(1000), usd(0));
        let charged = start.apply_charge_and_payment(usd(250), usd(0), usd(0));
        let (after, split) = charged.apply_change(usd(1500));
        let effects = AccountEffects {
            debt_created: usd(250),
            consumed_wallet: usd(0),
            applied_to_debt: split.applied_to_debt,
            applied_to_wallet: split.applied_to_wallet,
        };
        assert_eq!(after.reverse(&effects), start);
    }

    #[test]
    fn test_reverse_after_wallet_was_spent() {
        // Customer got 5.00 wallet from change, then spent it elsewhere
        let effects = AccountEffects {
            applied_to_wallet: usd(500),
            ..AccountEffects::default()
        };
        let reversed = AccountPosition::new(usd(0), usd(0)).reverse(&effects);
        assert_eq!(reversed, AccountPosition::new(usd(500), usd(0)));
    }

    #[test]
    fn test_zero_returns_cleared_amount() {
        let (after, cleared) = AccountPosition::new(usd(700), usd(0)).zero(CustomerQuadrant::Debt);
        assert_eq!(cleared, usd(700));
        assert_eq!(after, AccountPosition::default());

        let (after, cleared) = AccountPosition::new(usd(700), usd(0)).zero(CustomerQuadrant::Wallet);
        assert_eq!(cleared, usd(0));
        assert_eq!(after.debt, usd(700));
    }

    #[test]
    fn test_exclusivity_over_operation_sequences() {
        let mut position = AccountPosition::default();
        let steps = [
            (300, 0, 0, 0),
            (0, 100, 0, 900),
            (0, 0, 200, 0),
            (1200, 0, 0, 50),
            (0, 500, 0, 2000),
        ];
        for (debt_delta, toward_debt, wallet_used, change) in steps {
            position = position.apply_charge_and_payment(usd(debt_delta), usd(toward_debt), usd(wallet_used));
            assert_exclusive(position);
            position = position.apply_change(usd(change)).0;
            assert_exclusive(position);
        }
    }
}
