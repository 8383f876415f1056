//! # Remote Stock Deltas
//!
//! Stock changes replayed from other terminals by the replication
//! collaborator. A remote decrement goes through the same stock guard a
//! local sale does.

use tracing::info;

use super::{logged, Ledger};
use crate::error::{LedgerError, LedgerResult};
use crate::repository::inventory::{self, MovementKind};
use till_core::sale::{check_stock, StockRequirement};
use till_core::{Product, Quantity};

impl Ledger {
    /// Applies a signed base-unit delta from another terminal.
    ///
    /// Returns the stock after the change.
    ///
    /// ## Errors
    /// - `Validation(InsufficientStock)` when a decrement would go below
    ///   zero and the policy forbids negative stock
    /// - `NotFound` for an unknown product
    pub async fn apply_remote_delta(
        &self,
        product_id: &str,
        delta: f64,
        origin: &str,
    ) -> LedgerResult<Quantity> {
        logged(
            "apply_remote_delta",
            self.remote_delta_unit(product_id, delta, origin).await,
        )
    }

    async fn remote_delta_unit(
        &self,
        product_id: &str,
        delta: f64,
        origin: &str,
    ) -> LedgerResult<Quantity> {
        let delta = Quantity::from_decimal("delta", delta)?;

        let mut unit = self.db.begin_unit().await?;
        let product = inventory::get_in(&mut unit, product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", product_id))?;

        if delta < Quantity::zero() {
            let requirement = StockRequirement {
                product_id: product.id.clone(),
                name: product.name.clone(),
                quantity: -delta,
            };
            check_stock(&requirement, product.stock, &self.policy)?;
        }

        let stock_after =
            inventory::apply_delta(&mut unit, product_id, delta, MovementKind::Remote, Some(origin))
                .await?;
        unit.commit().await?;

        info!(%product_id, %delta, %stock_after, %origin, "Remote stock delta applied");
        Ok(stock_after)
    }

    /// Loads a product snapshot from the replication collaborator.
    pub async fn load_snapshot(&self, products: &[Product]) -> LedgerResult<usize> {
        Ok(self.db.products().upsert_snapshot(products).await?)
    }
}
