//! # Working Cart
//!
//! The lines a cashier is building before checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Scan product ─────────► add_item()      ──► merge or push line         │
//! │  Change quantity ──────► set_quantity()  ──► qty = n (0 removes)        │
//! │  Remove line ──────────► remove_item()   ──► retain others              │
//! │  Checkout ─────────────► to_lines()      ──► SaleRequest.lines          │
//! │  Sale committed ───────► clear()         ──► empty cart                 │
//! │                                                                         │
//! │  Lines are unique by (product, level): a pack and a case of the same   │
//! │  product are two lines, two packs are one.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::sale::SaleLineInput;
use crate::types::{Product, Quantity, TaxRate, UnitKind, UnitLevel};

/// Maximum distinct lines in one cart.
pub const MAX_CART_LINES: usize = 100;

/// A line in the working cart.
///
/// Name and price are frozen when the line is added, so the cart keeps
/// showing what the cashier scanned even if the catalog changes meanwhile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub level: UnitLevel,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.times_quantity(self.quantity)
    }

    pub fn tax(&self) -> Money {
        self.line_total().calculate_tax(self.tax_rate)
    }
}

/// The shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub items: Vec<CartItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds `quantity` of `product` at `level`, merging with an existing line.
    pub fn add_item(
        &mut self,
        product: &Product,
        level: UnitLevel,
        quantity: Quantity,
        tax_rate: TaxRate,
    ) -> ValidationResult<()> {
        if !quantity.is_positive() {
            return Err(ValidationError::InvalidQuantity {
                field: "quantity".to_string(),
            });
        }
        if product.unit_kind == UnitKind::Counted && !quantity.is_whole() {
            return Err(ValidationError::FractionalQuantity {
                product: product.name.clone(),
            });
        }
        let unit_price = product.price_for(level)?;

        if let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product.id && i.level == level)
        {
            item.quantity = item.quantity + quantity;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_LINES {
            return Err(ValidationError::TooLong {
                field: "cart".to_string(),
                max: MAX_CART_LINES,
            });
        }

        self.items.push(CartItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            level,
            quantity,
            unit_price,
            tax_rate,
            added_at: Utc::now(),
        });
        Ok(())
    }

    /// Sets a line's quantity; zero removes it.
    ///
    /// Returns false if the line is not in the cart.
    pub fn set_quantity(&mut self, product_id: &str, level: UnitLevel, quantity: Quantity) -> bool {
        if !quantity.is_positive() {
            return self.remove_item(product_id, level);
        }
        match self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id && i.level == level)
        {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Removes a line. Returns false if it was not in the cart.
    pub fn remove_item(&mut self, product_id: &str, level: UnitLevel) -> bool {
        let before = self.items.len();
        self.items
            .retain(|i| !(i.product_id == product_id && i.level == level));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.created_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn tax(&self) -> Money {
        self.items.iter().map(CartItem::tax).sum()
    }

    pub fn total(&self) -> Money {
        self.subtotal() + self.tax()
    }

    /// The cart as sale request lines, prices frozen.
    pub fn to_lines(&self) -> Vec<SaleLineInput> {
        self.items
            .iter()
            .map(|item| SaleLineInput {
                product_id: item.product_id.clone(),
                quantity: item.quantity.to_decimal(),
                level: item.level,
                unit_price: Some(item.unit_price.to_decimal()),
                tax_rate_bps: item.tax_rate.bps(),
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackLevel;

    fn water() -> Product {
        Product {
            id: "water".to_string(),
            name: "Water 1.5L".to_string(),
            price: Money::from_cents(120),
            stock: Quantity::from_units(50),
            unit_kind: UnitKind::Counted,
            pack: Some(PackLevel {
                contents: 6,
                price: Money::from_cents(650),
            }),
            case: None,
        }
    }

    #[test]
    fn test_add_merges_same_level() {
        let mut cart = Cart::new();
        let product = water();
        cart.add_item(&product, UnitLevel::Unit, Quantity::from_units(2), TaxRate::default())
            .unwrap();
        cart.add_item(&product, UnitLevel::Unit, Quantity::from_units(1), TaxRate::default())
            .unwrap();
        cart.add_item(&product, UnitLevel::Pack, Quantity::from_units(1), TaxRate::default())
            .unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].quantity, Quantity::from_units(3));
        assert_eq!(cart.subtotal(), Money::from_cents(360 + 650));
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add_item(&water(), UnitLevel::Unit, Quantity::from_units(2), TaxRate::default())
            .unwrap();
        assert!(cart.set_quantity("water", UnitLevel::Unit, Quantity::zero()));
        assert!(cart.is_empty());
        assert!(!cart.remove_item("water", UnitLevel::Unit));
    }

    #[test]
    fn test_unknown_level_rejected() {
        let mut cart = Cart::new();
        let err = cart
            .add_item(&water(), UnitLevel::Case, Quantity::from_units(1), TaxRate::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownUnitLevel { .. }));
    }

    #[test]
    fn test_to_lines_freezes_price() {
        let mut cart = Cart::new();
        cart.add_item(&water(), UnitLevel::Pack, Quantity::from_units(2), TaxRate::from_bps(1_600))
            .unwrap();
        let lines = cart.to_lines();
        assert_eq!(lines[0].unit_price, Some(6.5));
        assert_eq!(lines[0].quantity, 2.0);
        assert_eq!(lines[0].tax_rate_bps, 1_600);
        assert_eq!(cart.tax(), Money::from_cents(208));
    }
}
