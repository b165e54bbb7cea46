use serde::{Deserialize, Serialize};

use crate::product::{Product, ProductId};

/// One product in the cart together with the requested quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// Line total in centavos.
    pub fn total(&self) -> u64 {
        self.product.price * u64::from(self.quantity)
    }
}

/// Session-owned shopping cart.
///
/// Created when a session starts and passed explicitly to whatever needs it.
/// Mutated only through these methods: user add/update/remove actions and
/// `clear()` after a successful order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add `quantity` units of `product`, merging with an existing line.
    /// The resulting quantity is capped at the product's stock.
    /// Returns the quantity now in the cart for that product.
    pub fn add(&mut self, product: Product, quantity: u32) -> u32 {
        if quantity == 0 || product.stock == 0 {
            return self.quantity_of(&product.id);
        }
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(quantity).min(product.stock);
                line.product = product;
                line.quantity
            }
            None => {
                let quantity = quantity.min(product.stock);
                self.lines.push(CartLine { product, quantity });
                quantity
            }
        }
    }

    /// Set the quantity of a line. Zero removes it; values above stock are capped.
    pub fn update_quantity(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| &l.product.id == product_id) {
            line.quantity = quantity.min(line.product.stock);
        }
    }

    pub fn remove(&mut self, product_id: &ProductId) {
        self.lines.retain(|l| &l.product.id != product_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.lines
            .iter()
            .find(|l| &l.product.id == product_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line totals in centavos, before shipping.
    pub fn subtotal(&self) -> u64 {
        self.lines.iter().map(CartLine::total).sum()
    }
}
