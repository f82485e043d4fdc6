//! Cart Aggregate
//!
//! The cart is a server-confirmed snapshot: [`crate::cart::CartState`] replaces it
//! wholesale with whatever the backend returns. The methods here are the
//! client-side checks run before a request is issued.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, ProductId};
use crate::{Result, StorefrontError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType { Product, Combo }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboChild { pub name: String, pub quantity: u32 }

/// What a line refers to. Stock limits only apply to plain products.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "lowercase")]
pub enum LineItemKind {
    Product { stock_limit: Option<u32> },
    Combo { children: Vec<ComboChild> },
}

impl LineItemKind {
    pub fn item_type(&self) -> ItemType {
        match self { Self::Product { .. } => ItemType::Product, Self::Combo { .. } => ItemType::Combo }
    }
    pub fn stock_limit(&self) -> Option<u32> {
        match self { Self::Product { stock_limit } => *stock_limit, Self::Combo { .. } => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub kind: LineItemKind,
    /// False once the backend reports the product or combo as deactivated.
    pub active: bool,
}

impl CartLine {
    pub fn product(product_id: ProductId, quantity: u32, unit_price: Money, stock_limit: Option<u32>) -> Self {
        Self { name: product_id.to_string(), product_id, quantity, unit_price, kind: LineItemKind::Product { stock_limit }, active: true }
    }

    pub fn combo(product_id: ProductId, quantity: u32, unit_price: Money, children: Vec<ComboChild>) -> Self {
        Self { name: product_id.to_string(), product_id, quantity, unit_price, kind: LineItemKind::Combo { children }, active: true }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self { self.name = name.into(); self }
    pub fn item_type(&self) -> ItemType { self.kind.item_type() }
    pub fn stock_limit(&self) -> Option<u32> { self.kind.stock_limit() }
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

/// Rejects quantities below one or above a known product stock limit.
pub fn check_quantity(product_id: &ProductId, quantity: u32, kind: &LineItemKind) -> Result<()> {
    if quantity < 1 { return Err(StorefrontError::InvalidQuantity(quantity)); }
    match kind.stock_limit() {
        Some(available) if quantity > available => Err(StorefrontError::InsufficientStock {
            product_id: product_id.to_string(), requested: quantity, available,
        }),
        _ => Ok(()),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Builds a cart from backend lines, keeping the first occurrence of each product.
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 || cart.line(&line.product_id).is_some() {
                tracing::warn!(product_id = %line.product_id, quantity = line.quantity, "dropping invalid or duplicate cart line");
                continue;
            }
            cart.lines.push(line);
        }
        cart
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> { self.lines.iter().find(|l| &l.product_id == product_id) }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn item_count(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }

    /// Sum of `unit_price * quantity` over all lines.
    pub fn total(&self) -> Money { self.lines.iter().map(CartLine::line_total).sum() }

    /// Quantity the line would hold after adding `quantity`, validated against stock.
    pub fn check_add(&self, product_id: &ProductId, quantity: u32, kind: &LineItemKind) -> Result<u32> {
        if quantity < 1 { return Err(StorefrontError::InvalidQuantity(quantity)); }
        let existing = self.line(product_id).map(|l| l.quantity).unwrap_or(0);
        let merged = existing.saturating_add(quantity);
        // The stored line knows the freshest stock figure.
        let kind = self.line(product_id).map(|l| &l.kind).unwrap_or(kind);
        check_quantity(product_id, merged, kind)?;
        Ok(merged)
    }

    /// Validates a quantity change. `Ok(false)` means the quantity is unchanged.
    pub fn check_set(&self, product_id: &ProductId, quantity: u32) -> Result<bool> {
        if quantity < 1 { return Err(StorefrontError::InvalidQuantity(quantity)); }
        let line = self.line(product_id).ok_or_else(|| StorefrontError::NotInCart(product_id.to_string()))?;
        if line.quantity == quantity { return Ok(false); }
        check_quantity(product_id, quantity, &line.kind)?;
        Ok(true)
    }

    /// Replaces, inserts or removes a single line, leaving the others untouched.
    pub fn put_line(&mut self, product_id: &ProductId, line: Option<CartLine>) {
        match (self.lines.iter().position(|l| &l.product_id == product_id), line) {
            (Some(i), Some(line)) => self.lines[i] = line,
            (Some(i), None) => { self.lines.remove(i); }
            (None, Some(line)) => self.lines.push(line),
            (None, None) => {}
        }
    }

    /// Drops lines whose product or combo is no longer active. Returns the removed ids.
    pub fn prune_inactive(&mut self) -> Vec<ProductId> {
        let removed: Vec<ProductId> = self.lines.iter().filter(|l| !l.active).map(|l| l.product_id.clone()).collect();
        self.lines.retain(|l| l.active);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ProductId { ProductId::new(s).unwrap() }

    #[test]
    fn test_cart_total() {
        let cart = Cart::from_lines([
            CartLine::product(pid("p1"), 2, Money::from_units(1500), Some(10)),
            CartLine::combo(pid("c1"), 1, Money::from_units(9000), vec![ComboChild { name: "Fernet".into(), quantity: 1 }]),
        ]);
        assert_eq!(cart.total(), Money::from_units(12000));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_duplicate_lines_are_dropped() {
        let cart = Cart::from_lines([
            CartLine::product(pid("p1"), 2, Money::from_units(10), None),
            CartLine::product(pid("p1"), 5, Money::from_units(10), None),
        ]);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_check_add_merges_against_stock() {
        let cart = Cart::from_lines([CartLine::product(pid("p1"), 2, Money::from_units(10), Some(3))]);
        assert_eq!(cart.check_add(&pid("p1"), 1, &LineItemKind::Product { stock_limit: Some(3) }), Ok(3));
        assert!(matches!(
            cart.check_add(&pid("p1"), 2, &LineItemKind::Product { stock_limit: Some(3) }),
            Err(StorefrontError::InsufficientStock { requested: 4, available: 3, .. })
        ));
    }

    #[test]
    fn test_combos_ignore_stock() {
        let cart = Cart::new();
        assert_eq!(cart.check_add(&pid("c1"), 50, &LineItemKind::Combo { children: vec![] }), Ok(50));
    }

    #[test]
    fn test_check_set() {
        let cart = Cart::from_lines([CartLine::product(pid("p1"), 2, Money::from_units(10), Some(4))]);
        assert_eq!(cart.check_set(&pid("p1"), 2), Ok(false));
        assert_eq!(cart.check_set(&pid("p1"), 4), Ok(true));
        assert_eq!(cart.check_set(&pid("p1"), 0), Err(StorefrontError::InvalidQuantity(0)));
        assert!(matches!(cart.check_set(&pid("p1"), 5), Err(StorefrontError::InsufficientStock { .. })));
        assert!(matches!(cart.check_set(&pid("zz"), 1), Err(StorefrontError::NotInCart(_))));
    }

    #[test]
    fn test_prune_inactive() {
        let mut stale = CartLine::product(pid("gone"), 1, Money::from_units(10), None);
        stale.active = false;
        let mut cart = Cart::from_lines([stale, CartLine::product(pid("p1"), 1, Money::from_units(10), None)]);
        assert_eq!(cart.prune_inactive(), vec![pid("gone")]);
        assert_eq!(cart.line_count(), 1);
    }
}
