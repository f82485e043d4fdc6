//! Catalog entries: products and combos

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::cart::{ComboChild, LineItemKind};
use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub is_active: bool,
    pub image_url: Option<String>,
}

impl Product {
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
    pub fn line_kind(&self) -> LineItemKind { LineItemKind::Product { stock_limit: Some(self.stock) } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Combo {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub items: Vec<ComboChild>,
    pub is_active: bool,
    pub image_url: Option<String>,
}

impl Combo {
    pub fn line_kind(&self) -> LineItemKind { LineItemKind::Combo { children: self.items.clone() } }
}

/// Listing filters understood by the catalog endpoints
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub in_stock: Option<bool>,
    pub active: Option<bool>,
    pub category: Option<String>,
}

impl CatalogFilter {
    /// Storefront listing: active items with stock.
    pub fn storefront() -> Self { Self { in_stock: Some(true), active: Some(true), category: None } }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.in_stock { pairs.push(("in_stock", v.to_string())); }
        if let Some(v) = self.active { pairs.push(("active", v.to_string())); }
        if let Some(c) = &self.category { pairs.push(("category", c.clone())); }
        pairs
    }
}
