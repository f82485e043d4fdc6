//! Shipping price table and resolution

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::domain::value_objects::Money;
use crate::shipping::free_shipping::FreeShippingEvaluation;
use crate::shipping::zones::{BackendZone, ZoneCatalog};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZonePrice {
    pub price: Money,
    /// Store address, only meaningful for pickup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl ZonePrice {
    pub fn new(price: Money) -> Self { Self { price, address: None } }
    pub fn with_address(mut self, address: impl Into<String>) -> Self { self.address = Some(address.into()); self }
}

/// Shipping prices keyed by backend zone, as served by the settings endpoint.
/// A zone missing from the table is not offered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable(BTreeMap<BackendZone, ZonePrice>);

impl PriceTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (BackendZone, ZonePrice)>) -> Self {
        Self(entries.into_iter().collect())
    }
    pub fn get(&self, zone: BackendZone) -> Option<&ZonePrice> { self.0.get(&zone) }
    pub fn price(&self, zone: BackendZone) -> Option<Money> { self.0.get(&zone).map(|e| e.price) }
    pub fn contains(&self, zone: BackendZone) -> bool { self.0.contains_key(&zone) }
    pub fn pickup_address(&self) -> Option<&str> { self.get(BackendZone::Pickup).and_then(|e| e.address.as_deref()) }
    pub fn zones(&self) -> impl Iterator<Item = BackendZone> + '_ { self.0.keys().copied() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[derive(Clone, Debug, Default)]
pub struct ShippingPriceResolver {
    catalog: ZoneCatalog,
}

impl ShippingPriceResolver {
    pub fn new(catalog: ZoneCatalog) -> Self { Self { catalog } }
    pub fn catalog(&self) -> &ZoneCatalog { &self.catalog }

    /// Final shipping cost for a backend zone.
    ///
    /// Pickup is always free. Other zones must be priced by the table; central
    /// deliveries are waived for free-shipping carts, remote ones never are.
    pub fn resolve(&self, zone: BackendZone, table: &PriceTable, eval: &FreeShippingEvaluation) -> Result<Money> {
        if zone == BackendZone::Pickup { return Ok(Money::ZERO); }
        let price = table.price(zone).ok_or_else(|| StorefrontError::ZoneUnavailable(zone.to_string()))?;
        if zone == BackendZone::Central && eval.is_eligible {
            tracing::debug!(table_price = %price, "central shipping waived");
            return Ok(Money::ZERO);
        }
        Ok(price)
    }

    pub fn resolve_visual(&self, visual_key: &str, table: &PriceTable, eval: &FreeShippingEvaluation) -> Result<Money> {
        let zone = self.catalog.resolve_backend_zone(visual_key)?;
        self.resolve(zone, table, eval)
    }
}
