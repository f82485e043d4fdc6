//! Interactive zone picker state
//!
//! Backs both the dropdown and the map. Either affordance funnels into the same
//! selection path, so the resulting backend zone and cost cannot diverge.

use std::fmt;
use crate::domain::aggregates::AddressRecord;
use crate::domain::events::{ZoneClearReason, ZoneEvent};
use crate::domain::value_objects::{LatLng, Money};
use crate::shipping::free_shipping::FreeShippingEvaluation;
use crate::shipping::pricing::{PriceTable, ShippingPriceResolver};
use crate::shipping::zones::{BackendZone, Zone};
use crate::{Result, StorefrontError};

type Listener = Box<dyn Fn(&ZoneEvent) + Send + Sync>;

/// Dropdown entry
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneOption {
    pub key: String,
    pub label: String,
    pub backend_zone: BackendZone,
    pub price: Money,
}

/// What the map popup shows for a point
#[derive(Clone, Debug, PartialEq)]
pub struct ZonePopup {
    pub key: String,
    pub display_name: String,
    pub color: String,
    pub price: Option<Money>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShippingSelection {
    pub zone: BackendZone,
    pub cost: Money,
    pub address: Option<AddressRecord>,
}

pub struct ZoneSelection {
    resolver: ShippingPriceResolver,
    prices: PriceTable,
    read_only: bool,
    selected: Option<String>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for ZoneSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneSelection")
            .field("selected", &self.selected)
            .field("read_only", &self.read_only)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ZoneSelection {
    pub fn new(resolver: ShippingPriceResolver, prices: PriceTable) -> Self {
        Self { resolver, prices, read_only: false, selected: None, listeners: Vec::new() }
    }

    /// Display-only picker: clicks and selections are ignored, popups still work.
    pub fn read_only(resolver: ShippingPriceResolver, prices: PriceTable) -> Self {
        Self { read_only: true, ..Self::new(resolver, prices) }
    }

    pub fn is_read_only(&self) -> bool { self.read_only }
    pub fn prices(&self) -> &PriceTable { &self.prices }

    pub fn subscribe(&mut self, listener: impl Fn(&ZoneEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&self, event: ZoneEvent) {
        for listener in &self.listeners { listener(&event); }
    }

    /// Zones the backend currently prices. Unpriced zones are not offered.
    pub fn options(&self) -> Vec<ZoneOption> {
        self.resolver.catalog().zones().iter()
            .filter_map(|z| {
                let price = self.prices.price(z.backend_zone)?;
                Some(ZoneOption { key: z.key.clone(), label: z.display_name.clone(), backend_zone: z.backend_zone, price })
            })
            .collect()
    }

    pub fn selected_key(&self) -> Option<&str> { self.selected.as_deref() }

    pub fn selected_zone(&self) -> Option<&Zone> {
        self.selected.as_deref().and_then(|k| self.resolver.catalog().get(k))
    }

    pub fn selected_backend_zone(&self) -> Option<BackendZone> { self.selected_zone().map(|z| z.backend_zone) }

    /// Select by visual key. Returns the resolved backend zone, or `None` when read-only.
    pub fn select_zone(&mut self, key: &str) -> Result<Option<BackendZone>> {
        if self.read_only { return Ok(None); }
        let zone = self.resolver.catalog().get(key).ok_or_else(|| StorefrontError::InvalidZoneKind(key.to_string()))?;
        let (zone_key, backend_zone) = (zone.key.clone(), zone.backend_zone);
        if !self.prices.contains(backend_zone) {
            return Err(StorefrontError::ZoneUnavailable(zone_key));
        }
        tracing::debug!(zone = %zone_key, backend_zone = %backend_zone, "zone selected");
        self.selected = Some(zone_key.clone());
        self.emit(ZoneEvent::Selected { zone_key, backend_zone });
        Ok(Some(backend_zone))
    }

    /// Map click. Points outside every polygon leave the selection untouched.
    pub fn click(&mut self, point: LatLng) -> Result<Option<BackendZone>> {
        if self.read_only { return Ok(None); }
        match self.resolver.catalog().zone_at(point) {
            Some(zone) => {
                let key = zone.key.clone();
                self.select_zone(&key)
            }
            None => Ok(None),
        }
    }

    pub fn describe_at(&self, point: LatLng) -> Option<ZonePopup> {
        let zone = self.resolver.catalog().zone_at(point)?;
        Some(ZonePopup {
            key: zone.key.clone(),
            display_name: zone.display_name.clone(),
            color: zone.color.clone(),
            price: self.prices.price(zone.backend_zone),
        })
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.selected.take() {
            self.emit(ZoneEvent::Cleared { previous, reason: ZoneClearReason::Reset });
        }
    }

    /// Swap in a refreshed price table. A selection whose zone disappeared is
    /// reset and reported as `ZoneUnavailable`.
    pub fn update_price_table(&mut self, prices: PriceTable) -> Result<()> {
        self.prices = prices;
        let Some(backend_zone) = self.selected_backend_zone() else { return Ok(()) };
        if self.prices.contains(backend_zone) { return Ok(()); }
        let previous = self.selected.take().unwrap_or_default();
        tracing::warn!(zone = %previous, "selected zone no longer offered; selection reset");
        self.emit(ZoneEvent::Cleared { previous: previous.clone(), reason: ZoneClearReason::Unavailable });
        Err(StorefrontError::ZoneUnavailable(previous))
    }

    /// Cost of the current selection, `None` when nothing is selected.
    pub fn quote(&self, eval: &FreeShippingEvaluation) -> Result<Option<Money>> {
        self.selected_backend_zone()
            .map(|zone| self.resolver.resolve(zone, &self.prices, eval))
            .transpose()
    }

    pub fn shipping_selection(&self, eval: &FreeShippingEvaluation, address: Option<AddressRecord>) -> Result<ShippingSelection> {
        let zone = self.selected_backend_zone().ok_or_else(|| StorefrontError::InvalidShipping("no zone selected".into()))?;
        let cost = self.resolver.resolve(zone, &self.prices, eval)?;
        let address = if zone == BackendZone::Pickup { None } else { address };
        Ok(ShippingSelection { zone, cost, address })
    }
}
