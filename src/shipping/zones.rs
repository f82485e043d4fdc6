//! Delivery zone catalog
//!
//! Visual zones are what the map and dropdown show. Each one maps to exactly one
//! backend zone key, which is the only thing pricing and orders ever see.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::domain::value_objects::{LatLng, Money};
use crate::shipping::pricing::PriceTable;
use crate::{Result, StorefrontError};

/// Zone key understood by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendZone { Central, Remote, Pickup }

impl BackendZone {
    pub const ALL: [BackendZone; 3] = [BackendZone::Central, BackendZone::Remote, BackendZone::Pickup];

    pub fn as_str(&self) -> &'static str {
        match self { Self::Central => "central", Self::Remote => "remote", Self::Pickup => "pickup" }
    }

    /// Price used when the backend table has no entry for the zone.
    /// Central has none: an unpriced central zone is unavailable.
    pub fn fallback_price(&self) -> Option<Money> {
        match self {
            Self::Central => None,
            Self::Remote => Some(Money::from_units(1000)),
            Self::Pickup => Some(Money::ZERO),
        }
    }
}

impl fmt::Display for BackendZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for BackendZone {
    type Err = StorefrontError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "central" => Ok(Self::Central),
            "remote" => Ok(Self::Remote),
            "pickup" => Ok(Self::Pickup),
            other => Err(StorefrontError::InvalidZoneKind(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub key: String,
    pub display_name: String,
    pub backend_zone: BackendZone,
    pub polygon: Option<Vec<LatLng>>,
    pub color: String,
}

impl Zone {
    pub fn new(key: &str, display_name: &str, backend_zone: BackendZone, polygon: Option<Vec<LatLng>>, color: &str) -> Self {
        Self { key: key.into(), display_name: display_name.into(), backend_zone, polygon, color: color.into() }
    }

    pub fn contains(&self, point: LatLng) -> bool {
        self.polygon.as_deref().is_some_and(|ring| point_in_polygon(point, ring))
    }
}

/// Even-odd ray casting. Points exactly on an edge may fall either way.
pub fn point_in_polygon(point: LatLng, ring: &[LatLng]) -> bool {
    if ring.len() < 3 { return false; }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let lng_at = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if point.lng < lng_at { inside = !inside; }
        }
        j = i;
    }
    inside
}

#[derive(Clone, Debug)]
pub struct ZoneCatalog {
    zones: Vec<Zone>,
}

impl ZoneCatalog {
    /// Catalog from explicit zones. Keys are matched case-insensitively, so they are stored lowercased.
    pub fn new(zones: Vec<Zone>) -> Self {
        let zones = zones.into_iter().map(|mut z| { z.key = z.key.trim().to_ascii_lowercase(); z }).collect();
        Self { zones }
    }

    /// Service area: a central core ringed by four compass sectors billed as remote,
    /// the remote zone itself for dropdown use, and store pickup.
    pub fn standard() -> Self {
        // Central core and outer delivery boundary, (lat, lng).
        let (cn, cs, cw, ce) = (-34.580, -34.625, -58.445, -58.365);
        let (on, os, ow, oe) = (-34.520, -34.690, -58.530, -58.300);
        let p = LatLng::new;
        Self::new(vec![
            Zone::new("central", "Zona Céntrica", BackendZone::Central,
                Some(vec![p(cn, cw), p(cn, ce), p(cs, ce), p(cs, cw)]), "#2e7d32"),
            Zone::new("norte", "Zona Norte", BackendZone::Remote,
                Some(vec![p(on, ow), p(on, oe), p(cn, ce), p(cn, cw)]), "#f9a825"),
            Zone::new("este", "Zona Este", BackendZone::Remote,
                Some(vec![p(cn, ce), p(on, oe), p(os, oe), p(cs, ce)]), "#ef6c00"),
            Zone::new("sur", "Zona Sur", BackendZone::Remote,
                Some(vec![p(cs, cw), p(cs, ce), p(os, oe), p(os, ow)]), "#c62828"),
            Zone::new("oeste", "Zona Oeste", BackendZone::Remote,
                Some(vec![p(on, ow), p(cn, cw), p(cs, cw), p(os, ow)]), "#6a1b9a"),
            Zone::new("remote", "Zona Alejada", BackendZone::Remote, None, "#ef6c00"),
            Zone::new("pickup", "Retiro en el local", BackendZone::Pickup, None, "#1565c0"),
        ])
    }

    pub fn zones(&self) -> &[Zone] { &self.zones }

    pub fn get(&self, key: &str) -> Option<&Zone> {
        let key = key.trim().to_ascii_lowercase();
        self.zones.iter().find(|z| z.key == key)
    }

    pub fn resolve_backend_zone(&self, visual_key: &str) -> Result<BackendZone> {
        self.get(visual_key)
            .map(|z| z.backend_zone)
            .ok_or_else(|| StorefrontError::InvalidZoneKind(visual_key.to_string()))
    }

    /// Table price for the zone, or its documented fallback.
    pub fn price_for(&self, zone: BackendZone, table: &PriceTable) -> Result<Money> {
        table.price(zone)
            .or_else(|| zone.fallback_price())
            .ok_or_else(|| StorefrontError::ZoneUnavailable(zone.to_string()))
    }

    /// Zone whose polygon contains the point. Central wins over the sectors
    /// around it when a point sits on their shared edge.
    pub fn zone_at(&self, point: LatLng) -> Option<&Zone> {
        self.zones.iter()
            .filter(|z| z.contains(point))
            .min_by_key(|z| z.backend_zone != BackendZone::Central)
    }
}

impl Default for ZoneCatalog {
    fn default() -> Self { Self::standard() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shipping::pricing::ZonePrice;

    #[test]
    fn test_compass_zones_collapse_to_remote() {
        let catalog = ZoneCatalog::standard();
        for key in ["norte", "sur", "este", "oeste", "remote"] {
            assert_eq!(catalog.resolve_backend_zone(key).unwrap(), BackendZone::Remote, "{key}");
        }
        assert_eq!(catalog.resolve_backend_zone(" Central ").unwrap(), BackendZone::Central);
        assert_eq!(catalog.resolve_backend_zone("pickup").unwrap(), BackendZone::Pickup);
    }

    #[test]
    fn test_unknown_zone_is_invalid() {
        let catalog = ZoneCatalog::standard();
        assert_eq!(catalog.resolve_backend_zone("noreste"), Err(StorefrontError::InvalidZoneKind("noreste".into())));
    }

    #[test]
    fn test_price_for_uses_table_then_fallback() {
        let catalog = ZoneCatalog::standard();
        let table = PriceTable::from_entries([(BackendZone::Central, ZonePrice::new(Money::from_units(500)))]);
        assert_eq!(catalog.price_for(BackendZone::Central, &table), Ok(Money::from_units(500)));
        assert_eq!(catalog.price_for(BackendZone::Remote, &table), Ok(Money::from_units(1000)));
        assert_eq!(catalog.price_for(BackendZone::Pickup, &table), Ok(Money::ZERO));
        assert_eq!(catalog.price_for(BackendZone::Central, &PriceTable::default()), Err(StorefrontError::ZoneUnavailable("central".into())));
    }

    #[test]
    fn test_zone_at() {
        let catalog = ZoneCatalog::standard();
        assert_eq!(catalog.zone_at(LatLng::new(-34.600, -58.400)).unwrap().key, "central");
        assert_eq!(catalog.zone_at(LatLng::new(-34.540, -58.400)).unwrap().key, "norte");
        assert_eq!(catalog.zone_at(LatLng::new(-34.670, -58.400)).unwrap().key, "sur");
        assert_eq!(catalog.zone_at(LatLng::new(-34.600, -58.320)).unwrap().key, "este");
        assert_eq!(catalog.zone_at(LatLng::new(-34.600, -58.500)).unwrap().key, "oeste");
        assert!(catalog.zone_at(LatLng::new(-34.900, -58.400)).is_none());
    }

    #[test]
    fn test_degenerate_polygon() {
        assert!(!point_in_polygon(LatLng::new(0.0, 0.0), &[LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)]));
    }
}
