//! Delivery zones, free-shipping policy and shipping cost.
pub mod free_shipping;
pub mod pricing;
pub mod selection;
pub mod zones;

pub use free_shipping::{FreeShippingEvaluation, FreeShippingPolicy, FreeShippingRule};
pub use pricing::{PriceTable, ShippingPriceResolver, ZonePrice};
pub use selection::{ShippingSelection, ZoneOption, ZonePopup, ZoneSelection};
pub use zones::{BackendZone, Zone, ZoneCatalog};
