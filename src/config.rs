//! Runtime configuration
//!
//! Values come from the process environment, with `.env` loaded first when present.

use anyhow::{bail, Context};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::shipping::{FreeShippingPolicy, FreeShippingRule};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PENDING_PAYMENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_PICKUP_ADDRESS: &str = "Retiro en el local";

#[derive(Debug, Clone, PartialEq)]
pub struct StorefrontConfig {
    pub api_base_url: String,
    /// Upper bound for every backend call.
    pub request_timeout: Duration,
    /// Upper bound for the payment-preference call of a gateway checkout.
    pub payment_timeout: Duration,
    pub pending_payment_path: PathBuf,
    /// Pending records older than this are treated as abandoned on return.
    pub pending_payment_ttl: Duration,
    pub free_shipping: FreeShippingPolicy,
    /// Used when the shipping settings carry no pickup address.
    pub pickup_address: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            pending_payment_path: PathBuf::from("pending_payment.json"),
            pending_payment_ttl: DEFAULT_PENDING_PAYMENT_TTL,
            free_shipping: FreeShippingPolicy::default(),
            pickup_address: DEFAULT_PICKUP_ADDRESS.into(),
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `STOREFRONT_API_URL` is required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let api_base_url = lookup("STOREFRONT_API_URL").context("STOREFRONT_API_URL is not set")?;
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            bail!("STOREFRONT_API_URL must be an http(s) URL, got {api_base_url:?}");
        }
        let secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            Ok(parse::<u64>(&lookup, key)?.map(Duration::from_secs).unwrap_or(default))
        };
        let pending_payment_ttl = match parse::<u64>(&lookup, "STOREFRONT_PENDING_PAYMENT_TTL_HOURS")? {
            Some(hours) => hours.checked_mul(3600).map(Duration::from_secs)
                .with_context(|| format!("STOREFRONT_PENDING_PAYMENT_TTL_HOURS is out of range: {hours}"))?,
            None => defaults.pending_payment_ttl,
        };
        let free_shipping = FreeShippingPolicy {
            min_items: parse(&lookup, "STOREFRONT_FREE_SHIPPING_MIN_ITEMS")?.unwrap_or(defaults.free_shipping.min_items),
            combo_qualifies: parse(&lookup, "STOREFRONT_FREE_SHIPPING_COMBO_QUALIFIES")?.unwrap_or(defaults.free_shipping.combo_qualifies),
        };
        Ok(Self {
            api_base_url,
            request_timeout: secs("STOREFRONT_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            payment_timeout: secs("STOREFRONT_PAYMENT_TIMEOUT_SECS", defaults.payment_timeout)?,
            pending_payment_path: lookup("STOREFRONT_PENDING_PAYMENT_PATH").map(PathBuf::from).unwrap_or(defaults.pending_payment_path),
            pending_payment_ttl,
            free_shipping,
            pickup_address: lookup("STOREFRONT_PICKUP_ADDRESS").unwrap_or(defaults.pickup_address),
        })
    }
}

impl From<&StorefrontConfig> for FreeShippingRule {
    fn from(config: &StorefrontConfig) -> Self { FreeShippingRule::new(config.free_shipping) }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("{key} has an invalid value: {raw:?}")))
        .transpose()
}
