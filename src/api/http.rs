//! reqwest-backed implementation of [`StorefrontApi`]

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use uuid::Uuid;
use crate::api::payload::{self, CreateOrderBody, OrderReceipt, PaymentPreference, RawCart, RawCombo, RawOrder, RawPaymentSettings, RawProduct, RawZonePrice};
use crate::api::StorefrontApi;
use crate::config::StorefrontConfig;
use crate::domain::aggregates::{Cart, CatalogFilter, Combo, Order, OrderDraft, OrderId, Product, TransferInstructions};
use crate::domain::value_objects::ProductId;
use crate::shipping::PriceTable;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug)]
pub struct HttpStorefrontApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStorefrontApi {
    /// Client bound to `config.api_base_url`. Every request carries the bearer token
    /// when one is given and is cut off after `config.request_timeout`.
    pub fn new(config: &StorefrontConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StorefrontError::NetworkUnavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, base_url: config.api_base_url.trim_end_matches('/').to_string(), token })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "backend request");
        let request = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<serde_json::Value>().await.unwrap_or(serde_json::Value::Null);
            let err = status_error(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), error = %err, "backend request failed");
            return Err(err);
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        // 204 and empty 200 bodies decode as an empty document.
        let result = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(serde_json::Value::Object(Default::default()))
        } else {
            serde_json::from_slice(&bytes)
        };
        result.map_err(|e| StorefrontError::Decode(e.to_string()))
    }

    async fn cart(&self, request: RequestBuilder) -> Result<Cart> {
        Ok(self.send::<RawCart>(request).await?.into_domain())
    }
}

/// Maps a non-success status and its body to the error taxonomy.
pub fn status_error(status: u16, body: &serde_json::Value) -> StorefrontError {
    match status {
        404 => match payload::error_detail(body) {
            Some(detail) => StorefrontError::BackendValidationError { status, detail: Some(detail) },
            None => StorefrontError::NotFound,
        },
        400..=499 => StorefrontError::BackendValidationError { status, detail: payload::error_detail(body) },
        _ => StorefrontError::BackendServerError { status },
    }
}

fn transport_error(e: reqwest::Error) -> StorefrontError {
    if e.is_timeout() {
        StorefrontError::RequestTimeout
    } else if e.is_decode() {
        StorefrontError::Decode(e.to_string())
    } else {
        StorefrontError::NetworkUnavailable(e.to_string())
    }
}

fn keep_valid<R, T>(raw: Vec<R>, what: &str, convert: impl Fn(R) -> Result<T>) -> Vec<T> {
    raw.into_iter()
        .filter_map(|r| match convert(r) {
            Ok(v) => Some(v),
            Err(e) => { tracing::warn!(error = %e, "skipping malformed {what}"); None }
        })
        .collect()
}

#[async_trait]
impl StorefrontApi for HttpStorefrontApi {
    async fn fetch_cart(&self) -> Result<Cart> {
        self.cart(self.request(Method::GET, "/cart/")).await
    }

    async fn add_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<Cart> {
        let body = serde_json::json!({ "product_id": product_id, "quantity": quantity });
        self.cart(self.request(Method::POST, "/cart/items").json(&body)).await
    }

    async fn update_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<Cart> {
        let body = serde_json::json!({ "quantity": quantity });
        self.cart(self.request(Method::PUT, &format!("/cart/items/{product_id}")).json(&body)).await
    }

    async fn remove_cart_item(&self, product_id: &ProductId) -> Result<Cart> {
        self.cart(self.request(Method::DELETE, &format!("/cart/items/{product_id}"))).await
    }

    async fn clear_cart(&self) -> Result<Cart> {
        self.cart(self.request(Method::DELETE, "/cart/")).await
    }

    async fn list_products(&self, filter: &CatalogFilter) -> Result<Vec<Product>> {
        let raw: Vec<RawProduct> = self.send(self.request(Method::GET, "/products/").query(&filter.query_pairs())).await?;
        Ok(keep_valid(raw, "product", RawProduct::into_domain))
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product> {
        self.send::<RawProduct>(self.request(Method::GET, &format!("/products/{id}"))).await?.into_domain()
    }

    async fn list_combos(&self, filter: &CatalogFilter) -> Result<Vec<Combo>> {
        let raw: Vec<RawCombo> = self.send(self.request(Method::GET, "/combos/").query(&filter.query_pairs())).await?;
        Ok(keep_valid(raw, "combo", RawCombo::into_domain))
    }

    async fn get_combo(&self, id: &ProductId) -> Result<Combo> {
        self.send::<RawCombo>(self.request(Method::GET, &format!("/combos/{id}"))).await?.into_domain()
    }

    async fn create_order(&self, draft: &OrderDraft, idempotency_key: Uuid) -> Result<OrderReceipt> {
        let mut request = self.request(Method::POST, "/orders/")
            .header("Idempotency-Key", idempotency_key.to_string())
            .json(&CreateOrderBody::from(draft));
        if let Some(method) = draft.payment_method {
            request = request.query(&[("payment_method", method.as_query())]);
        }
        Ok(self.send::<RawOrder>(request).await?.into())
    }

    async fn my_orders(&self) -> Result<Vec<Order>> {
        let raw: Vec<RawOrder> = self.send(self.request(Method::GET, "/orders/me")).await?;
        Ok(keep_valid(raw, "order", RawOrder::into_domain))
    }

    async fn get_order(&self, id: &OrderId) -> Result<Order> {
        self.send::<RawOrder>(self.request(Method::GET, &format!("/orders/{id}"))).await?.into_domain()
    }

    async fn create_payment_preference(&self, order_id: &OrderId) -> Result<PaymentPreference> {
        self.send(self.request(Method::POST, &format!("/payments/create-preference/{order_id}"))).await
    }

    async fn shipping_prices(&self) -> Result<PriceTable> {
        let raw: BTreeMap<String, RawZonePrice> = self.send(self.request(Method::GET, "/settings/shipping")).await?;
        Ok(payload::price_table(raw))
    }

    async fn payment_settings(&self) -> Result<TransferInstructions> {
        self.send::<RawPaymentSettings>(self.request(Method::GET, "/settings/payment")).await?.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error_mapping() {
        assert_eq!(status_error(400, &json!({"detail": "Stock insuficiente"})),
            StorefrontError::BackendValidationError { status: 400, detail: Some("Stock insuficiente".into()) });
        assert_eq!(status_error(422, &serde_json::Value::Null), StorefrontError::BackendValidationError { status: 422, detail: None });
        assert_eq!(status_error(404, &json!({})), StorefrontError::NotFound);
        assert_eq!(status_error(404, &json!({"detail": "Pedido no encontrado"})),
            StorefrontError::BackendValidationError { status: 404, detail: Some("Pedido no encontrado".into()) });
        assert_eq!(status_error(503, &json!({"detail": "down"})), StorefrontError::BackendServerError { status: 503 });
    }
}
