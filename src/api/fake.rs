//! In-memory backend for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;
use crate::api::{OrderReceipt, PaymentPreference, StorefrontApi};
use crate::domain::aggregates::{
    Cart, CartLine, CatalogFilter, Combo, ComboChild, Order, OrderDraft, OrderId, OrderStatus, PaymentStatus, Product,
    TransferInstructions,
};
use crate::domain::value_objects::{Money, ProductId};
use crate::shipping::{BackendZone, PriceTable, ZonePrice};
use crate::{Result, StorefrontError};

#[derive(Clone)]
enum Entry { Product(Product), Combo(Combo) }

#[derive(Default)]
struct State {
    catalog: HashMap<ProductId, Entry>,
    cart: Vec<(ProductId, u32)>,
    orders: Vec<Order>,
    orders_by_key: HashMap<Uuid, OrderId>,
    calls: Vec<String>,
    cart_delays: VecDeque<Duration>,
    fail_next: Option<StorefrontError>,
    omit_order_id: bool,
    preference_delay: Option<Duration>,
    init_point: Option<String>,
    last_draft: Option<OrderDraft>,
    inflight: HashMap<ProductId, u32>,
    max_inflight: u32,
}

pub(crate) struct FakeBackend {
    state: Mutex<State>,
}

pub(crate) fn pid(s: &str) -> ProductId { ProductId::new(s).unwrap() }

impl FakeBackend {
    pub fn new() -> Self {
        let state = State { init_point: Some("https://pay.example/checkout?pref=1".into()), ..Default::default() };
        Self { state: Mutex::new(state) }
    }

    pub fn with_product(self, id: &str, price: i64, stock: u32) -> Self {
        let product = Product {
            id: pid(id), name: format!("Producto {id}"), description: None, category: None,
            price: Money::from_units(price), stock, is_active: true, image_url: None,
        };
        self.state.lock().unwrap().catalog.insert(pid(id), Entry::Product(product));
        self
    }

    pub fn with_combo(self, id: &str, price: i64) -> Self {
        let combo = Combo {
            id: pid(id), name: format!("Combo {id}"), description: None, price: Money::from_units(price),
            items: vec![ComboChild { name: "Fernet".into(), quantity: 1 }], is_active: true, image_url: None,
        };
        self.state.lock().unwrap().catalog.insert(pid(id), Entry::Combo(combo));
        self
    }

    pub fn with_cart_line(self, id: &str, quantity: u32) -> Self {
        self.state.lock().unwrap().cart.push((pid(id), quantity));
        self
    }

    pub fn deactivate(&self, id: &str) {
        if let Some(Entry::Product(p)) = self.state.lock().unwrap().catalog.get_mut(&pid(id)) { p.is_active = false; }
    }

    /// Delays handed out, in arrival order, to the next cart mutations.
    pub fn delay_cart_calls(&self, delays: impl IntoIterator<Item = Duration>) {
        self.state.lock().unwrap().cart_delays.extend(delays);
    }

    pub fn fail_next(&self, err: StorefrontError) { self.state.lock().unwrap().fail_next = Some(err); }
    pub fn omit_order_id(&self) { self.state.lock().unwrap().omit_order_id = true; }
    pub fn delay_preference(&self, delay: Duration) { self.state.lock().unwrap().preference_delay = Some(delay); }
    pub fn set_init_point(&self, url: Option<&str>) { self.state.lock().unwrap().init_point = url.map(String::from); }

    pub fn calls(&self) -> Vec<String> { self.state.lock().unwrap().calls.clone() }
    pub fn last_draft(&self) -> Option<OrderDraft> { self.state.lock().unwrap().last_draft.clone() }
    pub fn order_count(&self) -> usize { self.state.lock().unwrap().orders.len() }
    pub fn max_inflight(&self) -> u32 { self.state.lock().unwrap().max_inflight }
    pub fn server_quantity(&self, id: &str) -> Option<u32> {
        self.state.lock().unwrap().cart.iter().find(|(p, _)| p == &pid(id)).map(|(_, q)| *q)
    }

    fn record(&self, call: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.fail_next.take() { Some(err) => Err(err), None => Ok(()) }
    }

    fn snapshot(state: &State) -> Cart {
        let lines = state.cart.iter().filter_map(|(id, qty)| {
            let line = match state.catalog.get(id)? {
                Entry::Product(p) => CartLine::product(p.id.clone(), *qty, p.price, Some(p.stock)).with_name(&p.name),
                Entry::Combo(c) => CartLine::combo(c.id.clone(), *qty, c.price, c.items.clone()).with_name(&c.name),
            };
            let active = match state.catalog.get(id)? { Entry::Product(p) => p.is_active, Entry::Combo(c) => c.is_active };
            Some(CartLine { active, ..line })
        });
        Cart::from_lines(lines)
    }

    /// Applies a cart mutation, then waits out any configured latency before answering.
    /// The snapshot is taken before the wait, like a server that responds late.
    async fn mutate_cart(&self, id: &ProductId, call: String, apply: impl FnOnce(&mut State) -> Result<()>) -> Result<Cart> {
        self.record(call)?;
        let (snapshot, delay) = {
            let mut state = self.state.lock().unwrap();
            apply(&mut state)?;
            let inflight = state.inflight.entry(id.clone()).or_default();
            *inflight += 1;
            let now = *inflight;
            state.max_inflight = state.max_inflight.max(now);
            (Self::snapshot(&state), state.cart_delays.pop_front())
        };
        if let Some(delay) = delay { tokio::time::sleep(delay).await; }
        if let Some(n) = self.state.lock().unwrap().inflight.get_mut(id) { *n -= 1; }
        Ok(snapshot)
    }

    fn stock_of(state: &State, id: &ProductId) -> Result<Option<u32>> {
        match state.catalog.get(id) {
            Some(Entry::Product(p)) => Ok(Some(p.stock)),
            Some(Entry::Combo(_)) => Ok(None),
            None => Err(StorefrontError::NotFound),
        }
    }

    fn check_stock(requested: u32, stock: Option<u32>) -> Result<()> {
        match stock {
            Some(available) if requested > available => Err(StorefrontError::BackendValidationError {
                status: 400, detail: Some(format!("Stock insuficiente. Disponible: {available}")),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorefrontApi for FakeBackend {
    async fn fetch_cart(&self) -> Result<Cart> {
        self.record("fetch_cart".into())?;
        Ok(Self::snapshot(&self.state.lock().unwrap()))
    }

    async fn add_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<Cart> {
        let id = product_id.clone();
        self.mutate_cart(product_id, format!("add {product_id} {quantity}"), move |state| {
            let stock = Self::stock_of(state, &id)?;
            match state.cart.iter_mut().find(|(p, _)| p == &id) {
                Some((_, q)) => { Self::check_stock(*q + quantity, stock)?; *q += quantity; }
                None => { Self::check_stock(quantity, stock)?; state.cart.push((id, quantity)); }
            }
            Ok(())
        }).await
    }

    async fn update_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<Cart> {
        let id = product_id.clone();
        self.mutate_cart(product_id, format!("update {product_id} {quantity}"), move |state| {
            Self::check_stock(quantity, Self::stock_of(state, &id)?)?;
            let line = state.cart.iter_mut().find(|(p, _)| p == &id).ok_or(StorefrontError::NotFound)?;
            line.1 = quantity;
            Ok(())
        }).await
    }

    async fn remove_cart_item(&self, product_id: &ProductId) -> Result<Cart> {
        let id = product_id.clone();
        self.mutate_cart(product_id, format!("remove {product_id}"), move |state| {
            state.cart.retain(|(p, _)| p != &id);
            Ok(())
        }).await
    }

    async fn clear_cart(&self) -> Result<Cart> {
        self.record("clear".into())?;
        let mut state = self.state.lock().unwrap();
        state.cart.clear();
        Ok(Self::snapshot(&state))
    }

    async fn list_products(&self, filter: &CatalogFilter) -> Result<Vec<Product>> {
        self.record("list_products".into())?;
        let state = self.state.lock().unwrap();
        Ok(state.catalog.values()
            .filter_map(|e| match e { Entry::Product(p) => Some(p.clone()), Entry::Combo(_) => None })
            .filter(|p| filter.active.map_or(true, |a| p.is_active == a))
            .filter(|p| filter.in_stock.map_or(true, |s| p.is_in_stock() == s))
            .collect())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product> {
        self.record(format!("get_product {id}"))?;
        match self.state.lock().unwrap().catalog.get(id) {
            Some(Entry::Product(p)) => Ok(p.clone()),
            _ => Err(StorefrontError::NotFound),
        }
    }

    async fn list_combos(&self, _filter: &CatalogFilter) -> Result<Vec<Combo>> {
        self.record("list_combos".into())?;
        let state = self.state.lock().unwrap();
        Ok(state.catalog.values().filter_map(|e| match e { Entry::Combo(c) => Some(c.clone()), Entry::Product(_) => None }).collect())
    }

    async fn get_combo(&self, id: &ProductId) -> Result<Combo> {
        self.record(format!("get_combo {id}"))?;
        match self.state.lock().unwrap().catalog.get(id) {
            Some(Entry::Combo(c)) => Ok(c.clone()),
            _ => Err(StorefrontError::NotFound),
        }
    }

    async fn create_order(&self, draft: &OrderDraft, idempotency_key: Uuid) -> Result<OrderReceipt> {
        self.record(format!("create_order {}", draft.items.len()))?;
        let mut state = self.state.lock().unwrap();
        state.last_draft = Some(draft.clone());
        if state.omit_order_id { return Ok(OrderReceipt { order_id: None, total: None }); }
        if let Some(existing) = state.orders_by_key.get(&idempotency_key) {
            return Ok(OrderReceipt { order_id: Some(existing.clone()), total: None });
        }
        let id = OrderId::from_backend(format!("order-{}", state.orders.len() + 1)).unwrap();
        state.orders.push(Order {
            id: id.clone(), status: OrderStatus::Pending, payment_status: PaymentStatus::Pending,
            payment_method: draft.payment_method, items: vec![], shipping_cost: Money::ZERO, total: Money::ZERO, created_at: None,
        });
        state.orders_by_key.insert(idempotency_key, id.clone());
        Ok(OrderReceipt { order_id: Some(id), total: None })
    }

    async fn my_orders(&self) -> Result<Vec<Order>> {
        self.record("my_orders".into())?;
        Ok(self.state.lock().unwrap().orders.clone())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Order> {
        self.record(format!("get_order {id}"))?;
        self.state.lock().unwrap().orders.iter().find(|o| &o.id == id).cloned().ok_or(StorefrontError::NotFound)
    }

    async fn create_payment_preference(&self, order_id: &OrderId) -> Result<PaymentPreference> {
        self.record(format!("preference {order_id}"))?;
        let (delay, init_point) = {
            let state = self.state.lock().unwrap();
            (state.preference_delay, state.init_point.clone())
        };
        if let Some(delay) = delay { tokio::time::sleep(delay).await; }
        Ok(PaymentPreference { init_point, preference_id: Some(format!("pref-{order_id}")) })
    }

    async fn shipping_prices(&self) -> Result<PriceTable> {
        self.record("shipping_prices".into())?;
        Ok(PriceTable::from_entries([
            (BackendZone::Central, ZonePrice::new(Money::from_units(500))),
            (BackendZone::Remote, ZonePrice::new(Money::from_units(1000))),
            (BackendZone::Pickup, ZonePrice::new(Money::ZERO).with_address("Av. Rivadavia 5000")),
        ]))
    }

    async fn payment_settings(&self) -> Result<TransferInstructions> {
        self.record("payment_settings".into())?;
        Ok(TransferInstructions { transfer_alias: "bodega.norte.mp".into(), contact_channel: Some("+54 9 11 5555 4444".into()) })
    }
}
