//! In-process store used for demo mode and tests.
//!
//! Behaves like the hosted backend, including stock checks, and can be told
//! to fail a specific step once so recovery paths can be exercised.

use chrono::Utc;
use pratas_common::order::{
    Customer, CustomerId, NewCustomer, NewOrder, NewOrderItem, NewShippingEvent, Order, OrderId,
    OrderItem, OrderStatus, ShippingEvent,
};
use pratas_common::product::{Product, ProductCategory, ProductDraft, ProductId};
use pratas_common::quote::ShippingSettings;
use tokio::sync::{Mutex, MutexGuard};

use crate::adapters::{Catalog, OrderStore, ProductFilter, SettingsStore};
use crate::error::StoreError;

/// A store operation that can be made to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailPoint {
    CreateCustomer,
    CreateOrder,
    CreateOrderItems,
    DecrementStock(ProductId),
    DeleteOrder,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    products: Vec<Product>,
    customers: Vec<Customer>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    events: Vec<ShippingEvent>,
    settings: Option<ShippingSettings>,
    failures: Vec<FailPoint>,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn trip(&mut self, point: FailPoint) -> Result<(), StoreError> {
        match self.failures.iter().position(|f| *f == point) {
            Some(index) => {
                self.failures.remove(index);
                Err(StoreError::Unavailable(format!("{point:?}")))
            }
            None => Ok(()),
        }
    }

    fn product_mut(&mut self, id: &ProductId) -> Result<&mut Product, StoreError> {
        self.products
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))
    }

    fn order_mut(&mut self, id: &OrderId) -> Result<&mut Order, StoreError> {
        self.orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// Yield to the scheduler before every call, like a network hop would.
    interleave: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                products,
                ..MemoryState::default()
            }),
            interleave: false,
        }
    }

    /// Let concurrent callers interleave between store calls.
    pub fn interleaved(mut self) -> Self {
        self.interleave = true;
        self
    }

    async fn lock(&self) -> MutexGuard<'_, MemoryState> {
        if self.interleave {
            tokio::task::yield_now().await;
        }
        self.state.lock().await
    }

    /// A small catalog so the API is usable without a backend.
    pub fn demo() -> Self {
        let piece = |id: &str, name: &str, price: u64, stock: u32, category, featured| Product {
            id: ProductId(id.to_string()),
            name: name.to_string(),
            description: String::new(),
            price,
            stock,
            weight: Some(0.05),
            height: Some(3.0),
            width: Some(3.0),
            length: Some(5.0),
            image_url: String::new(),
            images: Vec::new(),
            category,
            is_featured: featured,
            created_at: Some(Utc::now()),
        };
        Self::with_products(vec![
            piece("demo-ring", "Anel Solitário Prata 925", 15990, 8, ProductCategory::Rings, true),
            piece("demo-necklace", "Colar Veneziana", 21900, 5, ProductCategory::Necklaces, true),
            piece("demo-earrings", "Brinco Argola", 8990, 12, ProductCategory::Earrings, false),
            piece("demo-bracelet", "Pulseira Cartier", 18500, 0, ProductCategory::Bracelets, false),
        ])
    }

    /// Make the next call matching `point` fail.
    pub async fn fail_once(&self, point: FailPoint) {
        self.state.lock().await.failures.push(point);
    }

    pub async fn stock_of(&self, id: &ProductId) -> Option<u32> {
        let state = self.state.lock().await;
        state.products.iter().find(|p| &p.id == id).map(|p| p.stock)
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn customer_count(&self) -> usize {
        self.state.lock().await.customers.len()
    }
}

impl Catalog for MemoryStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let state = self.lock().await;
        Ok(state
            .products
            .iter()
            .rev()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, StoreError> {
        let mut state = self.lock().await;
        state.product_mut(id).map(|p| p.clone())
    }

    async fn create_product(&self, draft: ProductDraft) -> Result<Product, StoreError> {
        let mut state = self.lock().await;
        let id = ProductId(state.next_id("prd"));
        let product = draft.into_product(id, Some(Utc::now()));
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: &ProductId, draft: ProductDraft) -> Result<Product, StoreError> {
        let mut state = self.lock().await;
        let product = state.product_mut(id)?;
        *product = draft.into_product(id.clone(), product.created_at);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: &ProductId) -> Result<(), StoreError> {
        let mut state = self.lock().await;
        let before = state.products.len();
        state.products.retain(|p| &p.id != id);
        if state.products.len() == before {
            return Err(StoreError::NotFound(format!("product {id}")));
        }
        Ok(())
    }
}

impl OrderStore for MemoryStore {
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        let mut state = self.lock().await;
        if let Some(existing) = state
            .customers
            .iter()
            .find(|c| c.email.eq_ignore_ascii_case(&customer.email))
        {
            return Ok(existing.clone());
        }
        state.trip(FailPoint::CreateCustomer)?;
        let record = Customer {
            id: CustomerId(state.next_id("cus")),
            user_id: None,
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
            street: customer.street,
            number: customer.number,
            complement: customer.complement,
            postal_code: customer.postal_code,
            city: customer.city,
            region: customer.region,
            created_at: Some(Utc::now()),
        };
        state.customers.push(record.clone());
        Ok(record)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let state = self.lock().await;
        Ok(state
            .customers
            .iter()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Customer, StoreError> {
        let state = self.lock().await;
        state
            .customers
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("customer {id}")))
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut state = self.lock().await;
        state.trip(FailPoint::CreateOrder)?;
        if state
            .orders
            .iter()
            .any(|o| o.checkout_reference.as_deref() == Some(order.checkout_reference.as_str()))
        {
            return Err(StoreError::Duplicate(format!(
                "order for checkout {}",
                order.checkout_reference
            )));
        }
        let now = Utc::now();
        let record = Order {
            id: OrderId(state.next_id("ord")),
            customer_id: order.customer_id,
            status: order.status,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            installments: order.installments,
            installment_amount: order.installment_amount,
            shipping_cost: order.shipping_cost,
            shipping_carrier: order.shipping_carrier,
            shipping_deadline: order.shipping_deadline,
            postal_code: order.postal_code,
            city: order.city,
            region: order.region,
            tracking_code: None,
            checkout_reference: Some(order.checkout_reference),
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.orders.push(record.clone());
        Ok(record)
    }

    async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError> {
        let mut state = self.lock().await;
        state.order_mut(id).map(|o| o.clone())
    }

    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        let state = self.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.checkout_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn create_order_items(
        &self,
        order: &OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, StoreError> {
        let mut state = self.lock().await;
        state.trip(FailPoint::CreateOrderItems)?;
        state.order_mut(order)?;
        let mut written = Vec::with_capacity(items.len());
        for item in items {
            let mut row = item.for_order(order);
            row.id = Some(state.next_id("itm"));
            written.push(row);
        }
        state.items.extend(written.iter().cloned());
        Ok(written)
    }

    async fn list_order_items(&self, order: &OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let state = self.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|i| &i.order_id == order)
            .cloned()
            .collect())
    }

    async fn delete_order(&self, id: &OrderId) -> Result<(), StoreError> {
        let mut state = self.lock().await;
        state.trip(FailPoint::DeleteOrder)?;
        state.items.retain(|i| &i.order_id != id);
        state.events.retain(|e| &e.order_id != id);
        state.orders.retain(|o| &o.id != id);
        Ok(())
    }

    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<u32, StoreError> {
        let mut state = self.lock().await;
        state.trip(FailPoint::DecrementStock(id.clone()))?;
        let product = state.product_mut(id)?;
        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product: id.clone(),
                available: product.stock,
                requested: quantity,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }

    async fn restore_stock(&self, id: &ProductId, quantity: u32) -> Result<u32, StoreError> {
        let mut state = self.lock().await;
        let product = state.product_mut(id)?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(product.stock)
    }

    async fn list_orders_for_customer(&self, customer: &CustomerId) -> Result<Vec<Order>, StoreError> {
        let state = self.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| &o.customer_id == customer)
            .cloned()
            .collect())
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let state = self.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect())
    }

    async fn update_order_status(&self, id: &OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        let mut state = self.lock().await;
        let order = state.order_mut(id)?;
        order.status = status;
        order.updated_at = Some(Utc::now());
        Ok(order.clone())
    }

    async fn update_tracking_code(&self, id: &OrderId, code: &str) -> Result<Order, StoreError> {
        let mut state = self.lock().await;
        let order = state.order_mut(id)?;
        order.tracking_code = Some(code.to_string());
        order.updated_at = Some(Utc::now());
        Ok(order.clone())
    }

    async fn record_shipping_event(
        &self,
        order: &OrderId,
        event: NewShippingEvent,
    ) -> Result<ShippingEvent, StoreError> {
        let mut state = self.lock().await;
        state.order_mut(order)?;
        let mut event = event.at(order, Utc::now());
        event.id = Some(state.next_id("evt"));
        state.events.push(event.clone());
        Ok(event)
    }

    async fn list_shipping_events(&self, order: &OrderId) -> Result<Vec<ShippingEvent>, StoreError> {
        let state = self.lock().await;
        let mut events: Vec<ShippingEvent> = state
            .events
            .iter()
            .rev()
            .filter(|e| &e.order_id == order)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.status_date.cmp(&a.status_date));
        Ok(events)
    }
}

impl SettingsStore for MemoryStore {
    async fn shipping_settings(&self) -> Result<ShippingSettings, StoreError> {
        Ok(self.lock().await.settings.clone().unwrap_or_default())
    }

    async fn save_shipping_settings(
        &self,
        settings: &ShippingSettings,
    ) -> Result<ShippingSettings, StoreError> {
        let mut state = self.lock().await;
        state.settings = Some(settings.clone());
        Ok(settings.clone())
    }
}
