//! Hosted backend over its PostgREST interface.
//!
//! Every call authenticates with the service key from configuration. Stock
//! changes are compare-and-set updates filtered on the stock value just read,
//! retried a bounded number of times when another checkout got there first.

use std::fmt::Display;

use chrono::Utc;
use pratas_common::order::{
    Customer, CustomerId, NewCustomer, NewOrder, NewOrderItem, NewShippingEvent, Order, OrderId,
    OrderItem, OrderStatus, ShippingEvent,
};
use pratas_common::product::{Product, ProductDraft, ProductId};
use pratas_common::quote::ShippingSettings;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::adapters::{Catalog, OrderStore, ProductFilter, SettingsStore};
use crate::error::StoreError;

const PRODUCTS: &str = "products";
const CUSTOMERS: &str = "customers";
const ORDERS: &str = "orders";
const ORDER_ITEMS: &str = "order_items";
const SHIPPING_LOGS: &str = "shipping_logs";
const SHIPPING_CONFIG: &str = "shipping_config";

/// Attempts per stock update before giving up with `Conflict`.
const STOCK_RETRIES: usize = 5;

const NEWEST_FIRST: (&str, &str) = ("order", "created_at.desc");

fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

/// The single `shipping_config` row. Credential columns are never read.
#[derive(Deserialize)]
struct ShippingConfigRow {
    id: serde_json::Value,
    #[serde(default)]
    enabled_carriers: Vec<String>,
}

#[derive(Clone)]
pub struct SupabaseStore {
    http: reqwest::Client,
    rest_url: String,
    key: String,
}

impl SupabaseStore {
    pub fn new(http: reqwest::Client, base_url: &str, service_key: impl Into<String>) -> Self {
        Self {
            http,
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            key: service_key.into(),
        }
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, table, "return=representation")
    }

    fn request(&self, method: Method, table: &str, prefer: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", prefer)
    }

    /// Insert unless a row with the same `unique` column exists. Yields the
    /// inserted row, or `None` when the insert was skipped.
    async fn insert_once<T: DeserializeOwned>(
        &self,
        table: &str,
        unique: &str,
        row: &impl serde::Serialize,
    ) -> Result<Option<T>, StoreError> {
        let request = self
            .request(Method::POST, table, "return=representation,resolution=ignore-duplicates")
            .query(&[("on_conflict", unique)])
            .json(row);
        match Self::rows(request).await {
            Ok(rows) => Ok(rows.into_iter().next()),
            Err(StoreError::Status { status: 409, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn first<T: DeserializeOwned>(
        request: RequestBuilder,
        what: impl FnOnce() -> String,
    ) -> Result<T, StoreError> {
        Self::rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(what()))
    }

    async fn order_where(&self, column: &str, value: impl Display) -> Result<Vec<Order>, StoreError> {
        Self::rows(
            self.table(Method::GET, ORDERS)
                .query(&[("select", "*".to_string()), (column, eq(value))])
                .query(&[NEWEST_FIRST]),
        )
        .await
    }

    async fn patch_order(&self, id: &OrderId, body: serde_json::Value) -> Result<Order, StoreError> {
        Self::first(
            self.table(Method::PATCH, ORDERS)
                .query(&[("id", eq(id))])
                .json(&body),
            || format!("order {id}"),
        )
        .await
    }

    /// Set stock to `next` only if it still equals `expected`.
    async fn swap_stock(&self, id: &ProductId, expected: u32, next: u32) -> Result<bool, StoreError> {
        let updated: Vec<Product> = Self::rows(
            self.table(Method::PATCH, PRODUCTS)
                .query(&[("id", eq(id)), ("stock", eq(expected))])
                .json(&json!({ "stock": next })),
        )
        .await?;
        Ok(!updated.is_empty())
    }
}

impl Catalog for SupabaseStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut query = vec![("select", "*".to_string())];
        if let Some(category) = &filter.category {
            query.push(("category", eq(category.as_str())));
        }
        if let Some(featured) = filter.featured {
            query.push(("is_featured", eq(featured)));
        }
        Self::rows(
            self.table(Method::GET, PRODUCTS)
                .query(&query)
                .query(&[NEWEST_FIRST]),
        )
        .await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, StoreError> {
        Self::first(
            self.table(Method::GET, PRODUCTS)
                .query(&[("select", "*".to_string()), ("id", eq(id))]),
            || format!("product {id}"),
        )
        .await
    }

    async fn create_product(&self, draft: ProductDraft) -> Result<Product, StoreError> {
        Self::first(self.table(Method::POST, PRODUCTS).json(&draft), || {
            "created product".to_string()
        })
        .await
    }

    async fn update_product(&self, id: &ProductId, draft: ProductDraft) -> Result<Product, StoreError> {
        Self::first(
            self.table(Method::PATCH, PRODUCTS)
                .query(&[("id", eq(id))])
                .json(&draft),
            || format!("product {id}"),
        )
        .await
    }

    async fn delete_product(&self, id: &ProductId) -> Result<(), StoreError> {
        let _: Product = Self::first(
            self.table(Method::DELETE, PRODUCTS).query(&[("id", eq(id))]),
            || format!("product {id}"),
        )
        .await?;
        Ok(())
    }
}

impl OrderStore for SupabaseStore {
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        if let Some(created) = self.insert_once(CUSTOMERS, "email", &customer).await? {
            return Ok(created);
        }
        self.find_customer_by_email(&customer.email)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("customer {}", customer.email)))
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let rows: Vec<Customer> = Self::rows(
            self.table(Method::GET, CUSTOMERS)
                .query(&[("select", "*".to_string()), ("email", eq(email))])
                .query(&[("limit", "1")]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Customer, StoreError> {
        Self::first(
            self.table(Method::GET, CUSTOMERS)
                .query(&[("select", "*".to_string()), ("id", eq(id))]),
            || format!("customer {id}"),
        )
        .await
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.insert_once(ORDERS, "checkout_reference", &order)
            .await?
            .ok_or_else(|| {
                StoreError::Duplicate(format!("order for checkout {}", order.checkout_reference))
            })
    }

    async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError> {
        self.order_where("id", id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        Ok(self
            .order_where("checkout_reference", reference)
            .await?
            .into_iter()
            .next())
    }

    async fn create_order_items(
        &self,
        order: &OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, StoreError> {
        let rows: Vec<OrderItem> = items.iter().map(|item| item.for_order(order)).collect();
        Self::rows(self.table(Method::POST, ORDER_ITEMS).json(&rows)).await
    }

    async fn list_order_items(&self, order: &OrderId) -> Result<Vec<OrderItem>, StoreError> {
        Self::rows(
            self.table(Method::GET, ORDER_ITEMS)
                .query(&[("select", "*".to_string()), ("order_id", eq(order))]),
        )
        .await
    }

    async fn delete_order(&self, id: &OrderId) -> Result<(), StoreError> {
        let _: Vec<OrderItem> = Self::rows(
            self.table(Method::DELETE, ORDER_ITEMS)
                .query(&[("order_id", eq(id))]),
        )
        .await?;
        let _: Vec<Order> =
            Self::rows(self.table(Method::DELETE, ORDERS).query(&[("id", eq(id))])).await?;
        Ok(())
    }

    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<u32, StoreError> {
        for attempt in 1..=STOCK_RETRIES {
            let current = self.get_product(id).await?.stock;
            if current < quantity {
                return Err(StoreError::InsufficientStock {
                    product: id.clone(),
                    available: current,
                    requested: quantity,
                });
            }
            let remaining = current - quantity;
            if self.swap_stock(id, current, remaining).await? {
                return Ok(remaining);
            }
            debug!(product = %id, attempt, "stock changed concurrently, retrying decrement");
        }
        warn!(product = %id, "giving up on stock decrement after repeated conflicts");
        Err(StoreError::Conflict(format!("stock of product {id}")))
    }

    async fn restore_stock(&self, id: &ProductId, quantity: u32) -> Result<u32, StoreError> {
        for attempt in 1..=STOCK_RETRIES {
            let current = self.get_product(id).await?.stock;
            let restored = current.saturating_add(quantity);
            if self.swap_stock(id, current, restored).await? {
                return Ok(restored);
            }
            debug!(product = %id, attempt, "stock changed concurrently, retrying restore");
        }
        warn!(product = %id, "giving up on stock restore after repeated conflicts");
        Err(StoreError::Conflict(format!("stock of product {id}")))
    }

    async fn list_orders_for_customer(&self, customer: &CustomerId) -> Result<Vec<Order>, StoreError> {
        self.order_where("customer_id", customer).await
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        match status {
            Some(status) => self.order_where("status", status).await,
            None => {
                Self::rows(
                    self.table(Method::GET, ORDERS)
                        .query(&[("select", "*")])
                        .query(&[NEWEST_FIRST]),
                )
                .await
            }
        }
    }

    async fn update_order_status(&self, id: &OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        self.patch_order(id, json!({ "status": status, "updated_at": Utc::now() }))
            .await
    }

    async fn update_tracking_code(&self, id: &OrderId, code: &str) -> Result<Order, StoreError> {
        self.patch_order(id, json!({ "tracking_code": code, "updated_at": Utc::now() }))
            .await
    }

    async fn record_shipping_event(
        &self,
        order: &OrderId,
        event: NewShippingEvent,
    ) -> Result<ShippingEvent, StoreError> {
        let row = event.at(order, Utc::now());
        Self::first(self.table(Method::POST, SHIPPING_LOGS).json(&row), || {
            "created shipping event".to_string()
        })
        .await
    }

    async fn list_shipping_events(&self, order: &OrderId) -> Result<Vec<ShippingEvent>, StoreError> {
        Self::rows(
            self.table(Method::GET, SHIPPING_LOGS)
                .query(&[("select", "*".to_string()), ("order_id", eq(order))])
                .query(&[("order", "status_date.desc")]),
        )
        .await
    }
}

impl SupabaseStore {
    async fn shipping_config(&self) -> Result<Option<ShippingConfigRow>, StoreError> {
        let rows: Vec<ShippingConfigRow> = Self::rows(
            self.table(Method::GET, SHIPPING_CONFIG)
                .query(&[("select", "id,enabled_carriers"), ("limit", "1")]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }
}

impl SettingsStore for SupabaseStore {
    async fn shipping_settings(&self) -> Result<ShippingSettings, StoreError> {
        Ok(self
            .shipping_config()
            .await?
            .map(|row| ShippingSettings::new(row.enabled_carriers))
            .unwrap_or_default())
    }

    async fn save_shipping_settings(
        &self,
        settings: &ShippingSettings,
    ) -> Result<ShippingSettings, StoreError> {
        let body = json!({
            "enabled_carriers": settings.enabled_carriers,
            "updated_at": Utc::now(),
        });
        let request = match self.shipping_config().await? {
            Some(row) => {
                let id = match row.id {
                    serde_json::Value::String(id) => id,
                    other => other.to_string(),
                };
                self.table(Method::PATCH, SHIPPING_CONFIG)
                    .query(&[("id", eq(id))])
                    .json(&body)
            }
            None => self.table(Method::POST, SHIPPING_CONFIG).json(&body),
        };
        let row: ShippingConfigRow =
            Self::first(request, || "shipping configuration".to_string()).await?;
        Ok(ShippingSettings::new(row.enabled_carriers))
    }
}
