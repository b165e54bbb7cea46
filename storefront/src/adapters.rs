//! Seams between the checkout flow and the outside world.
//!
//! Each trait has one production implementation talking HTTP and is also
//! implemented by the in-memory store so flows can be exercised offline.
//! Methods return `Send` futures so they can be awaited from axum handlers
//! and spawned tasks.

use std::future::Future;

use pratas_common::address::{PartialAddress, PostalCode};
use pratas_common::order::{
    Customer, CustomerId, NewCustomer, NewOrder, NewOrderItem, NewShippingEvent, Order, OrderId,
    OrderItem, OrderStatus, ShippingEvent,
};
use pratas_common::package::{DeclaredItem, PackageDescriptor};
use pratas_common::product::{Product, ProductCategory, ProductDraft, ProductId};
use pratas_common::quote::{QuoteError, QuoteOutcome, ShippingSettings};

use crate::error::{LookupError, StoreError};

/// Resolves a postal code to street, city and region.
pub trait AddressLookup: Send + Sync {
    /// `Ok(None)` when the service does not know the code.
    fn lookup(
        &self,
        postal_code: &PostalCode,
    ) -> impl Future<Output = Result<Option<PartialAddress>, LookupError>> + Send;
}

/// Prices a package between two postal codes.
pub trait QuoteProvider: Send + Sync {
    fn quote(
        &self,
        origin: &PostalCode,
        destination: &PostalCode,
        package: &PackageDescriptor,
        items: &[DeclaredItem],
    ) -> impl Future<Output = Result<QuoteOutcome, QuoteError>> + Send;
}

/// Live parcel status from the carrier, as the carrier reports it.
pub trait ShipmentTracker: Send + Sync {
    fn track(
        &self,
        tracking_code: &str,
    ) -> impl Future<Output = Result<serde_json::Value, QuoteError>> + Send;
}

/// Quotes from `inner` limited to the carriers the shop has enabled.
pub struct EnabledCarriers<'a, Q> {
    inner: &'a Q,
    settings: ShippingSettings,
}

impl<'a, Q> EnabledCarriers<'a, Q> {
    pub fn new(inner: &'a Q, settings: ShippingSettings) -> Self {
        Self { inner, settings }
    }
}

impl<Q: QuoteProvider> QuoteProvider for EnabledCarriers<'_, Q> {
    async fn quote(
        &self,
        origin: &PostalCode,
        destination: &PostalCode,
        package: &PackageDescriptor,
        items: &[DeclaredItem],
    ) -> Result<QuoteOutcome, QuoteError> {
        let outcome = self.inner.quote(origin, destination, package, items).await?;
        Ok(outcome.restrict_to(&self.settings))
    }
}

/// Shop-wide shipping settings.
pub trait SettingsStore: Send + Sync {
    /// Defaults when nothing was saved yet.
    fn shipping_settings(&self)
        -> impl Future<Output = Result<ShippingSettings, StoreError>> + Send;

    fn save_shipping_settings(
        &self,
        settings: &ShippingSettings,
    ) -> impl Future<Output = Result<ShippingSettings, StoreError>> + Send;
}

/// Catalog listing filter. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub featured: Option<bool>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        self.category.as_ref().map_or(true, |c| c == &product.category)
            && self.featured.map_or(true, |f| f == product.is_featured)
    }
}

/// Product catalog, read by shoppers and edited by admins.
pub trait Catalog: Send + Sync {
    /// Newest first.
    fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> impl Future<Output = Result<Vec<Product>, StoreError>> + Send;

    fn get_product(
        &self,
        id: &ProductId,
    ) -> impl Future<Output = Result<Product, StoreError>> + Send;

    fn create_product(
        &self,
        draft: ProductDraft,
    ) -> impl Future<Output = Result<Product, StoreError>> + Send;

    fn update_product(
        &self,
        id: &ProductId,
        draft: ProductDraft,
    ) -> impl Future<Output = Result<Product, StoreError>> + Send;

    fn delete_product(&self, id: &ProductId)
        -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Customers, orders, order lines and stock.
pub trait OrderStore: Send + Sync {
    /// Customers are unique by email: when one already exists it is
    /// returned unchanged instead of recording a second row.
    fn create_customer(
        &self,
        customer: NewCustomer,
    ) -> impl Future<Output = Result<Customer, StoreError>> + Send;

    fn find_customer_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Customer>, StoreError>> + Send;

    fn get_customer(
        &self,
        id: &CustomerId,
    ) -> impl Future<Output = Result<Customer, StoreError>> + Send;

    /// Fails with `Duplicate` when an order with the same checkout reference
    /// exists. The check and the insert are one atomic step.
    fn create_order(&self, order: NewOrder)
        -> impl Future<Output = Result<Order, StoreError>> + Send;

    fn get_order(&self, id: &OrderId) -> impl Future<Output = Result<Order, StoreError>> + Send;

    /// The order created by the checkout attempt `reference`, if any.
    fn find_order_by_reference(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    fn create_order_items(
        &self,
        order: &OrderId,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<Vec<OrderItem>, StoreError>> + Send;

    fn list_order_items(
        &self,
        order: &OrderId,
    ) -> impl Future<Output = Result<Vec<OrderItem>, StoreError>> + Send;

    /// Removes an order together with its lines.
    fn delete_order(&self, id: &OrderId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Atomically take `quantity` units. Returns the remaining stock.
    /// Fails with `InsufficientStock` rather than going negative.
    fn decrement_stock(
        &self,
        product: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;

    /// Give back units taken by `decrement_stock`. Returns the new stock.
    fn restore_stock(
        &self,
        product: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;

    /// Newest first.
    fn list_orders_for_customer(
        &self,
        customer: &CustomerId,
    ) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;

    /// Newest first, optionally restricted to one status.
    fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;

    fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = Result<Order, StoreError>> + Send;

    fn update_tracking_code(
        &self,
        id: &OrderId,
        code: &str,
    ) -> impl Future<Output = Result<Order, StoreError>> + Send;

    fn record_shipping_event(
        &self,
        order: &OrderId,
        event: NewShippingEvent,
    ) -> impl Future<Output = Result<ShippingEvent, StoreError>> + Send;

    /// Newest first.
    fn list_shipping_events(
        &self,
        order: &OrderId,
    ) -> impl Future<Output = Result<Vec<ShippingEvent>, StoreError>> + Send;
}
