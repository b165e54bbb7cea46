//! Back-office operations: order fulfilment, catalog edits, dashboard.

use std::collections::BTreeMap;

use pratas_common::order::{CustomerId, NewShippingEvent, Order, OrderId, OrderStatus, ShippingEvent};
use pratas_common::product::{Product, ProductDraft, ProductId};
use pratas_common::quote::ShippingSettings;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::{Catalog, OrderStore, SettingsStore};
use crate::error::StoreError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("order {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("order {id} is {status}; tracking codes need a processing order")]
    TrackingNotAllowed { id: OrderId, status: OrderStatus },

    #[error("tracking code is empty")]
    EmptyTrackingCode,

    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("at least one carrier must stay enabled")]
    NoCarriersEnabled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Move an order along the fulfilment graph.
pub async fn transition_order<S: OrderStore>(
    store: &S,
    id: &OrderId,
    next: OrderStatus,
) -> Result<Order, AdminError> {
    let order = store.get_order(id).await?;
    if !order.status.can_transition_to(next) {
        return Err(AdminError::InvalidTransition {
            id: id.clone(),
            from: order.status,
            to: next,
        });
    }
    let updated = store.update_order_status(id, next).await?;
    info!(order = %id, from = %order.status, to = %next, "order status changed");
    note_history(store, id, NewShippingEvent::for_status(next)).await;
    Ok(updated)
}

/// History is informational; a failed write never undoes the change it
/// describes.
async fn note_history<S: OrderStore>(store: &S, id: &OrderId, event: NewShippingEvent) {
    if let Err(e) = store.record_shipping_event(id, event).await {
        warn!(order = %id, error = %e, "shipping history not recorded");
    }
}

pub async fn attach_tracking_code<S: OrderStore>(
    store: &S,
    id: &OrderId,
    code: &str,
) -> Result<Order, AdminError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AdminError::EmptyTrackingCode);
    }
    let order = store.get_order(id).await?;
    if !order.status.accepts_tracking_code() {
        return Err(AdminError::TrackingNotAllowed {
            id: id.clone(),
            status: order.status,
        });
    }
    let updated = store.update_tracking_code(id, code).await?;
    info!(order = %id, tracking_code = code, "tracking code attached");
    note_history(store, id, NewShippingEvent::posted(code)).await;
    Ok(updated)
}

/// Append a manual entry, e.g. a carrier scan, to an order's history.
pub async fn record_shipping_event<S: OrderStore>(
    store: &S,
    id: &OrderId,
    event: NewShippingEvent,
) -> Result<ShippingEvent, AdminError> {
    if event.status.trim().is_empty() {
        return Err(AdminError::MissingFields(vec!["status"]));
    }
    store.get_order(id).await?;
    let recorded = store.record_shipping_event(id, event).await?;
    info!(order = %id, status = %recorded.status, "shipping event recorded");
    Ok(recorded)
}

pub async fn shipping_settings<S: SettingsStore>(store: &S) -> Result<ShippingSettings, StoreError> {
    store.shipping_settings().await
}

/// Replace the enabled carrier list. Names are normalized to carrier keys.
pub async fn save_shipping_settings<S: SettingsStore>(
    store: &S,
    requested: ShippingSettings,
) -> Result<ShippingSettings, AdminError> {
    let settings = ShippingSettings::new(&requested.enabled_carriers);
    if settings.enabled_carriers.is_empty() {
        return Err(AdminError::NoCarriersEnabled);
    }
    let saved = store.save_shipping_settings(&settings).await?;
    info!(carriers = ?saved.enabled_carriers, "shipping settings saved");
    Ok(saved)
}

/// Order history of one customer, newest first.
pub async fn customer_orders<S: OrderStore>(store: &S, id: &CustomerId) -> Result<Vec<Order>, StoreError> {
    store.list_orders_for_customer(id).await
}

/// Create when `id` is `None`, otherwise replace the product's fields.
pub async fn save_product<C: Catalog>(
    catalog: &C,
    id: Option<&ProductId>,
    draft: ProductDraft,
) -> Result<Product, AdminError> {
    let missing = draft.missing_fields();
    if !missing.is_empty() {
        return Err(AdminError::MissingFields(missing));
    }
    let product = match id {
        Some(id) => catalog.update_product(id, draft).await?,
        None => catalog.create_product(draft).await?,
    };
    info!(product = %product.id, name = %product.name, "product saved");
    Ok(product)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub orders: usize,
    /// Keyed by status name; every status is present.
    pub by_status: BTreeMap<&'static str, usize>,
    /// Centavos, completed orders only.
    pub revenue: u64,
    pub products: usize,
    pub out_of_stock: usize,
}

pub async fn dashboard_summary<S: Catalog + OrderStore>(store: &S) -> Result<DashboardSummary, StoreError> {
    let orders = store.list_orders(None).await?;
    let products = store.list_products(&Default::default()).await?;

    let mut by_status: BTreeMap<&'static str, usize> =
        OrderStatus::all().iter().map(|s| (s.as_str(), 0)).collect();
    for order in &orders {
        *by_status.entry(order.status.as_str()).or_default() += 1;
    }

    Ok(DashboardSummary {
        orders: orders.len(),
        by_status,
        revenue: orders
            .iter()
            .filter(|o| o.status == OrderStatus::Completed)
            .map(|o| o.total_amount)
            .sum(),
        products: products.len(),
        out_of_stock: products.iter().filter(|p| p.stock == 0).count(),
    })
}
