//! Order tracking for shoppers: the order, its lines, the shipping history
//! recorded by the back office and, once posted, the carrier's own status.

use pratas_common::order::{Order, OrderId, OrderItem, ShippingEvent};
use serde::Serialize;
use tracing::warn;

use crate::adapters::{OrderStore, ShipmentTracker};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTracking {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Newest first.
    pub history: Vec<ShippingEvent>,
    /// Raw carrier response; absent until a tracking code exists or when the
    /// carrier could not be reached.
    pub carrier: Option<serde_json::Value>,
}

/// Look up an order on behalf of the shopper who placed it.
///
/// `email` must match the order's customer. A mismatch reads as a missing
/// order.
pub async fn order_tracking<S, T>(
    store: &S,
    tracker: &T,
    id: &OrderId,
    email: &str,
) -> Result<OrderTracking, StoreError>
where
    S: OrderStore,
    T: ShipmentTracker,
{
    let not_found = || StoreError::NotFound(format!("order {id}"));
    let order = store.get_order(id).await?;
    let customer = match store.get_customer(&order.customer_id).await {
        Ok(customer) => customer,
        Err(StoreError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e),
    };
    let email = email.trim();
    if email.is_empty() || !customer.email.trim().eq_ignore_ascii_case(email) {
        return Err(not_found());
    }

    let items = store.list_order_items(id).await?;
    let history = store.list_shipping_events(id).await?;
    let carrier = match order.tracking_code.as_deref() {
        Some(code) => match tracker.track(code).await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(order = %id, tracking_code = code, error = %e, "carrier tracking unavailable");
                None
            }
        },
        None => None,
    };

    Ok(OrderTracking {
        order,
        items,
        history,
        carrier,
    })
}
