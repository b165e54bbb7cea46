//! Order placement.
//!
//! The backend offers no multi-table transaction, so placement is a sequence
//! of writes with compensation: once the order header exists, any later
//! failure gives reserved stock back and removes the header and its lines.
//! The checkout reference makes a retried submission return the order the
//! first attempt created instead of recording a duplicate.

use pratas_common::checkout::PlaceOrder;
use pratas_common::order::{
    Customer, NewOrder, Order, OrderId, OrderStatus, PaymentStatus,
};
use pratas_common::product::ProductId;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::OrderStore;
use crate::error::StoreError;

#[derive(Debug, Error)]
pub enum PlaceOrderError {
    #[error("could not check for an earlier attempt: {0}")]
    Lookup(#[source] StoreError),

    #[error("could not record customer: {0}")]
    Customer(#[source] StoreError),

    #[error("could not create order: {0}")]
    Order(#[source] StoreError),

    #[error("could not record lines of order {order}: {source}")]
    Items { order: OrderId, source: StoreError },

    #[error("could not reserve stock for order {order}: {source}")]
    Stock { order: OrderId, source: StoreError },
}

impl PlaceOrderError {
    /// Generic text for the shopper; details go to the log.
    pub fn user_message(&self) -> String {
        match self {
            PlaceOrderError::Stock {
                source: StoreError::InsufficientStock { .. },
                ..
            } => "Um dos produtos não tem mais estoque suficiente. Revise o carrinho.".to_string(),
            _ => "Erro ao processar pedido. Tente novamente.".to_string(),
        }
    }
}

async fn customer_for<S: OrderStore>(store: &S, request: &PlaceOrder) -> Result<Customer, StoreError> {
    if let Some(existing) = store.find_customer_by_email(&request.customer.email).await? {
        return Ok(existing);
    }
    store.create_customer(request.customer.clone()).await
}

fn new_order(request: &PlaceOrder, customer: &Customer) -> NewOrder {
    NewOrder {
        customer_id: customer.id.clone(),
        status: OrderStatus::Pending,
        total_amount: request.total(),
        payment_method: request.payment.method,
        payment_status: PaymentStatus::Pending,
        installments: request.payment.installments,
        installment_amount: request.installment_amount(),
        shipping_cost: request.shipping_cost,
        shipping_carrier: request.shipping_carrier.clone(),
        shipping_deadline: request.shipping_deadline,
        postal_code: request.customer.postal_code.clone(),
        city: request.customer.city.clone(),
        region: request.customer.region.clone(),
        checkout_reference: request.checkout_reference.clone(),
    }
}

/// Undo a partially placed order. Best effort: failures are logged.
async fn compensate<S: OrderStore>(store: &S, order: &OrderId, reserved: &[(ProductId, u32)]) {
    for (product, quantity) in reserved {
        if let Err(e) = store.restore_stock(product, *quantity).await {
            error!(%order, %product, quantity, error = %e, "failed to restore stock");
        }
    }
    if let Err(e) = store.delete_order(order).await {
        error!(%order, error = %e, "failed to remove partially placed order");
    }
}

/// Persist one checkout: customer, order header, lines, stock.
///
/// Returns the existing order when `request.checkout_reference` was already
/// placed, including by a submission racing this one.
pub async fn place_order<S: OrderStore>(store: &S, request: &PlaceOrder) -> Result<Order, PlaceOrderError> {
    if let Some(existing) = store
        .find_order_by_reference(&request.checkout_reference)
        .await
        .map_err(PlaceOrderError::Lookup)?
    {
        info!(
            order = %existing.id,
            reference = %request.checkout_reference,
            "checkout already placed, returning existing order"
        );
        return Ok(existing);
    }

    let customer = customer_for(store, request)
        .await
        .map_err(PlaceOrderError::Customer)?;

    let order = match store.create_order(new_order(request, &customer)).await {
        Ok(order) => order,
        Err(StoreError::Duplicate(what)) => {
            // A concurrent submission of the same checkout won the insert.
            let existing = store
                .find_order_by_reference(&request.checkout_reference)
                .await
                .map_err(PlaceOrderError::Lookup)?
                .ok_or(PlaceOrderError::Order(StoreError::Duplicate(what)))?;
            info!(
                order = %existing.id,
                reference = %request.checkout_reference,
                "checkout placed concurrently, returning existing order"
            );
            return Ok(existing);
        }
        Err(e) => return Err(PlaceOrderError::Order(e)),
    };

    if let Err(source) = store.create_order_items(&order.id, &request.items).await {
        warn!(order = %order.id, error = %source, "order lines failed, rolling back");
        compensate(store, &order.id, &[]).await;
        return Err(PlaceOrderError::Items {
            order: order.id,
            source,
        });
    }

    let mut reserved = Vec::with_capacity(request.items.len());
    for item in &request.items {
        match store.decrement_stock(&item.product_id, item.quantity).await {
            Ok(_) => reserved.push((item.product_id.clone(), item.quantity)),
            Err(source) => {
                warn!(
                    order = %order.id,
                    product = %item.product_id,
                    error = %source,
                    "stock reservation failed, rolling back"
                );
                compensate(store, &order.id, &reserved).await;
                return Err(PlaceOrderError::Stock {
                    order: order.id,
                    source,
                });
            }
        }
    }

    info!(
        order = %order.id,
        customer = %customer.id,
        total = order.total_amount,
        items = request.items.len(),
        "order placed"
    );
    Ok(order)
}
