use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::reais;
use crate::product::ProductId;

/// Unique order identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

/// Unique customer identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fulfilment status, advanced by admin actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout.
    Pending,
    /// Being prepared or in transit.
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn all() -> &'static [OrderStatus] {
        &[
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if transitioning from self to `next` is valid.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Completed)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
        )
    }

    /// Tracking codes can be attached only while the order is being shipped.
    pub fn accepts_tracking_code(self) -> bool {
        self == OrderStatus::Processing
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Pix,
    CreditCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Customer record as stored by the hosted backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, rename = "address")]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default, rename = "zip_code")]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default, rename = "state")]
    pub region: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "address")]
    pub street: String,
    pub number: String,
    pub complement: String,
    #[serde(rename = "zip_code")]
    pub postal_code: String,
    pub city: String,
    #[serde(rename = "state")]
    pub region: String,
}

/// Order header. Totals are centavos, snapshotted at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    #[serde(with = "reais")]
    pub total_amount: u64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default = "one")]
    pub installments: u8,
    #[serde(with = "reais", default)]
    pub installment_amount: u64,
    #[serde(with = "reais")]
    pub shipping_cost: u64,
    #[serde(default)]
    pub shipping_carrier: Option<String>,
    #[serde(default)]
    pub shipping_deadline: Option<u32>,
    #[serde(rename = "zip_code")]
    pub postal_code: String,
    pub city: String,
    #[serde(rename = "state")]
    pub region: String,
    #[serde(default)]
    pub tracking_code: Option<String>,
    /// Idempotency key of the checkout attempt that produced this order.
    #[serde(default)]
    pub checkout_reference: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn one() -> u8 {
    1
}

/// Insert payload for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    #[serde(with = "reais")]
    pub total_amount: u64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub installments: u8,
    #[serde(with = "reais")]
    pub installment_amount: u64,
    #[serde(with = "reais")]
    pub shipping_cost: u64,
    pub shipping_carrier: Option<String>,
    pub shipping_deadline: Option<u32>,
    #[serde(rename = "zip_code")]
    pub postal_code: String,
    pub city: String,
    #[serde(rename = "state")]
    pub region: String,
    pub checkout_reference: String,
}

/// One purchased line. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price at purchase time, in centavos.
    #[serde(with = "reais")]
    pub price: u64,
}

/// Insert payload for one order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(with = "reais")]
    pub price: u64,
}

impl NewOrderItem {
    pub fn for_order(&self, order_id: &OrderId) -> OrderItem {
        OrderItem {
            id: None,
            order_id: order_id.clone(),
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            price: self.price,
        }
    }
}

/// One entry of an order's shipping history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub order_id: OrderId,
    /// Short machine status such as `in_transit` or `delivered`.
    pub status: String,
    #[serde(default)]
    pub status_description: Option<String>,
    pub status_date: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Payload for appending to an order's shipping history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShippingEvent {
    pub status: String,
    #[serde(default)]
    pub status_description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl NewShippingEvent {
    /// History entry for an order entering `status`.
    pub fn for_status(status: OrderStatus) -> Self {
        let description = match status {
            OrderStatus::Pending => "Pedido recebido",
            OrderStatus::Processing => "Pedido em preparação",
            OrderStatus::Completed => "Pedido entregue",
            OrderStatus::Cancelled => "Pedido cancelado",
        };
        Self {
            status: status.as_str().to_string(),
            status_description: Some(description.to_string()),
            location: None,
        }
    }

    /// History entry for a parcel handed to the carrier.
    pub fn posted(tracking_code: &str) -> Self {
        Self {
            status: "in_transit".to_string(),
            status_description: Some(format!("Objeto postado. Código de rastreio {tracking_code}")),
            location: None,
        }
    }

    pub fn at(self, order_id: &OrderId, status_date: DateTime<Utc>) -> ShippingEvent {
        ShippingEvent {
            id: None,
            order_id: order_id.clone(),
            status: self.status.trim().to_string(),
            status_description: self.status_description.filter(|d| !d.trim().is_empty()),
            status_date,
            location: self.location.filter(|l| !l.trim().is_empty()),
        }
    }
}
