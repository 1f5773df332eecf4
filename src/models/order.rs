use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Preparing,
    Ready,
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivering,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub coordinates: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub business_id: String,
    pub business_name: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub delivery_address: DeliveryAddress,
    pub status: OrderStatus,
    #[serde(default)]
    pub delivery_person_id: Option<String>,
    #[serde(default)]
    pub delivery_person_name: Option<String>,
    pub estimated_time: String,
    pub created_at: DateTime<Utc>,
}

/// Checkout payload. Item names and prices, the business name, pricing and
/// the initial status are filled in by the store when the order is created.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub client_id: String,
    pub client_name: String,
    pub business_id: String,
    pub items: Vec<OrderItem>,
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

/// Fields that may change outside the lifecycle. Status and assignee only
/// move through transitions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub estimated_time: Option<String>,
    pub delivery_address: Option<DeliveryAddress>,
}

impl OrderPatch {
    pub fn apply(self, order: &mut Order) {
        if let Some(estimated_time) = self.estimated_time {
            order.estimated_time = estimated_time;
        }
        if let Some(address) = self.delivery_address {
            order.delivery_address = address;
        }
    }
}
