use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Preparing,
    Accepted,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Preparing => "preparing",
            DeliveryStatus::Accepted => "accepted",
            DeliveryStatus::OutForDelivery => "out_for_delivery",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Requested,
    Refunded,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub restaurant_id: i64,
    pub delivery_partner_id: Option<i64>,
    pub status: OrderStatus,
    pub delivery_status: DeliveryStatus,
    pub refund_status: Option<RefundStatus>,
    pub delivery_address: GeoPoint,
    pub total_amount: f64,
    pub verification_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the checkout flow when a new order row is created.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub user_id: i64,
    pub restaurant_id: i64,
    pub delivery_address: GeoPoint,
    pub total_amount: f64,
}

/// Partial status update. Every `None` field keeps its prior value; the
/// three fields are defaulted independently of each other.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusPatch {
    pub status: Option<OrderStatus>,
    pub delivery_status: Option<DeliveryStatus>,
    pub refund_status: Option<RefundStatus>,
}

impl StatusPatch {
    pub fn delivery(delivery_status: DeliveryStatus) -> Self {
        Self {
            delivery_status: Some(delivery_status),
            ..Self::default()
        }
    }
}
