use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::order::Order;
use crate::models::profile::{CourierProfile, Restaurant, UserProfile};
use crate::models::GeoPoint;

pub const NEW_ORDER: &str = "new_order";
pub const ORDER_STATUS: &str = "order_status";
pub const NEW_ORDER_ASSIGNMENT: &str = "new_order_assignment";
pub const DELIVERY_TRACKING: &str = "delivery_tracking";

/// One frame on the wire, both directions: `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    pub data: Value,
}

impl Frame {
    pub fn encode<T: Serialize>(event: &str, data: &T) -> Result<String, serde_json::Error> {
        let frame = Frame {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        };
        serde_json::to_string(&frame)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    JoinRestaurant(i64),
    JoinUser(i64),
    JoinDeliveryPartner(i64),
    LocationUpdate(LocationUpdate),
    AcceptOrder(OrderRef),
    CancelledOrder(OrderRef),
    DeliveryAccept(DeliveryAccept),
    OutForDelivery(i64),
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::JoinRestaurant(_) => "join_restaurant",
            InboundEvent::JoinUser(_) => "join_user",
            InboundEvent::JoinDeliveryPartner(_) => "join_delivery_partner",
            InboundEvent::LocationUpdate(_) => "location_update",
            InboundEvent::AcceptOrder(_) => "accept_order",
            InboundEvent::CancelledOrder(_) => "cancelled_order",
            InboundEvent::DeliveryAccept(_) => "delivery_accept",
            InboundEvent::OutForDelivery(_) => "out_for_delivery",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationUpdate {
    pub delivery_partner_id: i64,
    pub location: GeoPoint,
}

/// The order fields a restaurant or user client echoes back when accepting
/// or cancelling. The full row is re-read from the order directory.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRef {
    pub id: i64,
    pub restaurant_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryAccept {
    pub partner_id: i64,
    pub order_id: i64,
}

/// Request/response variant of delivery completion, invoked over HTTP by
/// the courier app with the code collected from the customer.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteDelivery {
    pub order_id: i64,
    pub delivery_partner_id: i64,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusPayload {
    pub message: String,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<Restaurant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner: Option<CourierProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

impl OrderStatusPayload {
    pub fn new(message: impl Into<String>, order: Order) -> Self {
        Self {
            message: message.into(),
            order,
            restaurant: None,
            partner: None,
            otp: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOffer {
    pub message: String,
    pub order: Order,
    pub restaurant: Restaurant,
    pub user: UserProfile,
    pub distance_from_restaurant: f64,
    pub distance_to_user: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingUpdate {
    #[serde(rename = "orderId")]
    pub order_id: i64,
    pub location: GeoPoint,
}
