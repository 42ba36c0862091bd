use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::cache::PendingOrders;
use crate::directory::{OrderDirectory, ProfileDirectory};
use crate::engine::matching;
use crate::error::AppError;
use crate::models::event::{
    AssignmentOffer, CompleteDelivery, DeliveryAccept, Frame, InboundEvent, LocationUpdate,
    OrderRef, OrderStatusPayload, TrackingUpdate, DELIVERY_TRACKING, NEW_ORDER,
    NEW_ORDER_ASSIGNMENT, ORDER_STATUS,
};
use crate::models::order::{DeliveryStatus, NewOrder, Order, OrderStatus, StatusPatch};
use crate::models::GeoPoint;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;
use crate::presence::PresenceStore;
use crate::rooms::{ConnectionId, Room, RoomRouter};

/// The state machine and matching algorithm. Owns handles to its three
/// collaborators plus the pending-orders cache; every event handler gets the
/// engine passed in explicitly, so tests can assemble one around fakes.
pub struct DispatchEngine {
    rooms: Arc<RoomRouter>,
    presence: Arc<PresenceStore>,
    orders: Arc<dyn OrderDirectory>,
    profiles: Arc<dyn ProfileDirectory>,
    pending: Arc<PendingOrders>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
    match_radius_km: f64,
}

impl DispatchEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rooms: Arc<RoomRouter>,
        presence: Arc<PresenceStore>,
        orders: Arc<dyn OrderDirectory>,
        profiles: Arc<dyn ProfileDirectory>,
        pending: Arc<PendingOrders>,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
        match_radius_km: f64,
    ) -> Self {
        Self {
            rooms,
            presence,
            orders,
            profiles,
            pending,
            notifier,
            metrics,
            match_radius_km,
        }
    }

    /// Entry point for everything arriving over a connection. Join events
    /// bind the connection's sender into the room router; the rest are
    /// state-machine transitions.
    pub fn handle_event(
        &self,
        connection: ConnectionId,
        sender: &UnboundedSender<String>,
        event: InboundEvent,
    ) -> Result<(), AppError> {
        self.metrics
            .socket_events_total
            .with_label_values(&[event.name()])
            .inc();

        match event {
            InboundEvent::JoinRestaurant(id) => {
                self.rooms.join(Room::Restaurant(id), connection, sender.clone());
                Ok(())
            }
            InboundEvent::JoinUser(id) => {
                self.rooms.join(Room::User(id), connection, sender.clone());
                Ok(())
            }
            InboundEvent::JoinDeliveryPartner(id) => {
                self.rooms.join(Room::Courier(id), connection, sender.clone());
                Ok(())
            }
            InboundEvent::LocationUpdate(update) => self.location_update(update),
            InboundEvent::AcceptOrder(order_ref) => self.restaurant_accept(&order_ref).map(|_| ()),
            InboundEvent::CancelledOrder(order_ref) => self.cancel_order(&order_ref).map(|_| ()),
            InboundEvent::DeliveryAccept(request) => match self.delivery_accept(&request) {
                Ok(_) => Ok(()),
                // A losing courier gets a direct outcome instead of silence,
                // so the client can drop the stale offer.
                Err(err @ AppError::NoLongerAvailable) => {
                    let data = json!({ "message": err.to_string(), "reason": err.reason() });
                    if let Ok(text) = Frame::encode(ORDER_STATUS, &data) {
                        let _ = sender.send(text);
                    }
                    Ok(())
                }
                Err(err) => Err(err),
            },
            InboundEvent::OutForDelivery(order_id) => self.out_for_delivery(order_id).map(|_| ()),
        }
    }

    /// Order placed by the (external) checkout flow: persist, queue for the
    /// restaurant, broadcast the refreshed queue.
    pub fn place_order(&self, new_order: NewOrder) -> Result<Order, AppError> {
        if new_order.user_id <= 0 || new_order.restaurant_id <= 0 {
            return Err(AppError::Validation(
                "user_id and restaurant_id are required".to_string(),
            ));
        }

        let order = self.orders.insert(new_order)?;
        self.pending.push(order.restaurant_id, order.clone());
        self.broadcast_queue(order.restaurant_id);

        self.record("place", "success");
        info!(order_id = order.id, restaurant_id = order.restaurant_id, "order placed");
        Ok(order)
    }

    /// Courier presence push. Refreshes the TTL'd sample and, when the
    /// courier has an active delivery, forwards the position immediately.
    pub fn location_update(&self, update: LocationUpdate) -> Result<(), AppError> {
        self.presence
            .set_location(update.delivery_partner_id, update.location);

        if let Some(order) = self.orders.find_active_delivery(update.delivery_partner_id)? {
            self.emit_tracking(&order, update.location);
        }

        Ok(())
    }

    /// Restaurant accepts: `pending -> preparing`, queue refresh, user
    /// notification, then assignment offers to every eligible courier at
    /// once. First courier to accept wins the conditional write.
    pub fn restaurant_accept(&self, order_ref: &OrderRef) -> Result<Order, AppError> {
        let order = self.require_order(order_ref.id)?;
        if order.delivery_status != DeliveryStatus::Pending {
            self.record("accept", "rejected");
            return Err(AppError::InvalidTransition {
                from: order.delivery_status,
                to: DeliveryStatus::Preparing,
            });
        }

        let updated = self
            .orders
            .update_status(order.id, StatusPatch::delivery(DeliveryStatus::Preparing))?
            .ok_or_else(|| AppError::NotFound(format!("order {}", order.id)))?;

        self.pending.remove(updated.restaurant_id, updated.id);
        self.broadcast_queue(updated.restaurant_id);

        let restaurant = self
            .profiles
            .restaurant(updated.restaurant_id)?
            .ok_or_else(|| AppError::NotFound(format!("restaurant {}", updated.restaurant_id)))?;
        let user = self
            .profiles
            .user(updated.user_id)?
            .ok_or_else(|| AppError::NotFound(format!("user {}", updated.user_id)))?;

        let mut payload = OrderStatusPayload::new(
            "Your order has been accepted by the restaurant.",
            updated.clone(),
        );
        payload.restaurant = Some(restaurant.clone());
        self.notify_user(updated.user_id, payload);

        let candidates = matching::nearby_couriers(
            self.profiles.as_ref(),
            &self.presence,
            restaurant.location,
            updated.delivery_address,
            self.match_radius_km,
        )?;

        if candidates.is_empty() {
            info!(order_id = updated.id, "no eligible couriers nearby");
        } else {
            for candidate in &candidates {
                self.emit(
                    Room::Courier(candidate.profile.id),
                    NEW_ORDER_ASSIGNMENT,
                    &AssignmentOffer {
                        message: "New order available for delivery".to_string(),
                        order: updated.clone(),
                        restaurant: restaurant.clone(),
                        user: user.clone(),
                        distance_from_restaurant: candidate.distance_from_restaurant,
                        distance_to_user: candidate.distance_to_user,
                    },
                );
            }
            info!(
                order_id = updated.id,
                offers = candidates.len(),
                "assignment offers broadcast"
            );
        }

        self.record("accept", "success");
        Ok(updated)
    }

    /// Cancellation from the restaurant or user path, allowed from any
    /// non-terminal state.
    pub fn cancel_order(&self, order_ref: &OrderRef) -> Result<Order, AppError> {
        let order = self.require_order(order_ref.id)?;
        if order.delivery_status.is_terminal() {
            self.record("cancel", "rejected");
            return Err(AppError::InvalidTransition {
                from: order.delivery_status,
                to: DeliveryStatus::Cancelled,
            });
        }

        let updated = self
            .orders
            .update_status(
                order.id,
                StatusPatch {
                    status: Some(OrderStatus::Cancelled),
                    delivery_status: Some(DeliveryStatus::Cancelled),
                    refund_status: None,
                },
            )?
            .ok_or_else(|| AppError::NotFound(format!("order {}", order.id)))?;

        self.pending.remove(updated.restaurant_id, updated.id);
        self.broadcast_queue(updated.restaurant_id);
        self.notify_user(
            updated.user_id,
            OrderStatusPayload::new("Your order has been cancelled.", updated.clone()),
        );

        self.record("cancel", "success");
        info!(order_id = updated.id, "order cancelled");
        Ok(updated)
    }

    /// Courier accepts an offer. The directory's conditional write is the
    /// only arbiter: no reservation precedes the offer broadcast, so any
    /// number of couriers may race here and exactly one wins.
    pub fn delivery_accept(&self, request: &DeliveryAccept) -> Result<Order, AppError> {
        let code = verification_code();

        let Some(updated) =
            self.orders
                .assign_courier(request.order_id, request.partner_id, &code)?
        else {
            self.record("assign", "conflict");
            return match self.orders.get(request.order_id)? {
                None => Err(AppError::NotFound(format!("order {}", request.order_id))),
                Some(_) => Err(AppError::NoLongerAvailable),
            };
        };

        let restaurant = self.profiles.restaurant(updated.restaurant_id)?;
        let partner = self.profiles.courier(request.partner_id)?;

        let mut payload = OrderStatusPayload::new(
            "Your order has been assigned to a delivery partner.",
            updated.clone(),
        );
        payload.restaurant = restaurant;
        payload.partner = partner;
        payload.otp = Some(code);
        self.notify_user(updated.user_id, payload);

        self.record("assign", "success");
        info!(
            order_id = updated.id,
            partner_id = request.partner_id,
            "delivery partner assigned"
        );
        Ok(updated)
    }

    /// Courier picked the order up. Progression only: anything but
    /// `accepted` is a rejected regression (or a repeat).
    pub fn out_for_delivery(&self, order_id: i64) -> Result<Order, AppError> {
        let order = self.require_order(order_id)?;
        if order.delivery_status != DeliveryStatus::Accepted {
            self.record("out_for_delivery", "rejected");
            return Err(match order.delivery_status {
                DeliveryStatus::Delivered => AppError::AlreadyDelivered,
                from => AppError::InvalidTransition {
                    from,
                    to: DeliveryStatus::OutForDelivery,
                },
            });
        }

        let updated = self
            .orders
            .update_status(order_id, StatusPatch::delivery(DeliveryStatus::OutForDelivery))?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        let mut payload =
            OrderStatusPayload::new("Your order is now out for delivery.", updated.clone());
        payload.otp = updated.verification_code.clone();
        self.notify_user(updated.user_id, payload);

        if let Some(partner_id) = updated.delivery_partner_id {
            self.emit(
                Room::Courier(partner_id),
                ORDER_STATUS,
                &OrderStatusPayload::new("Order marked as out for delivery.", updated.clone()),
            );
        }

        self.record("out_for_delivery", "success");
        Ok(updated)
    }

    /// Delivery completion with the customer's verification code. The
    /// already-delivered guard is checked before the code, so a retry with
    /// the right code reports the conflict instead of a second success.
    pub fn complete_delivery(&self, request: &CompleteDelivery) -> Result<Order, AppError> {
        if request.order_id <= 0 || request.delivery_partner_id <= 0 || request.otp.is_empty() {
            return Err(AppError::Validation(
                "order_id, delivery_partner_id and otp are required".to_string(),
            ));
        }

        let order = self.require_order(request.order_id)?;
        if order.delivery_partner_id != Some(request.delivery_partner_id) {
            return Err(AppError::NotFound(format!("order {}", request.order_id)));
        }
        if order.delivery_status == DeliveryStatus::Delivered {
            self.record("deliver", "rejected");
            return Err(AppError::AlreadyDelivered);
        }
        if order.verification_code.as_deref() != Some(request.otp.as_str()) {
            self.record("deliver", "rejected");
            return Err(AppError::InvalidCode);
        }

        let updated = self
            .orders
            .update_status(
                order.id,
                StatusPatch {
                    status: Some(OrderStatus::Completed),
                    delivery_status: Some(DeliveryStatus::Delivered),
                    refund_status: None,
                },
            )?
            .ok_or_else(|| AppError::NotFound(format!("order {}", order.id)))?;

        self.notify_user(
            updated.user_id,
            OrderStatusPayload::new("Your order has been delivered successfully", updated.clone()),
        );

        self.record("deliver", "success");
        info!(order_id = updated.id, "order delivered");
        Ok(updated)
    }

    pub fn order(&self, order_id: i64) -> Result<Option<Order>, AppError> {
        Ok(self.orders.get(order_id)?)
    }

    pub(crate) fn emit_tracking(&self, order: &Order, location: GeoPoint) {
        let update = TrackingUpdate {
            order_id: order.id,
            location,
        };
        self.emit(Room::User(order.user_id), DELIVERY_TRACKING, &update);
        self.emit(Room::Restaurant(order.restaurant_id), DELIVERY_TRACKING, &update);
    }

    pub(crate) fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    pub(crate) fn orders(&self) -> &dyn OrderDirectory {
        self.orders.as_ref()
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn require_order(&self, order_id: i64) -> Result<Order, AppError> {
        self.orders
            .get(order_id)?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))
    }

    fn broadcast_queue(&self, restaurant_id: i64) {
        let queue = self.pending.snapshot(restaurant_id);
        self.emit(Room::Restaurant(restaurant_id), NEW_ORDER, &queue);
    }

    /// User-facing notification: room broadcast first, push sink when
    /// nobody is connected. The broadcast is a latency optimization, not
    /// the system of record.
    fn notify_user(&self, user_id: i64, payload: OrderStatusPayload) {
        let message = payload.message.clone();
        let delivered = self.emit(Room::User(user_id), ORDER_STATUS, &payload);
        if delivered == 0 {
            self.notifier.notify(user_id, "Order update", &message);
        }
    }

    fn emit<T: Serialize>(&self, room: Room, event: &str, data: &T) -> usize {
        let delivered = self.rooms.broadcast(room, event, data);
        self.metrics
            .broadcasts_total
            .with_label_values(&[event])
            .inc();
        delivered
    }

    fn record(&self, transition: &str, outcome: &str) {
        self.metrics
            .transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
    }
}

/// Four-digit one-time code the courier presents at the door.
fn verification_code() -> String {
    rand::thread_rng().gen_range(1000..10000).to_string()
}
