use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::directory::{DirectoryError, OrderDirectory, ProfileDirectory};
use crate::models::order::{DeliveryStatus, NewOrder, Order, OrderStatus, StatusPatch};
use crate::models::profile::{CourierProfile, Restaurant, UserProfile};

/// Dashmap-backed order directory. Per-entry mutation happens under the
/// map's shard lock, which is what makes `assign_courier` an atomic
/// check-and-set.
pub struct InMemoryOrders {
    orders: DashMap<i64, Order>,
    next_id: AtomicI64,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryOrders {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderDirectory for InMemoryOrders {
    fn insert(&self, new_order: NewOrder) -> Result<Order, DirectoryError> {
        let now = Utc::now();
        let order = Order {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id: new_order.user_id,
            restaurant_id: new_order.restaurant_id,
            delivery_partner_id: None,
            status: OrderStatus::Pending,
            delivery_status: DeliveryStatus::Pending,
            refund_status: None,
            delivery_address: new_order.delivery_address,
            total_amount: new_order.total_amount,
            verification_code: None,
            created_at: now,
            updated_at: now,
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    fn get(&self, order_id: i64) -> Result<Option<Order>, DirectoryError> {
        Ok(self.orders.get(&order_id).map(|order| order.clone()))
    }

    fn update_status(
        &self,
        order_id: i64,
        patch: StatusPatch,
    ) -> Result<Option<Order>, DirectoryError> {
        let Some(mut order) = self.orders.get_mut(&order_id) else {
            return Ok(None);
        };

        if let Some(status) = patch.status {
            order.status = status;
        }
        if let Some(delivery_status) = patch.delivery_status {
            order.delivery_status = delivery_status;
        }
        if let Some(refund_status) = patch.refund_status {
            order.refund_status = Some(refund_status);
        }
        order.updated_at = Utc::now();

        Ok(Some(order.clone()))
    }

    fn assign_courier(
        &self,
        order_id: i64,
        courier_id: i64,
        verification_code: &str,
    ) -> Result<Option<Order>, DirectoryError> {
        let Some(mut order) = self.orders.get_mut(&order_id) else {
            return Ok(None);
        };

        if order.delivery_status != DeliveryStatus::Preparing {
            return Ok(None);
        }

        order.delivery_partner_id = Some(courier_id);
        order.verification_code = Some(verification_code.to_string());
        order.delivery_status = DeliveryStatus::Accepted;
        order.updated_at = Utc::now();

        Ok(Some(order.clone()))
    }

    fn find_active_delivery(&self, courier_id: i64) -> Result<Option<Order>, DirectoryError> {
        Ok(self
            .orders
            .iter()
            .find(|order| {
                order.delivery_partner_id == Some(courier_id)
                    && order.delivery_status == DeliveryStatus::OutForDelivery
            })
            .map(|order| order.clone()))
    }
}

/// Stand-in for the external profile service, seedable over REST.
pub struct InMemoryProfiles {
    restaurants: DashMap<i64, Restaurant>,
    users: DashMap<i64, UserProfile>,
    couriers: DashMap<i64, CourierProfile>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self {
            restaurants: DashMap::new(),
            users: DashMap::new(),
            couriers: DashMap::new(),
        }
    }

    pub fn upsert_restaurant(&self, restaurant: Restaurant) {
        self.restaurants.insert(restaurant.id, restaurant);
    }

    pub fn upsert_user(&self, user: UserProfile) {
        self.users.insert(user.id, user);
    }

    pub fn upsert_courier(&self, courier: CourierProfile) {
        self.couriers.insert(courier.id, courier);
    }

    pub fn set_courier_availability(&self, id: i64, is_available: bool) -> Option<CourierProfile> {
        let mut courier = self.couriers.get_mut(&id)?;
        courier.is_available = is_available;
        Some(courier.clone())
    }
}

impl Default for InMemoryProfiles {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileDirectory for InMemoryProfiles {
    fn restaurant(&self, id: i64) -> Result<Option<Restaurant>, DirectoryError> {
        Ok(self.restaurants.get(&id).map(|r| r.clone()))
    }

    fn user(&self, id: i64) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    fn courier(&self, id: i64) -> Result<Option<CourierProfile>, DirectoryError> {
        Ok(self.couriers.get(&id).map(|c| c.clone()))
    }

    fn available_couriers(&self) -> Result<Vec<CourierProfile>, DirectoryError> {
        Ok(self
            .couriers
            .iter()
            .filter(|courier| courier.is_available)
            .map(|courier| courier.clone())
            .collect())
    }
}
