use dashmap::DashMap;

use crate::models::order::Order;

/// Per-restaurant queue of orders awaiting acceptance, most-recent-first.
/// This is what the restaurant's live queue shows; it is mutated on
/// placement, acceptance, and cancellation instead of being re-derived from
/// the order directory on every change.
pub struct PendingOrders {
    queues: DashMap<i64, Vec<Order>>,
}

impl PendingOrders {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    /// Prepends: the newest order is always first.
    pub fn push(&self, restaurant_id: i64, order: Order) {
        self.queues
            .entry(restaurant_id)
            .or_default()
            .insert(0, order);
    }

    pub fn remove(&self, restaurant_id: i64, order_id: i64) {
        if let Some(mut queue) = self.queues.get_mut(&restaurant_id) {
            queue.retain(|order| order.id != order_id);
        }
    }

    pub fn snapshot(&self, restaurant_id: i64) -> Vec<Order> {
        self.queues
            .get(&restaurant_id)
            .map(|queue| queue.clone())
            .unwrap_or_default()
    }
}

impl Default for PendingOrders {
    fn default() -> Self {
        Self::new()
    }
}
