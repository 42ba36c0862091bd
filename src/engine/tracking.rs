use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::dispatch::DispatchEngine;
use crate::state::AppState;

impl DispatchEngine {
    /// One pass over the presence store: every courier with a live sample
    /// and an out-for-delivery order gets its position fanned out to the
    /// order's user and restaurant rooms. Read-only apart from the emits,
    /// so it can run concurrently with any in-flight transition.
    pub fn tracking_sweep(&self) -> usize {
        let timer = self.metrics().tracking_sweep_seconds.start_timer();
        let mut emitted = 0;

        for courier_id in self.presence().active_courier_ids() {
            let order = match self.orders().find_active_delivery(courier_id) {
                Ok(Some(order)) => order,
                Ok(None) => continue,
                Err(err) => {
                    warn!(courier_id, error = %err, "active delivery lookup failed during sweep");
                    continue;
                }
            };

            // The sample may expire between the id scan and this read.
            let Some(location) = self.presence().location(courier_id) else {
                continue;
            };

            self.emit_tracking(&order, location);
            emitted += 1;
        }

        timer.observe_duration();
        emitted
    }
}

/// Periodic location broadcast, one independent task for the process
/// lifetime. A slow pass delays the next tick instead of bursting.
pub async fn run_tracking_sweep(state: Arc<AppState>, period: Duration) {
    info!(period_secs = period.as_secs(), "tracking sweep started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let emitted = state.engine.tracking_sweep();
        if emitted > 0 {
            debug!(emitted, "tracking updates broadcast");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;
    use tokio::time::{advance, Duration};
    use uuid::Uuid;

    use crate::cache::PendingOrders;
    use crate::directory::memory::{InMemoryOrders, InMemoryProfiles};
    use crate::directory::OrderDirectory;
    use crate::engine::dispatch::DispatchEngine;
    use crate::models::order::{DeliveryStatus, NewOrder, StatusPatch};
    use crate::models::GeoPoint;
    use crate::notify::LogNotifier;
    use crate::observability::metrics::Metrics;
    use crate::presence::PresenceStore;
    use crate::rooms::{Room, RoomRouter};

    fn engine() -> (DispatchEngine, Arc<RoomRouter>, Arc<InMemoryOrders>, Arc<PresenceStore>) {
        let rooms = Arc::new(RoomRouter::new());
        let presence = Arc::new(PresenceStore::new(Duration::from_secs(300)));
        let orders = Arc::new(InMemoryOrders::new());

        let engine = DispatchEngine::new(
            rooms.clone(),
            presence.clone(),
            orders.clone(),
            Arc::new(InMemoryProfiles::new()),
            Arc::new(PendingOrders::new()),
            Arc::new(LogNotifier),
            Metrics::new(),
            10.0,
        );

        (engine, rooms, orders, presence)
    }

    fn out_for_delivery_order(orders: &InMemoryOrders, courier_id: i64) -> i64 {
        let order = orders
            .insert(NewOrder {
                user_id: 1,
                restaurant_id: 42,
                delivery_address: GeoPoint { lat: 0.02, lng: 0.0 },
                total_amount: 25.0,
            })
            .unwrap();
        orders
            .update_status(order.id, StatusPatch::delivery(DeliveryStatus::Preparing))
            .unwrap();
        orders.assign_courier(order.id, courier_id, "1234").unwrap();
        orders
            .update_status(order.id, StatusPatch::delivery(DeliveryStatus::OutForDelivery))
            .unwrap();
        order.id
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_emits_to_user_and_restaurant_rooms() {
        let (engine, rooms, orders, presence) = engine();
        let order_id = out_for_delivery_order(&orders, 5);
        presence.set_location(5, GeoPoint { lat: 0.01, lng: 0.0 });

        let (user_tx, mut user_rx) = mpsc::unbounded_channel();
        let (rest_tx, mut rest_rx) = mpsc::unbounded_channel();
        rooms.join(Room::User(1), Uuid::new_v4(), user_tx);
        rooms.join(Room::Restaurant(42), Uuid::new_v4(), rest_tx);

        assert_eq!(engine.tracking_sweep(), 1);

        let frame = user_rx.try_recv().unwrap();
        assert!(frame.contains("\"event\":\"delivery_tracking\""));
        assert!(frame.contains(&format!("\"orderId\":{order_id}")));
        assert!(rest_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_couriers_produce_no_emissions() {
        let (engine, _rooms, _orders, presence) = engine();
        presence.set_location(5, GeoPoint { lat: 0.01, lng: 0.0 });

        assert_eq!(engine.tracking_sweep(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_presence_is_skipped() {
        let (engine, _rooms, orders, presence) = engine();
        out_for_delivery_order(&orders, 5);
        presence.set_location(5, GeoPoint { lat: 0.01, lng: 0.0 });

        advance(Duration::from_secs(301)).await;

        assert_eq!(engine.tracking_sweep(), 0);
    }
}
