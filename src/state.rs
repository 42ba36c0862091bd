use std::sync::Arc;

use crate::cache::PendingOrders;
use crate::config::Config;
use crate::directory::memory::{InMemoryOrders, InMemoryProfiles};
use crate::engine::DispatchEngine;
use crate::notify::LogNotifier;
use crate::observability::metrics::Metrics;
use crate::presence::PresenceStore;
use crate::rooms::RoomRouter;

/// Everything the HTTP and socket layers share. The engine holds its own
/// handles to the collaborators; the extra handles here serve the REST
/// surface (profile seeding, queue snapshots, health).
pub struct AppState {
    pub engine: DispatchEngine,
    pub rooms: Arc<RoomRouter>,
    pub presence: Arc<PresenceStore>,
    pub profiles: Arc<InMemoryProfiles>,
    pub pending: Arc<PendingOrders>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let rooms = Arc::new(RoomRouter::new());
        let presence = Arc::new(PresenceStore::new(config.presence_ttl()));
        let orders = Arc::new(InMemoryOrders::new());
        let profiles = Arc::new(InMemoryProfiles::new());
        let pending = Arc::new(PendingOrders::new());
        let metrics = Metrics::new();

        let engine = DispatchEngine::new(
            rooms.clone(),
            presence.clone(),
            orders,
            profiles.clone(),
            pending.clone(),
            Arc::new(LogNotifier),
            metrics.clone(),
            config.match_radius_km,
        );

        Self {
            engine,
            rooms,
            presence,
            profiles,
            pending,
            metrics,
        }
    }
}
