use dashmap::DashMap;
use tokio::time::{Duration, Instant};

use crate::models::GeoPoint;

struct Sample {
    location: GeoPoint,
    expires_at: Instant,
}

/// Latest known location per courier, valid for a fixed TTL after the last
/// sample. An absent or expired entry means the courier's presence is
/// unknown and it must not be matched.
pub struct PresenceStore {
    ttl: Duration,
    entries: DashMap<i64, Sample>,
}

impl PresenceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Upserts the courier's location and refreshes its TTL.
    pub fn set_location(&self, courier_id: i64, location: GeoPoint) {
        self.entries.insert(
            courier_id,
            Sample {
                location,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn location(&self, courier_id: i64) -> Option<GeoPoint> {
        let (location, expires_at) = {
            let sample = self.entries.get(&courier_id)?;
            (sample.location, sample.expires_at)
        };

        if expires_at <= Instant::now() {
            self.entries.remove(&courier_id);
            return None;
        }

        Some(location)
    }

    /// Couriers with a live, unexpired sample. Expired entries are skipped
    /// but only purged lazily on the next `location` read.
    pub fn active_courier_ids(&self) -> Vec<i64> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| *entry.key())
            .collect()
    }
}
