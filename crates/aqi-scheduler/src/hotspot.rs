//! Tracks the "hot location" set: subscriber locations union recently
//! queried locations within a TTL window, per §4.9/GLOSSARY. Keyed by the
//! 2dp room-key quantization so repeated on-demand queries to the same
//! rounded location collapse to one tracked entry.

use aqi_core::LatLng;
use dashmap::DashMap;
use std::time::{Duration, Instant};

pub struct HotLocations {
    touched: DashMap<String, (LatLng, Instant)>,
    ttl: Duration,
}

impl HotLocations {
    pub fn new(ttl: Duration) -> Self {
        Self {
            touched: DashMap::new(),
            ttl,
        }
    }

    /// Records an on-demand request against `location`, refreshing its TTL.
    pub fn touch(&self, location: LatLng) {
        self.touched.insert(location.room_key(), (location, Instant::now()));
    }

    /// Drops entries whose TTL has elapsed. Invoked once per scheduler tick,
    /// alongside the cache sweep.
    pub fn sweep(&self) {
        let ttl = self.ttl;
        self.touched.retain(|_, (_, touched_at)| touched_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.touched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    /// Union of recently-touched locations with `subscriber_locations`,
    /// deduplicated by room key.
    pub fn union_with(&self, subscriber_locations: &[LatLng]) -> Vec<LatLng> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for entry in self.touched.iter() {
            let (location, _) = entry.value();
            if seen.insert(location.room_key()) {
                out.push(*location);
            }
        }
        for location in subscriber_locations {
            if seen.insert(location.room_key()) {
                out.push(*location);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_then_union_includes_it() {
        let hot = HotLocations::new(Duration::from_secs(60));
        hot.touch(LatLng::new(10.0, 10.0));
        let locations = hot.union_with(&[]);
        assert_eq!(locations.len(), 1);
    }

    #[test]
    fn dedups_against_subscriber_locations_by_room_key() {
        let hot = HotLocations::new(Duration::from_secs(60));
        hot.touch(LatLng::new(10.001, 10.001));
        let locations = hot.union_with(&[LatLng::new(10.002, 10.002)]);
        assert_eq!(locations.len(), 1);
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let hot = HotLocations::new(Duration::from_millis(1));
        hot.touch(LatLng::new(1.0, 1.0));
        std::thread::sleep(Duration::from_millis(5));
        hot.sweep();
        assert!(hot.is_empty());
    }
}
