//! Exclusive owner of the subscriber map. Readers and writers are split
//! across a `tokio::sync::RwLock`, the same idiom the websocket layer uses
//! for its connection-metadata map.

use crate::types::{
    ContactInfo, Subscriber, SubscriberId, SubscriberLocation, SubscriberPrefs, SubscriberPrefsPatch,
};
use aqi_core::AqiError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct SubscriptionRegistry {
    subscribers: Arc<RwLock<HashMap<SubscriberId, Subscriber>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Upserts a subscriber. `lastDispatchAt` is reset only on a genuinely
    /// new insert, per §4.7 — re-subscribing with the same id preserves
    /// cooldown state rather than letting a client reset it by
    /// resubscribing.
    pub async fn subscribe(
        &self,
        id: SubscriberId,
        location: SubscriberLocation,
        prefs: SubscriberPrefs,
        contact: ContactInfo,
    ) {
        let mut guard = self.subscribers.write().await;
        guard
            .entry(id)
            .and_modify(|s| {
                s.location = location;
                s.prefs = prefs.clone();
                s.contact = contact.clone();
            })
            .or_insert_with(|| {
                let mut subscriber = Subscriber::new(id, location, prefs);
                subscriber.contact = contact;
                subscriber
            });
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().await.remove(&id);
    }

    pub async fn update_prefs(&self, id: SubscriberId, patch: SubscriberPrefsPatch) -> Result<(), AqiError> {
        let mut guard = self.subscribers.write().await;
        match guard.get_mut(&id) {
            Some(subscriber) => {
                subscriber.prefs.merge(patch);
                Ok(())
            }
            None => Err(AqiError::NotFound(format!("subscriber {id} not found"))),
        }
    }

    pub async fn get(&self, id: SubscriberId) -> Option<Subscriber> {
        self.subscribers.read().await.get(&id).cloned()
    }

    /// All subscribers whose radius includes `location`. A subscriber
    /// with `radiusKm == 0` never matches, per §8 boundary behaviors.
    pub async fn within_radius(&self, location: aqi_core::LatLng) -> Vec<Subscriber> {
        let guard = self.subscribers.read().await;
        guard
            .values()
            .filter(|s| {
                s.location.radius_km > 0.0
                    && s.location.location.haversine_km(&location) <= s.location.radius_km
            })
            .cloned()
            .collect()
    }

    /// Atomically checks the per-subscriber cooldown and, if eligible,
    /// reserves the dispatch by advancing `lastDispatchAt` to `now` before
    /// releasing the write lock — so the check-then-set is indivisible
    /// under concurrent dispatch attempts for the same subscriber.
    pub async fn try_reserve_dispatch(
        &self,
        id: SubscriberId,
        now: DateTime<Utc>,
        cooldown: chrono::Duration,
    ) -> Option<Subscriber> {
        let mut guard = self.subscribers.write().await;
        let subscriber = guard.get_mut(&id)?;
        if !subscriber.prefs.enabled {
            return None;
        }
        if !subscriber.cooldown_elapsed(now, cooldown) {
            return None;
        }
        subscriber.last_dispatch_at = Some(now);
        Some(subscriber.clone())
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Every enabled subscriber's location, for the Scheduler's hot-location
    /// set (§4.9: "subscriber locations ∪ recently-queried locations").
    pub async fn all_locations(&self) -> Vec<aqi_core::LatLng> {
        self.subscribers
            .read()
            .await
            .values()
            .filter(|s| s.prefs.enabled)
            .map(|s| s.location.location)
            .collect()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, SubscriberPrefs};
    use aqi_core::LatLng;

    fn loc(lat: f64, lng: f64, radius_km: f64) -> SubscriberLocation {
        SubscriberLocation {
            location: LatLng::new(lat, lng),
            radius_km,
        }
    }

    #[tokio::test]
    async fn subscribe_then_within_radius() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriberId::new_v4();
        registry.subscribe(id, loc(40.0, -73.0, 25.0), SubscriberPrefs::default(), ContactInfo::default()).await;
        let hits = registry.within_radius(LatLng::new(40.01, -73.0)).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn zero_radius_never_matches() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriberId::new_v4();
        registry.subscribe(id, loc(40.0, -73.0, 0.0), SubscriberPrefs::default(), ContactInfo::default()).await;
        let hits = registry.within_radius(LatLng::new(40.0, -73.0)).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn resubscribe_preserves_last_dispatch_at() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriberId::new_v4();
        registry.subscribe(id, loc(40.0, -73.0, 25.0), SubscriberPrefs::default(), ContactInfo::default()).await;
        let now = Utc::now();
        registry
            .try_reserve_dispatch(id, now, chrono::Duration::hours(1))
            .await
            .unwrap();
        registry.subscribe(id, loc(40.0, -73.0, 25.0), SubscriberPrefs::default(), ContactInfo::default()).await;
        let subscriber = registry.get(id).await.unwrap();
        assert_eq!(subscriber.last_dispatch_at, Some(now));
    }

    #[tokio::test]
    async fn cooldown_blocks_second_reservation() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriberId::new_v4();
        registry.subscribe(id, loc(40.0, -73.0, 25.0), SubscriberPrefs::default(), ContactInfo::default()).await;
        let now = Utc::now();
        let cooldown = chrono::Duration::hours(1);
        assert!(registry.try_reserve_dispatch(id, now, cooldown).await.is_some());
        let soon_after = now + chrono::Duration::minutes(20);
        assert!(registry.try_reserve_dispatch(id, soon_after, cooldown).await.is_none());
        let later = now + chrono::Duration::minutes(65);
        assert!(registry.try_reserve_dispatch(id, later, cooldown).await.is_some());
    }

    #[tokio::test]
    async fn disabled_subscriber_never_reserved() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriberId::new_v4();
        let mut prefs = SubscriberPrefs::default();
        prefs.enabled = false;
        registry.subscribe(id, loc(40.0, -73.0, 25.0), prefs, ContactInfo::default()).await;
        assert!(registry
            .try_reserve_dispatch(id, Utc::now(), chrono::Duration::hours(1))
            .await
            .is_none());
        let _ = Channel::Push;
    }
}
