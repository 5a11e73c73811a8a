use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::events::PushEvent;

/// One client's mailbox: a bounded FIFO with drop-oldest backpressure.
/// Publishers never block on a slow or dead client.
struct Outbox {
    queue: std::sync::Mutex<std::collections::VecDeque<PushEvent>>,
    capacity: usize,
    notify: Notify,
}

impl Outbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: std::sync::Mutex::new(std::collections::VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    fn push(&self, event: PushEvent) -> bool {
        let mut q = self.queue.lock().unwrap();
        let dropped = if q.len() >= self.capacity {
            q.pop_front();
            true
        } else {
            false
        };
        q.push_back(event);
        drop(q);
        self.notify.notify_waiters();
        dropped
    }

    fn drain(&self) -> Vec<PushEvent> {
        let mut q = self.queue.lock().unwrap();
        q.drain(..).collect()
    }

    async fn recv(&self) -> PushEvent {
        loop {
            {
                let mut q = self.queue.lock().unwrap();
                if let Some(event) = q.pop_front() {
                    return event;
                }
            }
            self.notify.notified().await;
        }
    }
}

/// Publish/subscribe primitive keyed by opaque room strings, fed by the
/// Scheduler and the AlertDispatcher and drained by realtime transport
/// (websocket) handlers.
///
/// Backpressure guarantee: a slow or dead client never blocks a publisher —
/// its outbox drops the *oldest* buffered event and the drop is logged.
/// Ordering guarantee: events delivered to a single client arrive in
/// publish order.
#[derive(Clone)]
pub struct PushBus {
    rooms: Arc<DashMap<String, DashSet<String>>>,
    clients: Arc<DashMap<String, Arc<Outbox>>>,
    default_outbox_capacity: usize,
}

impl PushBus {
    pub fn new(default_outbox_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            clients: Arc::new(DashMap::new()),
            default_outbox_capacity,
        }
    }

    fn outbox_for(&self, client_id: &str) -> Arc<Outbox> {
        self.clients
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(Outbox::new(self.default_outbox_capacity)))
            .clone()
    }

    pub fn join(&self, client_id: &str, room: &str) {
        self.outbox_for(client_id);
        self.rooms
            .entry(room.to_string())
            .or_insert_with(DashSet::new)
            .insert(client_id.to_string());
        debug!(client_id, room, "joined push-bus room");
    }

    pub fn leave(&self, client_id: &str, room: &str) {
        if let Some(members) = self.rooms.get(room) {
            members.remove(client_id);
        }
    }

    /// Drops a client entirely, removing it from every room it had joined.
    pub fn disconnect(&self, client_id: &str) {
        self.clients.remove(client_id);
        for entry in self.rooms.iter() {
            entry.value().remove(client_id);
        }
    }

    /// Fan out `event` to every client currently joined to `room`.
    pub fn publish(&self, room: &str, event: PushEvent) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for client_id in members.iter() {
            let outbox = self.outbox_for(client_id.key());
            if outbox.push(event.clone()) {
                warn!(room, client = client_id.key(), "push-bus outbox full, dropped oldest event");
            }
        }
    }

    /// Blocks until the next event for `client_id` is available. Used by
    /// the websocket write-loop to drain a client's mailbox in order.
    pub async fn recv(&self, client_id: &str) -> PushEvent {
        self.outbox_for(client_id).recv().await
    }

    /// Non-blocking drain, primarily useful for tests asserting on
    /// backpressure behavior without timing-sensitive awaits.
    pub fn drain(&self, client_id: &str) -> Vec<PushEvent> {
        self.outbox_for(client_id).drain()
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for PushBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, AlertKind};
    use crate::geo::LatLng;
    use chrono::Utc;

    fn info_alert() -> Alert {
        Alert {
            kind: AlertKind::Info,
            hours_until: 0,
            aqi: None,
            pollutant: None,
            value: None,
            message: "test".to_string(),
            at: Utc::now(),
        }
    }

    #[test]
    fn s6_backpressure_drops_oldest_keeps_newest() {
        let bus = PushBus::new(64);
        bus.join("slow", "loc:1,1");
        bus.join("fast", "loc:1,1");

        let mut fast_events = Vec::new();
        for i in 0..200 {
            bus.publish(
                "loc:1,1",
                PushEvent::alert(format!("{i}"), vec![info_alert()], LatLng::new(1.0, 1.0)),
            );
            // "fast" drains after every publish, so it never hits capacity
            // and observes every event; "slow" never drains until the end.
            fast_events.extend(bus.drain("fast"));
        }

        let slow_events = bus.drain("slow");
        assert_eq!(slow_events.len(), 64);
        // The surviving events are the most recent 64 publishes (136..200).
        if let PushEvent::AirQualityAlert { subscriber_id, .. } = &slow_events[0] {
            assert_eq!(subscriber_id, "136");
        } else {
            panic!("wrong event variant");
        }
        if let PushEvent::AirQualityAlert { subscriber_id, .. } = slow_events.last().unwrap() {
            assert_eq!(subscriber_id, "199");
        } else {
            panic!("wrong event variant");
        }

        assert_eq!(fast_events.len(), 200);
    }

    #[test]
    fn publish_to_empty_room_is_noop() {
        let bus = PushBus::new(8);
        bus.publish("nobody-here", PushEvent::alert("x", vec![], LatLng::new(0.0, 0.0)));
    }

    #[test]
    fn leave_stops_future_delivery() {
        let bus = PushBus::new(8);
        bus.join("a", "room");
        bus.leave("a", "room");
        bus.publish("room", PushEvent::alert("a", vec![info_alert()], LatLng::new(0.0, 0.0)));
        assert!(bus.drain("a").is_empty());
    }
}
