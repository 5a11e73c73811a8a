//! Evaluates a freshly generated forecast against every subscriber in range
//! and fans alerts out across push/email/sms, per §4.8.

use crate::rate_limiter::RateLimiterRegistry;
use crate::registry::SubscriptionRegistry;
use crate::sink::{AlertBundle, NotificationSink};
use crate::types::{Channel, SubscriberId, SubscriberPrefs};
use aqi_core::config::DispatcherConfig;
use aqi_core::{Alert, AlertKind, Forecast, PushBus, PushEvent};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One completed dispatch, retained in the bounded history ring.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub subscriber_id: SubscriberId,
    pub alerts: Vec<Alert>,
    pub channels_sent: Vec<&'static str>,
    pub at: DateTime<Utc>,
}

/// Re-derives alert severity from `forecast`'s already-computed AQI
/// trajectory and per-pollutant predictions, but against `prefs`'s own
/// thresholds rather than the engine's defaults: per §4.8, "the
/// subscriber's thresholds override the forecast's defaults — include only
/// alerts whose computed severity at the subscriber's thresholds is at
/// least warning."
fn alerts_for_subscriber(forecast: &Forecast, prefs: &SubscriberPrefs) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let t = &prefs.aqi_thresholds;
    for pred in forecast.aqi.iter().filter(|p| p.hour <= 24) {
        let kind = if pred.aqi >= t.emergency {
            Some(AlertKind::AqiEmergency)
        } else if pred.aqi >= t.critical {
            Some(AlertKind::AqiCritical)
        } else if pred.aqi >= t.warning {
            Some(AlertKind::AqiWarning)
        } else {
            None
        };
        if let Some(kind) = kind {
            alerts.push(Alert {
                kind,
                hours_until: pred.hour,
                aqi: Some(pred.aqi),
                pollutant: None,
                value: None,
                message: format!("AQI forecast to reach {} in {}h", pred.aqi, pred.hour),
                at: pred.at,
            });
        }
    }
    for (pollutant, preds) in &forecast.per_pollutant {
        let Some(threshold) = prefs.per_pollutant_thresholds.get(pollutant) else {
            continue;
        };
        for pred in preds.iter().filter(|p| p.hour <= 24) {
            let kind = if pred.concentration >= threshold.critical {
                Some(AlertKind::PollutantCritical)
            } else if pred.concentration >= threshold.warning {
                Some(AlertKind::PollutantWarning)
            } else {
                None
            };
            if let Some(kind) = kind {
                alerts.push(Alert {
                    kind,
                    hours_until: pred.hour,
                    aqi: None,
                    pollutant: Some(*pollutant),
                    value: Some(pred.concentration),
                    message: format!(
                        "{} forecast to reach {:.1} in {}h",
                        pollutant, pred.concentration, pred.hour
                    ),
                    at: pred.at,
                });
            }
        }
    }
    alerts
}

/// Per-location alert evaluation and multi-channel dispatch, with a
/// bounded in-memory history ring for inspection and testing.
pub struct AlertDispatcher {
    registry: SubscriptionRegistry,
    push_bus: PushBus,
    sinks: Vec<Arc<dyn NotificationSink>>,
    rate_limiters: RateLimiterRegistry,
    cooldown: chrono::Duration,
    history: Arc<RwLock<VecDeque<DispatchRecord>>>,
    history_capacity: usize,
}

impl AlertDispatcher {
    pub fn new(
        registry: SubscriptionRegistry,
        push_bus: PushBus,
        sinks: Vec<Arc<dyn NotificationSink>>,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            push_bus,
            sinks,
            rate_limiters: RateLimiterRegistry::new(),
            cooldown: chrono::Duration::seconds(config.cooldown_secs as i64),
            history: Arc::new(RwLock::new(VecDeque::with_capacity(config.history_capacity))),
            history_capacity: config.history_capacity,
        }
    }

    /// Evaluates `forecast` against every subscriber within radius of its
    /// location. For each one: skip if no alert clears its own thresholds,
    /// skip if disabled or still in cooldown, otherwise dispatch to every
    /// enabled channel and append a record to the history ring.
    pub async fn dispatch(&self, forecast: &Forecast) -> Vec<DispatchRecord> {
        let now = Utc::now();
        let mut dispatched = Vec::new();
        for candidate in self.registry.within_radius(forecast.location).await {
            let alerts = alerts_for_subscriber(forecast, &candidate.prefs);
            if alerts.is_empty() {
                continue;
            }
            let Some(subscriber) = self
                .registry
                .try_reserve_dispatch(candidate.id, now, self.cooldown)
                .await
            else {
                debug!(subscriber = %candidate.id, "alert suppressed by cooldown or disabled");
                continue;
            };

            let bundle = AlertBundle {
                subscriber: &subscriber,
                alerts: &alerts,
                location_label: format!("{:.2},{:.2}", forecast.location.lat, forecast.location.lng),
            };

            let mut channels_sent = Vec::new();
            for channel in &subscriber.prefs.channels {
                match channel {
                    Channel::Push => {
                        self.push_bus.publish(
                            &format!("user:{}", subscriber.id),
                            PushEvent::alert(subscriber.id.to_string(), alerts.clone(), forecast.location),
                        );
                        channels_sent.push("push");
                    }
                    Channel::Email | Channel::Sms => {
                        let name = if *channel == Channel::Email { "email" } else { "sms" };
                        self.rate_limiters.get(*channel).acquire().await;
                        for sink in self.sinks.iter().filter(|s| s.channel_name() == name) {
                            if sink.send(&bundle).await {
                                channels_sent.push(sink.channel_name());
                            }
                        }
                    }
                }
            }

            info!(
                subscriber = %subscriber.id,
                alert_count = alerts.len(),
                channels = ?channels_sent,
                "dispatched air-quality alert"
            );

            let record = DispatchRecord {
                subscriber_id: subscriber.id,
                alerts,
                channels_sent,
                at: now,
            };
            self.record(record.clone()).await;
            dispatched.push(record);
        }
        dispatched
    }

    /// Injects a synthetic `info` alert for `subscriber_id`, bypassing the
    /// cooldown reservation entirely, per §6 `POST test`. Returns `None`
    /// if the subscriber doesn't exist; a disabled subscriber still
    /// receives the test alert, since this is an operator/diagnostic path
    /// rather than the regular forecast-driven dispatch.
    pub async fn dispatch_test(&self, subscriber_id: SubscriberId) -> Option<DispatchRecord> {
        let subscriber = self.registry.get(subscriber_id).await?;
        let now = Utc::now();
        let alert = Alert {
            kind: AlertKind::Info,
            hours_until: 0,
            aqi: None,
            pollutant: None,
            value: None,
            message: "This is a test alert from your air-quality subscription.".to_string(),
            at: now,
        };
        let alerts = vec![alert];
        let bundle = AlertBundle {
            subscriber: &subscriber,
            alerts: &alerts,
            location_label: format!(
                "{:.2},{:.2}",
                subscriber.location.location.lat, subscriber.location.location.lng
            ),
        };

        let mut channels_sent = Vec::new();
        for channel in &subscriber.prefs.channels {
            match channel {
                Channel::Push => {
                    self.push_bus.publish(
                        &format!("user:{}", subscriber.id),
                        PushEvent::alert(subscriber.id.to_string(), alerts.clone(), subscriber.location.location),
                    );
                    channels_sent.push("push");
                }
                Channel::Email | Channel::Sms => {
                    let name = if *channel == Channel::Email { "email" } else { "sms" };
                    self.rate_limiters.get(*channel).acquire().await;
                    for sink in self.sinks.iter().filter(|s| s.channel_name() == name) {
                        if sink.send(&bundle).await {
                            channels_sent.push(sink.channel_name());
                        }
                    }
                }
            }
        }

        let record = DispatchRecord {
            subscriber_id: subscriber.id,
            alerts,
            channels_sent,
            at: now,
        };
        self.record(record.clone()).await;
        Some(record)
    }

    async fn record(&self, record: DispatchRecord) {
        let mut history = self.history.write().await;
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(record);
    }

    pub async fn history(&self) -> Vec<DispatchRecord> {
        self.history.read().await.iter().cloned().collect()
    }

    /// `GET history` per §6: the latest dispatched bundles for one
    /// subscriber, newest first, capped at `limit`.
    pub async fn history_for(&self, subscriber_id: SubscriberId, limit: usize) -> Vec<DispatchRecord> {
        self.history
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.subscriber_id == subscriber_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactInfo, SubscriberLocation};
    use aqi_core::{AqiPrediction, Availability, DataSources, Level};
    use aqi_core::LatLng;
    use std::collections::BTreeMap;

    fn forecast_with_peak(location: LatLng, aqi_at_h: &[(u32, i32)]) -> Forecast {
        let generated_at = Utc::now();
        let aqi: Vec<AqiPrediction> = aqi_at_h
            .iter()
            .map(|(h, value)| AqiPrediction {
                hour: *h,
                aqi: *value,
                level: Level::from_aqi(*value),
                at: generated_at + chrono::Duration::hours(*h as i64),
            })
            .collect();
        Forecast {
            location,
            horizon_hours: aqi.iter().map(|p| p.hour).max().unwrap_or(0),
            generated_at,
            per_pollutant: BTreeMap::new(),
            aqi,
            confidence: BTreeMap::new(),
            alerts: vec![],
            recommendations: vec![],
            data_sources: DataSources {
                satellite: Availability::Unavailable,
                ground: Availability::Unavailable,
                weather: Availability::Unavailable,
            },
        }
    }

    async fn registry_with_subscriber(location: LatLng) -> (SubscriptionRegistry, SubscriberId) {
        let registry = SubscriptionRegistry::new();
        let id = SubscriberId::new_v4();
        registry
            .subscribe(
                id,
                SubscriberLocation {
                    location,
                    radius_km: 10.0,
                },
                SubscriberPrefs::default(),
                ContactInfo::default(),
            )
            .await;
        (registry, id)
    }

    #[tokio::test]
    async fn s5_cooldown_allows_second_dispatch_only_after_window() {
        let location = LatLng::new(40.0, -73.0);
        let (registry, _id) = registry_with_subscriber(location).await;
        let config = DispatcherConfig {
            cooldown_secs: 3600,
            history_capacity: 1000,
        };
        let dispatcher = AlertDispatcher::new(registry, PushBus::new(8), vec![], &config);

        // t=0: AQI 130 at h=3 clears warning(100) -> dispatch.
        let forecast_a = forecast_with_peak(location, &[(3, 130)]);
        let first = dispatcher.dispatch(&forecast_a).await;
        assert_eq!(first.len(), 1);

        // t+20min: AQI 140 at h=2 would also clear, but cooldown blocks it.
        let forecast_b = forecast_with_peak(location, &[(2, 140)]);
        let second = dispatcher.dispatch(&forecast_b).await;
        assert!(second.is_empty());

        assert_eq!(dispatcher.history_len().await, 1);
    }

    #[tokio::test]
    async fn cooldown_releases_after_the_window_elapses() {
        let location = LatLng::new(40.0, -73.0);
        let (registry, id) = registry_with_subscriber(location).await;
        let cooldown = chrono::Duration::hours(1);
        let dispatched_at = Utc::now() - chrono::Duration::minutes(65);
        registry
            .try_reserve_dispatch(id, dispatched_at, cooldown)
            .await
            .unwrap();

        let config = DispatcherConfig {
            cooldown_secs: 3600,
            history_capacity: 1000,
        };
        let dispatcher = AlertDispatcher::new(registry, PushBus::new(8), vec![], &config);
        // 65 minutes have elapsed since the prior dispatch; AQI 105 clears warning(100) again.
        let forecast_c = forecast_with_peak(location, &[(1, 105)]);
        let third = dispatcher.dispatch(&forecast_c).await;
        assert_eq!(third.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_test_bypasses_cooldown_and_disabled() {
        let location = LatLng::new(5.0, 5.0);
        let (registry, id) = registry_with_subscriber(location).await;
        let config = DispatcherConfig {
            cooldown_secs: 3600,
            history_capacity: 1000,
        };
        let dispatcher = AlertDispatcher::new(registry.clone(), PushBus::new(8), vec![], &config);

        let first = dispatcher.dispatch_test(id).await.unwrap();
        assert_eq!(first.alerts[0].kind, AlertKind::Info);
        let second = dispatcher.dispatch_test(id).await.unwrap();
        assert_eq!(dispatcher.history_len().await, 2);
        let _ = second;
    }

    #[tokio::test]
    async fn dispatch_test_unknown_subscriber_returns_none() {
        let registry = SubscriptionRegistry::new();
        let config = DispatcherConfig {
            cooldown_secs: 3600,
            history_capacity: 1000,
        };
        let dispatcher = AlertDispatcher::new(registry, PushBus::new(8), vec![], &config);
        assert!(dispatcher.dispatch_test(SubscriberId::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn history_for_is_newest_first_and_scoped_to_subscriber() {
        let location = LatLng::new(5.0, 5.0);
        let (registry, id) = registry_with_subscriber(location).await;
        let other_id = SubscriberId::new_v4();
        let config = DispatcherConfig {
            cooldown_secs: 0,
            history_capacity: 1000,
        };
        let dispatcher = AlertDispatcher::new(registry, PushBus::new(8), vec![], &config);
        dispatcher.dispatch_test(id).await.unwrap();
        dispatcher.dispatch_test(other_id).await;
        dispatcher.dispatch_test(id).await.unwrap();

        let history = dispatcher.history_for(id, 1000).await;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.subscriber_id == id));
        assert!(history[0].at >= history[1].at);

        let capped = dispatcher.history_for(id, 1).await;
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn no_qualifying_alert_means_no_dispatch() {
        let location = LatLng::new(10.0, 10.0);
        let (registry, _id) = registry_with_subscriber(location).await;
        let config = DispatcherConfig {
            cooldown_secs: 3600,
            history_capacity: 1000,
        };
        let dispatcher = AlertDispatcher::new(registry, PushBus::new(8), vec![], &config);
        let forecast = forecast_with_peak(location, &[(1, 40), (2, 50)]);
        let result = dispatcher.dispatch(&forecast).await;
        assert!(result.is_empty());
        assert_eq!(dispatcher.history_len().await, 0);
    }

    #[tokio::test]
    async fn history_ring_is_bounded() {
        let location = LatLng::new(0.0, 0.0);
        let config = DispatcherConfig {
            cooldown_secs: 0,
            history_capacity: 2,
        };
        let registry = SubscriptionRegistry::new();
        let dispatcher = AlertDispatcher::new(registry.clone(), PushBus::new(8), vec![], &config);
        for _ in 0..5 {
            let id = SubscriberId::new_v4();
            registry
                .subscribe(
                    id,
                    SubscriberLocation {
                        location,
                        radius_km: 10.0,
                    },
                    SubscriberPrefs::default(),
                    ContactInfo::default(),
                )
                .await;
            let forecast = forecast_with_peak(location, &[(1, 150)]);
            dispatcher.dispatch(&forecast).await;
        }
        assert_eq!(dispatcher.history_len().await, 2);
    }
}
