//! Periodic + on-demand refresh pipeline: for each hot location, fetch ->
//! canonicalize -> assemble features -> forecast -> publish to the Push Bus
//! and the AlertDispatcher. Grounded on `cherenkov-ingest`'s interval-loop
//! daemon shape (worker-pool-bounded concurrent fetch, per-item failure
//! isolation, `tokio::select!` shutdown).

use crate::hotspot::HotLocations;
use aqi_canon::Canonicalizer;
use aqi_clients::Pipeline;
use aqi_core::config::SchedulerConfig;
use aqi_core::{LatLng, PushBus, PushEvent, Query};
use aqi_forecast::{FeatureAssembler, ForecastEngine};
use aqi_subscriptions::{AlertDispatcher, SubscriptionRegistry};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default query radius for scheduler-driven refreshes, matching
/// `current-air-quality`'s documented default (spec §6).
pub const DEFAULT_RADIUS_KM: f64 = 25.0;

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    registry: SubscriptionRegistry,
    dispatcher: Arc<AlertDispatcher>,
    push_bus: PushBus,
    hot_locations: HotLocations,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        registry: SubscriptionRegistry,
        dispatcher: Arc<AlertDispatcher>,
        push_bus: PushBus,
        config: SchedulerConfig,
    ) -> Self {
        let hot_ttl = Duration::from_secs(config.tick_interval_secs.saturating_mul(4).max(60));
        Self {
            pipeline,
            registry,
            dispatcher,
            push_bus,
            hot_locations: HotLocations::new(hot_ttl),
            config,
        }
    }

    /// Marks `location` as recently queried, for on-demand requests made
    /// outside the tick loop (REST handlers call this).
    pub fn touch(&self, location: LatLng) {
        self.hot_locations.touch(location);
    }

    /// Runs the refresh pipeline for a single location on demand, bypassing
    /// the tick cadence. Used by REST handlers that need a synchronous
    /// answer.
    #[instrument(skip(self))]
    pub async fn refresh_now(&self, query: &Query) -> Result<aqi_core::Forecast, aqi_core::AqiError> {
        self.touch(query.location);
        self.refresh_one(query).await
    }

    /// Fetches and canonicalizes a single location without running the
    /// forecast stage, for `current-air-quality` (spec §6) which returns a
    /// bare `Snapshot` rather than a `Forecast`.
    #[instrument(skip(self))]
    pub async fn snapshot_now(&self, query: &Query) -> Result<aqi_core::Snapshot, aqi_core::AqiError> {
        self.touch(query.location);
        let deadline = Duration::from_secs(self.config.request_deadline_secs);
        tokio::time::timeout(deadline, async {
            let bundle = self.pipeline.fetch_all(query).await?;
            Ok(Canonicalizer::canonicalize(query.location, &bundle))
        })
        .await
        .map_err(|_| aqi_core::AqiError::Timeout)?
    }

    /// Drives the periodic tick loop until `cancel` fires, then waits up to
    /// `shutdown_grace_secs` for the in-flight tick to finish before
    /// returning. Each tick runs as its own task so that cancellation can
    /// be observed by the `select!` below even while a tick is running,
    /// rather than only between ticks.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut in_flight: Option<tokio::task::JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match &in_flight {
                        Some(handle) if !handle.is_finished() => {
                            warn!("previous tick still running, skipping this cadence");
                        }
                        _ => {
                            let this = self.clone();
                            in_flight = Some(tokio::spawn(async move { this.tick().await; }));
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("scheduler received shutdown signal");
                    break;
                }
            }
        }

        let grace = self.config.shutdown_grace();
        info!(grace_secs = grace.as_secs(), "scheduler waiting for in-flight tick to settle");
        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                if tokio::time::timeout(grace, handle).await.is_err() {
                    warn!(grace_secs = grace.as_secs(), "in-flight tick did not settle within shutdown grace");
                }
            }
        }
        info!("scheduler shut down");
    }

    /// One full tick: sweep caches and hot-location TTLs, then refresh every
    /// hot location with bounded concurrency. A single location's failure
    /// never aborts the others (§8 "Empty subscriber set: Scheduler still
    /// refreshes no locations; CPU work is bounded" generalizes to "one bad
    /// location never blocks the rest").
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        self.pipeline.sweep_caches();
        self.hot_locations.sweep();

        let subscriber_locations = self.registry.all_locations().await;
        let locations = self.hot_locations.union_with(&subscriber_locations);
        if locations.is_empty() {
            debug!("no hot locations this tick");
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.worker_pool_size));
        let mut tasks = FuturesUnordered::new();
        for location in locations {
            let semaphore = semaphore.clone();
            tasks.push(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let query = Query::new(
                    location.lat,
                    location.lng,
                    DEFAULT_RADIUS_KM,
                    self.config.default_horizon_hours,
                );
                match self.refresh_one(&query).await {
                    Ok(forecast) => {
                        self.publish_and_dispatch(forecast).await;
                    }
                    Err(e) => {
                        warn!(location = %location.room_key(), error = %e, "location refresh failed");
                    }
                }
            });
        }
        while tasks.next().await.is_some() {}
    }

    async fn refresh_one(&self, query: &Query) -> Result<aqi_core::Forecast, aqi_core::AqiError> {
        let deadline = Duration::from_secs(self.config.request_deadline_secs);
        tokio::time::timeout(deadline, self.refresh_one_inner(query))
            .await
            .map_err(|_| aqi_core::AqiError::Timeout)?
    }

    async fn refresh_one_inner(&self, query: &Query) -> Result<aqi_core::Forecast, aqi_core::AqiError> {
        let bundle = self.pipeline.fetch_all(query).await?;
        let snapshot = Canonicalizer::canonicalize(query.location, &bundle);

        // Feature assembly is always run so the fixed-shape contract stays
        // exercised even though the statistical engine doesn't yet consume
        // it (spec §9's documented ML extension point).
        let _features = FeatureAssembler::assemble(&snapshot, bundle.weather.as_ref());

        let data_sources = ForecastEngine::data_sources_from(
            bundle.satellite.is_some(),
            bundle.ground_a.is_some() || bundle.ground_b.is_some(),
            bundle.weather.is_some(),
        );
        Ok(ForecastEngine::generate(query, &snapshot, data_sources))
    }

    async fn publish_and_dispatch(&self, forecast: aqi_core::Forecast) {
        let room = forecast.location.room_key();
        self.push_bus.publish(&room, PushEvent::update(forecast.clone()));
        self.dispatcher.dispatch(&forecast).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqi_clients::{AirQualityClient, WeatherProvider};
    use aqi_core::config::Config;
    use async_trait::async_trait;

    struct EmptyClient;
    #[async_trait]
    impl AirQualityClient for EmptyClient {
        fn name(&self) -> &'static str {
            "empty"
        }
        async fn fetch(
            &self,
            _ctx: &aqi_clients::RequestContext,
            _q: &Query,
        ) -> Result<aqi_clients::AirQualityPayload, aqi_core::AqiError> {
            Err(aqi_core::AqiError::Timeout)
        }
        fn mock_fetch(&self, _query: &Query) -> aqi_clients::AirQualityPayload {
            aqi_clients::AirQualityPayload {
                source: "empty",
                measurements: vec![],
                stations: vec![],
                is_mock: true,
            }
        }
    }

    struct EmptyWeather;
    #[async_trait]
    impl WeatherProvider for EmptyWeather {
        fn name(&self) -> &'static str {
            "empty-weather"
        }
        async fn fetch(
            &self,
            _ctx: &aqi_clients::RequestContext,
            _q: &Query,
        ) -> Result<aqi_clients::WeatherPayload, aqi_core::AqiError> {
            Err(aqi_core::AqiError::Timeout)
        }
        fn mock_fetch(&self, _q: &Query) -> aqi_clients::WeatherPayload {
            aqi_clients::WeatherPayload {
                temperature_c: 20.0,
                humidity_pct: 50.0,
                wind_speed_ms: 3.0,
                pressure_hpa: 1013.0,
                cloud_cover_pct: 10.0,
                observed_at: chrono::Utc::now(),
                is_mock: true,
            }
        }
    }

    fn build_scheduler() -> Scheduler {
        let config = Config::default();
        let client: Arc<dyn AirQualityClient> = Arc::new(EmptyClient);
        let pipeline = Arc::new(Pipeline::new(
            client.clone(),
            client.clone(),
            client,
            Arc::new(EmptyWeather),
            config.sources.clone(),
            &config.cache,
        ));
        let registry = SubscriptionRegistry::new();
        let dispatcher = Arc::new(AlertDispatcher::new(
            registry.clone(),
            PushBus::new(8),
            vec![],
            &config.dispatcher,
        ));
        Scheduler::new(pipeline, registry, dispatcher, PushBus::new(8), config.scheduler)
    }

    #[tokio::test]
    async fn empty_subscriber_set_ticks_without_work() {
        let scheduler = build_scheduler();
        scheduler.tick().await;
        assert_eq!(scheduler.hot_locations.len(), 0);
    }

    #[tokio::test]
    async fn touch_makes_a_location_hot_for_the_next_tick() {
        let scheduler = build_scheduler();
        scheduler.touch(LatLng::new(12.0, 34.0));
        assert_eq!(scheduler.hot_locations.len(), 1);
    }

    #[tokio::test]
    async fn refresh_now_degrades_gracefully_with_all_sources_down() {
        let scheduler = build_scheduler();
        let query = Query::new(1.0, 1.0, 25.0, 6);
        let forecast = scheduler.refresh_now(&query).await.unwrap();
        assert_eq!(forecast.aqi.len(), 6);
    }
}
