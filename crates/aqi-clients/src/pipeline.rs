//! Ties the four upstream clients to their per-client TTL caches and fans
//! out a single query to all of them concurrently, applying each client's
//! configured fallback policy before the result is cached.

use crate::client::{AirQualityClient, WeatherProvider};
use crate::payload::{AirQualityPayload, RequestContext, WeatherPayload};
use aqi_cache::Cache;
use aqi_core::config::{CacheConfig, SourcesConfig};
use aqi_core::{AqiError, Query};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    lat_centi: i64,
    lng_centi: i64,
    radius_m: i64,
}

impl From<&Query> for CacheKey {
    fn from(q: &Query) -> Self {
        let rounded = q.location.rounded_2dp();
        Self {
            lat_centi: (rounded.lat * 100.0).round() as i64,
            lng_centi: (rounded.lng * 100.0).round() as i64,
            radius_m: (q.radius_km * 1000.0).round() as i64,
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchBundle {
    pub satellite: Option<AirQualityPayload>,
    pub ground_a: Option<AirQualityPayload>,
    pub ground_b: Option<AirQualityPayload>,
    pub weather: Option<WeatherPayload>,
}

pub struct Pipeline {
    satellite: Arc<dyn AirQualityClient>,
    ground_a: Arc<dyn AirQualityClient>,
    ground_b: Arc<dyn AirQualityClient>,
    weather: Arc<dyn WeatherProvider>,
    sources: SourcesConfig,
    cache_satellite: Cache<CacheKey, AirQualityPayload, AqiError>,
    cache_ground_a: Cache<CacheKey, AirQualityPayload, AqiError>,
    cache_ground_b: Cache<CacheKey, AirQualityPayload, AqiError>,
    cache_weather: Cache<CacheKey, WeatherPayload, AqiError>,
}

impl Pipeline {
    pub fn new(
        satellite: Arc<dyn AirQualityClient>,
        ground_a: Arc<dyn AirQualityClient>,
        ground_b: Arc<dyn AirQualityClient>,
        weather: Arc<dyn WeatherProvider>,
        sources: SourcesConfig,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            satellite,
            ground_a,
            ground_b,
            weather,
            sources,
            cache_satellite: Cache::new(cache.satellite_ttl()),
            cache_ground_a: Cache::new(cache.ground_a_ttl()),
            cache_ground_b: Cache::new(cache.ground_b_ttl()),
            cache_weather: Cache::new(cache.weather_ttl()),
        }
    }

    /// Validates the query, then fans out to all four clients concurrently.
    /// A `BadRequest` never reaches a provider. Errors from any single
    /// provider never fail the whole fetch — they resolve to the client's
    /// configured fallback (mock or `None`) per §4.2.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, query: &Query) -> Result<FetchBundle, AqiError> {
        query.validate()?;
        let key = CacheKey::from(query);

        let (satellite, ground_a, ground_b, weather) = tokio::join!(
            self.fetch_air_quality(
                key,
                query,
                &self.satellite,
                &self.cache_satellite,
                &self.sources.satellite,
            ),
            self.fetch_air_quality(
                key,
                query,
                &self.ground_a,
                &self.cache_ground_a,
                &self.sources.ground_a,
            ),
            self.fetch_air_quality(
                key,
                query,
                &self.ground_b,
                &self.cache_ground_b,
                &self.sources.ground_b,
            ),
            self.fetch_weather(key, query),
        );

        Ok(FetchBundle {
            satellite,
            ground_a,
            ground_b,
            weather,
        })
    }

    async fn fetch_air_quality(
        &self,
        key: CacheKey,
        query: &Query,
        client: &Arc<dyn AirQualityClient>,
        cache: &Cache<CacheKey, AirQualityPayload, AqiError>,
        settings: &aqi_core::config::ProviderSettings,
    ) -> Option<AirQualityPayload> {
        let allow_mock = settings.allow_mock_fallback;
        let timeout = Duration::from_secs(settings.timeout_secs);
        let result = cache
            .get_or_compute(key, || async {
                let ctx = RequestContext::with_timeout(timeout);
                match client.fetch(&ctx, query).await {
                    Ok(payload) => {
                        crate::metrics::record_fetch(client.name(), "live");
                        Ok(payload)
                    }
                    Err(e) if allow_mock => {
                        warn!(source = client.name(), error = %e, "falling back to deterministic mock");
                        crate::metrics::record_fetch(client.name(), "mock");
                        Ok(client.mock_fetch(query))
                    }
                    Err(e) => {
                        crate::metrics::record_fetch(client.name(), "error");
                        Err(e)
                    }
                }
            })
            .await;
        match result {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(source = client.name(), error = %e, "upstream unavailable, skipping from merge");
                None
            }
        }
    }

    async fn fetch_weather(&self, key: CacheKey, query: &Query) -> Option<WeatherPayload> {
        let settings = &self.sources.weather;
        let allow_mock = settings.allow_mock_fallback;
        let timeout = Duration::from_secs(settings.timeout_secs);
        let result = self
            .cache_weather
            .get_or_compute(key, || async {
                let ctx = RequestContext::with_timeout(timeout);
                match self.weather.fetch(&ctx, query).await {
                    Ok(payload) => Ok(payload),
                    Err(e) if allow_mock => {
                        warn!(source = self.weather.name(), error = %e, "falling back to deterministic weather mock");
                        Ok(self.weather.mock_fetch(query))
                    }
                    Err(e) => Err(e),
                }
            })
            .await;
        result.ok()
    }

    /// Removes expired entries from every per-client cache. Invoked on the
    /// scheduler's tick, ahead of the refresh pass.
    pub fn sweep_caches(&self) {
        self.cache_satellite.sweep();
        self.cache_ground_a.sweep();
        self.cache_ground_b.sweep();
        self.cache_weather.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{AirQualityPayload as Payload, WeatherPayload};
    use async_trait::async_trait;
    use aqi_core::{LatLng, Measurement, Pollutant};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyClient {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AirQualityClient for FlakyClient {
        fn name(&self) -> &'static str {
            "flaky"
        }
        async fn fetch(&self, _ctx: &RequestContext, _q: &Query) -> Result<Payload, AqiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AqiError::Upstream("boom".to_string()))
        }
        fn mock_fetch(&self, _query: &Query) -> Payload {
            Payload {
                source: "flaky",
                measurements: vec![Measurement {
                    pollutant: Pollutant::NO2,
                    concentration: 10.0,
                    unit: "ppb".to_string(),
                    source: "flaky".to_string(),
                    station_id: None,
                    observed_at: Utc::now(),
                    distance_meters: Some(0.0),
                }],
                stations: vec![],
                is_mock: true,
            }
        }
    }

    struct DeadWeather;
    #[async_trait]
    impl WeatherProvider for DeadWeather {
        fn name(&self) -> &'static str {
            "dead-weather"
        }
        async fn fetch(&self, _ctx: &RequestContext, _q: &Query) -> Result<WeatherPayload, AqiError> {
            Err(AqiError::Timeout)
        }
        fn mock_fetch(&self, _q: &Query) -> WeatherPayload {
            unreachable!("weather mock disabled in this test's config")
        }
    }

    fn test_sources(ground_a_mock: bool) -> SourcesConfig {
        use aqi_core::config::ProviderSettings;
        let settings = |allow_mock: bool| ProviderSettings {
            base_url: "https://example.invalid".to_string(),
            api_key: None,
            timeout_secs: 1,
            allow_mock_fallback: allow_mock,
        };
        SourcesConfig {
            satellite: settings(true),
            ground_a: settings(ground_a_mock),
            ground_b: settings(true),
            weather: settings(false),
        }
    }

    #[tokio::test]
    async fn fallback_mock_used_when_allowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client: Arc<dyn AirQualityClient> = Arc::new(FlakyClient { calls: calls.clone() });
        let cache_cfg = aqi_core::config::Config::default().cache;
        let pipeline = Pipeline::new(
            client.clone(),
            client.clone(),
            client.clone(),
            Arc::new(DeadWeather),
            test_sources(false),
            &cache_cfg,
        );
        let query = Query::new(10.0, 10.0, 25.0, 24);
        let bundle = pipeline.fetch_all(&query).await.unwrap();
        assert!(bundle.satellite.is_some());
        assert!(bundle.ground_a.is_none()); // allow_mock_fallback=false for ground_a in this test
        assert!(bundle.ground_b.is_some());
        assert!(bundle.weather.is_none());
    }

    #[tokio::test]
    async fn bad_request_never_touches_upstream() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client: Arc<dyn AirQualityClient> = Arc::new(FlakyClient { calls: calls.clone() });
        let cache_cfg = aqi_core::config::Config::default().cache;
        let pipeline = Pipeline::new(
            client.clone(),
            client.clone(),
            client.clone(),
            Arc::new(DeadWeather),
            test_sources(true),
            &cache_cfg,
        );
        let bad_query = Query::new(200.0, 10.0, 25.0, 24);
        let result = pipeline.fetch_all(&bad_query).await;
        assert!(matches!(result, Err(AqiError::BadRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
