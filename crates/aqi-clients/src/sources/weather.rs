use crate::client::WeatherProvider;
use crate::mock::seed_for_location;
use crate::payload::{RequestContext, WeatherPayload};
use aqi_core::{AqiError, Query};
use async_trait::async_trait;
use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reqwest::Client;
use serde::Deserialize;
use tracing::{instrument, warn};

/// Open-Meteo-style current-conditions provider, feeding the
/// FeatureAssembler's weather columns and the forecast's stagnation /
/// dispersion indices.
pub struct WeatherClient {
    http: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: OpenMeteoCurrent,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    pressure_msl: f64,
    cloud_cover: f64,
    time: chrono::DateTime<Utc>,
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    fn name(&self) -> &'static str {
        "Weather"
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &RequestContext, query: &Query) -> Result<WeatherPayload, AqiError> {
        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current=temperature_2m,relative_humidity_2m,wind_speed_10m,pressure_msl,cloud_cover",
            self.base_url, query.location.lat, query.location.lng
        );
        let request = self.http.get(&url).send();
        let response = match tokio::time::timeout(ctx.remaining(), request).await {
            Ok(Ok(resp)) if resp.status().is_success() => resp,
            Ok(Ok(resp)) => {
                warn!(status = %resp.status(), "weather client non-2xx response");
                return Err(AqiError::Upstream(format!("status {}", resp.status())));
            }
            Ok(Err(e)) => return Err(AqiError::Upstream(e.to_string())),
            Err(_) => return Err(AqiError::Timeout),
        };
        let body: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| AqiError::Upstream(format!("parse failure: {e}")))?;

        Ok(WeatherPayload {
            temperature_c: body.current.temperature_2m,
            humidity_pct: body.current.relative_humidity_2m,
            wind_speed_ms: body.current.wind_speed_10m,
            pressure_hpa: body.current.pressure_msl,
            cloud_cover_pct: body.current.cloud_cover,
            observed_at: body.current.time,
            is_mock: false,
        })
    }

    fn mock_fetch(&self, query: &Query) -> WeatherPayload {
        let seed = seed_for_location(query.location, "weather");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        WeatherPayload {
            temperature_c: rng.gen_range(5.0..30.0),
            humidity_pct: rng.gen_range(30.0..90.0),
            wind_speed_ms: rng.gen_range(0.5..8.0),
            pressure_hpa: rng.gen_range(995.0..1030.0),
            cloud_cover_pct: rng.gen_range(0.0..100.0),
            observed_at: Utc::now(),
            is_mock: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_is_deterministic_per_location() {
        let client = WeatherClient::new("https://weather.example.invalid");
        let query = Query::new(40.71, -74.01, 25.0, 24);
        let a = client.mock_fetch(&query);
        let b = client.mock_fetch(&query);
        assert_eq!(a.temperature_c, b.temperature_c);
        assert_eq!(a.wind_speed_ms, b.wind_speed_ms);
    }
}
