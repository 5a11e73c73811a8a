use crate::client::AirQualityClient;
use crate::mock::mock_concentration;
use crate::payload::{AirQualityPayload, RequestContext};
use aqi_core::{AqiError, LatLng, Measurement, Pollutant, Query, Station};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{instrument, warn};

/// OpenAQ-style crowd-sourced ground network: community and low-cost
/// sensors, reachable results keyed by `(location, parameter)`.
pub struct GroundClientB {
    http: Client,
    base_url: String,
}

impl GroundClientB {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAqResponse {
    results: Vec<OpenAqResult>,
}

#[derive(Debug, Deserialize)]
struct OpenAqResult {
    location: String,
    #[serde(rename = "locationId")]
    location_id: u64,
    parameter: String,
    value: f64,
    unit: String,
    coordinates: OpenAqCoordinates,
    date: OpenAqDate,
}

#[derive(Debug, Deserialize)]
struct OpenAqCoordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct OpenAqDate {
    utc: chrono::DateTime<Utc>,
}

fn convert_unit(value: f64, unit: &str, pollutant: Pollutant) -> Option<f64> {
    let canonical = pollutant.canonical_unit();
    match (unit, canonical) {
        ("µg/m³", "ug/m3") => Some(value),
        ("ppb", "ppb") => Some(value),
        ("ppm", "ppm") => Some(value),
        ("ppm", "ppb") => Some(value * 1000.0),
        _ => None,
    }
}

#[async_trait]
impl AirQualityClient for GroundClientB {
    fn name(&self) -> &'static str {
        "OpenAQ"
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &RequestContext, query: &Query) -> Result<AirQualityPayload, AqiError> {
        let url = format!(
            "{}/v2/latest?coordinates={},{}&radius={}",
            self.base_url,
            query.location.lat,
            query.location.lng,
            (query.radius_km * 1000.0) as u64
        );
        let request = self.http.get(&url).send();
        let response = match tokio::time::timeout(ctx.remaining(), request).await {
            Ok(Ok(resp)) if resp.status().is_success() => resp,
            Ok(Ok(resp)) => {
                warn!(status = %resp.status(), "ground client B non-2xx response");
                return Err(AqiError::Upstream(format!("status {}", resp.status())));
            }
            Ok(Err(e)) => return Err(AqiError::Upstream(e.to_string())),
            Err(_) => return Err(AqiError::Timeout),
        };
        let body: OpenAqResponse = response
            .json()
            .await
            .map_err(|e| AqiError::Upstream(format!("parse failure: {e}")))?;

        let mut measurements = Vec::new();
        let mut stations = Vec::new();
        for result in body.results {
            let Some(pollutant) = Pollutant::normalize(&result.parameter) else {
                continue;
            };
            let Some(concentration) = convert_unit(result.value, &result.unit, pollutant) else {
                continue;
            };
            let station_loc = LatLng::new(result.coordinates.latitude, result.coordinates.longitude);
            let distance_m = station_loc.haversine_km(&query.location) * 1000.0;
            let station_id = result.location_id.to_string();
            stations.push(Station {
                id: station_id.clone(),
                source: self.name().to_string(),
                name: result.location,
                lat: result.coordinates.latitude,
                lng: result.coordinates.longitude,
                distance_meters: Some(distance_m),
            });
            measurements.push(Measurement {
                pollutant,
                concentration,
                unit: pollutant.canonical_unit().to_string(),
                source: self.name().to_string(),
                station_id: Some(station_id),
                observed_at: result.date.utc,
                distance_meters: Some(distance_m),
            });
        }
        Ok(AirQualityPayload {
            source: self.name(),
            measurements,
            stations,
            is_mock: false,
        })
    }

    fn mock_fetch(&self, query: &Query) -> AirQualityPayload {
        let now = Utc::now();
        let station = Station {
            id: "mock-openaq-1".to_string(),
            source: self.name().to_string(),
            name: "Mock OpenAQ Node".to_string(),
            lat: query.location.lat,
            lng: query.location.lng,
            distance_meters: Some(0.0),
        };
        let measurements = Pollutant::ALL
            .iter()
            .map(|&pollutant| Measurement {
                pollutant,
                concentration: mock_concentration(pollutant, query.location),
                unit: pollutant.canonical_unit().to_string(),
                source: self.name().to_string(),
                station_id: Some(station.id.clone()),
                observed_at: now,
                distance_meters: Some(0.0),
            })
            .collect();
        AirQualityPayload {
            source: self.name(),
            measurements,
            stations: vec![station],
            is_mock: true,
        }
    }
}
