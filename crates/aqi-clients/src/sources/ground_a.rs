use crate::client::AirQualityClient;
use crate::mock::mock_concentration;
use crate::payload::{AirQualityPayload, RequestContext};
use aqi_core::{AqiError, LatLng, Measurement, Pollutant, Query, Station};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{instrument, warn};

/// EPA AirNow-style ground station network: per-station, per-pollutant
/// readings keyed by a fixed set of regulatory monitors.
pub struct GroundClientA {
    http: Client,
    base_url: String,
}

impl GroundClientA {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EpaObservation {
    #[serde(rename = "SiteName")]
    site_name: String,
    #[serde(rename = "AQSID")]
    aqsid: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "ParameterName")]
    parameter_name: String,
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "Unit")]
    unit: String,
    #[serde(rename = "DateObserved")]
    date_observed: chrono::DateTime<Utc>,
}

fn convert_unit(value: f64, unit: &str, pollutant: Pollutant) -> Option<f64> {
    let canonical = pollutant.canonical_unit();
    let folded = unit.to_ascii_lowercase();
    match (folded.as_str(), canonical) {
        ("ug/m3", "ug/m3") | ("µg/m3", "ug/m3") => Some(value),
        ("ppb", "ppb") => Some(value),
        ("ppm", "ppm") => Some(value),
        ("ppm", "ppb") => Some(value * 1000.0),
        ("ppb", "ppm") => Some(value / 1000.0),
        _ => None,
    }
}

#[async_trait]
impl AirQualityClient for GroundClientA {
    fn name(&self) -> &'static str {
        "GroundClientA"
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &RequestContext, query: &Query) -> Result<AirQualityPayload, AqiError> {
        let url = format!(
            "{}/aq/observation/latLong/current?latitude={}&longitude={}&distance={}",
            self.base_url, query.location.lat, query.location.lng, query.radius_km
        );
        let request = self.http.get(&url).send();
        let response = match tokio::time::timeout(ctx.remaining(), request).await {
            Ok(Ok(resp)) if resp.status().is_success() => resp,
            Ok(Ok(resp)) => {
                warn!(status = %resp.status(), "ground client A non-2xx response");
                return Err(AqiError::Upstream(format!("status {}", resp.status())));
            }
            Ok(Err(e)) => return Err(AqiError::Upstream(e.to_string())),
            Err(_) => return Err(AqiError::Timeout),
        };
        let observations: Vec<EpaObservation> = response
            .json()
            .await
            .map_err(|e| AqiError::Upstream(format!("parse failure: {e}")))?;

        let mut measurements = Vec::new();
        let mut stations = Vec::new();
        for obs in observations {
            let Some(pollutant) = Pollutant::normalize(&obs.parameter_name) else {
                continue;
            };
            let Some(concentration) = convert_unit(obs.value, &obs.unit, pollutant) else {
                continue;
            };
            let station_loc = LatLng::new(obs.latitude, obs.longitude);
            let distance_m = station_loc.haversine_km(&query.location) * 1000.0;
            stations.push(Station {
                id: obs.aqsid.clone(),
                source: self.name().to_string(),
                name: obs.site_name,
                lat: obs.latitude,
                lng: obs.longitude,
                distance_meters: Some(distance_m),
            });
            measurements.push(Measurement {
                pollutant,
                concentration,
                unit: pollutant.canonical_unit().to_string(),
                source: self.name().to_string(),
                station_id: Some(obs.aqsid),
                observed_at: obs.date_observed,
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
            id: "mock-epa-1".to_string(),
            source: self.name().to_string(),
            name: "Mock EPA Station".to_string(),
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
