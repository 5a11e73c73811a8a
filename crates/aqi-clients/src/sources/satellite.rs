use crate::client::AirQualityClient;
use crate::mock::mock_concentration;
use crate::payload::{AirQualityPayload, RequestContext};
use aqi_core::{AqiError, Measurement, Pollutant, Query};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{instrument, warn};

/// Column-density satellite product (Sentinel-5P/TROPOMI style). Reports a
/// single area-averaged reading per pollutant for the query radius rather
/// than discrete stations, and never reports particulates — those require
/// ground-level sensing.
pub struct SatelliteClient {
    http: Client,
    base_url: String,
}

const SATELLITE_POLLUTANTS: [Pollutant; 4] =
    [Pollutant::NO2, Pollutant::O3, Pollutant::SO2, Pollutant::HCHO];

impl SatelliteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SatelliteResponse {
    columns: Vec<SatelliteColumn>,
}

#[derive(Debug, Deserialize)]
struct SatelliteColumn {
    species: String,
    surface_equivalent: f64,
    unit: String,
    observed_at: chrono::DateTime<Utc>,
}

#[async_trait]
impl AirQualityClient for SatelliteClient {
    fn name(&self) -> &'static str {
        "Satellite"
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &RequestContext, query: &Query) -> Result<AirQualityPayload, AqiError> {
        let url = format!(
            "{}/v1/column?lat={}&lon={}&radius_km={}",
            self.base_url, query.location.lat, query.location.lng, query.radius_km
        );
        let request = self.http.get(&url).send();
        let response = match tokio::time::timeout(ctx.remaining(), request).await {
            Ok(Ok(resp)) if resp.status().is_success() => resp,
            Ok(Ok(resp)) => {
                warn!(status = %resp.status(), "satellite client non-2xx response");
                return Err(AqiError::Upstream(format!("status {}", resp.status())));
            }
            Ok(Err(e)) => return Err(AqiError::Upstream(e.to_string())),
            Err(_) => return Err(AqiError::Timeout),
        };
        let body: SatelliteResponse = response
            .json()
            .await
            .map_err(|e| AqiError::Upstream(format!("parse failure: {e}")))?;

        let mut measurements = Vec::new();
        for column in body.columns {
            let Some(pollutant) = Pollutant::normalize(&column.species) else {
                continue;
            };
            if !SATELLITE_POLLUTANTS.contains(&pollutant) {
                continue;
            }
            measurements.push(Measurement {
                pollutant,
                concentration: column.surface_equivalent,
                unit: pollutant.canonical_unit().to_string(),
                source: self.name().to_string(),
                station_id: None,
                observed_at: column.observed_at,
                distance_meters: Some(0.0),
            });
        }
        Ok(AirQualityPayload {
            source: self.name(),
            measurements,
            stations: Vec::new(),
            is_mock: false,
        })
    }

    fn mock_fetch(&self, query: &Query) -> AirQualityPayload {
        let now = Utc::now();
        let measurements = SATELLITE_POLLUTANTS
            .iter()
            .map(|&pollutant| Measurement {
                pollutant,
                concentration: mock_concentration(pollutant, query.location),
                unit: pollutant.canonical_unit().to_string(),
                source: self.name().to_string(),
                station_id: None,
                observed_at: now,
                distance_meters: Some(0.0),
            })
            .collect();
        AirQualityPayload {
            source: self.name(),
            measurements,
            stations: Vec::new(),
            is_mock: true,
        }
    }
}
