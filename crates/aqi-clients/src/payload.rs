use aqi_core::{Measurement, Station};
use chrono::{DateTime, Utc};

/// Raw pollutant payload from one of the three air-quality providers
/// (satellite or either ground network), before canonicalization.
#[derive(Debug, Clone)]
pub struct AirQualityPayload {
    pub source: &'static str,
    pub measurements: Vec<Measurement>,
    pub stations: Vec<Station>,
    /// Set when this payload came from the deterministic mock rather than
    /// a live upstream response (`ErrFallbackMock` diagnostic marker).
    pub is_mock: bool,
}

/// Raw weather payload, consumed by the FeatureAssembler.
#[derive(Debug, Clone)]
pub struct WeatherPayload {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub pressure_hpa: f64,
    pub cloud_cover_pct: f64,
    pub observed_at: DateTime<Utc>,
    pub is_mock: bool,
}

/// Carries a per-request deadline through to every upstream client, so a
/// fetch that overruns its timeout budget returns `ErrTimeout` instead of
/// hanging the caller.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub deadline: tokio::time::Instant,
}

impl RequestContext {
    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            deadline: tokio::time::Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(tokio::time::Instant::now())
    }
}
