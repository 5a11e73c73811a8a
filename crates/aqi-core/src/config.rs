use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide configuration, loaded once at startup. Upstream endpoints
/// and API keys live here and rotation requires a restart — no secret is
/// ever written to a log line (see `aqi-observability`'s redaction layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub dispatcher: DispatcherConfig,
    pub push_bus: PushBusConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

/// Per-upstream-provider settings: endpoint, API key, and whether the
/// deterministic mock is permitted to stand in for a failed fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub allow_mock_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub satellite: ProviderSettings,
    pub ground_a: ProviderSettings,
    pub ground_b: ProviderSettings,
    pub weather: ProviderSettings,
}

/// TTLs for the CacheLayer, one per upstream client, per §4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub satellite_ttl_secs: u64,
    pub ground_a_ttl_secs: u64,
    pub ground_b_ttl_secs: u64,
    pub weather_ttl_secs: u64,
}

impl CacheConfig {
    pub fn satellite_ttl(&self) -> Duration {
        Duration::from_secs(self.satellite_ttl_secs)
    }
    pub fn ground_a_ttl(&self) -> Duration {
        Duration::from_secs(self.ground_a_ttl_secs)
    }
    pub fn ground_b_ttl(&self) -> Duration {
        Duration::from_secs(self.ground_b_ttl_secs)
    }
    pub fn weather_ttl(&self) -> Duration {
        Duration::from_secs(self.weather_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    pub worker_pool_size: usize,
    pub shutdown_grace_secs: u64,
    pub default_horizon_hours: u32,
    pub request_deadline_secs: u64,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub cooldown_secs: u64,
    pub history_capacity: usize,
}

/// Default AQI severity thresholds applied by the ForecastEngine and used
/// to seed a new subscriber's `aqiThresholds` until overridden via
/// `UpdatePrefs`. Mirrors the EPA "Unhealthy for Sensitive Groups" /
/// "Unhealthy" / "Very Unhealthy" band edges from `aqi_core::aqi`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AqiThresholds {
    pub warning: i32,
    pub critical: i32,
    pub emergency: i32,
}

impl Default for AqiThresholds {
    fn default() -> Self {
        Self {
            warning: 100,
            critical: 150,
            emergency: 200,
        }
    }
}

impl DispatcherConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushBusConfig {
    pub outbox_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub port: u16,
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourcesConfig {
                satellite: ProviderSettings {
                    base_url: "https://satellite.example.invalid".to_string(),
                    api_key: None,
                    timeout_secs: 30,
                    allow_mock_fallback: true,
                },
                ground_a: ProviderSettings {
                    base_url: "https://ground-a.example.invalid".to_string(),
                    api_key: None,
                    timeout_secs: 15,
                    allow_mock_fallback: false,
                },
                ground_b: ProviderSettings {
                    base_url: "https://ground-b.example.invalid".to_string(),
                    api_key: None,
                    timeout_secs: 15,
                    allow_mock_fallback: true,
                },
                weather: ProviderSettings {
                    base_url: "https://weather.example.invalid".to_string(),
                    api_key: None,
                    timeout_secs: 15,
                    allow_mock_fallback: false,
                },
            },
            cache: CacheConfig {
                satellite_ttl_secs: 15 * 60,
                ground_a_ttl_secs: 10 * 60,
                ground_b_ttl_secs: 10 * 60,
                weather_ttl_secs: 30 * 60,
            },
            scheduler: SchedulerConfig {
                tick_interval_secs: 15 * 60,
                worker_pool_size: 8,
                shutdown_grace_secs: 30,
                default_horizon_hours: 24,
                request_deadline_secs: 45,
            },
            dispatcher: DispatcherConfig {
                cooldown_secs: 60 * 60,
                history_capacity: 1000,
            },
            push_bus: PushBusConfig {
                outbox_capacity: 64,
            },
            api: ApiConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8080,
                rate_limit_per_minute: 60,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
                metrics_port: 9090,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Overlays environment variables on top of defaults. API keys are the
    /// only secrets read this way, matching the "rotation requires restart"
    /// contract in the spec's external-interfaces section.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(key) = std::env::var("AQI_SATELLITE_API_KEY") {
            config.sources.satellite.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("AQI_GROUND_A_API_KEY") {
            config.sources.ground_a.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("AQI_GROUND_B_API_KEY") {
            config.sources.ground_b.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("AQI_WEATHER_API_KEY") {
            config.sources.weather.api_key = Some(key);
        }
        if let Ok(port) = std::env::var("AQI_API_PORT") {
            if let Ok(p) = port.parse() {
                config.api.port = p;
            }
        }
        config
    }

    /// Loads a base file then overlays environment overrides, mirroring the
    /// file-then-env precedence used throughout this stack.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;
        if let Ok(key) = std::env::var("AQI_SATELLITE_API_KEY") {
            config.sources.satellite.api_key = Some(key);
        }
        if let Ok(port) = std::env::var("AQI_API_PORT") {
            if let Ok(p) = port.parse() {
                config.api.port = p;
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let c = Config::default();
        assert_eq!(c.cache.satellite_ttl_secs, 900);
        assert_eq!(c.cache.ground_a_ttl_secs, 600);
        assert_eq!(c.cache.ground_b_ttl_secs, 600);
        assert_eq!(c.cache.weather_ttl_secs, 1800);
        assert_eq!(c.sources.satellite.timeout_secs, 30);
        assert_eq!(c.sources.ground_a.timeout_secs, 15);
        assert!(!c.sources.ground_a.allow_mock_fallback);
        assert!(c.sources.ground_b.allow_mock_fallback);
        assert_eq!(c.dispatcher.cooldown_secs, 3600);
    }
}
