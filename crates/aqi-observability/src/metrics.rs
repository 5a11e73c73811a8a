use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn init_prometheus_exporter() {
    let builder = PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder");
}

/// Binds the Prometheus exporter to `addr` and serves `/metrics` on it,
/// separate from the main REST listener so scraping never competes with
/// request traffic for the same accept loop.
pub fn start_metrics_server(addr: SocketAddr) {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(addr)
        .install_recorder()
        .expect("Failed to start metrics server");
}

/// Counters/histograms recorded around each scheduler tick and on-demand
/// refresh. Grounded on the teacher's per-subsystem metrics structs
/// (`IngestMetrics`, `AnomalyMetrics`) — one small `Clone` struct per
/// concern rather than a single god-object.
#[derive(Clone)]
pub struct ForecastMetrics;

impl ForecastMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_refresh(&self, outcome: &str) {
        metrics::counter!("aqi_scheduler_refresh_total", "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_refresh_latency(&self, latency_ms: u64) {
        metrics::histogram!("aqi_scheduler_refresh_latency_ms").record(latency_ms as f64);
    }

    pub fn record_tick_locations(&self, count: usize) {
        metrics::gauge!("aqi_scheduler_tick_locations").set(count as f64);
    }
}

impl Default for ForecastMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters recorded by the AlertDispatcher around each dispatch decision.
#[derive(Clone)]
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_dispatch(&self, channel: &str) {
        metrics::counter!("aqi_dispatch_total", "channel" => channel.to_string()).increment(1);
    }

    pub fn record_cooldown_skip(&self) {
        metrics::counter!("aqi_dispatch_cooldown_skipped_total").increment(1);
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
