pub mod logging;
pub mod metrics;
pub mod tracing;

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the process-wide `tracing` subscriber (JSON, env-filtered) and
/// the Prometheus recorder, exposed on `metrics_addr`. Call once at binary
/// startup, before anything else logs or records a metric.
pub fn init_observability(metrics_addr: SocketAddr) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    metrics::start_metrics_server(metrics_addr);
}
