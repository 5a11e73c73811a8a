use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

mod rate_limit;
mod rest;
mod state;
mod websocket;

use aqi_clients::{GroundClientA, GroundClientB, Pipeline, SatelliteClient, WeatherClient};
use aqi_core::config::Config;
use aqi_core::PushBus;
use aqi_scheduler::Scheduler;
use aqi_subscriptions::{AlertDispatcher, EmailNotifier, NotificationSink, SmsNotifier, SubscriptionRegistry};
use rate_limit::RateLimitLayer;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("AQI_CONFIG_PATH") {
        Ok(path) => Config::load(&path)?,
        Err(_) => Config::from_env(),
    };

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    aqi_observability::init_observability(metrics_addr);

    info!("starting aqi-sentinel v{}", env!("CARGO_PKG_VERSION"));

    let satellite = Arc::new(SatelliteClient::new(config.sources.satellite.base_url.clone()));
    let ground_a = Arc::new(GroundClientA::new(config.sources.ground_a.base_url.clone()));
    let ground_b = Arc::new(GroundClientB::new(config.sources.ground_b.base_url.clone()));
    let weather = Arc::new(WeatherClient::new(config.sources.weather.base_url.clone()));

    let pipeline = Arc::new(Pipeline::new(
        satellite,
        ground_a,
        ground_b,
        weather,
        config.sources.clone(),
        &config.cache,
    ));

    let registry = SubscriptionRegistry::new();

    // Email/SMS sinks are only wired up when their credentials are present
    // in the environment; a deployment with neither still serves push-only
    // subscribers.
    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    if let Ok(email_config) = aqi_subscriptions::EmailConfig::from_env() {
        match EmailNotifier::new(email_config) {
            Ok(notifier) => sinks.push(Arc::new(notifier)),
            Err(e) => tracing::warn!(error = %e, "email notifier configured but failed to initialize"),
        }
    }
    if let Ok(sms_config) = aqi_subscriptions::SmsConfig::from_env() {
        match SmsNotifier::new(sms_config) {
            Ok(notifier) => sinks.push(Arc::new(notifier)),
            Err(e) => tracing::warn!(error = %e, "sms notifier configured but failed to initialize"),
        }
    }

    // Scheduler and AlertDispatcher share one Push Bus instance so a
    // scheduler-tick forecast and its derived alerts fan out over the same
    // set of client mailboxes.
    let push_bus = PushBus::new(config.push_bus.outbox_capacity);

    let dispatcher = Arc::new(AlertDispatcher::new(
        registry.clone(),
        push_bus.clone(),
        sinks,
        &config.dispatcher,
    ));

    let scheduler = Arc::new(Scheduler::new(
        pipeline,
        registry.clone(),
        dispatcher.clone(),
        push_bus.clone(),
        config.scheduler.clone(),
    ));

    let cancel = CancellationToken::new();
    let scheduler_handle = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let state = AppState {
        scheduler,
        registry,
        dispatcher,
        push_bus,
        config: Arc::new(config.clone()),
    };

    let app = Router::new()
        .route("/health", get(rest::health))
        .nest("/v1", rest::create_router())
        .nest("/ws", websocket::create_router())
        .layer(RateLimitLayer::new(config.api.rate_limit_per_minute))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.api.bind_addr, config.api.port).parse()?;
    info!(%addr, "listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    cancel.cancel();
    let _ = scheduler_handle.await;
    Ok(())
}
