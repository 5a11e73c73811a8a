//! Shared application state threaded through every REST and WebSocket
//! handler via axum's `State` extractor.

use aqi_core::{Config, PushBus};
use aqi_scheduler::Scheduler;
use aqi_subscriptions::{AlertDispatcher, SubscriptionRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub registry: SubscriptionRegistry,
    pub dispatcher: Arc<AlertDispatcher>,
    pub push_bus: PushBus,
    pub config: Arc<Config>,
}
