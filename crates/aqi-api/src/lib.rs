pub mod rate_limit;
pub mod rest;
pub mod state;
pub mod websocket;

pub use rate_limit::RateLimitLayer;
pub use state::AppState;
