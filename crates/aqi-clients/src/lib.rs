pub mod client;
pub mod metrics;
pub mod mock;
pub mod payload;
pub mod pipeline;
pub mod sources;

pub use client::{AirQualityClient, WeatherProvider};
pub use payload::{AirQualityPayload, RequestContext, WeatherPayload};
pub use pipeline::{FetchBundle, Pipeline};
pub use sources::{GroundClientA, GroundClientB, SatelliteClient, WeatherClient};
