pub mod aqi;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod geo;
pub mod pollutant;

pub use aqi::{aqi as compute_aqi, Level};
pub use bus::PushBus;
pub use config::{AqiThresholds, Config};
pub use domain::{
    Alert, AlertKind, AqiPrediction, Availability, Band, Confidence, Coverage, DataQuality,
    DataSources, Forecast, ForecastSummary, HourPrediction, Measurement, Method, Query,
    Recommendation, Snapshot, Station, Trend,
};
pub use error::{AqiError, AqiResult};
pub use events::PushEvent;
pub use geo::LatLng;
pub use pollutant::Pollutant;
