pub mod engine;
pub mod features;

pub use engine::ForecastEngine;
pub use features::{FeatureAssembler, FeatureMatrix, FEATURE_COLUMNS};
