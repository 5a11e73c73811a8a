pub mod ground_a;
pub mod ground_b;
pub mod satellite;
pub mod weather;

pub use ground_a::GroundClientA;
pub use ground_b::GroundClientB;
pub use satellite::SatelliteClient;
pub use weather::WeatherClient;
