pub mod hotspot;
pub mod scheduler;

pub use hotspot::HotLocations;
pub use scheduler::{Scheduler, DEFAULT_RADIUS_KM};
