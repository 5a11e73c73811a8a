//! Spherical-earth distance and coarse location quantization, shared by the
//! canonicalizer (nearest-station selection), the subscription registry
//! (radius membership), and the scheduler (push-bus room keys).

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometers via the haversine formula.
    pub fn haversine_km(&self, other: &LatLng) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// Rounds to 2 decimal places — the resolution the deterministic mock
    /// seed and the hot-location quantizer key off of.
    pub fn rounded_2dp(&self) -> LatLng {
        LatLng {
            lat: (self.lat * 100.0).round() / 100.0,
            lng: (self.lng * 100.0).round() / 100.0,
        }
    }

    /// Push-Bus room key for this location: `loc:<lat>,<lng>` at 2dp.
    pub fn room_key(&self) -> String {
        let q = self.rounded_2dp();
        format!("loc:{:.2},{:.2}", q.lat, q.lng)
    }

    /// Rounds to 4 decimal places (~11m resolution) — the forecast engine's
    /// PRNG seed keys off of this, finer than the 2dp room/cache key so
    /// distinct queries within the same room still get distinct noise.
    pub fn rounded(&self, decimals: u32) -> LatLng {
        let factor = 10f64.powi(decimals as i32);
        LatLng {
            lat: (self.lat * factor).round() / factor,
            lng: (self.lng * factor).round() / factor,
        }
    }
}

use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let a = LatLng::new(40.0, -73.0);
        assert_eq!(a.haversine_km(&a), 0.0);
    }

    #[test]
    fn known_distance_roughly_matches() {
        // NYC to LA is roughly 3940km.
        let nyc = LatLng::new(40.7128, -74.0060);
        let la = LatLng::new(34.0522, -118.2437);
        let d = nyc.haversine_km(&la);
        assert!((3900.0..4000.0).contains(&d), "distance was {d}");
    }

    #[test]
    fn room_key_quantizes() {
        let a = LatLng::new(40.71284, -73.99123);
        assert_eq!(a.room_key(), "loc:40.71,-73.99");
    }
}
