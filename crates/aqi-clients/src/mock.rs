//! Deterministic mock fallback shared by every air-quality client.
//!
//! The seed is derived purely from `(lat rounded to 2dp, lng rounded to
//! 2dp, pollutant)`, so two calls with the same rounded location and
//! pollutant always produce the identical concentration — required for
//! cache idempotence and for the `GroundClientB`/`SatelliteClient` fallback
//! to be a valid cacheable value rather than a fresh random draw each time.

use aqi_core::{LatLng, Pollutant};
use chrono::{Timelike, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Base concentration used when a location has no live reading for a
/// pollutant, shared with the forecast engine's statistical baseline.
pub fn base_concentration(pollutant: Pollutant) -> f64 {
    match pollutant {
        Pollutant::NO2 => 20.0,
        Pollutant::O3 => 50.0,
        Pollutant::SO2 => 10.0,
        Pollutant::HCHO => 5.0,
        Pollutant::PM25 => 15.0,
        Pollutant::PM10 => 25.0,
        Pollutant::CO => 1.0,
    }
}

/// Fixed city centers and their per-pollutant urban multiplier, applied
/// when the query location falls within 0.5 degrees of the center.
struct CityCenter {
    name: &'static str,
    lat: f64,
    lng: f64,
}

const CITY_CENTERS: &[CityCenter] = &[
    CityCenter { name: "new-york", lat: 40.71, lng: -74.01 },
    CityCenter { name: "los-angeles", lat: 34.05, lng: -118.24 },
    CityCenter { name: "london", lat: 51.51, lng: -0.13 },
    CityCenter { name: "delhi", lat: 28.61, lng: 77.21 },
    CityCenter { name: "beijing", lat: 39.90, lng: 116.41 },
    CityCenter { name: "sao-paulo", lat: -23.55, lng: -46.63 },
];

const URBAN_RADIUS_DEG: f64 = 0.5;

fn urban_multiplier(pollutant: Pollutant, location: LatLng) -> f64 {
    let near_city = CITY_CENTERS.iter().any(|c| {
        (location.lat - c.lat).abs() <= URBAN_RADIUS_DEG
            && (location.lng - c.lng).abs() <= URBAN_RADIUS_DEG
    });
    if !near_city {
        return 1.0;
    }
    match pollutant {
        Pollutant::NO2 => 1.5,
        Pollutant::CO => 1.4,
        Pollutant::PM25 => 1.35,
        Pollutant::PM10 => 1.3,
        Pollutant::SO2 => 1.2,
        Pollutant::HCHO => 1.1,
        Pollutant::O3 => 0.8, // NOx titration suppresses O3 near traffic.
    }
}

/// Local-hour multiplier: NO2/CO peak at rush hours, O3 peaks midday,
/// particulates and SO2 carry a mild evening bump, HCHO stays flat.
fn time_of_day_multiplier(pollutant: Pollutant, local_hour: u32) -> f64 {
    let rush_hour = matches!(local_hour, 7..=9 | 17..=19);
    let midday = matches!(local_hour, 11..=15);
    let evening = matches!(local_hour, 18..=22);
    match pollutant {
        Pollutant::NO2 | Pollutant::CO => {
            if rush_hour {
                1.3
            } else {
                1.0
            }
        }
        Pollutant::O3 => {
            if midday {
                1.4
            } else {
                0.85
            }
        }
        Pollutant::PM25 | Pollutant::PM10 | Pollutant::SO2 => {
            if evening {
                1.15
            } else {
                1.0
            }
        }
        Pollutant::HCHO => 1.0,
    }
}

/// FNV-1a: a small, stable, dependency-free hash — deliberately not
/// `std`'s `DefaultHasher`, whose internal keys are not a documented
/// stability guarantee across Rust versions.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Seed for a `(location, pollutant)` pair, rounded to 2 decimal places.
pub fn seed_for(location: LatLng, pollutant: Pollutant) -> u64 {
    let rounded = location.rounded_2dp();
    let key = format!("{:.2},{:.2},{}", rounded.lat, rounded.lng, pollutant.as_str());
    fnv1a(key.as_bytes())
}

/// Seed for a bare location, used by providers without a pollutant axis
/// (the weather mock).
pub fn seed_for_location(location: LatLng, tag: &str) -> u64 {
    let rounded = location.rounded_2dp();
    let key = format!("{:.2},{:.2},{}", rounded.lat, rounded.lng, tag);
    fnv1a(key.as_bytes())
}

/// Deterministic mock concentration for one pollutant at one location,
/// given the current wall-clock hour (local time is approximated as UTC —
/// the service has no per-location timezone database).
pub fn mock_concentration(pollutant: Pollutant, location: LatLng) -> f64 {
    let seed = seed_for(location, pollutant);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise: f64 = rng.gen_range(-0.1..=0.1);
    let local_hour = Utc::now().hour();
    let base = base_concentration(pollutant);
    let value = base
        * urban_multiplier(pollutant, location)
        * time_of_day_multiplier(pollutant, local_hour)
        * (1.0 + noise);
    value.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_inputs_produce_identical_values() {
        let loc = LatLng::new(40.71284, -74.00601);
        let a = mock_concentration(Pollutant::NO2, loc);
        let b = mock_concentration(Pollutant::NO2, loc);
        assert_eq!(a, b);
    }

    #[test]
    fn rounding_collapses_nearby_points_to_same_seed() {
        let a = LatLng::new(40.7128, -74.0060);
        let b = LatLng::new(40.71283, -74.00601);
        assert_eq!(seed_for(a, Pollutant::O3), seed_for(b, Pollutant::O3));
    }

    #[test]
    fn urban_multiplier_only_applies_near_city_centers() {
        let city = LatLng::new(40.71, -74.01);
        let rural = LatLng::new(10.0, 10.0);
        assert!(urban_multiplier(Pollutant::NO2, city) > 1.0);
        assert_eq!(urban_multiplier(Pollutant::NO2, rural), 1.0);
    }

    #[test]
    fn values_are_non_negative() {
        for p in Pollutant::ALL {
            let v = mock_concentration(p, LatLng::new(0.0, 0.0));
            assert!(v >= 0.0);
        }
    }
}
