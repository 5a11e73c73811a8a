//! Builds the fixed-shape feature window the [`crate::engine::ForecastEngine`]
//! conditions its projection on.

use aqi_clients::WeatherPayload;
use aqi_core::Snapshot;
use chrono::{Datelike, Timelike};

/// Column order of [`FeatureMatrix`]. Documented once so the fixed-shape
/// contract is self-describing without a runtime lookup table.
pub const FEATURE_COLUMNS: [&str; 12] = [
    "hourOfDay",
    "dayOfWeek",
    "monthOfYear",
    "temperatureC",
    "humidityPct",
    "windSpeedMs",
    "pressureHpa",
    "no2",
    "o3",
    "so2",
    "stagnation",
    "dispersion",
];

/// One row's worth of features, in [`FEATURE_COLUMNS`] order.
pub type FeatureRow = [f64; 12];

/// A 24-row x 12-column feature window: row 0 is 23 hours ago, row 23 is
/// now. Stored row-major rather than as a dense algebraic matrix — nothing
/// downstream needs matrix operations, only the fixed-shape per-hour
/// contract (spec §9's documented ML extension point never materialized
/// in this service; the statistical engine never consumes this window at
/// all).
#[derive(Debug, Clone)]
pub struct FeatureMatrix(Vec<FeatureRow>);

impl FeatureMatrix {
    pub fn row(&self, hours_ago: usize) -> &FeatureRow {
        &self.0[hours_ago]
    }

    pub fn latest(&self) -> &FeatureRow {
        self.row(23)
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.0
    }
}

pub struct FeatureAssembler;

impl FeatureAssembler {
    /// Builds the 24-row window for `snapshot`'s location.
    ///
    /// Documented limitation (spec §9 Open Questions): this service keeps
    /// no historical weather archive, so rows 0..22 reuse the *current*
    /// weather observation rather than an actual hourly history feed. Only
    /// `hourOfDay`/`dayOfWeek`/`monthOfYear` vary by row; the weather and
    /// pollutant columns are constant across the window until a history
    /// feed is wired in.
    pub fn assemble(snapshot: &Snapshot, weather: Option<&WeatherPayload>) -> FeatureMatrix {
        let now = snapshot.observed_at;
        let (temp, humidity, wind, pressure, cloud) = match weather {
            Some(w) => (
                w.temperature_c,
                w.humidity_pct,
                w.wind_speed_ms,
                w.pressure_hpa,
                w.cloud_cover_pct,
            ),
            None => (15.0, 50.0, 2.0, 1013.0, 50.0),
        };
        let no2 = snapshot
            .pollutants
            .get(&aqi_core::Pollutant::NO2)
            .map(|m| m.concentration)
            .unwrap_or(0.0);
        let o3 = snapshot
            .pollutants
            .get(&aqi_core::Pollutant::O3)
            .map(|m| m.concentration)
            .unwrap_or(0.0);
        let so2 = snapshot
            .pollutants
            .get(&aqi_core::Pollutant::SO2)
            .map(|m| m.concentration)
            .unwrap_or(0.0);

        let stagnation = (1.0 - wind / 5.0).clamp(0.0, 1.0) + if pressure > 1020.0 { 0.3 } else { 0.0 };
        let dispersion = wind / 10.0 + cloud / 100.0;

        let mut rows = Vec::with_capacity(24);
        for row in 0..24 {
            let hours_ago = 23 - row;
            let at = now - chrono::Duration::hours(hours_ago as i64);
            rows.push([
                at.hour() as f64,
                at.weekday().num_days_from_monday() as f64,
                at.month() as f64,
                temp,
                humidity,
                wind,
                pressure,
                no2,
                o3,
                so2,
                stagnation,
                dispersion,
            ]);
        }
        FeatureMatrix(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqi_core::{Confidence, Coverage, DataQuality, LatLng};
    use chrono::Utc;

    fn empty_snapshot() -> Snapshot {
        Snapshot {
            location: LatLng::new(10.0, 10.0),
            observed_at: Utc::now(),
            pollutants: Default::default(),
            stations: vec![],
            sources: vec![],
            data_quality: DataQuality {
                confidence: Confidence::Low,
                coverage: Coverage::Partial,
                resolution: "none".to_string(),
            },
            aqi: 0,
        }
    }

    #[test]
    fn matrix_has_24_rows_and_12_columns() {
        let snapshot = empty_snapshot();
        let features = FeatureAssembler::assemble(&snapshot, None);
        assert_eq!(features.rows().len(), 24);
        assert_eq!(FEATURE_COLUMNS.len(), 12);
        for row in features.rows() {
            assert_eq!(row.len(), 12);
        }
    }

    #[test]
    fn stagnation_and_dispersion_match_formula() {
        let snapshot = empty_snapshot();
        let weather = WeatherPayload {
            temperature_c: 20.0,
            humidity_pct: 40.0,
            wind_speed_ms: 1.0,
            pressure_hpa: 1025.0,
            cloud_cover_pct: 50.0,
            observed_at: Utc::now(),
            is_mock: false,
        };
        let features = FeatureAssembler::assemble(&snapshot, Some(&weather));
        let row = features.latest();
        let stagnation = row[10];
        let dispersion = row[11];
        assert!((stagnation - (0.8 + 0.3)).abs() < 1e-9);
        assert!((dispersion - (0.1 + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn hour_column_tracks_row_offset() {
        let snapshot = empty_snapshot();
        let features = FeatureAssembler::assemble(&snapshot, None);
        let now_hour = snapshot.observed_at.hour() as f64;
        assert_eq!(features.row(23)[0], now_hour);
    }
}
