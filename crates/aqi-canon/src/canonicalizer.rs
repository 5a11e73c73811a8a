//! Merges heterogeneous provider payloads into one canonical [`Snapshot`].
//! Never fails: an empty input set still yields a valid, empty Snapshot
//! with `confidence = low`.

use aqi_clients::{AirQualityPayload, FetchBundle};
use aqi_core::{
    compute_aqi, Confidence, Coverage, DataQuality, LatLng, Measurement, Pollutant, Snapshot,
    Station,
};
use chrono::Utc;
use std::collections::BTreeMap;

pub struct Canonicalizer;

impl Canonicalizer {
    /// Builds a canonical [`Snapshot`] for `location` from whatever subset
    /// of the three pollutant payloads and the weather payload actually
    /// arrived. Weather does not contribute pollutants; its presence only
    /// feeds the caller's `dataSources.weather` flag (handled upstream by
    /// the scheduler, not here).
    pub fn canonicalize(location: LatLng, bundle: &FetchBundle) -> Snapshot {
        let payloads: Vec<&AirQualityPayload> = [&bundle.satellite, &bundle.ground_a, &bundle.ground_b]
            .into_iter()
            .filter_map(|p| p.as_ref())
            .collect();

        let mut sources: Vec<String> = Vec::new();
        let mut stations: Vec<Station> = Vec::new();
        let mut candidates: BTreeMap<Pollutant, Vec<&Measurement>> = BTreeMap::new();

        for payload in &payloads {
            if !sources.contains(&payload.source.to_string()) {
                sources.push(payload.source.to_string());
            }
            for station in &payload.stations {
                if !stations
                    .iter()
                    .any(|s| s.id == station.id && s.source == station.source)
                {
                    stations.push(station.clone());
                }
            }
            for m in &payload.measurements {
                candidates.entry(m.pollutant).or_default().push(m);
            }
        }

        let mut pollutants = BTreeMap::new();
        for (pollutant, mut ms) in candidates {
            ms.sort_by(|a, b| {
                let da = a.distance_meters.unwrap_or(f64::MAX);
                let db = b.distance_meters.unwrap_or(f64::MAX);
                da.partial_cmp(&db)
                    .unwrap()
                    .then_with(|| b.observed_at.cmp(&a.observed_at))
                    .then_with(|| a.source.cmp(&b.source))
            });
            if let Some(winner) = ms.into_iter().next() {
                pollutants.insert(pollutant, winner.clone());
            }
        }

        let aqi = pollutants
            .iter()
            .map(|(p, m)| compute_aqi(*p, m.concentration))
            .max()
            .unwrap_or(0);

        let satellite_present = bundle.satellite.is_some();
        let ground_present = bundle.ground_a.is_some() || bundle.ground_b.is_some();
        let confidence = if satellite_present && ground_present {
            Confidence::High
        } else if satellite_present || ground_present {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        let coverage = if pollutants.len() >= 5 {
            Coverage::Full
        } else {
            Coverage::Partial
        };

        let resolution = if ground_present {
            "station".to_string()
        } else if satellite_present {
            "area-average".to_string()
        } else {
            "none".to_string()
        };

        Snapshot {
            location,
            observed_at: Utc::now(),
            pollutants,
            stations,
            sources,
            data_quality: DataQuality {
                confidence,
                coverage,
                resolution,
            },
            aqi,
        }
    }

    /// Re-feeds an existing Snapshot's measurements as a single source,
    /// used to check idempotence: `canonicalize(canonicalize(raw)) ==
    /// canonicalize(raw)` when re-fed as one source.
    pub fn reingest(snapshot: &Snapshot) -> FetchBundle {
        let measurements: Vec<Measurement> = snapshot.pollutants.values().cloned().collect();
        FetchBundle {
            satellite: None,
            ground_a: Some(AirQualityPayload {
                source: "Reingest",
                measurements,
                stations: snapshot.stations.clone(),
                is_mock: false,
            }),
            ground_b: None,
            weather: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn measurement(
        pollutant: Pollutant,
        concentration: f64,
        source: &str,
        distance_m: f64,
        age_secs: i64,
    ) -> Measurement {
        Measurement {
            pollutant,
            concentration,
            unit: pollutant.canonical_unit().to_string(),
            source: source.to_string(),
            station_id: Some(format!("{source}-station")),
            observed_at: Utc::now() - ChronoDuration::seconds(age_secs),
            distance_meters: Some(distance_m),
        }
    }

    #[test]
    fn s3_prefers_nearer_station() {
        let ground_a = AirQualityPayload {
            source: "GroundClientA",
            measurements: vec![measurement(Pollutant::PM25, 15.0, "GroundClientA", 8000.0, 0)],
            stations: vec![],
            is_mock: false,
        };
        let ground_b = AirQualityPayload {
            source: "OpenAQ",
            measurements: vec![measurement(Pollutant::PM25, 22.0, "OpenAQ", 2000.0, 0)],
            stations: vec![],
            is_mock: false,
        };
        let bundle = FetchBundle {
            satellite: None,
            ground_a: Some(ground_a),
            ground_b: Some(ground_b),
            weather: None,
        };
        let snapshot = Canonicalizer::canonicalize(LatLng::new(0.0, 0.0), &bundle);
        let m = snapshot.pollutants.get(&Pollutant::PM25).unwrap();
        assert_eq!(m.concentration, 22.0);
        assert_eq!(m.source, "OpenAQ");
        assert_eq!(snapshot.aqi, compute_aqi(Pollutant::PM25, 22.0));
        assert_eq!(snapshot.aqi, 72);
    }

    #[test]
    fn empty_input_yields_low_confidence_empty_snapshot() {
        let bundle = FetchBundle::default();
        let snapshot = Canonicalizer::canonicalize(LatLng::new(0.0, 0.0), &bundle);
        assert!(snapshot.pollutants.is_empty());
        assert_eq!(snapshot.aqi, 0);
        assert_eq!(snapshot.data_quality.confidence, Confidence::Low);
    }

    #[test]
    fn tie_breaks_on_newer_observed_at_then_source() {
        let a = AirQualityPayload {
            source: "GroundClientA",
            measurements: vec![measurement(Pollutant::O3, 40.0, "GroundClientA", 1000.0, 600)],
            stations: vec![],
            is_mock: false,
        };
        let b = AirQualityPayload {
            source: "OpenAQ",
            measurements: vec![measurement(Pollutant::O3, 60.0, "OpenAQ", 1000.0, 0)],
            stations: vec![],
            is_mock: false,
        };
        let bundle = FetchBundle {
            satellite: None,
            ground_a: Some(a),
            ground_b: Some(b),
            weather: None,
        };
        let snapshot = Canonicalizer::canonicalize(LatLng::new(0.0, 0.0), &bundle);
        // Same distance; OpenAQ's reading is newer, so it wins.
        assert_eq!(snapshot.pollutants.get(&Pollutant::O3).unwrap().source, "OpenAQ");
    }

    #[test]
    fn idempotent_on_reingest() {
        let ground_b = AirQualityPayload {
            source: "OpenAQ",
            measurements: vec![measurement(Pollutant::PM25, 22.0, "OpenAQ", 2000.0, 0)],
            stations: vec![],
            is_mock: false,
        };
        let bundle = FetchBundle {
            satellite: None,
            ground_a: None,
            ground_b: Some(ground_b),
            weather: None,
        };
        let first = Canonicalizer::canonicalize(LatLng::new(0.0, 0.0), &bundle);
        let reingested = Canonicalizer::reingest(&first);
        let second = Canonicalizer::canonicalize(LatLng::new(0.0, 0.0), &reingested);
        assert_eq!(first.aqi, second.aqi);
        assert_eq!(
            first.pollutants.get(&Pollutant::PM25).unwrap().concentration,
            second.pollutants.get(&Pollutant::PM25).unwrap().concentration
        );
    }
}
