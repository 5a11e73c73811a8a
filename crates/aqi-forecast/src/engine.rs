//! Per-pollutant statistical hourly projection, AQI trajectory, confidence
//! bands, alert derivation, and recommendation bundles.

use aqi_core::config::AqiThresholds;
use aqi_core::{
    Alert, AlertKind, AqiPrediction, Availability, Band, DataSources, Forecast, HourPrediction,
    LatLng, Level, Method, Pollutant, Query, Recommendation, Snapshot,
};
use chrono::{Datelike, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Base concentration (canonical unit) assumed for a pollutant absent from
/// the current snapshot.
fn base_concentration(pollutant: Pollutant) -> f64 {
    match pollutant {
        Pollutant::NO2 => 20.0,
        Pollutant::O3 => 50.0,
        Pollutant::SO2 => 10.0,
        Pollutant::HCHO => 5.0,
        Pollutant::CO => 1.0,
        Pollutant::PM25 => 15.0,
        Pollutant::PM10 => 25.0,
    }
}

/// Seeds the noise term from `(location rounded to 4dp, pollutant,
/// generation day)` so identical inputs always produce identical forecasts.
/// Uses `std::hash::Hasher`'s default (SipHash) implementation, stable for
/// the lifetime of one compiled binary — adequate here since no forecast
/// is ever persisted or compared across a Rust version upgrade.
fn seed_for(location: LatLng, pollutant: Pollutant, generation_day: i64) -> u64 {
    let rounded = location.rounded(4);
    let mut hasher = DefaultHasher::new();
    rounded.lat.to_bits().hash(&mut hasher);
    rounded.lng.to_bits().hash(&mut hasher);
    pollutant.as_str().hash(&mut hasher);
    generation_day.hash(&mut hasher);
    hasher.finish()
}

pub struct ForecastEngine;

impl ForecastEngine {
    /// Projects `horizon_hours` of per-pollutant concentrations from
    /// `snapshot`, then derives the AQI trajectory, confidence bands,
    /// alerts, and recommendations. Pure and deterministic: the only
    /// stochastic input is the seeded PRNG noise term.
    pub fn generate(query: &Query, snapshot: &Snapshot, data_sources: DataSources) -> Forecast {
        let generated_at = Utc::now();
        let generation_day = generated_at.num_days_from_ce() as i64;
        let horizon = query.horizon_hours;

        let mut per_pollutant: BTreeMap<Pollutant, Vec<HourPrediction>> = BTreeMap::new();
        let mut confidence: BTreeMap<Pollutant, Vec<Band>> = BTreeMap::new();

        for pollutant in Pollutant::ALL {
            let base = snapshot
                .pollutants
                .get(&pollutant)
                .map(|m| m.concentration)
                .unwrap_or_else(|| base_concentration(pollutant));

            let mut rng = ChaCha8Rng::seed_from_u64(seed_for(query.location, pollutant, generation_day));
            let mut predictions = Vec::with_capacity(horizon as usize);
            let mut bands = Vec::with_capacity(horizon as usize);
            for h in 1..=horizon {
                let trend = ((h as f64) * std::f64::consts::PI / 12.0).sin() * 0.1;
                let noise: f64 = rng.gen_range(-0.1..=0.1);
                let c = (base * (1.0 + trend + noise)).max(0.0);
                let at = generated_at + chrono::Duration::hours(h as i64);
                predictions.push(HourPrediction {
                    hour: h,
                    concentration: c,
                    at,
                    method: Method::Statistical,
                });
                bands.push(Band {
                    hour: h,
                    lower: 0.8 * c,
                    upper: 1.2 * c,
                    confidence: 0.8,
                });
            }
            per_pollutant.insert(pollutant, predictions);
            confidence.insert(pollutant, bands);
        }

        let aqi = Self::aqi_trajectory(&per_pollutant, generated_at);
        let thresholds = AqiThresholds::default();
        let alerts = Self::derive_alerts(&aqi, &per_pollutant, &thresholds);
        let recommendations = Self::derive_recommendations(&aqi);

        Forecast {
            location: query.location,
            horizon_hours: horizon,
            generated_at,
            per_pollutant,
            aqi,
            confidence,
            alerts,
            recommendations,
            data_sources,
        }
    }

    fn aqi_trajectory(
        per_pollutant: &BTreeMap<Pollutant, Vec<HourPrediction>>,
        generated_at: chrono::DateTime<Utc>,
    ) -> Vec<AqiPrediction> {
        let horizon = per_pollutant.values().map(|v| v.len()).max().unwrap_or(0);
        let mut out = Vec::with_capacity(horizon);
        for idx in 0..horizon {
            let hour = (idx + 1) as u32;
            let max_aqi = per_pollutant
                .iter()
                .filter_map(|(p, preds)| preds.get(idx).map(|pred| aqi_core::compute_aqi(*p, pred.concentration)))
                .max();
            if let Some(value) = max_aqi {
                out.push(AqiPrediction {
                    hour,
                    aqi: value,
                    level: Level::from_aqi(value),
                    at: generated_at + chrono::Duration::hours(hour as i64),
                });
            }
        }
        out
    }

    fn derive_alerts(
        aqi: &[AqiPrediction],
        per_pollutant: &BTreeMap<Pollutant, Vec<HourPrediction>>,
        thresholds: &AqiThresholds,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for pred in aqi.iter().filter(|p| p.hour <= 24) {
            let kind = if pred.aqi >= thresholds.emergency {
                Some(AlertKind::AqiEmergency)
            } else if pred.aqi >= thresholds.critical {
                Some(AlertKind::AqiCritical)
            } else if pred.aqi >= thresholds.warning {
                Some(AlertKind::AqiWarning)
            } else {
                None
            };
            if let Some(kind) = kind {
                alerts.push(Alert {
                    kind,
                    hours_until: pred.hour,
                    aqi: Some(pred.aqi),
                    pollutant: None,
                    value: None,
                    message: format!("AQI forecast to reach {} in {}h", pred.aqi, pred.hour),
                    at: pred.at,
                });
            }
        }
        for (pollutant, preds) in per_pollutant {
            let warning = pollutant.default_warning_threshold();
            let critical = pollutant.default_critical_threshold();
            for pred in preds.iter().filter(|p| p.hour <= 24) {
                if pred.concentration >= critical {
                    alerts.push(Alert {
                        kind: AlertKind::PollutantCritical,
                        hours_until: pred.hour,
                        aqi: None,
                        pollutant: Some(*pollutant),
                        value: Some(pred.concentration),
                        message: format!(
                            "{} forecast to reach {:.1} in {}h",
                            pollutant, pred.concentration, pred.hour
                        ),
                        at: pred.at,
                    });
                } else if pred.concentration >= warning {
                    alerts.push(Alert {
                        kind: AlertKind::PollutantWarning,
                        hours_until: pred.hour,
                        aqi: None,
                        pollutant: Some(*pollutant),
                        value: Some(pred.concentration),
                        message: format!(
                            "{} forecast to reach {:.1} in {}h",
                            pollutant, pred.concentration, pred.hour
                        ),
                        at: pred.at,
                    });
                }
            }
        }
        alerts
    }

    /// One bundle per hour whose AQI exceeds 100. Duplicate bundles for
    /// consecutive hours at the same level are intentionally not
    /// suppressed here — that is the caller's concern.
    fn derive_recommendations(aqi: &[AqiPrediction]) -> Vec<Recommendation> {
        aqi.iter()
            .filter(|p| p.aqi > 100)
            .map(|p| Recommendation {
                hour: p.hour,
                level: p.level,
                message: recommendation_message(p.level),
            })
            .collect()
    }

    pub fn data_sources_from(
        satellite: bool,
        ground: bool,
        weather: bool,
    ) -> DataSources {
        let flag = |present: bool| {
            if present {
                Availability::Available
            } else {
                Availability::Unavailable
            }
        };
        DataSources {
            satellite: flag(satellite),
            ground: flag(ground),
            weather: flag(weather),
        }
    }
}

fn recommendation_message(level: Level) -> String {
    match level {
        Level::Good | Level::Moderate => "Air quality is acceptable for most activities.".to_string(),
        Level::UnhealthySensitive => {
            "Sensitive groups should reduce prolonged or heavy exertion outdoors.".to_string()
        }
        Level::Unhealthy => "Everyone should reduce prolonged or heavy outdoor exertion.".to_string(),
        Level::VeryUnhealthy => "Avoid outdoor exertion; sensitive groups should remain indoors.".to_string(),
        Level::Hazardous => "Everyone should avoid all outdoor exertion.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqi_core::{Confidence, Coverage, DataQuality};

    fn empty_snapshot(location: LatLng) -> Snapshot {
        Snapshot {
            location,
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
    fn forecast_length_matches_horizon() {
        let query = Query::new(10.0, 10.0, 25.0, 24);
        let snapshot = empty_snapshot(query.location);
        let data_sources = ForecastEngine::data_sources_from(false, false, false);
        let forecast = ForecastEngine::generate(&query, &snapshot, data_sources);
        assert_eq!(forecast.aqi.len(), 24);
        for preds in forecast.per_pollutant.values() {
            assert_eq!(preds.len(), 24);
        }
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let query = Query::new(12.34, 56.78, 25.0, 12);
        let snapshot = empty_snapshot(query.location);
        let data_sources = ForecastEngine::data_sources_from(true, true, true);
        let first = ForecastEngine::generate(&query, &snapshot, data_sources);
        let second = ForecastEngine::generate(&query, &snapshot, data_sources);
        for pollutant in Pollutant::ALL {
            let a = &first.per_pollutant[&pollutant];
            let b = &second.per_pollutant[&pollutant];
            for (pa, pb) in a.iter().zip(b.iter()) {
                assert_eq!(pa.concentration.to_bits(), pb.concentration.to_bits());
            }
        }
    }

    #[test]
    fn confidence_band_brackets_the_prediction() {
        let query = Query::new(1.0, 1.0, 25.0, 24);
        let snapshot = empty_snapshot(query.location);
        let data_sources = ForecastEngine::data_sources_from(false, true, false);
        let forecast = ForecastEngine::generate(&query, &snapshot, data_sources);
        for (pollutant, bands) in &forecast.confidence {
            let preds = &forecast.per_pollutant[pollutant];
            for (band, pred) in bands.iter().zip(preds.iter()) {
                assert!(0.0 <= band.lower);
                assert!(band.lower <= pred.concentration);
                assert!(pred.concentration <= band.upper);
            }
        }
    }

    #[test]
    fn recommendations_only_above_100() {
        let query = Query::new(1.0, 1.0, 25.0, 24);
        let snapshot = empty_snapshot(query.location);
        let data_sources = ForecastEngine::data_sources_from(false, true, false);
        let forecast = ForecastEngine::generate(&query, &snapshot, data_sources);
        for r in &forecast.recommendations {
            let matching_aqi = forecast.aqi.iter().find(|p| p.hour == r.hour).unwrap();
            assert!(matching_aqi.aqi > 100);
        }
    }
}
