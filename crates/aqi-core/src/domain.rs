use crate::error::AqiError;
use crate::geo::LatLng;
use crate::pollutant::Pollutant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic query: the shared input to every upstream client, the
/// canonicalizer, and the forecast engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub location: LatLng,
    pub radius_km: f64,
    pub horizon_hours: u32,
}

impl Query {
    pub fn new(lat: f64, lng: f64, radius_km: f64, horizon_hours: u32) -> Self {
        Self {
            location: LatLng::new(lat, lng),
            radius_km,
            horizon_hours,
        }
    }

    /// Validates a query per the upstream-client contract. Invalid inputs
    /// never reach a provider.
    pub fn validate(&self) -> Result<(), AqiError> {
        if !(-90.0..=90.0).contains(&self.location.lat) {
            return Err(AqiError::BadRequest(format!(
                "latitude {} out of range [-90, 90]",
                self.location.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.location.lng) {
            return Err(AqiError::BadRequest(format!(
                "longitude {} out of range [-180, 180]",
                self.location.lng
            )));
        }
        if !(self.radius_km > 0.0 && self.radius_km <= 100.0) {
            return Err(AqiError::BadRequest(format!(
                "radiusKm {} out of range (0, 100]",
                self.radius_km
            )));
        }
        if !(1..=72).contains(&self.horizon_hours) {
            return Err(AqiError::BadRequest(format!(
                "horizonHours {} out of range [1, 72]",
                self.horizon_hours
            )));
        }
        Ok(())
    }
}

/// A single pollutant reading from one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub pollutant: Pollutant,
    pub concentration: f64,
    pub unit: String,
    pub source: String,
    pub station_id: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub distance_meters: Option<f64>,
}

impl Measurement {
    pub fn is_valid(&self) -> bool {
        self.concentration >= 0.0 && self.unit == self.pollutant.canonical_unit()
    }
}

/// A monitoring station. Identity is `(id, source)`; immutable once a
/// `Snapshot` has been built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub source: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    Partial,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQuality {
    pub confidence: Confidence,
    pub coverage: Coverage,
    pub resolution: String,
}

/// The canonical point-in-time air-quality view for one location, produced
/// by the Canonicalizer and owned by the cache until eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub location: LatLng,
    pub observed_at: DateTime<Utc>,
    pub pollutants: std::collections::BTreeMap<Pollutant, Measurement>,
    pub stations: Vec<Station>,
    pub sources: Vec<String>,
    pub data_quality: DataQuality,
    pub aqi: i32,
}

impl Snapshot {
    pub fn level(&self) -> crate::aqi::Level {
        crate::aqi::Level::from_aqi(self.aqi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Statistical,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourPrediction {
    pub hour: u32,
    pub concentration: f64,
    pub at: DateTime<Utc>,
    pub method: Method,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AqiPrediction {
    pub hour: u32,
    pub aqi: i32,
    pub level: crate::aqi::Level,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub hour: u32,
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    AqiWarning,
    AqiCritical,
    AqiEmergency,
    PollutantWarning,
    PollutantCritical,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub hours_until: u32,
    pub aqi: Option<i32>,
    pub pollutant: Option<Pollutant>,
    pub value: Option<f64>,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub hour: u32,
    pub level: crate::aqi::Level,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSources {
    pub satellite: Availability,
    pub ground: Availability,
    pub weather: Availability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// The full forecast product: per-pollutant hourly predictions, the
/// derived AQI trajectory, confidence bands, alerts, and recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub location: LatLng,
    pub horizon_hours: u32,
    pub generated_at: DateTime<Utc>,
    pub per_pollutant: std::collections::BTreeMap<Pollutant, Vec<HourPrediction>>,
    pub aqi: Vec<AqiPrediction>,
    pub confidence: std::collections::BTreeMap<Pollutant, Vec<Band>>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub data_sources: DataSources,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    pub current: i32,
    pub peak: i32,
    pub average: f64,
    pub trend: Trend,
    pub worst_hour: u32,
}

impl Forecast {
    /// `summary` per §6: trend rule compares first/last AQI in the series.
    pub fn summary(&self) -> ForecastSummary {
        if self.aqi.is_empty() {
            return ForecastSummary {
                current: 0,
                peak: 0,
                average: 0.0,
                trend: Trend::Stable,
                worst_hour: 0,
            };
        }
        let first = self.aqi.first().unwrap();
        let last = self.aqi.last().unwrap();
        let peak_pred = self.aqi.iter().max_by_key(|p| p.aqi).unwrap();
        let average = self.aqi.iter().map(|p| p.aqi as f64).sum::<f64>() / self.aqi.len() as f64;
        let delta = last.aqi - first.aqi;
        let trend = if delta > 10 {
            Trend::Increasing
        } else if delta < -10 {
            Trend::Decreasing
        } else {
            Trend::Stable
        };
        ForecastSummary {
            current: first.aqi,
            peak: peak_pred.aqi,
            average,
            trend,
            worst_hour: peak_pred.hour,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_validates_bounds() {
        assert!(Query::new(40.0, -73.0, 25.0, 24).validate().is_ok());
        assert!(Query::new(91.0, 0.0, 25.0, 24).validate().is_err());
        assert!(Query::new(0.0, 181.0, 25.0, 24).validate().is_err());
        assert!(Query::new(0.0, 0.0, 0.0, 24).validate().is_err());
        assert!(Query::new(0.0, 0.0, 101.0, 24).validate().is_err());
        assert!(Query::new(0.0, 0.0, 25.0, 0).validate().is_err());
        assert!(Query::new(0.0, 0.0, 25.0, 73).validate().is_err());
        assert!(Query::new(0.0, 0.0, 25.0, 1).validate().is_ok());
        assert!(Query::new(0.0, 0.0, 25.0, 72).validate().is_ok());
    }

    #[test]
    fn trend_rule() {
        let mk = |aqi: i32| AqiPrediction {
            hour: 1,
            aqi,
            level: crate::aqi::Level::from_aqi(aqi),
            at: Utc::now(),
        };
        let f = |series: Vec<i32>| Forecast {
            location: LatLng::new(0.0, 0.0),
            horizon_hours: series.len() as u32,
            generated_at: Utc::now(),
            per_pollutant: Default::default(),
            aqi: series.into_iter().map(mk).collect(),
            confidence: Default::default(),
            alerts: vec![],
            recommendations: vec![],
            data_sources: DataSources {
                satellite: Availability::Available,
                ground: Availability::Available,
                weather: Availability::Available,
            },
        };
        assert_eq!(f(vec![50, 60, 70]).summary().trend, Trend::Increasing);
        assert_eq!(f(vec![70, 60, 50]).summary().trend, Trend::Decreasing);
        assert_eq!(f(vec![50, 52, 55]).summary().trend, Trend::Stable);
    }
}
