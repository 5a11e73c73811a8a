use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven pollutants this service tracks. Canonical names are
/// case-sensitive; incoming aliases (`pm2.5`, `pm2_5`, `o3 `, ...) must be
/// normalized to one of these before they enter a [`crate::Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    NO2,
    O3,
    SO2,
    HCHO,
    CO,
    PM25,
    PM10,
}

impl Pollutant {
    pub const ALL: [Pollutant; 7] = [
        Pollutant::NO2,
        Pollutant::O3,
        Pollutant::SO2,
        Pollutant::HCHO,
        Pollutant::CO,
        Pollutant::PM25,
        Pollutant::PM10,
    ];

    /// The unit a canonical [`crate::Measurement`] for this pollutant must
    /// carry: micrograms per cubic meter for particulates, parts per
    /// billion for gases, parts per million for carbon monoxide.
    pub fn canonical_unit(self) -> &'static str {
        match self {
            Pollutant::PM25 | Pollutant::PM10 => "ug/m3",
            Pollutant::CO => "ppm",
            Pollutant::NO2 | Pollutant::O3 | Pollutant::SO2 | Pollutant::HCHO => "ppb",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pollutant::NO2 => "NO2",
            Pollutant::O3 => "O3",
            Pollutant::SO2 => "SO2",
            Pollutant::HCHO => "HCHO",
            Pollutant::CO => "CO",
            Pollutant::PM25 => "PM25",
            Pollutant::PM10 => "PM10",
        }
    }

    /// Concentration (canonical unit) at which this pollutant's own AQI
    /// crosses 100 — the upper edge of the EPA "Moderate" breakpoint row
    /// in [`crate::aqi`]. Used as the default per-pollutant warning
    /// threshold when a subscriber has not overridden it.
    pub fn default_warning_threshold(self) -> f64 {
        match self {
            Pollutant::PM25 => 35.4,
            Pollutant::PM10 => 154.0,
            Pollutant::O3 => 70.0,
            Pollutant::NO2 => 100.0,
            Pollutant::SO2 => 75.0,
            Pollutant::CO => 9.4,
            Pollutant::HCHO => 20.0,
        }
    }

    /// Concentration (canonical unit) at which this pollutant's own AQI
    /// crosses 150 — the upper edge of the EPA "Unhealthy for Sensitive
    /// Groups" row. Default per-pollutant critical threshold.
    pub fn default_critical_threshold(self) -> f64 {
        match self {
            Pollutant::PM25 => 55.4,
            Pollutant::PM10 => 254.0,
            Pollutant::O3 => 85.0,
            Pollutant::NO2 => 360.0,
            Pollutant::SO2 => 185.0,
            Pollutant::CO => 12.4,
            Pollutant::HCHO => 50.0,
        }
    }

    /// Normalizes a provider-supplied pollutant name: case-folds, strips
    /// punctuation, and maps known aliases to a canonical member. Returns
    /// `None` for anything unrecognized.
    pub fn normalize(raw: &str) -> Option<Pollutant> {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "no2" => Some(Pollutant::NO2),
            "o3" | "ozone" => Some(Pollutant::O3),
            "so2" => Some(Pollutant::SO2),
            "hcho" | "formaldehyde" | "ch2o" => Some(Pollutant::HCHO),
            "co" => Some(Pollutant::CO),
            "pm25" | "pm2" | "pm2point5" => Some(Pollutant::PM25),
            "pm10" => Some(Pollutant::PM10),
            _ => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
