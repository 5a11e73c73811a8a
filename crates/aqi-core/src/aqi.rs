//! Pure, stateless EPA breakpoint interpolation. No I/O, no allocation
//! beyond the static breakpoint tables, never fails.

use crate::pollutant::Pollutant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One piecewise-linear segment of an EPA breakpoint table.
#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    c_low: f64,
    c_high: f64,
    i_low: i32,
    i_high: i32,
}

const fn bp(c_low: f64, c_high: f64, i_low: i32, i_high: i32) -> Breakpoint {
    Breakpoint {
        c_low,
        c_high,
        i_low,
        i_high,
    }
}

const PM25: &[Breakpoint] = &[
    bp(0.0, 12.0, 0, 50),
    bp(12.1, 35.4, 51, 100),
    bp(35.5, 55.4, 101, 150),
    bp(55.5, 150.4, 151, 200),
    bp(150.5, 250.4, 201, 300),
    bp(250.5, 350.4, 301, 400),
    bp(350.5, 500.4, 401, 500),
];

const PM10: &[Breakpoint] = &[
    bp(0.0, 54.0, 0, 50),
    bp(55.0, 154.0, 51, 100),
    bp(155.0, 254.0, 101, 150),
    bp(255.0, 354.0, 151, 200),
    bp(355.0, 424.0, 201, 300),
    bp(425.0, 504.0, 301, 400),
    bp(505.0, 604.0, 401, 500),
];

const O3: &[Breakpoint] = &[
    bp(0.0, 54.0, 0, 50),
    bp(55.0, 70.0, 51, 100),
    bp(71.0, 85.0, 101, 150),
    bp(86.0, 105.0, 151, 200),
    bp(106.0, 200.0, 201, 300),
];

const NO2: &[Breakpoint] = &[
    bp(0.0, 53.0, 0, 50),
    bp(54.0, 100.0, 51, 100),
    bp(101.0, 360.0, 101, 150),
    bp(361.0, 649.0, 151, 200),
    bp(650.0, 1249.0, 201, 300),
    bp(1250.0, 1649.0, 301, 400),
    bp(1650.0, 2049.0, 401, 500),
];

const SO2: &[Breakpoint] = &[
    bp(0.0, 35.0, 0, 50),
    bp(36.0, 75.0, 51, 100),
    bp(76.0, 185.0, 101, 150),
    bp(186.0, 304.0, 151, 200),
    bp(305.0, 604.0, 201, 300),
];

const CO: &[Breakpoint] = &[
    bp(0.0, 4.4, 0, 50),
    bp(4.5, 9.4, 51, 100),
    bp(9.5, 12.4, 101, 150),
    bp(12.5, 15.4, 151, 200),
    bp(15.5, 30.4, 201, 300),
    bp(30.5, 40.4, 301, 400),
    bp(40.5, 50.4, 401, 500),
];

const HCHO: &[Breakpoint] = &[
    bp(0.0, 10.0, 0, 50),
    bp(11.0, 20.0, 51, 100),
    bp(21.0, 50.0, 101, 150),
    bp(51.0, 100.0, 151, 200),
    bp(101.0, 200.0, 201, 300),
];

fn table_for(pollutant: Pollutant) -> &'static [Breakpoint] {
    match pollutant {
        Pollutant::PM25 => PM25,
        Pollutant::PM10 => PM10,
        Pollutant::O3 => O3,
        Pollutant::NO2 => NO2,
        Pollutant::SO2 => SO2,
        Pollutant::CO => CO,
        Pollutant::HCHO => HCHO,
    }
}

/// Maps a concentration (in the pollutant's canonical unit) to an AQI value
/// in `[0, 500]` via EPA piecewise-linear breakpoint interpolation.
///
/// A concentration exactly on a boundary (`c == cHigh`) belongs to the
/// segment it closes, matching EPA convention — the table is scanned in
/// order and the first segment with `c <= cHigh` wins.
pub fn aqi(pollutant: Pollutant, concentration: f64) -> i32 {
    if !concentration.is_finite() || concentration < 0.0 {
        return 0;
    }
    let table = table_for(pollutant);
    let first = match table.first() {
        Some(row) => row,
        None => return 0,
    };
    if concentration < first.c_low {
        return (first.i_low as f64 * concentration / first.c_low).round() as i32;
    }
    for row in table {
        if concentration <= row.c_high {
            let value = (row.i_high - row.i_low) as f64 / (row.c_high - row.c_low)
                * (concentration - row.c_low)
                + row.i_low as f64;
            return value.round().clamp(0.0, 500.0) as i32;
        }
    }
    500
}

/// Qualitative AQI level bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl Level {
    pub fn from_aqi(value: i32) -> Level {
        match value {
            v if v <= 50 => Level::Good,
            v if v <= 100 => Level::Moderate,
            v if v <= 150 => Level::UnhealthySensitive,
            v if v <= 200 => Level::Unhealthy,
            v if v <= 300 => Level::VeryUnhealthy,
            _ => Level::Hazardous,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Good => "good",
            Level::Moderate => "moderate",
            Level::UnhealthySensitive => "unhealthy-sensitive",
            Level::Unhealthy => "unhealthy",
            Level::VeryUnhealthy => "very-unhealthy",
            Level::Hazardous => "hazardous",
        };
        write!(f, "{}", s)
    }
}
