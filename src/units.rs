//! Distance and speed unit conversions for display.

use serde::{Deserialize, Serialize};

pub const FEET_PER_METER: f32 = 3.28084;
pub const MILES_PER_METER: f32 = 0.000621371;
pub const METERS_PER_KILOMETER: f32 = 1000.0;
/// m/s → km/h
pub const KMH_PER_MPS: f32 = 3.6;
/// m/s → mph
pub const MPH_PER_MPS: f32 = 2.23694;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Feet,
    Miles,
}

impl DistanceUnit {
    pub fn from_meters(self, meters: f32) -> f32 {
        match self {
            Self::Meters => meters,
            Self::Kilometers => meters / METERS_PER_KILOMETER,
            Self::Feet => meters * FEET_PER_METER,
            Self::Miles => meters * MILES_PER_METER,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Meters => "m",
            Self::Kilometers => "km",
            Self::Feet => "ft",
            Self::Miles => "mi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    MetersPerSecond,
    KilometersPerHour,
    MilesPerHour,
}

impl SpeedUnit {
    pub fn from_mps(self, mps: f32) -> f32 {
        match self {
            Self::MetersPerSecond => mps,
            Self::KilometersPerHour => mps * KMH_PER_MPS,
            Self::MilesPerHour => mps * MPH_PER_MPS,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::MetersPerSecond => "m/s",
            Self::KilometersPerHour => "km/h",
            Self::MilesPerHour => "mph",
        }
    }
}

/// "12.35 m" のような表示用文字列
pub fn format_distance(meters: f32, unit: DistanceUnit) -> String {
    format!("{:.2} {}", unit.from_meters(meters), unit.symbol())
}
