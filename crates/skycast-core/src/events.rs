//! Threshold-based weather event classification
//!
//! The four predicates are evaluated independently of each other, so one
//! observation may raise flags that look contradictory (heat and snow on
//! the same day). That behavior is kept as-is.

use serde::{Deserialize, Serialize};

use crate::rollups::fraction;
use crate::types::Conditions;

pub const EXTREME_HEAT_ABOVE_C: f64 = 30.0;
pub const RAIN_AT_LEAST_MM_DAY: f64 = 0.01;
pub const SNOW_BELOW_C: f64 = 5.0;
pub const THUNDERSTORM_PRECIP_ABOVE_MM_DAY: f64 = 5.0;
pub const THUNDERSTORM_CLOUD_TOP_BELOW_C: f64 = -30.0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("cannot compute event probabilities over an empty series")]
    EmptySeries,
}

/// Event thresholds; every field can be overridden from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub extreme_heat_above_c: f64,
    pub rain_at_least_mm_day: f64,
    pub snow_below_c: f64,
    pub thunderstorm_precip_above_mm_day: f64,
    pub thunderstorm_cloud_top_below_c: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            extreme_heat_above_c: EXTREME_HEAT_ABOVE_C,
            rain_at_least_mm_day: RAIN_AT_LEAST_MM_DAY,
            snow_below_c: SNOW_BELOW_C,
            thunderstorm_precip_above_mm_day: THUNDERSTORM_PRECIP_ABOVE_MM_DAY,
            thunderstorm_cloud_top_below_c: THUNDERSTORM_CLOUD_TOP_BELOW_C,
        }
    }
}

/// The fixed set of weather events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherEvent {
    ExtremeHeat,
    Rain,
    Snow,
    Thunderstorm,
}

impl WeatherEvent {
    pub const ALL: [WeatherEvent; 4] = [
        WeatherEvent::ExtremeHeat,
        WeatherEvent::Rain,
        WeatherEvent::Snow,
        WeatherEvent::Thunderstorm,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WeatherEvent::ExtremeHeat => "Extreme Heat",
            WeatherEvent::Rain => "Rain",
            WeatherEvent::Snow => "Snow",
            WeatherEvent::Thunderstorm => "Thunderstorm",
        }
    }

    /// `None` when a value the predicate needs is absent
    pub fn test<C: Conditions + ?Sized>(&self, record: &C, t: &Thresholds) -> Option<bool> {
        match self {
            WeatherEvent::ExtremeHeat => record
                .temperature_c()
                .map(|temp| temp > t.extreme_heat_above_c),
            WeatherEvent::Rain => record
                .precip_mm_day()
                .map(|precip| precip >= t.rain_at_least_mm_day),
            WeatherEvent::Snow => record.temperature_c().map(|temp| temp < t.snow_below_c),
            WeatherEvent::Thunderstorm => {
                let precip = record.precip_mm_day()?;
                let cloud_top = record.cloud_top_temp_c()?;
                Some(
                    precip > t.thunderstorm_precip_above_mm_day
                        && cloud_top < t.thunderstorm_cloud_top_below_c,
                )
            }
        }
    }
}

/// Boolean flags for a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFlags {
    #[serde(rename = "Extreme Heat")]
    pub extreme_heat: bool,
    #[serde(rename = "Rain")]
    pub rain: bool,
    #[serde(rename = "Snow")]
    pub snow: bool,
    #[serde(rename = "Thunderstorm")]
    pub thunderstorm: bool,
}

impl EventFlags {
    pub fn get(&self, event: WeatherEvent) -> bool {
        match event {
            WeatherEvent::ExtremeHeat => self.extreme_heat,
            WeatherEvent::Rain => self.rain,
            WeatherEvent::Snow => self.snow,
            WeatherEvent::Thunderstorm => self.thunderstorm,
        }
    }
}

/// Share of years in which each event occurred
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EventProbabilities {
    #[serde(rename = "Extreme Heat")]
    pub extreme_heat: f64,
    #[serde(rename = "Rain")]
    pub rain: f64,
    #[serde(rename = "Snow")]
    pub snow: f64,
    #[serde(rename = "Thunderstorm")]
    pub thunderstorm: f64,
}

impl EventProbabilities {
    pub fn get(&self, event: WeatherEvent) -> f64 {
        match event {
            WeatherEvent::ExtremeHeat => self.extreme_heat,
            WeatherEvent::Rain => self.rain,
            WeatherEvent::Snow => self.snow,
            WeatherEvent::Thunderstorm => self.thunderstorm,
        }
    }
}

/// Flags for one record; a flag whose inputs are absent is `false`
pub fn classify<C: Conditions + ?Sized>(record: &C, thresholds: &Thresholds) -> EventFlags {
    let flag = |event: WeatherEvent| event.test(record, thresholds).unwrap_or(false);
    EventFlags {
        extreme_heat: flag(WeatherEvent::ExtremeHeat),
        rain: flag(WeatherEvent::Rain),
        snow: flag(WeatherEvent::Snow),
        thunderstorm: flag(WeatherEvent::Thunderstorm),
    }
}

/// Per-event share of records satisfying the predicate
///
/// Records missing a value the predicate needs are left out of both the
/// numerator and the denominator. When no record qualifies the probability
/// is 0.
pub fn probabilities<C: Conditions>(
    records: &[C],
    thresholds: &Thresholds,
) -> Result<EventProbabilities, EventError> {
    if records.is_empty() {
        return Err(EventError::EmptySeries);
    }
    let share = |event: WeatherEvent| {
        fraction(records.iter().map(|r| event.test(r, thresholds))).unwrap_or(0.0)
    };
    Ok(EventProbabilities {
        extreme_heat: share(WeatherEvent::ExtremeHeat),
        rain: share(WeatherEvent::Rain),
        snow: share(WeatherEvent::Snow),
        thunderstorm: share(WeatherEvent::Thunderstorm),
    })
}
