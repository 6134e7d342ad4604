//! Unit conversion utilities
//!
//! Archive products report SI units; the tables use Celsius, hPa, m/s and
//! mm/day.

use crate::types::variables;

pub const KELVIN_OFFSET: f64 = 273.15;
pub const PASCALS_PER_HECTOPASCAL: f64 = 100.0;
pub const HOURS_PER_DAY: f64 = 24.0;

/// Conversion applied to a raw archive variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    KelvinToCelsius,
    PascalToHectopascal,
    Identity,
}

impl Conversion {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Conversion::KelvinToCelsius => kelvin_to_celsius(value),
            Conversion::PascalToHectopascal => pascal_to_hectopascal(value),
            Conversion::Identity => value,
        }
    }
}

/// Get the conversion for an archive variable
pub fn conversion_for(variable: &str) -> Conversion {
    match variable {
        variables::AIR_TEMPERATURE_2M | variables::CLOUD_TOP_TEMPERATURE => {
            Conversion::KelvinToCelsius
        }
        variables::SURFACE_PRESSURE => Conversion::PascalToHectopascal,
        _ => Conversion::Identity,
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

pub fn pascal_to_hectopascal(pascal: f64) -> f64 {
    pascal / PASCALS_PER_HECTOPASCAL
}

/// Speed from eastward and northward components
pub fn wind_speed(u: f64, v: f64) -> f64 {
    u.hypot(v)
}

/// mm/hr rate to a daily total
pub fn hourly_to_daily(rate_mm_hr: f64) -> f64 {
    rate_mm_hr * HOURS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        assert!((kelvin_to_celsius(273.15) - 0.0).abs() < 1e-9);
        assert!((kelvin_to_celsius(303.15) - 30.0).abs() < 1e-9);
        assert!((kelvin_to_celsius(223.15) + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_pressure_and_wind() {
        assert_eq!(pascal_to_hectopascal(101_325.0), 1013.25);
        assert_eq!(wind_speed(3.0, 4.0), 5.0);
        assert_eq!(wind_speed(-3.0, 0.0), 3.0);
    }

    #[test]
    fn test_hourly_to_daily() {
        assert_eq!(hourly_to_daily(0.5), 12.0);
        assert_eq!(hourly_to_daily(0.0), 0.0);
    }

    #[test]
    fn test_conversion_lookup() {
        assert_eq!(
            conversion_for(variables::AIR_TEMPERATURE_2M),
            Conversion::KelvinToCelsius
        );
        assert_eq!(
            conversion_for(variables::SURFACE_PRESSURE),
            Conversion::PascalToHectopascal
        );
        assert_eq!(conversion_for(variables::EASTWARD_WIND_10M), Conversion::Identity);
        assert_eq!(Conversion::PascalToHectopascal.apply(95_000.0), 950.0);
    }
}
