//! Advisory prompt template

use skycast_core::{Conditions, GeoPoint};

fn reading(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1} {unit}"),
        None => "n/a".to_string(),
    }
}

/// Prompt for one location, date and set of expected conditions
///
/// Absent values are written as `n/a`.
pub fn build_prompt<C: Conditions + ?Sized>(
    point: GeoPoint,
    date: &str,
    conditions: &C,
) -> String {
    format!(
        "You are a friendly assistant helping people plan outdoor events.\n\
         Location: lat={lat}, lon={lon}\n\
         Date: {date}\n\
         \n\
         Temperature: {temperature}\n\
         Rainfall: {rainfall}\n\
         Wind speed: {wind}\n\
         Pressure: {pressure}\n\
         \n\
         Please:\n\
         1. Summarize the expected weather in plain language.\n\
         2. Recommend what to plan for or bring.\n\
         3. End with a short, encouraging closing note.",
        lat = point.lat,
        lon = point.lon,
        temperature = reading(conditions.temperature_c(), "°C"),
        rainfall = reading(conditions.precip_mm_day(), "mm/day"),
        wind = reading(conditions.wind_speed_ms(), "m/s"),
        pressure = reading(conditions.pressure_hpa(), "hPa"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::{Estimate, ForecastMode, ForecastResult};

    fn forecast() -> ForecastResult {
        let mut result = ForecastResult::unavailable(2021, ForecastMode::Forecast);
        result.temperature_c = Some(Estimate::Forecast {
            point: 24.26,
            lower: 21.0,
            upper: 27.5,
        });
        result.precip_mm_day = Some(Estimate::Forecast {
            point: 1.23,
            lower: 0.0,
            upper: 3.0,
        });
        result.wind_speed_ms = Some(Estimate::Forecast {
            point: 3.04,
            lower: 2.0,
            upper: 4.0,
        });
        result
    }

    #[test]
    fn prompt_with_missing_pressure() {
        let prompt = build_prompt(GeoPoint::new(39.9, 116.4), "2021-06-01", &forecast());
        insta::assert_snapshot!(prompt, @r###"
        You are a friendly assistant helping people plan outdoor events.
        Location: lat=39.9, lon=116.4
        Date: 2021-06-01

        Temperature: 24.3 °C
        Rainfall: 1.2 mm/day
        Wind speed: 3.0 m/s
        Pressure: n/a

        Please:
        1. Summarize the expected weather in plain language.
        2. Recommend what to plan for or bring.
        3. End with a short, encouraging closing note.
        "###);
    }

    #[test]
    fn observed_values_use_the_same_template() {
        let observed = ForecastResult::observed(
            2019,
            skycast_core::PrecipitationSample {
                precip_mm_hr: Some(0.5),
            },
            skycast_core::AtmosphericSample {
                pressure_hpa: Some(1008.04),
                ..Default::default()
            },
        );
        let prompt = build_prompt(GeoPoint::new(-33.9, 18.4), "2019-03-02", &observed);
        assert!(prompt.contains("Rainfall: 12.0 mm/day"));
        assert!(prompt.contains("Pressure: 1008.0 hPa"));
        assert!(prompt.contains("Temperature: n/a"));
        assert!(prompt.contains("lat=-33.9, lon=18.4"));
    }
}
