//! Core data types for point observations and forecasts

use serde::{Deserialize, Serialize};

use crate::units::hourly_to_daily;

/// Calendar year of a record
pub type Year = i32;

/// Geographic query point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and inside [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Square box of `half_width_deg` around the point, clamped to valid coordinates
    pub fn bounding_box(&self, half_width_deg: f64) -> BoundingBox {
        BoundingBox {
            west: (self.lon - half_width_deg).max(-180.0),
            south: (self.lat - half_width_deg).max(-90.0),
            east: (self.lon + half_width_deg).min(180.0),
            north: (self.lat + half_width_deg).min(90.0),
        }
    }
}

/// Search box in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// `W,S,E,N` as accepted by granule search services
    pub fn to_query_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

/// Archive variable names
pub mod variables {
    pub const PRECIPITATION: &str = "precipitation";
    pub const AIR_TEMPERATURE_2M: &str = "T2M";
    pub const EASTWARD_WIND_10M: &str = "U10M";
    pub const NORTHWARD_WIND_10M: &str = "V10M";
    pub const CLOUD_TOP_TEMPERATURE: &str = "CLDTMP";
    pub const SURFACE_PRESSURE: &str = "PS";
}

/// Storage order of the gridded variables inside a granule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimOrder {
    TimeLatLon,
    TimeLonLat,
}

/// Satellite data products the pipeline reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    /// GPM IMERG final run, daily
    Precipitation,
    /// MERRA-2 hourly single-level diagnostics
    Atmosphere,
}

impl Product {
    pub fn short_name(&self) -> &'static str {
        match self {
            Product::Precipitation => "GPM_3IMERGDL",
            Product::Atmosphere => "M2T1NXSLV",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Product::Precipitation => "07",
            Product::Atmosphere => "5.12.4",
        }
    }

    pub fn variables(&self) -> &'static [&'static str] {
        match self {
            Product::Precipitation => &[variables::PRECIPITATION],
            Product::Atmosphere => &[
                variables::AIR_TEMPERATURE_2M,
                variables::EASTWARD_WIND_10M,
                variables::NORTHWARD_WIND_10M,
                variables::CLOUD_TOP_TEMPERATURE,
                variables::SURFACE_PRESSURE,
            ],
        }
    }

    pub fn dim_order(&self) -> DimOrder {
        match self {
            Product::Precipitation => DimOrder::TimeLonLat,
            Product::Atmosphere => DimOrder::TimeLatLon,
        }
    }
}

/// Precipitation extracted for one date
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PrecipitationSample {
    pub precip_mm_hr: Option<f64>,
}

impl PrecipitationSample {
    pub fn precip_mm_day(&self) -> Option<f64> {
        self.precip_mm_hr.map(hourly_to_daily)
    }
}

/// Time-averaged atmospheric values extracted for one date
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AtmosphericSample {
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub cloud_top_temp_c: Option<f64>,
    pub pressure_hpa: Option<f64>,
}

/// Read access shared by historical rows and forecast results
///
/// Event classification and the advisory prompt only go through this trait,
/// so they treat forecasts and observations the same way.
pub trait Conditions {
    fn temperature_c(&self) -> Option<f64>;
    fn precip_mm_day(&self) -> Option<f64>;
    fn cloud_top_temp_c(&self) -> Option<f64>;
    fn wind_speed_ms(&self) -> Option<f64>;
    fn pressure_hpa(&self) -> Option<f64>;
}

/// One row of the historical table
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct YearlyRecord {
    pub year: Year,
    pub precip_mm_hr: Option<f64>,
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub cloud_top_temp_c: Option<f64>,
    pub pressure_hpa: Option<f64>,
}

impl YearlyRecord {
    /// Record with every value absent
    pub fn empty(year: Year) -> Self {
        Self {
            year,
            ..Self::default()
        }
    }

    pub fn set_precipitation(&mut self, sample: PrecipitationSample) {
        self.precip_mm_hr = sample.precip_mm_hr;
    }

    pub fn set_atmosphere(&mut self, sample: AtmosphericSample) {
        self.temperature_c = sample.temperature_c;
        self.wind_speed_ms = sample.wind_speed_ms;
        self.cloud_top_temp_c = sample.cloud_top_temp_c;
        self.pressure_hpa = sample.pressure_hpa;
    }
}

impl Conditions for YearlyRecord {
    fn temperature_c(&self) -> Option<f64> {
        self.temperature_c
    }

    /// Derived from the hourly rate, so it is absent exactly when the rate is
    fn precip_mm_day(&self) -> Option<f64> {
        self.precip_mm_hr.map(hourly_to_daily)
    }

    fn cloud_top_temp_c(&self) -> Option<f64> {
        self.cloud_top_temp_c
    }

    fn wind_speed_ms(&self) -> Option<f64> {
        self.wind_speed_ms
    }

    fn pressure_hpa(&self) -> Option<f64> {
        self.pressure_hpa
    }
}

/// Value for one variable of the target date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Estimate {
    /// Model extrapolation with a 95% interval
    Forecast { point: f64, lower: f64, upper: f64 },
    /// Direct retrieval, no interval
    Observed { point: f64 },
}

impl Estimate {
    pub fn point(&self) -> f64 {
        match self {
            Estimate::Forecast { point, .. } | Estimate::Observed { point } => *point,
        }
    }

    pub fn lower(&self) -> Option<f64> {
        match self {
            Estimate::Forecast { lower, .. } => Some(*lower),
            Estimate::Observed { .. } => None,
        }
    }

    pub fn upper(&self) -> Option<f64> {
        match self {
            Estimate::Forecast { upper, .. } => Some(*upper),
            Estimate::Observed { .. } => None,
        }
    }
}

/// How a [`ForecastResult`] was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMode {
    Forecast,
    Observed,
}

/// Conditions for the target date, one estimate per variable
///
/// A `None` estimate means the variable is unavailable: no data was
/// retrieved, or no model could be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub year: Year,
    pub mode: ForecastMode,
    pub precip_mm_day: Option<Estimate>,
    pub temperature_c: Option<Estimate>,
    pub wind_speed_ms: Option<Estimate>,
    pub cloud_top_temp_c: Option<Estimate>,
    pub pressure_hpa: Option<Estimate>,
}

impl ForecastResult {
    /// Result with no estimates yet
    pub fn unavailable(year: Year, mode: ForecastMode) -> Self {
        Self {
            year,
            mode,
            precip_mm_day: None,
            temperature_c: None,
            wind_speed_ms: None,
            cloud_top_temp_c: None,
            pressure_hpa: None,
        }
    }

    /// Result built from a direct retrieval of the target date
    pub fn observed(
        year: Year,
        precipitation: PrecipitationSample,
        atmosphere: AtmosphericSample,
    ) -> Self {
        let observed = |v: Option<f64>| v.map(|point| Estimate::Observed { point });
        Self {
            year,
            mode: ForecastMode::Observed,
            precip_mm_day: observed(precipitation.precip_mm_day()),
            temperature_c: observed(atmosphere.temperature_c),
            wind_speed_ms: observed(atmosphere.wind_speed_ms),
            cloud_top_temp_c: observed(atmosphere.cloud_top_temp_c),
            pressure_hpa: observed(atmosphere.pressure_hpa),
        }
    }
}

impl Conditions for ForecastResult {
    fn temperature_c(&self) -> Option<f64> {
        self.temperature_c.map(|e| e.point())
    }

    fn precip_mm_day(&self) -> Option<f64> {
        self.precip_mm_day.map(|e| e.point())
    }

    fn cloud_top_temp_c(&self) -> Option<f64> {
        self.cloud_top_temp_c.map(|e| e.point())
    }

    fn wind_speed_ms(&self) -> Option<f64> {
        self.wind_speed_ms.map(|e| e.point())
    }

    fn pressure_hpa(&self) -> Option<f64> {
        self.pressure_hpa.map(|e| e.point())
    }
}
