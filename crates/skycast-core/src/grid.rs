//! Gridded observations and nearest-cell point extraction

use std::collections::HashMap;

use crate::rollups::Accumulator;
use crate::types::{variables, AtmosphericSample, GeoPoint, PrecipitationSample};
use crate::units::{conversion_for, wind_speed};

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("field {name} has {actual} values, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot stack grids with different coordinates")]
    CoordinateMismatch,
}

/// Per-variable arrays over time x latitude x longitude
///
/// Values are stored row-major with longitude varying fastest. Non-finite
/// values mark missing cells.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedObservation {
    lat: Vec<f64>,
    lon: Vec<f64>,
    time_steps: usize,
    fields: HashMap<String, Vec<f64>>,
}

impl GriddedObservation {
    pub fn new(lat: Vec<f64>, lon: Vec<f64>, time_steps: usize) -> Self {
        Self {
            lat,
            lon,
            time_steps,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, values: Vec<f64>) -> Result<Self, GridError> {
        self.insert_field(name, values)?;
        Ok(self)
    }

    pub fn insert_field(&mut self, name: &str, values: Vec<f64>) -> Result<(), GridError> {
        let expected = self.cell_count();
        if values.len() != expected {
            return Err(GridError::ShapeMismatch {
                name: name.to_string(),
                expected,
                actual: values.len(),
            });
        }
        self.fields.insert(name.to_string(), values);
        Ok(())
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0 || self.fields.is_empty()
    }

    fn cell_count(&self) -> usize {
        self.time_steps * self.lat.len() * self.lon.len()
    }

    fn offset(&self, t: usize, i: usize, j: usize) -> usize {
        (t * self.lat.len() + i) * self.lon.len() + j
    }

    /// Raw value of `name` at (time, lat index, lon index), `None` when missing
    pub fn value(&self, name: &str, t: usize, i: usize, j: usize) -> Option<f64> {
        if t >= self.time_steps || i >= self.lat.len() || j >= self.lon.len() {
            return None;
        }
        self.fields
            .get(name)
            .and_then(|values| values.get(self.offset(t, i, j)))
            .copied()
            .filter(|v| v.is_finite())
    }

    /// Mean of `name` over every time step at one cell, missing steps excluded
    pub fn time_mean(&self, name: &str, i: usize, j: usize) -> Option<f64> {
        if !self.has_field(name) {
            return None;
        }
        (0..self.time_steps)
            .map(|t| self.value(name, t, i, j))
            .collect::<Accumulator>()
            .mean()
    }

    /// Lat/lon indices of the cell closest to `point`, each axis independently
    pub fn nearest_cell(&self, point: GeoPoint) -> Option<(usize, usize)> {
        Some((
            nearest_index(&self.lat, point.lat)?,
            nearest_index(&self.lon, point.lon)?,
        ))
    }

    /// Append `other` along the time axis
    ///
    /// Only fields present in both grids survive.
    pub fn stack(mut self, other: GriddedObservation) -> Result<Self, GridError> {
        if self.lat != other.lat || self.lon != other.lon {
            return Err(GridError::CoordinateMismatch);
        }
        let mut other_fields = other.fields;
        self.fields.retain(|name, _| other_fields.contains_key(name));
        for (name, values) in self.fields.iter_mut() {
            if let Some(more) = other_fields.remove(name) {
                values.extend(more);
            }
        }
        self.time_steps += other.time_steps;
        Ok(self)
    }
}

/// Index minimizing `|coords[k] - target|`; the first one wins ties
pub fn nearest_index(coords: &[f64], target: f64) -> Option<usize> {
    coords
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (k, c)| {
            let distance = (c - target).abs();
            match best {
                Some((_, d)) if d <= distance => best,
                _ => Some((k, distance)),
            }
        })
        .map(|(k, _)| k)
}

/// Precipitation rate at the first time step of the nearest cell
pub fn extract_precipitation(grid: &GriddedObservation, point: GeoPoint) -> PrecipitationSample {
    let precip_mm_hr = grid
        .nearest_cell(point)
        .and_then(|(i, j)| grid.value(variables::PRECIPITATION, 0, i, j));
    PrecipitationSample { precip_mm_hr }
}

/// Time-averaged atmospheric block at the nearest cell, converted to table units
pub fn extract_atmosphere(grid: &GriddedObservation, point: GeoPoint) -> AtmosphericSample {
    let Some((i, j)) = grid.nearest_cell(point) else {
        return AtmosphericSample::default();
    };
    let mean = |name: &str| {
        grid.time_mean(name, i, j)
            .map(|v| conversion_for(name).apply(v))
    };

    let wind = match (
        mean(variables::EASTWARD_WIND_10M),
        mean(variables::NORTHWARD_WIND_10M),
    ) {
        (Some(u), Some(v)) => Some(wind_speed(u, v)),
        _ => None,
    };

    AtmosphericSample {
        temperature_c: mean(variables::AIR_TEMPERATURE_2M),
        wind_speed_ms: wind,
        cloud_top_temp_c: mean(variables::CLOUD_TOP_TEMPERATURE),
        pressure_hpa: mean(variables::SURFACE_PRESSURE),
    }
}
