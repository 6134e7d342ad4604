//! DAP2 ASCII responses and index-range subsetting

use std::collections::HashMap;
use std::ops::RangeInclusive;

use skycast_core::{BoundingBox, DimOrder, GriddedObservation};

use crate::{ArchiveError, ArchiveResult};

/// Values at or below this, or with a magnitude at or above [`FILL_ABOVE`], are fill
const FILL_BELOW: f64 = -9999.0;
const FILL_ABOVE: f64 = 1.0e14;

fn cleaned(v: f64) -> f64 {
    if v <= FILL_BELOW || v.abs() >= FILL_ABOVE {
        f64::NAN
    } else {
        v
    }
}

/// Arrays of one ASCII response, each flattened row-major
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DapArrays {
    arrays: HashMap<String, Vec<f64>>,
}

impl DapArrays {
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.arrays.get(name).map(Vec::as_slice)
    }

    pub fn take(&mut self, name: &str) -> Option<Vec<f64>> {
        self.arrays.remove(name)
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// Array name of a row header such as `T2M[0][3]` or `precipitation.precipitation[0]`
///
/// Map vectors of a grid (`precipitation.lat`) return `None`.
fn array_name(header: &str) -> Option<&str> {
    let name = header.split('[').next()?.trim();
    match name.split_once('.') {
        Some((parent, child)) if parent == child => Some(child),
        Some(_) => None,
        None if name.is_empty() => None,
        None => Some(name),
    }
}

/// Parse a DAP2 `.ascii` body
///
/// Each data row is `header, v, v, ...`; rows of the same array are
/// concatenated in order. Header lines and blank lines are skipped.
pub fn parse_ascii(body: &str) -> ArchiveResult<DapArrays> {
    let mut arrays: HashMap<String, Vec<f64>> = HashMap::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Dataset") || line.starts_with("---") {
            continue;
        }
        let mut cells = line.split(',');
        let Some(name) = cells.next().and_then(array_name) else {
            continue;
        };
        let values = arrays.entry(name.to_string()).or_default();
        for cell in cells {
            let cell = cell.trim();
            let v = cell
                .parse::<f64>()
                .map_err(|_| ArchiveError::Dap(format!("bad value {cell:?} in {name}")))?;
            values.push(cleaned(v));
        }
    }

    Ok(DapArrays { arrays })
}

/// Smallest contiguous index range whose coordinates fall inside `[lo, hi]`
pub fn index_span(coords: &[f64], lo: f64, hi: f64) -> Option<RangeInclusive<usize>> {
    let mut inside = coords
        .iter()
        .enumerate()
        .filter(|(_, c)| (lo..=hi).contains(*c))
        .map(|(k, _)| k);
    let first = inside.next()?;
    let last = inside.last().unwrap_or(first);
    Some(first..=last)
}

/// Coordinates of a granule
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleAxes {
    pub time_steps: usize,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

impl GranuleAxes {
    pub fn from_ascii(body: &str) -> ArchiveResult<Self> {
        let mut arrays = parse_ascii(body)?;
        let mut axis = |name: &str| {
            arrays
                .take(name)
                .ok_or_else(|| ArchiveError::Dap(format!("missing coordinate {name}")))
        };
        Ok(Self {
            time_steps: axis("time")?.len(),
            lat: axis("lat")?,
            lon: axis("lon")?,
        })
    }

    /// Index window of the axes covered by `bbox`
    pub fn subset(&self, bbox: &BoundingBox) -> ArchiveResult<Subset> {
        let lat = index_span(&self.lat, bbox.south, bbox.north).ok_or(ArchiveError::NoCoverage)?;
        let lon = index_span(&self.lon, bbox.west, bbox.east).ok_or(ArchiveError::NoCoverage)?;
        if self.time_steps == 0 {
            return Err(ArchiveError::NoCoverage);
        }
        Ok(Subset {
            time_steps: self.time_steps,
            lat,
            lon,
        })
    }
}

/// Hyperslab over all time steps and a lat/lon window
#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    pub time_steps: usize,
    pub lat: RangeInclusive<usize>,
    pub lon: RangeInclusive<usize>,
}

impl Subset {
    pub fn n_lat(&self) -> usize {
        self.lat.end() - self.lat.start() + 1
    }

    pub fn n_lon(&self) -> usize {
        self.lon.end() - self.lon.start() + 1
    }

    /// Constraint expression selecting `variables` in the storage order `order`
    pub fn constraint(&self, variables: &[&str], order: DimOrder) -> String {
        let lat = format!("[{}:{}]", self.lat.start(), self.lat.end());
        let lon = format!("[{}:{}]", self.lon.start(), self.lon.end());
        let (second, third) = match order {
            DimOrder::TimeLatLon => (lat, lon),
            DimOrder::TimeLonLat => (lon, lat),
        };
        variables
            .iter()
            .map(|v| format!("{v}[0:{}]{second}{third}", self.time_steps - 1))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Cache key fragment for this window
    pub fn tag(&self) -> String {
        format!(
            "t{}_y{}-{}_x{}-{}",
            self.time_steps,
            self.lat.start(),
            self.lat.end(),
            self.lon.start(),
            self.lon.end()
        )
    }

    /// Assemble the gridded observation from a subset response
    pub fn to_grid(
        &self,
        axes: &GranuleAxes,
        body: &str,
        variables: &[&str],
        order: DimOrder,
    ) -> ArchiveResult<GriddedObservation> {
        let mut arrays = parse_ascii(body)?;
        let (nt, ny, nx) = (self.time_steps, self.n_lat(), self.n_lon());
        let mut grid = GriddedObservation::new(
            axes.lat[self.lat.clone()].to_vec(),
            axes.lon[self.lon.clone()].to_vec(),
            nt,
        );
        for name in variables {
            let Some(values) = arrays.take(name) else {
                tracing::debug!(variable = *name, "variable absent from response");
                continue;
            };
            let values = match order {
                DimOrder::TimeLatLon => values,
                DimOrder::TimeLonLat => transpose_time_slices(&values, nt, nx, ny)?,
            };
            grid.insert_field(name, values)?;
        }
        Ok(grid)
    }
}

/// Reorder `t x lon x lat` data into `t x lat x lon`
fn transpose_time_slices(
    values: &[f64],
    nt: usize,
    nx: usize,
    ny: usize,
) -> ArchiveResult<Vec<f64>> {
    if values.len() != nt * nx * ny {
        return Err(ArchiveError::Dap(format!(
            "expected {} values, got {}",
            nt * nx * ny,
            values.len()
        )));
    }
    let mut out = Vec::with_capacity(values.len());
    for t in 0..nt {
        for i in 0..ny {
            for j in 0..nx {
                out.push(values[(t * nx + j) * ny + i]);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::GeoPoint;

    const AXES: &str = "Dataset: MERRA2_400.tavg1_2d_slv_Nx.20190601.nc4\n\
time, 0, 60\n\
lat, 39.0, 39.5, 40.0, 40.5\n\
lon, 116.0, 116.625, 117.25\n";

    #[test]
    fn test_array_names() {
        assert_eq!(array_name("T2M[0][1]"), Some("T2M"));
        assert_eq!(array_name("precipitation.precipitation[0][2]"), Some("precipitation"));
        assert_eq!(array_name("precipitation.lat"), None);
        assert_eq!(array_name("lat"), Some("lat"));
    }

    #[test]
    fn test_parse_concatenates_rows_and_masks_fill() {
        let body = "Dataset: x\n\
            PS[0][0], 1.0, 2.0\n\
            PS[0][1], 3.0, 1e15\n\n\
            CLDTMP[0][0], -9999.9, 230.5\n";
        let arrays = parse_ascii(body).unwrap();
        let ps = arrays.get("PS").unwrap();
        assert_eq!(&ps[..3], &[1.0, 2.0, 3.0]);
        assert!(ps[3].is_nan());
        assert!(arrays.get("CLDTMP").unwrap()[0].is_nan());
        assert!(parse_ascii("T2M[0], abc").is_err());
    }

    #[test]
    fn test_subset_and_constraint() {
        let axes = GranuleAxes::from_ascii(AXES).unwrap();
        assert_eq!(axes.time_steps, 2);

        let bbox = GeoPoint::new(40.2, 116.7).bounding_box(0.35);
        let subset = axes.subset(&bbox).unwrap();
        assert_eq!(subset.lat, 2..=3);
        assert_eq!(subset.lon, 1..=1);
        assert_eq!(
            subset.constraint(&["T2M", "PS"], DimOrder::TimeLatLon),
            "T2M[0:1][2:3][1:1],PS[0:1][2:3][1:1]"
        );
        assert_eq!(
            subset.constraint(&["precipitation"], DimOrder::TimeLonLat),
            "precipitation[0:1][1:1][2:3]"
        );

        let far = GeoPoint::new(-30.0, 10.0).bounding_box(1.0);
        assert!(matches!(axes.subset(&far), Err(ArchiveError::NoCoverage)));
    }

    #[test]
    fn test_lon_lat_order_is_transposed() {
        let axes = GranuleAxes {
            time_steps: 1,
            lat: vec![10.0, 11.0],
            lon: vec![20.0, 21.0, 22.0],
        };
        let subset = Subset {
            time_steps: 1,
            lat: 0..=1,
            lon: 0..=2,
        };
        // stored lon-major: (lon0: lat0 lat1), (lon1: ...), (lon2: ...)
        let body = "precipitation.precipitation[0][0], 1, 2\n\
precipitation.precipitation[0][1], 3, 4\n\
precipitation.precipitation[0][2], 5, 6\n\
precipitation.lon, 20, 21, 22\n";
        let grid = subset
            .to_grid(&axes, body, &["precipitation"], DimOrder::TimeLonLat)
            .unwrap();
        assert_eq!(grid.value("precipitation", 0, 0, 0), Some(1.0));
        assert_eq!(grid.value("precipitation", 0, 1, 0), Some(2.0));
        assert_eq!(grid.value("precipitation", 0, 0, 2), Some(5.0));
        assert_eq!(grid.value("precipitation", 0, 1, 2), Some(6.0));
    }

    #[test]
    fn test_short_response_is_rejected() {
        let axes = GranuleAxes {
            time_steps: 1,
            lat: vec![0.0, 1.0],
            lon: vec![0.0],
        };
        let subset = Subset {
            time_steps: 1,
            lat: 0..=1,
            lon: 0..=0,
        };
        let err = subset
            .to_grid(&axes, "T2M[0][0], 280.0\n", &["T2M"], DimOrder::TimeLatLon)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Grid(_)));
    }
}
