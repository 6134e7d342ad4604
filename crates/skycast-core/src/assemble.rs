//! Trailing-window series assembly and single-date lookup

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tokio::task::JoinSet;
use tracing::instrument;

use crate::grid::{extract_atmosphere, extract_precipitation, GriddedObservation};
use crate::pipeline::{Archive, CacheSlot, GranuleQuery};
use crate::series::{
    same_day_in_year, window_years, AtmosphereSeries, HistoricalSeries, PrecipitationSeries,
    TRAILING_WINDOW_YEARS,
};
use crate::types::{AtmosphericSample, ForecastResult, GeoPoint, PrecipitationSample, Product};

/// Target date, query point and how many years to look back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowRequest {
    pub date: NaiveDate,
    pub point: GeoPoint,
    pub window: i32,
}

impl WindowRequest {
    pub fn new(date: NaiveDate, point: GeoPoint) -> Self {
        Self {
            date,
            point,
            window: TRAILING_WINDOW_YEARS,
        }
    }
}

type Extract<S> = fn(&GriddedObservation, GeoPoint) -> S;

/// One sample per window year, fetched concurrently
///
/// Every year of the window is present in the result. A year whose date does
/// not exist, whose search finds nothing, or whose retrieval fails keeps the
/// default (all-null) sample.
#[instrument(skip_all, fields(product = product.short_name(), date = %request.date))]
pub async fn assemble_series<S>(
    archive: Arc<dyn Archive>,
    product: Product,
    request: WindowRequest,
    extract: Extract<S>,
) -> HistoricalSeries<S>
where
    S: Default + Send + 'static,
{
    let mut series = HistoricalSeries::new();
    let mut tasks = JoinSet::new();

    for year in window_years(request.date.year(), request.window) {
        series.insert(year, S::default());
        let Some(day) = same_day_in_year(request.date, year) else {
            tracing::debug!(year, "date does not exist in year, left empty");
            continue;
        };
        let query = GranuleQuery::new(product, day, request.point, CacheSlot::History);
        let archive = Arc::clone(&archive);
        tasks.spawn(async move { (year, archive.fetch(&query).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((year, Ok(Some(grid)))) => {
                series.insert(year, extract(&grid, request.point));
            }
            Ok((year, Ok(None))) => {
                tracing::warn!(year, "no granules found");
            }
            Ok((year, Err(e))) => {
                tracing::warn!(year, error = %e, "retrieval failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "retrieval task aborted");
            }
        }
    }

    series
}

pub async fn assemble_precipitation(
    archive: Arc<dyn Archive>,
    request: WindowRequest,
) -> PrecipitationSeries {
    assemble_series(archive, Product::Precipitation, request, extract_precipitation).await
}

pub async fn assemble_atmosphere(
    archive: Arc<dyn Archive>,
    request: WindowRequest,
) -> AtmosphereSeries {
    assemble_series(archive, Product::Atmosphere, request, extract_atmosphere).await
}

async fn fetch_one<S: Default>(
    archive: &dyn Archive,
    query: GranuleQuery,
    extract: Extract<S>,
) -> S {
    match archive.fetch(&query).await {
        Ok(Some(grid)) => extract(&grid, query.point),
        Ok(None) => {
            tracing::warn!(product = query.product.short_name(), "no granules found");
            S::default()
        }
        Err(e) => {
            tracing::warn!(
                product = query.product.short_name(),
                error = %e,
                "retrieval failed"
            );
            S::default()
        }
    }
}

/// Conditions of a past or present date read directly from the archive
#[instrument(skip_all, fields(date = %date, lat = point.lat, lon = point.lon))]
pub async fn fetch_observed(
    archive: &dyn Archive,
    date: NaiveDate,
    point: GeoPoint,
) -> ForecastResult {
    let precipitation = GranuleQuery::new(Product::Precipitation, date, point, CacheSlot::Lookup);
    let atmosphere = GranuleQuery::new(Product::Atmosphere, date, point, CacheSlot::Lookup);

    let (precipitation, atmosphere): (PrecipitationSample, AtmosphericSample) = tokio::join!(
        fetch_one(archive, precipitation, extract_precipitation),
        fetch_one(archive, atmosphere, extract_atmosphere),
    );
    ForecastResult::observed(date.year(), precipitation, atmosphere)
}
