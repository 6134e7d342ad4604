//! One analysis request, end to end

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use skycast_advisor::build_prompt;
use skycast_charts::{render_all, ChartInputs};
use skycast_core::{
    assemble_atmosphere, assemble_precipitation, classify, fetch_observed, forecast_next_year,
    merge, probabilities, Advisor, Archive, Branch, EventError, ForecastError, ForecastResult,
    GeoPoint, Package, PackageBuilder, Thresholds, WeatherEvent, WindowRequest, FORECAST_TABLE,
    MERGED_TABLE, TRAILING_WINDOW_YEARS,
};
use thiserror::Error;
use tracing::instrument;

/// Source of "today" for choosing between forecast and lookup
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid coordinates lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error(transparent)]
    Events(#[from] EventError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("advice generation failed: {0:#}")]
    Advisor(anyhow::Error),
}

/// Body of `POST /analyze`; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub date: Option<String>,
}

/// Values used for fields a request leaves out
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub point: GeoPoint,
    pub date: String,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            point: GeoPoint::new(39.9, 116.4),
            date: "2020-06-01".to_string(),
        }
    }
}

impl AnalyzeRequest {
    pub fn resolve(self, defaults: &RequestDefaults) -> (GeoPoint, String) {
        let point = GeoPoint::new(
            self.lat.unwrap_or(defaults.point.lat),
            self.lon.unwrap_or(defaults.point.lon),
        );
        (point, self.date.unwrap_or_else(|| defaults.date.clone()))
    }
}

/// Parse a `YYYY-MM-DD` date, rejecting unpadded or otherwise loose forms
pub fn parse_date(raw: &str) -> Result<NaiveDate, AnalysisError> {
    let invalid = || AnalysisError::InvalidDate(raw.to_string());
    let well_formed = raw.len() == 10
        && raw.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())
}

pub struct Analyzer {
    archive: Arc<dyn Archive>,
    advisor: Option<Arc<dyn Advisor>>,
    thresholds: Thresholds,
    window_years: i32,
    clock: Clock,
}

impl Analyzer {
    pub fn new(archive: Arc<dyn Archive>, advisor: Option<Arc<dyn Advisor>>) -> Self {
        Self {
            archive,
            advisor,
            thresholds: Thresholds::default(),
            window_years: TRAILING_WINDOW_YEARS,
            clock: Arc::new(|| Local::now().date_naive()),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_window_years(mut self, window_years: i32) -> Self {
        self.window_years = window_years;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(skip_all, fields(lat = point.lat, lon = point.lon, date = raw_date))]
    pub async fn analyze(&self, point: GeoPoint, raw_date: &str) -> Result<Package, AnalysisError> {
        let date = parse_date(raw_date)?;
        if !point.is_valid() {
            return Err(AnalysisError::InvalidCoordinates {
                lat: point.lat,
                lon: point.lon,
            });
        }

        let request = WindowRequest {
            window: self.window_years,
            ..WindowRequest::new(date, point)
        };
        let (precipitation, atmosphere) = tokio::join!(
            assemble_precipitation(Arc::clone(&self.archive), request),
            assemble_atmosphere(Arc::clone(&self.archive), request),
        );
        let merged = merge(&precipitation, &atmosphere);
        tracing::debug!(rows = merged.rows().len(), "series merged");

        let branch = Branch::select(date, (self.clock)());
        let result = match branch {
            Branch::FutureForecast => {
                let outcome = forecast_next_year(&merged)?;
                for (column, error) in &outcome.failures {
                    tracing::warn!(%column, %error, "variable left without forecast");
                }
                outcome.result
            }
            Branch::PastLookup => fetch_observed(self.archive.as_ref(), date, point).await,
        };
        tracing::info!(?branch, year = result.year, "conditions resolved");

        let events = classify(&result, &self.thresholds);
        if events.get(WeatherEvent::ExtremeHeat) && events.get(WeatherEvent::Snow) {
            tracing::warn!("extreme heat and snow both flagged");
        }
        let probabilities = probabilities(merged.rows(), &self.thresholds)?;

        let chatbot = self.advise(point, raw_date, &result).await?;

        let figures = render_all(&ChartInputs {
            date,
            point,
            precipitation: &precipitation,
            atmosphere: &atmosphere,
            probabilities: &probabilities,
            result: &result,
        });

        Ok(PackageBuilder::new()
            .table(MERGED_TABLE, &merged)
            .table(FORECAST_TABLE, &result)
            .figures(figures)
            .chatbot(chatbot)
            .events(events)
            .build())
    }

    async fn advise(
        &self,
        point: GeoPoint,
        date: &str,
        result: &ForecastResult,
    ) -> Result<Option<String>, AnalysisError> {
        let Some(advisor) = &self.advisor else {
            tracing::debug!("no advisor configured");
            return Ok(None);
        };
        let prompt = build_prompt(point, date, result);
        let text = advisor
            .advise(&prompt)
            .await
            .map_err(AnalysisError::Advisor)?;
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_date_format() {
        assert_eq!(
            parse_date("2020-06-01").unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
        );
        for raw in ["2020-6-1", "2020/06/01", "20200601", "2020-06-01T00:00", "", "abcd-ef-gh"] {
            assert!(
                matches!(parse_date(raw), Err(AnalysisError::InvalidDate(_))),
                "{raw} accepted"
            );
        }
        // well formed but not a calendar day
        assert!(parse_date("2021-02-29").is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let defaults = RequestDefaults::default();
        let (point, date) = AnalyzeRequest::default().resolve(&defaults);
        assert_eq!(point, GeoPoint::new(39.9, 116.4));
        assert_eq!(date, "2020-06-01");

        let partial = AnalyzeRequest {
            lat: Some(10.0),
            ..Default::default()
        };
        let (point, _) = partial.resolve(&defaults);
        assert_eq!(point, GeoPoint::new(10.0, 116.4));
    }
}
