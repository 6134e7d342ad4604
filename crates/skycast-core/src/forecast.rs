//! Forecast branch selection and one-step-ahead ARIMA forecasting
//!
//! The model search mirrors the usual automatic ARIMA recipe at the scale
//! of a seven-year window: the differencing order comes from repeated KPSS
//! tests, then the AR order and the constant are picked by AIC. Moving
//! average terms are not searched.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::series::{Column, MergedTable};
use crate::types::{Estimate, ForecastMode, ForecastResult};

/// Fewest observations a model is fitted on
pub const MIN_OBSERVATIONS: usize = 3;
pub const MAX_DIFFERENCES: usize = 2;
pub const MAX_AR_ORDER: usize = 2;

/// KPSS level-stationarity critical value at the 5% level
pub const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.959_963_984_540_054;

/// Variance floor so a perfect fit still has a finite AIC
const VARIANCE_FLOOR: f64 = 1e-12;

/// Columns forecast in the future branch, in output order
pub const FORECAST_COLUMNS: [Column; 4] = [
    Column::PrecipMmDay,
    Column::TemperatureC,
    Column::WindSpeedMs,
    Column::PressureHpa,
];

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ForecastError {
    #[error("need at least {needed} observations, got {actual}")]
    InsufficientData { needed: usize, actual: usize },

    #[error("series contains non-finite values")]
    NonFinite,

    #[error("singular design matrix for order {0}")]
    Singular(ArimaOrder),

    #[error("no admissible model order")]
    NoAdmissibleModel,

    #[error("historical table has no rows")]
    EmptyTable,
}

/// Which path produces the target-date conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    FutureForecast,
    PastLookup,
}

impl Branch {
    /// Forecast only for dates strictly after today
    pub fn select(target: NaiveDate, today: NaiveDate) -> Self {
        if target > today {
            Branch::FutureForecast
        } else {
            Branch::PastLookup
        }
    }
}

/// Non-seasonal ARIMA(p, d, 0) order, with or without a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub with_constant: bool,
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({},{},0)", self.p, self.d)?;
        if self.with_constant {
            f.write_str("+c")?;
        }
        Ok(())
    }
}

/// Fitted model, ready to forecast one step past the end of its series
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ArimaOrder,
    /// `levels[k]` is the series differenced `k` times
    levels: Vec<Vec<f64>>,
    /// Constant first when present, then AR coefficients by lag
    coefficients: Vec<f64>,
    sigma2: f64,
}

impl ArimaModel {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Next value with a 95% interval
    pub fn forecast_one(&self) -> Estimate {
        let ArimaOrder {
            p,
            d,
            with_constant,
        } = self.order;
        let w = &self.levels[d];
        let (constant, phi) = if with_constant {
            (self.coefficients[0], &self.coefficients[1..])
        } else {
            (0.0, &self.coefficients[..])
        };

        let mut next = constant;
        for lag in 1..=p {
            next += phi[lag - 1] * w[w.len() - lag];
        }
        // integrate back up through each differencing level
        for level in (0..d).rev() {
            if let Some(last) = self.levels[level].last() {
                next += last;
            }
        }

        let half_width = Z_95 * self.sigma2.sqrt();
        Estimate::Forecast {
            point: next,
            lower: next - half_width,
            upper: next + half_width,
        }
    }
}

fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// KPSS statistic for level stationarity
pub fn kpss_statistic(series: &[f64]) -> f64 {
    let n = series.len() as f64;
    if series.is_empty() {
        return 0.0;
    }
    let mean = series.iter().sum::<f64>() / n;
    let resid: Vec<f64> = series.iter().map(|v| v - mean).collect();

    let mut partial = 0.0;
    let mut eta = 0.0;
    for e in &resid {
        partial += e;
        eta += partial * partial;
    }
    eta /= n * n;

    let lags = ((3.0 * n.sqrt()) / 13.0).floor() as usize;
    let mut long_run = resid.iter().map(|e| e * e).sum::<f64>() / n;
    for lag in 1..=lags.min(resid.len().saturating_sub(1)) {
        let weight = 1.0 - lag as f64 / (lags as f64 + 1.0);
        let cov = (lag..resid.len())
            .map(|t| resid[t] * resid[t - lag])
            .sum::<f64>()
            / n;
        long_run += 2.0 * weight * cov;
    }

    if long_run <= f64::EPSILON {
        return 0.0;
    }
    eta / long_run
}

/// Differencing order suggested by repeated KPSS tests
pub fn ndiffs(series: &[f64]) -> usize {
    let mut d = 0;
    let mut current = series.to_vec();
    while d < MAX_DIFFERENCES
        && current.len() > MIN_OBSERVATIONS
        && kpss_statistic(&current) > KPSS_CRITICAL_5PCT
    {
        current = difference(&current);
        d += 1;
    }
    d
}

struct ArFit {
    coefficients: Vec<f64>,
    sigma2: f64,
    aic: f64,
}

/// Conditional least squares AR(p) on `w[start..]`
fn fit_ar(w: &[f64], order: ArimaOrder, start: usize) -> Result<ArFit, ForecastError> {
    let m = w.len() - start;
    let k = order.p + usize::from(order.with_constant);
    if m <= k {
        return Err(ForecastError::NoAdmissibleModel);
    }

    let y = DVector::from_iterator(m, w[start..].iter().copied());
    let (coefficients, resid) = if k == 0 {
        (Vec::new(), y.clone())
    } else {
        let x = DMatrix::from_fn(m, k, |row, col| {
            let t = start + row;
            match (order.with_constant, col) {
                (true, 0) => 1.0,
                (true, c) => w[t - c],
                (false, c) => w[t - c - 1],
            }
        });
        let xt = x.transpose();
        let beta = (&xt * &x)
            .cholesky()
            .ok_or(ForecastError::Singular(order))?
            .solve(&(&xt * &y));
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(ForecastError::Singular(order));
        }
        let resid = &y - &x * &beta;
        (beta.iter().copied().collect(), resid)
    };

    let sse = resid.norm_squared();
    let variance = (sse / m as f64).max(VARIANCE_FLOOR);
    let aic = m as f64 * variance.ln() + 2.0 * (k as f64 + 1.0);
    Ok(ArFit {
        coefficients,
        sigma2: sse / (m - k) as f64,
        aic,
    })
}

/// Select and fit a non-seasonal model for `series`
pub fn auto_arima(series: &[f64]) -> Result<ArimaModel, ForecastError> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::NonFinite);
    }
    if series.len() < MIN_OBSERVATIONS {
        return Err(ForecastError::InsufficientData {
            needed: MIN_OBSERVATIONS,
            actual: series.len(),
        });
    }

    let d = ndiffs(series);
    let mut levels = vec![series.to_vec()];
    for k in 0..d {
        let next = difference(&levels[k]);
        levels.push(next);
    }
    let w = &levels[d];

    // every candidate is scored on the same effective sample
    let max_p = MAX_AR_ORDER.min(w.len().saturating_sub(2));
    let mut best: Option<(ArimaOrder, ArFit)> = None;
    for p in 0..=max_p {
        for with_constant in [false, true] {
            let order = ArimaOrder {
                p,
                d,
                with_constant,
            };
            match fit_ar(w, order, max_p) {
                Ok(fit) => {
                    if best.as_ref().map_or(true, |(_, b)| fit.aic < b.aic) {
                        best = Some((order, fit));
                    }
                }
                Err(e) => tracing::trace!(%order, error = %e, "candidate skipped"),
            }
        }
    }

    let (order, _) = best.ok_or(ForecastError::NoAdmissibleModel)?;
    // refit the winner on every observation its order can use
    let fit = fit_ar(w, order, order.p)?;
    Ok(ArimaModel {
        order,
        levels,
        coefficients: fit.coefficients,
        sigma2: fit.sigma2,
    })
}

/// Forecast plus the variables that could not be modelled
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub result: ForecastResult,
    pub failures: Vec<(Column, ForecastError)>,
}

/// One-step forecast of every [`FORECAST_COLUMNS`] variable, fitted independently
///
/// Absent years are dropped before fitting. A variable whose model cannot be
/// fitted is left unavailable and reported in `failures`.
pub fn forecast_next_year(table: &MergedTable) -> Result<ForecastOutcome, ForecastError> {
    let last_year = table.last_year().ok_or(ForecastError::EmptyTable)?;
    let mut result = ForecastResult::unavailable(last_year + 1, ForecastMode::Forecast);
    let mut failures = Vec::new();

    for column in FORECAST_COLUMNS {
        let values: Vec<f64> = table.observed(column).into_iter().map(|(_, v)| v).collect();
        let estimate = match auto_arima(&values) {
            Ok(model) => {
                let estimate = model.forecast_one();
                tracing::debug!(
                    %column,
                    order = %model.order(),
                    point = estimate.point(),
                    "forecast fitted"
                );
                Some(estimate)
            }
            Err(e) => {
                failures.push((column, e));
                None
            }
        };
        match column {
            Column::PrecipMmDay => result.precip_mm_day = estimate,
            Column::TemperatureC => result.temperature_c = estimate,
            Column::WindSpeedMs => result.wind_speed_ms = estimate,
            Column::PressureHpa => result.pressure_hpa = estimate,
            _ => {}
        }
    }

    Ok(ForecastOutcome { result, failures })
}
