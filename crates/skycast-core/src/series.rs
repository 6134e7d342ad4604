//! Trailing-window series and the merged historical table

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{Datelike, NaiveDate};

use crate::types::{
    AtmosphericSample, Conditions, PrecipitationSample, Year, YearlyRecord,
};

/// Years of history gathered before the target year
pub const TRAILING_WINDOW_YEARS: i32 = 7;

/// Years `target - window ..= target - 1`
pub fn window_years(target_year: Year, window: i32) -> Range<Year> {
    (target_year - window)..target_year
}

/// Same month and day in another year; `None` for 29 February in a non-leap year
pub fn same_day_in_year(date: NaiveDate, year: Year) -> Option<NaiveDate> {
    date.with_year(year)
}

/// Samples keyed by year, kept sorted ascending with one entry per year
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries<S> {
    entries: BTreeMap<Year, S>,
}

pub type PrecipitationSeries = HistoricalSeries<PrecipitationSample>;
pub type AtmosphereSeries = HistoricalSeries<AtmosphericSample>;

impl<S> HistoricalSeries<S> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert or replace the sample for `year`
    pub fn insert(&mut self, year: Year, sample: S) {
        self.entries.insert(year, sample);
    }

    pub fn get(&self, year: Year) -> Option<&S> {
        self.entries.get(&year)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Year, &S)> + '_ {
        self.entries.iter().map(|(y, s)| (*y, s))
    }
}

impl<S> Default for HistoricalSeries<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FromIterator<(Year, S)> for HistoricalSeries<S> {
    fn from_iter<I: IntoIterator<Item = (Year, S)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Columns of the merged table in their fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Year,
    PrecipMmHr,
    PrecipMmDay,
    TemperatureC,
    WindSpeedMs,
    CloudTopTempC,
    PressureHpa,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Year,
        Column::PrecipMmHr,
        Column::PrecipMmDay,
        Column::TemperatureC,
        Column::WindSpeedMs,
        Column::CloudTopTempC,
        Column::PressureHpa,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Year => "year",
            Column::PrecipMmHr => "precip_mm_hr",
            Column::PrecipMmDay => "precip_mm_day",
            Column::TemperatureC => "temperature_c",
            Column::WindSpeedMs => "wind_speed_ms",
            Column::CloudTopTempC => "cloud_top_temp_c",
            Column::PressureHpa => "pressure_hpa",
        }
    }

    fn is_precipitation(&self) -> bool {
        matches!(self, Column::PrecipMmHr | Column::PrecipMmDay)
    }

    /// Value of this column in `record`
    pub fn value(&self, record: &YearlyRecord) -> Option<f64> {
        match self {
            Column::Year => Some(f64::from(record.year)),
            Column::PrecipMmHr => record.precip_mm_hr,
            Column::PrecipMmDay => record.precip_mm_day(),
            Column::TemperatureC => record.temperature_c,
            Column::WindSpeedMs => record.wind_speed_ms,
            Column::CloudTopTempC => record.cloud_top_temp_c,
            Column::PressureHpa => record.pressure_hpa,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outer join of the precipitation and atmospheric series on year
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    columns: Vec<Column>,
    rows: Vec<YearlyRecord>,
}

impl MergedTable {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows ascending by year, one per year
    pub fn rows(&self) -> &[YearlyRecord] {
        &self.rows
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_year(&self) -> Option<Year> {
        self.rows.last().map(|r| r.year)
    }

    /// `(year, value)` pairs of one column with absent values dropped
    pub fn observed(&self, column: Column) -> Vec<(Year, f64)> {
        if !self.has_column(column) {
            return Vec::new();
        }
        self.rows
            .iter()
            .filter_map(|r| column.value(r).map(|v| (r.year, v)))
            .collect()
    }
}

/// Merge the two series into one table sorted by year
///
/// A year present on only one side keeps nulls for the other side's
/// columns. The columns of a side whose series is empty are left out.
pub fn merge(precipitation: &PrecipitationSeries, atmosphere: &AtmosphereSeries) -> MergedTable {
    let mut rows: BTreeMap<Year, YearlyRecord> = BTreeMap::new();

    for (year, sample) in precipitation.iter() {
        rows.entry(year)
            .or_insert_with(|| YearlyRecord::empty(year))
            .set_precipitation(*sample);
    }
    for (year, sample) in atmosphere.iter() {
        rows.entry(year)
            .or_insert_with(|| YearlyRecord::empty(year))
            .set_atmosphere(*sample);
    }

    let columns = Column::ALL
        .into_iter()
        .filter(|c| match c {
            Column::Year => true,
            c if c.is_precipitation() => !precipitation.is_empty(),
            _ => !atmosphere.is_empty(),
        })
        .collect();

    MergedTable {
        columns,
        rows: rows.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn precip(entries: &[(Year, Option<f64>)]) -> PrecipitationSeries {
        entries
            .iter()
            .map(|(y, v)| (*y, PrecipitationSample { precip_mm_hr: *v }))
            .collect()
    }

    fn atmos(entries: &[(Year, Option<f64>)]) -> AtmosphereSeries {
        entries
            .iter()
            .map(|(y, t)| {
                (
                    *y,
                    AtmosphericSample {
                        temperature_c: *t,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_window_years() {
        let years: Vec<_> = window_years(2020, TRAILING_WINDOW_YEARS).collect();
        assert_eq!(years, vec![2013, 2014, 2015, 2016, 2017, 2018, 2019]);
    }

    #[test]
    fn test_leap_day_has_no_counterpart() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(same_day_in_year(date, 2019), None);
        assert_eq!(
            same_day_in_year(date, 2016),
            NaiveDate::from_ymd_opt(2016, 2, 29)
        );
    }

    #[test]
    fn test_merge_disjoint_years_sorted_and_unique() {
        let p = precip(&[(2019, Some(0.1)), (2015, None)]);
        let a = atmos(&[(2017, Some(20.0)), (2019, Some(22.0))]);
        let table = merge(&p, &a);

        let years: Vec<_> = table.rows().iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2015, 2017, 2019]);

        let row_2017 = table.rows()[1];
        assert_eq!(row_2017.precip_mm_hr, None);
        assert_eq!(row_2017.temperature_c, Some(20.0));

        let row_2019 = table.rows()[2];
        assert_eq!(row_2019.precip_mm_day(), Some(0.1 * 24.0));
        assert_eq!(row_2019.temperature_c, Some(22.0));
        assert_eq!(table.columns(), &Column::ALL);
    }

    #[test]
    fn test_merge_omits_columns_of_empty_side() {
        let p = precip(&[(2018, Some(0.2))]);
        let table = merge(&p, &AtmosphereSeries::new());
        assert_eq!(
            table.columns(),
            &[Column::Year, Column::PrecipMmHr, Column::PrecipMmDay]
        );
        assert!(table.observed(Column::TemperatureC).is_empty());
    }

    #[test]
    fn test_observed_drops_nulls() {
        let p = precip(&[(2013, Some(0.5)), (2014, None), (2015, Some(0.0))]);
        let table = merge(&p, &AtmosphereSeries::new());
        assert_eq!(
            table.observed(Column::PrecipMmDay),
            vec![(2013, 12.0), (2015, 0.0)]
        );
        assert_eq!(table.last_year(), Some(2015));
    }

    #[test]
    fn test_daily_is_hourly_times_24_for_every_row() {
        let p = precip(&[(2013, Some(0.013)), (2014, None), (2015, Some(1.7))]);
        let table = merge(&p, &atmos(&[(2016, Some(1.0))]));
        for row in table.rows() {
            match row.precip_mm_hr {
                Some(hr) => assert_eq!(row.precip_mm_day(), Some(hr * 24.0)),
                None => assert_eq!(row.precip_mm_day(), None),
            }
        }
    }
}
