//! Response package assembly

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::EventFlags;
use crate::series::{Column, MergedTable};
use crate::types::{Estimate, ForecastResult};

pub const MERGED_TABLE: &str = "merged";
pub const FORECAST_TABLE: &str = "forecast";

/// Column-ordered table with one JSON object per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableJson {
    pub columns: Vec<String>,
    pub data: Vec<Map<String, Value>>,
}

impl TableJson {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Anything that renders as a [`TableJson`]
pub trait Tabular {
    fn to_table(&self) -> TableJson;
}

fn number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl Tabular for MergedTable {
    fn to_table(&self) -> TableJson {
        let columns = self.columns();
        let data = self
            .rows()
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| {
                        let value = match c {
                            Column::Year => Value::from(row.year),
                            c => number(c.value(row)),
                        };
                        (c.name().to_string(), value)
                    })
                    .collect()
            })
            .collect();
        TableJson {
            columns: columns.iter().map(|c| c.name().to_string()).collect(),
            data,
        }
    }
}

impl ForecastResult {
    fn estimates(&self) -> [(&'static str, Option<Estimate>); 5] {
        [
            ("precip_mm_day", self.precip_mm_day),
            ("temperature_c", self.temperature_c),
            ("wind_speed_ms", self.wind_speed_ms),
            ("cloud_top_temp_c", self.cloud_top_temp_c),
            ("pressure_hpa", self.pressure_hpa),
        ]
    }
}

/// One row: `year`, then each variable with its `_lower` and `_upper` bounds
impl Tabular for ForecastResult {
    fn to_table(&self) -> TableJson {
        let mut columns = vec!["year".to_string()];
        let mut row = Map::new();
        row.insert("year".to_string(), Value::from(self.year));

        for (name, estimate) in self.estimates() {
            let lower = format!("{name}_lower");
            let upper = format!("{name}_upper");
            row.insert(name.to_string(), number(estimate.map(|e| e.point())));
            row.insert(lower.clone(), number(estimate.and_then(|e| e.lower())));
            row.insert(upper.clone(), number(estimate.and_then(|e| e.upper())));
            columns.extend([name.to_string(), lower, upper]);
        }

        TableJson {
            columns,
            data: vec![row],
        }
    }
}

/// Final response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tables: BTreeMap<String, TableJson>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub figures: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatbot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<EventFlags>,
}

/// Collects the package parts, dropping empty ones
#[derive(Debug, Default)]
pub struct PackageBuilder {
    package: Package,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, table: &impl Tabular) -> Self {
        let table = table.to_table();
        if !table.is_empty() {
            self.package.tables.insert(name.to_string(), table);
        }
        self
    }

    pub fn figure(mut self, name: &str, figure: Value) -> Self {
        if !figure.is_null() {
            self.package.figures.insert(name.to_string(), figure);
        }
        self
    }

    pub fn figures<I>(self, figures: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        figures
            .into_iter()
            .fold(self, |builder, (name, figure)| builder.figure(&name, figure))
    }

    pub fn chatbot(mut self, text: Option<String>) -> Self {
        self.package.chatbot = text.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn events(mut self, flags: EventFlags) -> Self {
        self.package.events = Some(flags);
        self
    }

    pub fn build(self) -> Package {
        self.package
    }
}
