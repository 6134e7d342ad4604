//! Plotly figure model
//!
//! Only the trace kinds and attributes the dashboard uses are modelled;
//! layouts stay free-form JSON.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Value,
}

impl Figure {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Bar(XyTrace),
    Scatter(XyTrace),
    Scattermapbox(MapTrace),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

/// Bar or line trace; absent y values are `null` gaps
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct XyTrace {
    pub x: Vec<Value>,
    pub y: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MapTrace {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub mode: String,
    pub marker: Marker,
    pub customdata: Vec<Vec<Option<f64>>>,
    pub hovertemplate: String,
}

/// Round half away from zero to `digits` decimals
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

/// `value` with `digits` decimals, or an empty label when absent
pub fn label(value: Option<f64>, digits: usize) -> String {
    value
        .map(|v| format!("{v:.digits$}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trace_kind_is_tagged() {
        let figure = Figure {
            data: vec![Trace::Bar(XyTrace {
                x: vec![json!(2019)],
                y: vec![None],
                ..Default::default()
            })],
            layout: json!({"title": "t"}),
        };
        let value = figure.to_value();
        assert_eq!(value["data"][0]["type"], "bar");
        assert_eq!(value["data"][0]["y"][0], Value::Null);
        // unset optional attributes are left out
        assert!(value["data"][0].get("marker").is_none());
        assert!(value["data"][0].get("text").is_none());
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round_to(12.345_67, 2), 12.35);
        assert_eq!(round_to(0.123_4 * 100.0, 1), 12.3);
        assert_eq!(label(Some(3.14159), 2), "3.14");
        assert_eq!(label(None, 2), "");
    }
}
