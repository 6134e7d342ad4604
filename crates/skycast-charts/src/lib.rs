//! Plotly figures for the analysis dashboard
//!
//! Every builder is a pure function from analysis results to a Plotly
//! figure. Absent values become gaps, never zeros.

pub mod figure;

pub use figure::*;

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};
use skycast_core::{
    AtmosphereSeries, AtmosphericSample, Conditions, EventProbabilities, ForecastResult, GeoPoint,
    PrecipitationSeries, WeatherEvent,
};

pub const PRECIPITATION_FIGURE: &str = "previous precipitation";
pub const WEATHER_TREND_FIGURE: &str = "weather trend";
pub const PROBABILITY_FIGURE: &str = "probability";
pub const MAP_FIGURE: &str = "map";

fn month_day(date: NaiveDate) -> String {
    format!("{:02}-{:02}", date.month(), date.day())
}

/// Bar chart of daily precipitation on the target month-day, one bar per year
pub fn precipitation_bar(series: &PrecipitationSeries, date: NaiveDate) -> Figure {
    let x = series.years().map(Value::from).collect();
    let y: Vec<Option<f64>> = series.iter().map(|(_, s)| s.precip_mm_day()).collect();
    let text = y.iter().map(|v| label(*v, 2)).collect();

    Figure {
        data: vec![Trace::Bar(XyTrace {
            x,
            y,
            text,
            textposition: Some("outside".into()),
            marker: Some(Marker {
                color: Some(json!("#118ab2")),
                ..Default::default()
            }),
            ..Default::default()
        })],
        layout: json!({
            "template": "plotly_white",
            "title": {"text": format!("Daily Precipitation on {} (mm/day)", month_day(date))},
            "xaxis": {"title": {"text": "year"}, "tickmode": "linear"},
            "yaxis": {"title": {"text": "Daily Precipitation (mm/day)"}},
        }),
    }
}

type Accessor = fn(&AtmosphericSample) -> Option<f64>;

fn temperature(s: &AtmosphericSample) -> Option<f64> {
    s.temperature_c
}

fn wind_speed(s: &AtmosphericSample) -> Option<f64> {
    s.wind_speed_ms
}

fn cloud_top(s: &AtmosphericSample) -> Option<f64> {
    s.cloud_top_temp_c
}

fn pressure(s: &AtmosphericSample) -> Option<f64> {
    s.pressure_hpa
}

const TREND_PANELS: [(&str, &str, Accessor); 4] = [
    ("Temperature (°C)", "red", temperature),
    ("Wind speed (m/s)", "blue", wind_speed),
    ("Cloud-top T (°C)", "purple", cloud_top),
    ("Pressure (hPa)", "green", pressure),
];

/// 2x2 line charts of the atmospheric variables over the window
pub fn weather_trend(series: &AtmosphereSeries, date: NaiveDate) -> Figure {
    // (x domain, y domain) of each panel, row-major from the top left
    let domains = [
        ([0.0, 0.44], [0.575, 1.0]),
        ([0.56, 1.0], [0.575, 1.0]),
        ([0.0, 0.44], [0.0, 0.425]),
        ([0.56, 1.0], [0.0, 0.425]),
    ];

    let years: Vec<Value> = series.years().map(Value::from).collect();
    let mut data = Vec::with_capacity(TREND_PANELS.len());
    let mut layout = json!({
        "template": "plotly_white",
        "showlegend": false,
        "height": 800,
        "width": 1000,
        "annotations": [],
    });

    for (k, ((title, color, accessor), (x_domain, y_domain))) in
        TREND_PANELS.iter().zip(domains).enumerate()
    {
        let suffix = if k == 0 { String::new() } else { (k + 1).to_string() };
        let y: Vec<Option<f64>> = series.iter().map(|(_, s)| accessor(s)).collect();
        data.push(Trace::Scatter(XyTrace {
            x: years.clone(),
            text: y.iter().map(|v| label(*v, 2)).collect(),
            y,
            name: Some((*title).to_string()),
            mode: Some("lines+markers+text".into()),
            textposition: Some("top center".into()),
            line: Some(json!({"color": color, "width": 3})),
            marker: Some(Marker {
                size: Some(8.0),
                ..Default::default()
            }),
            xaxis: Some(format!("x{suffix}")),
            yaxis: Some(format!("y{suffix}")),
        }));

        layout[format!("xaxis{suffix}")] = json!({
            "domain": x_domain,
            "anchor": format!("y{suffix}"),
            "showgrid": true,
            "tickmode": "linear",
        });
        layout[format!("yaxis{suffix}")] = json!({
            "domain": y_domain,
            "anchor": format!("x{suffix}"),
            "showgrid": true,
        });
        if let Some(annotations) = layout["annotations"].as_array_mut() {
            annotations.push(json!({
                "text": title,
                "x": (x_domain[0] + x_domain[1]) / 2.0,
                "y": y_domain[1],
                "xref": "paper",
                "yref": "paper",
                "xanchor": "center",
                "yanchor": "bottom",
                "showarrow": false,
            }));
        }
    }

    let span = match (series.years().next(), series.years().last()) {
        (Some(first), Some(last)) => format!(" ({first}-{last})"),
        _ => String::new(),
    };
    layout["title"] = json!({
        "text": format!("Weather Trends on {}{span}", month_day(date)),
        "x": 0.5,
        "xanchor": "center",
    });

    Figure { data, layout }
}

fn event_color(event: WeatherEvent) -> &'static str {
    match event {
        WeatherEvent::ExtremeHeat => "#ef476f",
        WeatherEvent::Rain => "#118ab2",
        WeatherEvent::Snow => "#adb5bd",
        WeatherEvent::Thunderstorm => "#8338ec",
    }
}

/// Bar chart of event probabilities in percent
pub fn probability_bar(probabilities: &EventProbabilities) -> Figure {
    let percents: Vec<f64> = WeatherEvent::ALL
        .iter()
        .map(|e| round_to(probabilities.get(*e) * 100.0, 1))
        .collect();

    Figure {
        data: vec![Trace::Bar(XyTrace {
            x: WeatherEvent::ALL.iter().map(|e| json!(e.label())).collect(),
            text: percents.iter().map(|p| format!("{p:.1}%")).collect(),
            y: percents.into_iter().map(Some).collect(),
            textposition: Some("outside".into()),
            marker: Some(Marker {
                color: Some(json!(WeatherEvent::ALL.map(event_color))),
                ..Default::default()
            }),
            ..Default::default()
        })],
        layout: json!({
            "template": "plotly_white",
            "title": {"text": "Weather Probabilities"},
            "xaxis": {"title": {"text": "Weather Event"}},
            "yaxis": {"title": {"text": "Probability (%)"}, "range": [0, 100]},
            "font": {"size": 14},
            "height": 500,
            "width": 700,
        }),
    }
}

/// Single map marker at the query point carrying the expected conditions
pub fn forecast_map(point: GeoPoint, result: &ForecastResult) -> Figure {
    let rounded = |v: Option<f64>| v.map(|v| round_to(v, 2));
    let customdata = vec![vec![
        rounded(result.temperature_c()),
        rounded(result.precip_mm_day()),
        rounded(result.wind_speed_ms()),
        rounded(result.pressure_hpa()),
    ]];
    let heading = match result.mode {
        skycast_core::ForecastMode::Forecast => "Predicted Weather",
        skycast_core::ForecastMode::Observed => "Observed Weather",
    };

    Figure {
        data: vec![Trace::Scattermapbox(MapTrace {
            lat: vec![point.lat],
            lon: vec![point.lon],
            mode: "markers".into(),
            marker: Marker {
                color: Some(json!("blue")),
                size: Some(10.0),
                opacity: Some(0.8),
            },
            customdata,
            hovertemplate: format!(
                "<b>{heading}</b><br>\
                 Temperature: %{{customdata[0]:.2f}} °C<br>\
                 Precipitation: %{{customdata[1]:.2f}} mm/day<br>\
                 Wind Speed: %{{customdata[2]:.2f}} m/s<br>\
                 Pressure: %{{customdata[3]:.2f}} hPa<br>\
                 <extra></extra>"
            ),
        })],
        layout: json!({
            "mapbox": {
                "style": "carto-positron",
                "center": {"lat": point.lat, "lon": point.lon},
                "zoom": 10,
            },
            "margin": {"r": 0, "t": 30, "l": 0, "b": 0},
        }),
    }
}

/// Everything the charts need from one analysis
pub struct ChartInputs<'a> {
    pub date: NaiveDate,
    pub point: GeoPoint,
    pub precipitation: &'a PrecipitationSeries,
    pub atmosphere: &'a AtmosphereSeries,
    pub probabilities: &'a EventProbabilities,
    pub result: &'a ForecastResult,
}

/// The four dashboard figures keyed by name
pub fn render_all(inputs: &ChartInputs<'_>) -> Vec<(String, Value)> {
    let figures = [
        (PRECIPITATION_FIGURE, precipitation_bar(inputs.precipitation, inputs.date)),
        (WEATHER_TREND_FIGURE, weather_trend(inputs.atmosphere, inputs.date)),
        (PROBABILITY_FIGURE, probability_bar(inputs.probabilities)),
        (MAP_FIGURE, forecast_map(inputs.point, inputs.result)),
    ];
    tracing::debug!(count = figures.len(), "figures rendered");
    figures
        .into_iter()
        .map(|(name, figure)| (name.to_string(), figure.to_value()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::{Estimate, ForecastMode, PrecipitationSample};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
    }

    fn precipitation() -> PrecipitationSeries {
        [
            (2013, Some(0.5)),
            (2014, None),
            (2015, Some(0.125)),
        ]
        .into_iter()
        .map(|(y, v)| (y, PrecipitationSample { precip_mm_hr: v }))
        .collect()
    }

    fn atmosphere() -> AtmosphereSeries {
        (2013..2020)
            .map(|y| {
                (
                    y,
                    AtmosphericSample {
                        temperature_c: Some(20.0 + f64::from(y - 2013)),
                        wind_speed_ms: Some(3.0),
                        cloud_top_temp_c: None,
                        pressure_hpa: Some(1010.0),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn precipitation_bar_has_gap_for_missing_year() {
        let fig = precipitation_bar(&precipitation(), date()).to_value();
        let trace = &fig["data"][0];
        assert_eq!(trace["type"], "bar");
        assert_eq!(trace["x"], json!([2013, 2014, 2015]));
        assert_eq!(trace["y"], json!([12.0, null, 3.0]));
        assert_eq!(trace["text"], json!(["12.00", "", "3.00"]));
        assert_eq!(
            fig["layout"]["title"]["text"],
            "Daily Precipitation on 06-01 (mm/day)"
        );
    }

    #[test]
    fn weather_trend_has_four_panels() {
        let fig = weather_trend(&atmosphere(), date()).to_value();
        let data = fig["data"].as_array().unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(data[0]["xaxis"], "x");
        assert_eq!(data[3]["yaxis"], "y4");
        assert_eq!(data[2]["name"], "Cloud-top T (°C)");
        assert!(data[2]["y"].as_array().unwrap().iter().all(Value::is_null));
        assert_eq!(fig["layout"]["yaxis3"]["anchor"], "x3");
        assert_eq!(fig["layout"]["annotations"].as_array().unwrap().len(), 4);
        assert_eq!(
            fig["layout"]["title"]["text"],
            "Weather Trends on 06-01 (2013-2019)"
        );
    }

    #[test]
    fn probabilities_in_percent() {
        let probabilities = EventProbabilities {
            extreme_heat: 1.0 / 7.0,
            rain: 0.5,
            snow: 0.0,
            thunderstorm: 1.0,
        };
        let fig = probability_bar(&probabilities).to_value();
        let trace = &fig["data"][0];
        assert_eq!(trace["x"], json!(["Extreme Heat", "Rain", "Snow", "Thunderstorm"]));
        assert_eq!(trace["y"], json!([14.3, 50.0, 0.0, 100.0]));
        assert_eq!(trace["text"][0], "14.3%");
        assert_eq!(trace["marker"]["color"][3], "#8338ec");
        assert_eq!(fig["layout"]["yaxis"]["range"], json!([0, 100]));
    }

    #[test]
    fn map_marker_carries_conditions() {
        let mut result = ForecastResult::unavailable(2021, ForecastMode::Forecast);
        result.temperature_c = Some(Estimate::Forecast {
            point: 25.456,
            lower: 20.0,
            upper: 30.0,
        });
        let fig = forecast_map(GeoPoint::new(39.9, 116.4), &result).to_value();
        let trace = &fig["data"][0];
        assert_eq!(trace["type"], "scattermapbox");
        assert_eq!(trace["lat"], json!([39.9]));
        assert_eq!(trace["customdata"], json!([[25.46, null, null, null]]));
        assert!(trace["hovertemplate"]
            .as_str()
            .unwrap()
            .starts_with("<b>Predicted Weather</b>"));
        assert_eq!(fig["layout"]["mapbox"]["style"], "carto-positron");
    }

    #[test]
    fn render_all_names_every_figure() {
        let result = ForecastResult::unavailable(2020, ForecastMode::Observed);
        let figures = render_all(&ChartInputs {
            date: date(),
            point: GeoPoint::new(0.0, 0.0),
            precipitation: &precipitation(),
            atmosphere: &atmosphere(),
            probabilities: &EventProbabilities::default(),
            result: &result,
        });
        let names: Vec<_> = figures.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["previous precipitation", "weather trend", "probability", "map"]);
        for (_, figure) in &figures {
            assert!(figure["data"].is_array());
            assert!(figure["layout"].is_object());
        }
    }
}
