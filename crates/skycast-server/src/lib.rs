pub mod report;

pub use report::{
    parse_date, AnalysisError, AnalyzeRequest, Analyzer, Clock, RequestDefaults,
};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::instrument;

pub const STATUS_MESSAGE: &str = "skycast analysis API running";

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    analyze_failures_total: Counter<u64>,
    analyzer: Analyzer,
    defaults: RequestDefaults,
}

pub fn build_app(analyzer: Analyzer, defaults: RequestDefaults) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter().with_registry(registry.clone()).build()?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("skycast-server");

    let requests_total = meter
        .u64_counter("skycast_requests_total")
        .with_description("Total HTTP requests served")
        .init();
    let analyze_failures_total = meter
        .u64_counter("skycast_analyze_failures_total")
        .with_description("Analysis requests answered with an error")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        analyze_failures_total,
        analyzer,
        defaults,
    });

    let router = Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

async fn index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.requests_total.add(1, &[]);
    Json(json!({ "message": STATUS_MESSAGE }))
}

fn failure(state: &AppState, message: String) -> Response {
    state.analyze_failures_total.add(1, &[]);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

/// Empty or whitespace-only bodies mean "all defaults"
fn parse_request(body: &[u8]) -> Result<AnalyzeRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AnalyzeRequest::default());
    }
    serde_json::from_slice(body)
}

#[instrument(skip_all)]
async fn analyze(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    state.requests_total.add(1, &[]);

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "malformed analyze body");
            return failure(&state, format!("invalid request body: {e}"));
        }
    };
    let (point, date) = request.resolve(&state.defaults);

    match state.analyzer.analyze(point, &date).await {
        Ok(package) => (StatusCode::OK, Json(package)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "analysis failed");
            failure(&state, e.to_string())
        }
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.requests_total.add(1, &[]);
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> ([(header::HeaderName, HeaderValue); 1], String) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error = ?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_means_defaults() {
        let request = parse_request(b"  \n").unwrap();
        assert!(request.lat.is_none() && request.date.is_none());
        let request = parse_request(br#"{"date": "2021-01-02"}"#).unwrap();
        assert_eq!(request.date.as_deref(), Some("2021-01-02"));
        assert!(parse_request(b"{lat: 1").is_err());
    }
}
