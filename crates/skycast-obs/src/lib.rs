use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,skycast=debug";

/// Filter directives from `RUST_LOG`, or [`DEFAULT_FILTER`] when unset or empty
pub fn filter_directives(rust_log: Option<String>) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initialize observability (logging/tracing)
/// - JSON logs, Cloud Logging friendly
/// - RUST_LOG respected; default to "info,skycast=debug"
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init(service_name: &str) {
    let env_filter = filter_directives(std::env::var("RUST_LOG").ok());

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %service_name, "Observability initialized");
    }
}
