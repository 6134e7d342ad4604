use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use skycast_advisor::{GeminiAdvisor, GeminiSettings};
use skycast_archive::{DiskCache, EarthdataArchive};
use skycast_config::AppConfig;
use skycast_core::{Advisor, Archive};
use skycast_server::{Analyzer, RequestDefaults};
use tokio::net::TcpListener;

fn advisor(cfg: &AppConfig) -> anyhow::Result<Option<Arc<dyn Advisor>>> {
    let Some(api_key) = cfg.advisor_api_key() else {
        tracing::warn!("no language model API key, advice disabled");
        return Ok(None);
    };
    let advisor = GeminiAdvisor::new(GeminiSettings {
        endpoint: cfg.advisor_endpoint(),
        model: cfg.advisor_model(),
        api_key,
        temperature: cfg.advisor_temperature(),
        max_output_tokens: cfg.advisor_max_output_tokens(),
        timeout: cfg.advisor_timeout(),
    })?;
    Ok(Some(Arc::new(advisor)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Observability
    skycast_obs::init("skycast");

    // Config
    let cfg = AppConfig::load().context("loading configuration")?;

    let cache = DiskCache::new(cfg.data_dir(), cfg.lookup_dir());
    let archive: Arc<dyn Archive> = Arc::new(EarthdataArchive::new(
        cfg.cmr_url(),
        cfg.earthdata_token(),
        cache,
        cfg.archive_timeout(),
    )?);
    if cfg.earthdata_token().is_none() {
        tracing::warn!("no Earthdata token, archive requests are anonymous");
    }

    let analyzer = Analyzer::new(archive, advisor(&cfg)?)
        .with_thresholds(cfg.thresholds())
        .with_window_years(cfg.window_years());
    let defaults = RequestDefaults {
        point: cfg.default_point(),
        date: cfg.default_date(),
    };

    let (app, state) = skycast_server::build_app(analyzer, defaults)?;

    let addr: SocketAddr = cfg
        .http_bind()
        .parse()
        .context("invalid HTTP bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Mark ready just before serving
    skycast_server::set_ready(&state, true);

    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
