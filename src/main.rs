//! NCDOT incident ingest — binary entrypoint.
//! Loads config, connects to the unified store, fetches the feed once, and
//! runs the enrichment pipeline over it.

use std::sync::Arc;

use anyhow::{Context, Result};
use incident_ingest::config::AppConfig;
use incident_ingest::ingest::providers::ncdot::NcdotFeed;
use incident_ingest::ingest::types::IncidentFeed;
use incident_ingest::ingest::IngestionPipeline;
use incident_ingest::metrics::Metrics;
use incident_ingest::store::PgIncidentStore;
use incident_ingest::weather::{DisabledWeather, NwsWeatherResolver, WeatherResolver};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let dotenv_loaded = dotenvy::dotenv().is_ok();
    init_tracing();
    if !dotenv_loaded {
        info!(".env file not found, using process environment");
    }

    let cfg = AppConfig::from_env().context("loading configuration")?;
    info!(
        feed = %cfg.feed.url,
        relevant_types = ?cfg.relevant_types,
        weather_enabled = cfg.weather.enabled,
        "configuration loaded"
    );

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "metrics recorder unavailable");
            None
        }
    };

    let store = PgIncidentStore::connect(&cfg.database).await?;

    let feed = NcdotFeed::from_config(&cfg.feed)?;
    let incidents = feed
        .fetch_latest()
        .await
        .with_context(|| format!("fetching incidents from {}", feed.name()))?;

    let weather: Arc<dyn WeatherResolver> = if cfg.weather.enabled {
        Arc::new(NwsWeatherResolver::new(&cfg.weather)?)
    } else {
        Arc::new(DisabledWeather)
    };

    let pipeline = IngestionPipeline::new(weather, cfg.relevant_types.clone());
    let summary = pipeline.run(&incidents, &store).await;

    info!(
        "Run complete. Processed and saved {} of {} relevant incidents to the unified table.",
        summary.saved, summary.relevant
    );

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_textfile) {
        m.write_textfile(path)?;
    }
    Ok(())
}
