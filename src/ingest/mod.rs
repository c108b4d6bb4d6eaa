// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tracing::{debug, error, info};

use crate::ingest::types::SourceIncident;
use crate::normalize::normalize;
use crate::store::IncidentStore;
use crate::weather::WeatherResolver;

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_incidents_total", "Incidents parsed from the feed.");
        describe_counter!(
            "ingest_relevant_total",
            "Incidents whose type is in the allow-list."
        );
        describe_counter!("ingest_saved_total", "Incidents upserted successfully.");
        describe_counter!("ingest_store_errors_total", "Failed incident upserts.");
        describe_counter!(
            "ingest_timestamp_fallbacks_total",
            "Incidents stored with ingestion time because the start time did not parse."
        );
        describe_counter!(
            "weather_lookup_failures_total",
            "Weather lookups that returned nothing, by stage."
        );
        describe_histogram!("weather_lookup_ms", "Two-stage weather lookup time in milliseconds.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

pub fn is_relevant(incident_type: &str, allow: &[String]) -> bool {
    allow.iter().any(|t| t == incident_type)
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub seen: usize,
    pub relevant: usize,
    pub saved: usize,
    pub failed: usize,
    pub weather_missing: usize,
    pub timestamp_fallbacks: usize,
}

/// Filter → weather → normalize → upsert, one incident at a time.
pub struct IngestionPipeline {
    weather: Arc<dyn WeatherResolver>,
    relevant_types: Vec<String>,
}

impl IngestionPipeline {
    pub fn new(weather: Arc<dyn WeatherResolver>, relevant_types: Vec<String>) -> Self {
        Self {
            weather,
            relevant_types,
        }
    }

    /// Process a batch. A failed write is logged and counted; it never stops
    /// the records after it.
    pub async fn run(&self, incidents: &[SourceIncident], store: &dyn IncidentStore) -> RunSummary {
        ensure_metrics_described();

        let mut summary = RunSummary {
            seen: incidents.len(),
            ..RunSummary::default()
        };

        for src in incidents {
            if !is_relevant(&src.incident_type, &self.relevant_types) {
                debug!(
                    target: "ingest",
                    incident_id = src.id,
                    incident_type = %src.incident_type,
                    "skipping irrelevant incident"
                );
                continue;
            }
            summary.relevant += 1;

            let weather = self.weather.resolve(src.latitude, src.longitude).await;
            if weather.is_none() {
                summary.weather_missing += 1;
            }

            let normalized = normalize(src, weather, Utc::now());
            if normalized.event_time.is_fallback() {
                summary.timestamp_fallbacks += 1;
                counter!("ingest_timestamp_fallbacks_total").increment(1);
            }

            match store.upsert(&normalized.incident).await {
                Ok(()) => summary.saved += 1,
                Err(e) => {
                    summary.failed += 1;
                    counter!("ingest_store_errors_total").increment(1);
                    error!(
                        target: "ingest",
                        incident_id = src.id,
                        store = store.name(),
                        error = %e,
                        "error saving NCDOT incident"
                    );
                }
            }
        }

        counter!("ingest_relevant_total").increment(summary.relevant as u64);
        counter!("ingest_saved_total").increment(summary.saved as u64);
        gauge!("ingest_pipeline_last_run_ts").set(Utc::now().timestamp().max(0) as f64);

        info!(
            target: "ingest",
            seen = summary.seen,
            relevant = summary.relevant,
            saved = summary.saved,
            failed = summary.failed,
            weather_missing = summary.weather_missing,
            timestamp_fallbacks = summary.timestamp_fallbacks,
            weather = self.weather.name(),
            "run complete"
        );
        summary
    }
}
