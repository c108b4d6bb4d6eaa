// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod store;
pub mod weather;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::ingest::types::{IncidentFeed, SourceIncident};
pub use crate::ingest::{IngestionPipeline, RunSummary};
pub use crate::normalize::{normalize, EventTime, UnifiedIncident};
pub use crate::store::{IncidentStore, StoreError};
pub use crate::weather::{WeatherObservation, WeatherResolver};
