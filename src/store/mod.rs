// src/store/mod.rs
//! Unified incident store: insert on first sighting, merge on every later one.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::normalize::{UnifiedIncident, STATUS_ACTIVE};

pub use memory::InMemoryIncidentStore;
pub use postgres::PgIncidentStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("write rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Atomic insert-or-merge keyed by `(source, source_id)`.
    async fn upsert(&self, incident: &UnifiedIncident) -> Result<(), StoreError>;
    fn name(&self) -> &'static str;
}

/// Merge a re-observed incident into the stored one.
///
/// Only the enrichment fields move: details, status (back to active), problem
/// detail and the three weather columns. Identity and the first-seen snapshot
/// (type, address, coordinates, timestamp, jurisdiction) stay as they were.
pub fn merge_observation(stored: &mut UnifiedIncident, incoming: &UnifiedIncident) {
    stored.details = incoming.details.clone();
    stored.status = STATUS_ACTIVE.to_string();
    stored.problem_detail = incoming.problem_detail.clone();
    stored.weather_temp = incoming.weather_temp;
    stored.weather_wind_speed = incoming.weather_wind_speed.clone();
    stored.weather_forecast = incoming.weather_forecast.clone();
}
