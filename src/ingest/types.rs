// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One incident as published by the NCDOT feed, in its native field layout.
///
/// Free-text and numeric attributes are optional because the feed emits `null`
/// for anything it does not know. The four core fields read a missing key or a
/// `null` as their zero value, so one sparse record cannot sink the batch.
/// Fields not modelled here are kept verbatim in `extra` so the record
/// serializes back out whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceIncident {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub incident_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub longitude: f64,
    pub common_name: Option<String>,
    pub reason: Option<String>,
    pub condition: Option<String>,
    pub severity: Option<i64>,
    pub direction: Option<String>,
    pub location: Option<String>,
    pub county_id: Option<i64>,
    pub county_name: Option<String>,
    pub city: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub last_update: Option<String>,
    pub road: Option<String>,
    pub route_id: Option<i64>,
    pub lanes_closed: Option<i64>,
    pub lanes_total: Option<i64>,
    pub detour: Option<String>,
    pub event: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[async_trait::async_trait]
pub trait IncidentFeed {
    async fn fetch_latest(&self) -> Result<Vec<SourceIncident>>;
    fn name(&self) -> &'static str;
}
