//! Source record → unified incident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ingest::types::SourceIncident;
use crate::weather::WeatherObservation;

pub const SOURCE_NCDOT: &str = "NCDOT";
pub const STATUS_ACTIVE: &str = "active";
pub const DETAILS_SCHEMA_VERSION: u32 = 1;

/// Natural key of a unified incident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncidentKey {
    pub source: String,
    pub source_id: String,
}

/// Audit payload stored alongside every unified incident.
///
/// The raw source record and the weather used are both kept so a row can be
/// explained from `details` alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentDetails {
    pub schema_version: u32,
    pub raw_incident: SourceIncident,
    pub weather: Option<WeatherObservation>,
}

/// Canonical cross-source incident, as written to `unified_incidents`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedIncident {
    pub source: String,
    pub source_id: String,
    pub event_type: String,
    pub status: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub problem_detail: Option<String>,
    pub weather_temp: Option<i32>,
    pub weather_wind_speed: Option<String>,
    pub weather_forecast: Option<String>,
    /// Not provided by NCDOT; left out of the write when `None`.
    pub jurisdiction: Option<String>,
    pub details: IncidentDetails,
}

impl UnifiedIncident {
    pub fn key(&self) -> IncidentKey {
        IncidentKey {
            source: self.source.clone(),
            source_id: self.source_id.clone(),
        }
    }
}

/// Start time of an incident, or the reason we had to make one up.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    Parsed(DateTime<Utc>),
    Fallback {
        raw: Option<String>,
        reason: String,
        substituted: DateTime<Utc>,
    },
}

impl EventTime {
    pub fn resolved(&self) -> DateTime<Utc> {
        match self {
            EventTime::Parsed(ts) => *ts,
            EventTime::Fallback { substituted, .. } => *substituted,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EventTime::Fallback { .. })
    }
}

/// Strict RFC 3339 parse; anything else falls back to `now`.
pub fn parse_event_time(raw: Option<&str>, now: DateTime<Utc>) -> EventTime {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return EventTime::Fallback {
            raw: raw.map(str::to_string),
            reason: "missing".to_string(),
            substituted: now,
        };
    };
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => EventTime::Parsed(dt.with_timezone(&Utc)),
        Err(e) => EventTime::Fallback {
            raw: Some(s.to_string()),
            reason: e.to_string(),
            substituted: now,
        },
    }
}

/// Output of [`normalize`]: the record plus how its timestamp was obtained.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub incident: UnifiedIncident,
    pub event_time: EventTime,
}

pub fn normalize(
    src: &SourceIncident,
    weather: Option<WeatherObservation>,
    now: DateTime<Utc>,
) -> Normalized {
    let event_time = parse_event_time(src.start.as_deref(), now);
    if let EventTime::Fallback { raw, reason, .. } = &event_time {
        warn!(
            target: "ingest",
            incident_id = src.id,
            raw = raw.as_deref().unwrap_or_default(),
            %reason,
            "could not parse start time, using current time"
        );
    }

    let (weather_temp, weather_wind_speed, weather_forecast) = match &weather {
        Some(w) => (
            Some(w.temperature),
            Some(w.wind_speed.clone()),
            Some(w.short_forecast.clone()),
        ),
        None => (None, None, None),
    };

    let incident = UnifiedIncident {
        source: SOURCE_NCDOT.to_string(),
        source_id: src.id.to_string(),
        event_type: src.incident_type.clone(),
        status: STATUS_ACTIVE.to_string(),
        address: src.location.clone(),
        latitude: src.latitude,
        longitude: src.longitude,
        timestamp: event_time.resolved(),
        problem_detail: src.reason.clone(),
        weather_temp,
        weather_wind_speed,
        weather_forecast,
        jurisdiction: None,
        details: IncidentDetails {
            schema_version: DETAILS_SCHEMA_VERSION,
            raw_incident: src.clone(),
            weather,
        },
    };

    Normalized {
        incident,
        event_time,
    }
}
