// tests/common/mod.rs
// Shared fakes: an in-process NWS look-alike, a static HTTP endpoint, and
// stub weather/store implementations.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use incident_ingest::ingest::types::SourceIncident;
use incident_ingest::normalize::UnifiedIncident;
use incident_ingest::store::{IncidentStore, InMemoryIncidentStore, StoreError};
use incident_ingest::weather::{WeatherObservation, WeatherResolver};
use serde_json::json;

#[derive(Clone, Copy, Debug)]
pub enum PointsMode {
    Ok,
    Status(u16),
    MissingForecastUrl,
    Garbage,
}

#[derive(Clone, Copy, Debug)]
pub enum ForecastMode {
    Ok,
    Status(u16),
    EmptyPeriods,
    Garbage,
    Slow(Duration),
}

#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub path: String,
    pub query: Option<String>,
    pub user_agent: Option<String>,
}

struct NwsState {
    base: String,
    points: PointsMode,
    forecast: ForecastMode,
    seen: Mutex<Vec<SeenRequest>>,
}

impl NwsState {
    fn record(&self, path: String, query: Option<String>, headers: &HeaderMap) {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().unwrap().push(SeenRequest {
            path,
            query,
            user_agent,
        });
    }
}

pub struct FakeNws {
    pub base_url: String,
    state: Arc<NwsState>,
}

impl FakeNws {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }
}

async fn points_handler(
    State(st): State<Arc<NwsState>>,
    Path(coords): Path<String>,
    headers: HeaderMap,
) -> Response {
    st.record(format!("/points/{coords}"), None, &headers);
    match st.points {
        PointsMode::Ok => Json(json!({
            "properties": {
                "gridId": "RAH",
                "forecastHourly": format!("{}/gridpoints/RAH/73,57/forecast/hourly", st.base)
            }
        }))
        .into_response(),
        PointsMode::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
        PointsMode::MissingForecastUrl => {
            Json(json!({ "properties": { "gridId": "RAH" } })).into_response()
        }
        PointsMode::Garbage => (StatusCode::OK, "<html>maintenance</html>").into_response(),
    }
}

async fn forecast_handler(
    State(st): State<Arc<NwsState>>,
    Path((office, grid)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    st.record(
        format!("/gridpoints/{office}/{grid}/forecast/hourly"),
        query,
        &headers,
    );
    let periods = json!({
        "properties": {
            "periods": [
                {
                    "number": 1,
                    "temperature": 72,
                    "temperatureUnit": "F",
                    "windSpeed": "5 mph",
                    "shortForecast": "Clear",
                    "icon": "https://api.weather.gov/icons/land/day/skc?size=small"
                },
                {
                    "number": 2,
                    "temperature": 70,
                    "temperatureUnit": "F",
                    "windSpeed": "10 mph",
                    "shortForecast": "Partly Cloudy",
                    "icon": "https://api.weather.gov/icons/land/day/sct?size=small"
                }
            ]
        }
    });
    match st.forecast {
        ForecastMode::Ok => Json(periods).into_response(),
        ForecastMode::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
        ForecastMode::EmptyPeriods => {
            Json(json!({ "properties": { "periods": [] } })).into_response()
        }
        ForecastMode::Garbage => (StatusCode::OK, "{\"properties\": ").into_response(),
        ForecastMode::Slow(d) => {
            tokio::time::sleep(d).await;
            Json(periods).into_response()
        }
    }
}

pub async fn spawn_fake_nws(points: PointsMode, forecast: ForecastMode) -> FakeNws {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let state = Arc::new(NwsState {
        base: base.clone(),
        points,
        forecast,
        seen: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/points/{coords}", get(points_handler))
        .route(
            "/gridpoints/{office}/{grid}/forecast/hourly",
            get(forecast_handler),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeNws {
        base_url: base,
        state,
    }
}

/// Serve one fixed response at `/incidents`; returns the full URL.
pub async fn spawn_static(status: u16, body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/incidents", listener.local_addr().unwrap());
    let app = Router::new().route(
        "/incidents",
        get(move || async move { (StatusCode::from_u16(status).unwrap(), body) }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    url
}

/// Weather resolver returning a fixed answer and counting calls.
pub struct FixedWeather {
    pub answer: Option<WeatherObservation>,
    pub calls: AtomicUsize,
}

impl FixedWeather {
    pub fn some(obs: WeatherObservation) -> Self {
        Self {
            answer: Some(obs),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn none() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherResolver for FixedWeather {
    async fn resolve(&self, _lat: f64, _lon: f64) -> Option<WeatherObservation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

pub fn clear_72() -> WeatherObservation {
    WeatherObservation {
        temperature: 72,
        wind_speed: "5 mph".into(),
        short_forecast: "Clear".into(),
        icon: "https://api.weather.gov/icons/land/day/skc?size=small".into(),
    }
}

/// In-memory store that rejects writes for selected source ids and counts
/// every call it receives.
pub struct RejectingStore {
    pub inner: InMemoryIncidentStore,
    reject_ids: HashSet<String>,
    pub calls: AtomicUsize,
}

impl RejectingStore {
    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            inner: InMemoryIncidentStore::new(),
            reject_ids: ids.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IncidentStore for RejectingStore {
    async fn upsert(&self, incident: &UnifiedIncident) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_ids.contains(&incident.source_id) {
            return Err(StoreError::Rejected(format!(
                "duplicate key value violates unique constraint (source_id={})",
                incident.source_id
            )));
        }
        self.inner.upsert(incident).await
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}

pub fn incident(id: i64, incident_type: &str) -> SourceIncident {
    SourceIncident {
        id,
        incident_type: incident_type.to_string(),
        latitude: 35.78,
        longitude: -78.64,
        location: Some(format!("Location {id}")),
        reason: Some(format!("reason {id}")),
        start: Some("2024-05-01T10:00:00Z".to_string()),
        ..Default::default()
    }
}
