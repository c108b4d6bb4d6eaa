//! Weather enrichment backed by the National Weather Service API.
//!
//! A lookup is two dependent calls: `/points/{lat},{lon}` names the hourly
//! forecast endpoint for that grid cell, and the first period of that forecast
//! is the observation we keep. Any failure along the way means "no weather"
//! for the incident; it is logged and never propagated into the pipeline.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::WeatherConfig;

/// Current short-term conditions for one coordinate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherObservation {
    pub temperature: i32,
    #[serde(default)]
    pub wind_speed: String,
    #[serde(default)]
    pub short_forecast: String,
    #[serde(default)]
    pub icon: String,
}

/// Which of the two chained calls failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStage {
    Points,
    Forecast,
}

impl LookupStage {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupStage::Points => "points",
            LookupStage::Forecast => "forecast",
        }
    }
}

impl fmt::Display for LookupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("{stage} request failed: {source}")]
    Request {
        stage: LookupStage,
        #[source]
        source: reqwest::Error,
    },
    #[error("{stage} endpoint returned non-success status {status}")]
    Status {
        stage: LookupStage,
        status: StatusCode,
    },
    #[error("{stage} response body could not be decoded: {source}")]
    Decode {
        stage: LookupStage,
        #[source]
        source: reqwest::Error,
    },
    #[error("points response did not contain a forecast URL")]
    MissingForecastUrl,
    #[error("forecast response contained no periods")]
    NoPeriods,
}

impl WeatherError {
    pub fn stage(&self) -> LookupStage {
        match self {
            WeatherError::Request { stage, .. }
            | WeatherError::Status { stage, .. }
            | WeatherError::Decode { stage, .. } => *stage,
            WeatherError::MissingForecastUrl => LookupStage::Points,
            WeatherError::NoPeriods => LookupStage::Forecast,
        }
    }
}

/// Coordinate → optional weather. `None` is an expected outcome.
#[async_trait]
pub trait WeatherResolver: Send + Sync {
    async fn resolve(&self, lat: f64, lon: f64) -> Option<WeatherObservation>;
    fn name(&self) -> &'static str;
}

/// Resolver used when enrichment is switched off.
pub struct DisabledWeather;

#[async_trait]
impl WeatherResolver for DisabledWeather {
    async fn resolve(&self, _lat: f64, _lon: f64) -> Option<WeatherObservation> {
        None
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    #[serde(default)]
    forecast_hourly: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<WeatherObservation>,
}

/// Two-stage NWS lookup. Holds one `reqwest::Client` with the caller's
/// User-Agent and per-request timeout baked in.
pub struct NwsWeatherResolver {
    base_url: String,
    client: Client,
}

impl NwsWeatherResolver {
    pub fn new(cfg: &WeatherConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(Duration::from_secs(4).min(cfg.timeout))
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn points_url(&self, lat: f64, lon: f64) -> String {
        format!("{}/{}", self.base_url, points_path(lat, lon))
    }

    /// Fallible lookup, exposing why weather is unavailable.
    pub async fn try_resolve(&self, lat: f64, lon: f64) -> Result<WeatherObservation, WeatherError> {
        let points: PointsResponse = self
            .get_json(&self.points_url(lat, lon), &[], LookupStage::Points)
            .await?;
        let forecast_url = points
            .properties
            .forecast_hourly
            .filter(|u| !u.trim().is_empty())
            .ok_or(WeatherError::MissingForecastUrl)?;

        let forecast: ForecastResponse = self
            .get_json(&forecast_url, &[("units", "us")], LookupStage::Forecast)
            .await?;
        forecast
            .properties
            .periods
            .into_iter()
            .next()
            .ok_or(WeatherError::NoPeriods)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        stage: LookupStage,
    ) -> Result<T, WeatherError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/geo+json")
            .send()
            .await
            .map_err(|source| WeatherError::Request { stage, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WeatherError::Status { stage, status });
        }
        resp.json::<T>()
            .await
            .map_err(|source| WeatherError::Decode { stage, source })
    }
}

#[async_trait]
impl WeatherResolver for NwsWeatherResolver {
    async fn resolve(&self, lat: f64, lon: f64) -> Option<WeatherObservation> {
        let t0 = Instant::now();
        let out = self.try_resolve(lat, lon).await;
        histogram!("weather_lookup_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match out {
            Ok(obs) => Some(obs),
            Err(e) => {
                warn!(
                    target: "weather",
                    lat, lon,
                    stage = e.stage().as_str(),
                    error = %e,
                    "weather unavailable, continuing without it"
                );
                counter!("weather_lookup_failures_total", "stage" => e.stage().as_str())
                    .increment(1);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "nws"
    }
}

/// `points/{lat},{lon}` with both coordinates rounded to 4 decimals.
pub fn points_path(lat: f64, lon: f64) -> String {
    format!("points/{lat:.4},{lon:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_path_rounds_to_four_decimals() {
        assert_eq!(points_path(35.779612, -78.63819), "points/35.7796,-78.6382");
        assert_eq!(points_path(35.78, -78.64), "points/35.7800,-78.6400");
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        let cfg = WeatherConfig {
            base_url: "http://localhost:1/".into(),
            ..WeatherConfig::default()
        };
        let r = NwsWeatherResolver::new(&cfg).unwrap();
        assert_eq!(r.points_url(1.0, 2.0), "http://localhost:1/points/1.0000,2.0000");
    }

    #[test]
    fn period_decodes_from_nws_shape() {
        let raw = r#"{
            "number": 1,
            "temperature": 72,
            "temperatureUnit": "F",
            "windSpeed": "5 mph",
            "shortForecast": "Clear",
            "icon": "https://api.weather.gov/icons/land/night/skc?size=small"
        }"#;
        let obs: WeatherObservation = serde_json::from_str(raw).unwrap();
        assert_eq!(obs.temperature, 72);
        assert_eq!(obs.wind_speed, "5 mph");
        assert_eq!(obs.short_forecast, "Clear");
    }

    #[test]
    fn error_stage_mapping() {
        assert_eq!(WeatherError::MissingForecastUrl.stage(), LookupStage::Points);
        assert_eq!(WeatherError::NoPeriods.stage(), LookupStage::Forecast);
        let e = WeatherError::Status {
            stage: LookupStage::Forecast,
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(e.to_string().contains("forecast"));
    }

    #[tokio::test]
    async fn disabled_resolver_never_returns_weather() {
        assert!(DisabledWeather.resolve(35.0, -78.0).await.is_none());
    }
}
