// src/config/mod.rs
//! Process configuration, read once at startup and passed down by reference.

use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ingest::config::resolve_allowlist;

pub const ENV_DOT_URL: &str = "DOT_URL";
pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.weather.gov";
pub const DEFAULT_WEATHER_USER_AGENT: &str = "(incident-ingest, ops@localhost)";
pub const DEFAULT_WEATHER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub database: DatabaseConfig,
    pub weather: WeatherConfig,
    /// Incident types worth enriching and storing.
    pub relevant_types: Vec<String>,
    pub metrics_textfile: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub base_url: String,
    /// NWS rejects requests without an identifying User-Agent.
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            user_agent: DEFAULT_WEATHER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_WEATHER_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

// Keep the password out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));

        // The feed URL is checked first so a misconfigured job fails before
        // touching anything else.
        let feed = FeedConfig {
            url: require(ENV_DOT_URL)?,
            timeout: Duration::from_secs(parse_or(
                get("FEED_TIMEOUT_SECS"),
                "FEED_TIMEOUT_SECS",
                DEFAULT_FEED_TIMEOUT_SECS,
            )?),
        };

        let database = DatabaseConfig {
            host: require("DATABASE_HOST")?,
            port: parse_or(get("DATABASE_PORT"), "DATABASE_PORT", DEFAULT_DB_PORT)?,
            username: require("DATABASE_USERNAME")?,
            password: lookup("DATABASE_PASSWORD").unwrap_or_default(),
            database: require("DATABASE_NAME")?,
            max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DB_MAX_CONNECTIONS,
            )?
            .max(1),
        };

        let weather = WeatherConfig {
            enabled: get("WEATHER_ENABLED")
                .map(|v| parse_bool(&v))
                .transpose()?
                .unwrap_or(true),
            base_url: get("WEATHER_BASE_URL").unwrap_or_else(|| DEFAULT_WEATHER_BASE_URL.into()),
            user_agent: get("WEATHER_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_WEATHER_USER_AGENT.into()),
            timeout: Duration::from_secs(parse_or(
                get("WEATHER_TIMEOUT_SECS"),
                "WEATHER_TIMEOUT_SECS",
                DEFAULT_WEATHER_TIMEOUT_SECS,
            )?),
        };

        let relevant_types = resolve_allowlist(get("INGEST_ALLOWLIST_PATH").map(PathBuf::from))?;

        Ok(Self {
            feed,
            database,
            weather,
            relevant_types,
            metrics_textfile: get("METRICS_TEXTFILE").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .parse::<T>()
            .with_context(|| format!("{key} has invalid value {v:?}")),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got {other:?}")),
    }
}
