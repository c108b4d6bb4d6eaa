// src/store/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use super::{IncidentStore, StoreError};
use crate::config::DatabaseConfig;
use crate::normalize::UnifiedIncident;

// No `jurisdiction` column: NCDOT does not report one, and an existing value
// must survive the write.
const UPSERT_SQL: &str = r#"
    INSERT INTO unified_incidents (
        source, source_id, event_type, status, address, latitude, longitude, timestamp, details,
        problem_detail, weather_temp, weather_wind_speed, weather_forecast
    ) VALUES ($1, $2, $3, 'active', $4, $5, $6, $7, $8, $9, $10, $11, $12)
    ON CONFLICT (source, source_id) DO UPDATE SET
        details = EXCLUDED.details,
        status = 'active',
        problem_detail = EXCLUDED.problem_detail,
        weather_temp = EXCLUDED.weather_temp,
        weather_wind_speed = EXCLUDED.weather_wind_speed,
        weather_forecast = EXCLUDED.weather_forecast
"#;

const UPSERT_WITH_JURISDICTION_SQL: &str = r#"
    INSERT INTO unified_incidents (
        source, source_id, event_type, status, address, latitude, longitude, timestamp, details,
        problem_detail, weather_temp, weather_wind_speed, weather_forecast, jurisdiction
    ) VALUES ($1, $2, $3, 'active', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (source, source_id) DO UPDATE SET
        details = EXCLUDED.details,
        status = 'active',
        problem_detail = EXCLUDED.problem_detail,
        weather_temp = EXCLUDED.weather_temp,
        weather_wind_speed = EXCLUDED.weather_wind_speed,
        weather_forecast = EXCLUDED.weather_forecast
"#;

pub struct PgIncidentStore {
    pool: PgPool,
}

pub fn connect_options(cfg: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.username)
        .password(&cfg.password)
        .database(&cfg.database)
        .ssl_mode(PgSslMode::Require)
}

impl PgIncidentStore {
    /// Open the pool and verify the database answers before any work starts.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(connect_options(cfg))
            .await
            .with_context(|| format!("opening database {}@{}:{}", cfg.database, cfg.host, cfg.port))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("pinging database")?;

        info!(target: "store", host = %cfg.host, database = %cfg.database, "connected to database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
    async fn upsert(&self, incident: &UnifiedIncident) -> Result<(), StoreError> {
        let sql = if incident.jurisdiction.is_some() {
            UPSERT_WITH_JURISDICTION_SQL
        } else {
            UPSERT_SQL
        };

        let mut q = sqlx::query(sql)
            .bind(&incident.source)
            .bind(&incident.source_id)
            .bind(&incident.event_type)
            .bind(&incident.address)
            .bind(incident.latitude)
            .bind(incident.longitude)
            .bind(incident.timestamp)
            .bind(Json(&incident.details))
            .bind(&incident.problem_detail)
            .bind(incident.weather_temp)
            .bind(&incident.weather_wind_speed)
            .bind(&incident.weather_forecast);
        if let Some(j) = &incident.jurisdiction {
            q = q.bind(j);
        }

        q.execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
