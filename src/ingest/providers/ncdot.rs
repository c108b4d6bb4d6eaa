// src/ingest/providers/ncdot.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug, error, info};

use crate::config::FeedConfig;
use crate::ingest::types::{IncidentFeed, SourceIncident};

// Enough of a bad body to diagnose it without flooding the log.
const MAX_LOGGED_BODY: usize = 2_000;

pub struct NcdotFeed {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl NcdotFeed {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_config(cfg: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: cfg.url.clone(),
                client,
            },
        })
    }

    pub fn parse_incidents(body: &str) -> Result<Vec<SourceIncident>> {
        let t0 = std::time::Instant::now();
        let out: Vec<SourceIncident> = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                error!(
                    target: "ingest",
                    provider = "NCDOT",
                    body = %truncate(body, MAX_LOGGED_BODY),
                    "feed body is not a JSON incident array"
                );
                return Err(e).context("parsing NCDOT incident JSON");
            }
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl IncidentFeed for NcdotFeed {
    async fn fetch_latest(&self) -> Result<Vec<SourceIncident>> {
        let incidents = match &self.mode {
            Mode::Fixture(s) => Self::parse_incidents(s)?,
            Mode::Http { url, client } => {
                debug!(target: "ingest", %url, "fetching NCDOT incidents");
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .context("NCDOT http get()")?;
                let status = resp.status();
                let body = resp.text().await.context("NCDOT http .text()")?;
                if !status.is_success() {
                    error!(
                        target: "ingest",
                        provider = "NCDOT",
                        %status,
                        body = %truncate(&body, MAX_LOGGED_BODY),
                        "feed returned non-success status"
                    );
                    return Err(anyhow!("NCDOT feed returned {status}"));
                }
                Self::parse_incidents(&body)?
            }
        };

        counter!("ingest_incidents_total").increment(incidents.len() as u64);
        info!(target: "ingest", count = incidents.len(), "found incidents from NCDOT");
        Ok(incidents)
    }

    fn name(&self) -> &'static str {
        "NCDOT"
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
