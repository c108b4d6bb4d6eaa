// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PATH: &str = "INGEST_ALLOWLIST_PATH";

/// Incident types kept when no allow-list file is configured.
pub const DEFAULT_RELEVANT_TYPES: [&str; 2] = ["Vehicle Crash", "Disabled Vehicle"];

pub fn default_relevant_types() -> Vec<String> {
    DEFAULT_RELEVANT_TYPES.iter().map(|s| s.to_string()).collect()
}

/// Load the allow-list from an explicit path. Supports TOML or JSON formats.
pub fn load_allowlist_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading allow-list from {}", path.display()))?;
    let format = AllowListFormat::detect(path, &content);
    format
        .parse(&content)
        .with_context(|| format!("parsing {format:?} allow-list {}", path.display()))
}

/// Resolve the allow-list:
/// 1) explicit path (from $INGEST_ALLOWLIST_PATH), which must exist
/// 2) config/ingest_allowlist.toml
/// 3) config/ingest_allowlist.json
/// 4) built-in default
pub fn resolve_allowlist(explicit: Option<PathBuf>) -> Result<Vec<String>> {
    if let Some(pb) = explicit {
        if pb.exists() {
            return load_allowlist_from(&pb);
        }
        return Err(anyhow!(
            "{ENV_PATH} points to non-existent path {}",
            pb.display()
        ));
    }
    let toml_p = PathBuf::from("config/ingest_allowlist.toml");
    if toml_p.exists() {
        return load_allowlist_from(&toml_p);
    }
    let json_p = PathBuf::from("config/ingest_allowlist.json");
    if json_p.exists() {
        return load_allowlist_from(&json_p);
    }
    Ok(default_relevant_types())
}

/// Same as [`resolve_allowlist`], reading the explicit path from the environment.
pub fn load_allowlist_default() -> Result<Vec<String>> {
    resolve_allowlist(std::env::var(ENV_PATH).ok().map(PathBuf::from))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllowListFormat {
    /// `incident_types = ["Vehicle Crash", ...]`
    Toml,
    /// `["Vehicle Crash", ...]`
    Json,
}

impl AllowListFormat {
    /// Extension first; otherwise a bare array is JSON and anything else TOML.
    fn detect(path: &Path, content: &str) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("toml") => Self::Toml,
            Some(e) if e.eq_ignore_ascii_case("json") => Self::Json,
            _ if content.trim_start().starts_with('[') => Self::Json,
            _ => Self::Toml,
        }
    }

    fn parse(self, content: &str) -> Result<Vec<String>> {
        #[derive(serde::Deserialize)]
        struct TomlAllowList {
            incident_types: Vec<String>,
        }

        let raw = match self {
            Self::Toml => toml::from_str::<TomlAllowList>(content)?.incident_types,
            Self::Json => serde_json::from_str::<Vec<String>>(content)?,
        };
        let types = normalize_types(raw);
        // An empty allow-list would silently drop every incident.
        if types.is_empty() {
            return Err(anyhow!("allow-list is empty"));
        }
        Ok(types)
    }
}

/// Trimmed, blank-free, sorted and unique.
fn normalize_types(raw: Vec<String>) -> Vec<String> {
    raw.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
