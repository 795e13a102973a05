//! Configuration loading.
//!
//! Runtime settings come from environment variables with sensible
//! defaults; the monitored targets come from a JSON file.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::models::Target;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("duplicate target name: {0}")]
    DuplicateName(String),
    #[error("no targets configured")]
    Empty,
}

/// Runtime settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Path to the JSON targets file (default: "targets.json")
    pub targets_path: String,
    /// CSV export path; `None` disables the session export.
    pub export_path: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            targets_path: "targets.json".to_string(),
            export_path: Some("dbpulse-session.csv".to_string()),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DBPULSE_TARGETS`: targets file path (default: "targets.json")
    /// - `DBPULSE_EXPORT`: CSV output path; empty disables the export
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = env::var("DBPULSE_TARGETS") {
            if !path.is_empty() {
                cfg.targets_path = path;
            }
        }

        if let Ok(path) = env::var("DBPULSE_EXPORT") {
            cfg.export_path = if path.is_empty() { None } else { Some(path) };
        }

        cfg
    }
}

/// Load the monitored targets from a JSON file.
///
/// The file holds an array of target records; file order becomes the
/// session's target order. Names must be unique since the per-target
/// state map is keyed by them.
pub fn load_targets<P: AsRef<Path>>(path: P) -> Result<Vec<Target>, ConfigError> {
    let shown = path.as_ref().display().to_string();
    let raw = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
        path: shown.clone(),
        source: e,
    })?;
    let targets: Vec<Target> = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: shown,
        source: e,
    })?;

    if targets.is_empty() {
        return Err(ConfigError::Empty);
    }
    let mut seen = HashSet::new();
    for target in &targets {
        if !seen.insert(target.name.as_str()) {
            return Err(ConfigError::DuplicateName(target.name.clone()));
        }
    }

    Ok(targets)
}
