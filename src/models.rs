//! Core data types shared across the monitor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured database endpoint to be monitored.
///
/// Targets are loaded once at session start and stay immutable for the
/// lifetime of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// Declared engine kind, e.g. "postgres" or "mariadb". Matched
    /// case-insensitively against the supported families.
    pub engine: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub tls_required: bool,
}

impl Target {
    /// "host:port" form for connecting and logging.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Observed status of a target after one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
    Unknown,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Up => write!(f, "UP"),
            ProbeStatus::Down => write!(f, "DOWN"),
            ProbeStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Outcome of one probe against one target.
///
/// Created fresh each cycle and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// Successful probe with the measured latency.
    pub fn up(elapsed_ms: u64) -> Self {
        Self {
            status: ProbeStatus::Up,
            elapsed_ms,
            error: None,
        }
    }

    /// Failed probe with a human-readable reason.
    pub fn down(elapsed_ms: u64, error: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Down,
            elapsed_ms,
            error: Some(error.into()),
        }
    }

    /// Unrecognized engine kind. No network I/O was attempted, so the
    /// elapsed time is zero and the detail names the offending kind.
    pub fn unknown(kind: &str) -> Self {
        Self {
            status: ProbeStatus::Unknown,
            elapsed_ms: 0,
            error: Some(format!("unsupported engine kind: {}", kind)),
        }
    }
}
