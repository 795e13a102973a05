//! Probe adapters for the supported database engine families.
//!
//! A probe is a single bounded connect/handshake cycle against one
//! target. Probing never fails at the call site: network errors, auth
//! rejections, timeouts and unrecognized engine kinds are all folded
//! into the returned [`ProbeOutcome`].

mod mssql;
mod mysql;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::models::{ProbeOutcome, Target};

/// Upper bound on a single probe, covering connection establishment
/// and the handshake exchange.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server error: {0}")]
    Server(String),
}

/// Canonical database engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    Postgres,
    MySql,
    SqlServer,
}

impl EngineFamily {
    /// Match a declared engine kind against the supported families.
    ///
    /// Matching is case-insensitive and each family accepts the
    /// aliases in common use.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            "mssql" | "sqlserver" => Some(Self::SqlServer),
            _ => None,
        }
    }
}

/// Probe capability, supplied per engine family.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Run one probe cycle against the target.
    async fn probe(&self, target: &Target) -> ProbeOutcome;
}

/// Default prober speaking each family's wire handshake over TCP.
#[derive(Debug, Default)]
pub struct WireProber;

#[async_trait]
impl Prober for WireProber {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let family = match EngineFamily::parse(&target.engine) {
            Some(family) => family,
            None => {
                tracing::warn!(
                    "Unsupported engine kind '{}' for target {}",
                    target.engine,
                    target.name
                );
                return ProbeOutcome::unknown(&target.engine);
            }
        };

        let start = Instant::now();
        let result = tokio::time::timeout(PROBE_TIMEOUT, handshake(family, target)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(())) => ProbeOutcome::up(elapsed_ms),
            Ok(Err(e)) => ProbeOutcome::down(elapsed_ms, e.to_string()),
            Err(_) => {
                ProbeOutcome::down(elapsed_ms, ProbeError::Timeout(PROBE_TIMEOUT).to_string())
            }
        }
    }
}

/// Dispatch to the family handshake. The TCP stream lives inside the
/// callee and is dropped on every exit path.
async fn handshake(family: EngineFamily, target: &Target) -> Result<(), ProbeError> {
    match family {
        EngineFamily::Postgres => postgres::check(target).await,
        EngineFamily::MySql => mysql::check(target).await,
        EngineFamily::SqlServer => mssql::check(target).await,
    }
}

pub(crate) async fn connect(target: &Target) -> Result<TcpStream, ProbeError> {
    TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|e| ProbeError::Connect(format!("{}: {}", target.addr(), e)))
}
