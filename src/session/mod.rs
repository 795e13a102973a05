//! In-memory session recording.
//!
//! The session log is an append-only ledger of probe observations,
//! one entry per target per cycle, kept for the lifetime of the
//! monitoring session and flattened for export at the end.

mod export;

pub use export::*;

use chrono::{DateTime, Utc};

use crate::models::{ProbeOutcome, ProbeStatus, Target};
use crate::tracker::{DowntimeInterval, TargetState};

/// One immutable record of a probe observation.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub timestamp: DateTime<Utc>,
    pub target_name: String,
    pub engine: String,
    pub status: ProbeStatus,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    /// Value copy of the target's downtime ledger at record time, so
    /// later transitions cannot alter history.
    pub downtime_snapshot: Vec<DowntimeInterval>,
}

/// Append-only log of session entries.
///
/// Grows monotonically for the session lifetime; there is no eviction.
#[derive(Debug, Default)]
pub struct SessionLog {
    entries: Vec<SessionEntry>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation.
    ///
    /// Must run after the tracker transition for the same outcome so
    /// the snapshot reflects the post-transition ledger.
    pub fn record(
        &mut self,
        target: &Target,
        outcome: &ProbeOutcome,
        state: &TargetState,
        now: DateTime<Utc>,
    ) {
        self.entries.push(SessionEntry {
            timestamp: now,
            target_name: target.name.clone(),
            engine: target.engine.clone(),
            status: outcome.status,
            elapsed_ms: outcome.elapsed_ms,
            error: outcome.error.clone(),
            downtime_snapshot: state.intervals().to_vec(),
        });
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
