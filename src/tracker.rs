//! Per-target availability state machine.
//!
//! Tracks the current status of a target together with an append-only
//! ledger of downtime intervals. An interval opens on a transition
//! into `Down` and closes on the next transition into `Up`; at most
//! one interval is open at any time.

use chrono::{DateTime, Duration, Utc};

use crate::models::ProbeStatus;

/// A contiguous time range during which a target was down.
///
/// `end == None` marks the interval as still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DowntimeInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl DowntimeInterval {
    /// Duration of the interval, using `now` for an open end.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end.unwrap_or(now) - self.start
    }
}

/// Availability state of one monitored target.
///
/// Created at session start with no observed status and an empty
/// ledger; mutated only through [`TargetState::apply`].
#[derive(Debug, Clone, Default)]
pub struct TargetState {
    current: Option<ProbeStatus>,
    intervals: Vec<DowntimeInterval>,
}

impl TargetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed status, `None` before the first probe.
    pub fn current(&self) -> Option<ProbeStatus> {
        self.current
    }

    /// The downtime ledger, oldest first.
    pub fn intervals(&self) -> &[DowntimeInterval] {
        &self.intervals
    }

    /// Apply one observed status at the given instant.
    ///
    /// Ledger effects per transition:
    /// - into `Down`: a new open interval, unless one is already open
    ///   (a `Down, Unknown, Down` run keeps the original interval);
    /// - into `Up`: the open interval, if any, closes at `now`;
    /// - into `Unknown`: the ledger is untouched; an open interval is
    ///   neither closed nor extended.
    pub fn apply(&mut self, status: ProbeStatus, now: DateTime<Utc>) {
        match status {
            ProbeStatus::Down => {
                if self.open_interval().is_none() {
                    self.intervals.push(DowntimeInterval {
                        start: now,
                        end: None,
                    });
                }
            }
            ProbeStatus::Up => {
                if let Some(open) = self.intervals.iter_mut().find(|i| i.end.is_none()) {
                    open.end = Some(now);
                }
            }
            ProbeStatus::Unknown => {}
        }
        self.current = Some(status);
    }

    /// The currently open downtime interval, if any.
    pub fn open_interval(&self) -> Option<&DowntimeInterval> {
        self.intervals.iter().find(|i| i.end.is_none())
    }

    /// Total downtime accumulated so far.
    ///
    /// Recomputed on demand so an open interval keeps counting against
    /// `now` rather than a stale cached value.
    pub fn total_downtime(&self, now: DateTime<Utc>) -> Duration {
        self.intervals
            .iter()
            .fold(Duration::zero(), |acc, i| acc + i.duration(now))
    }
}
