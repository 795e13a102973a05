//! Polling scheduler driving the probe cycle.
//!
//! One coordinating loop probes every target concurrently, waits for
//! the whole fan-out, applies the outcomes serially, and re-arms
//! itself to keep a fixed cadence. Loop postcondition: cycles never
//! overlap and none are dropped; an overrunning cycle is followed
//! immediately by the next one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::models::{ProbeOutcome, Target};
use crate::probe::Prober;
use crate::session::SessionLog;
use crate::tracker::TargetState;

/// Fixed delay between cycle starts.
pub const CYCLE_INTERVAL: Duration = Duration::from_millis(1000);

/// Per-cycle view of one target, in target-list order.
///
/// Carries a copy of the post-transition state so the display derives
/// downtime itself against the observation instant.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: Target,
    pub outcome: ProbeOutcome,
    pub state: TargetState,
}

/// Summary of one completed cycle, emitted for external rendering.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub cycle: u64,
    /// Wall-clock instant the cycle's outcomes were applied at.
    pub observed: chrono::DateTime<Utc>,
    pub reports: Vec<TargetReport>,
    /// Time the fan-out and bookkeeping took.
    pub elapsed: Duration,
    /// Delay until the next cycle starts, i.e. the observable next
    /// wake. Zero when the cycle overran the cadence.
    pub next_delay: Duration,
}

/// Everything accumulated over one monitoring session.
#[derive(Debug, Default)]
pub struct Session {
    /// Availability state per target, keyed by target name.
    pub states: HashMap<String, TargetState>,
    pub log: SessionLog,
}

/// The coordinating loop over the selected targets.
pub struct Scheduler {
    targets: Arc<Vec<Target>>,
    prober: Arc<dyn Prober>,
    summary_tx: Option<mpsc::Sender<CycleSummary>>,
}

impl Scheduler {
    pub fn new(targets: Vec<Target>, prober: Arc<dyn Prober>) -> Self {
        Self {
            targets: Arc::new(targets),
            prober,
            summary_tx: None,
        }
    }

    /// Attach a channel receiving one [`CycleSummary`] per cycle.
    pub fn with_summaries(mut self, tx: mpsc::Sender<CycleSummary>) -> Self {
        self.summary_tx = Some(tx);
        self
    }

    /// Run cycles until the stop channel fires, then return the
    /// accumulated session.
    ///
    /// A cycle in flight when the signal arrives completes and records
    /// its results before the loop exits.
    pub async fn run(mut self, mut stop_rx: broadcast::Receiver<()>) -> Session {
        let mut session = Session::default();
        for target in self.targets.iter() {
            session.states.insert(target.name.clone(), TargetState::new());
        }

        tracing::info!("Scheduler starting with {} targets", self.targets.len());

        let mut cycle: u64 = 0;
        loop {
            let cycle_start = Instant::now();
            let outcomes = self.fan_out().await;
            let observed = Utc::now();
            cycle += 1;

            // All shared-state mutation happens here, serially, after
            // the fan-out barrier.
            let mut reports = Vec::with_capacity(self.targets.len());
            for (target, outcome) in self.targets.iter().zip(outcomes) {
                let state = session.states.entry(target.name.clone()).or_default();
                state.apply(outcome.status, observed);
                session.log.record(target, &outcome, state, observed);
                reports.push(TargetReport {
                    target: target.clone(),
                    outcome,
                    state: state.clone(),
                });
            }

            let elapsed = cycle_start.elapsed();
            let next_delay = CYCLE_INTERVAL.saturating_sub(elapsed);
            if next_delay.is_zero() {
                tracing::warn!(
                    "Cycle {} took {}ms, longer than the {}ms cadence; starting next cycle now",
                    cycle,
                    elapsed.as_millis(),
                    CYCLE_INTERVAL.as_millis()
                );
            }

            let send_failed = match &self.summary_tx {
                Some(tx) => tx
                    .send(CycleSummary {
                        cycle,
                        observed,
                        reports,
                        elapsed,
                        next_delay,
                    })
                    .await
                    .is_err(),
                None => false,
            };
            if send_failed {
                tracing::warn!("Summary receiver dropped; cycle reports disabled");
                self.summary_tx = None;
            }

            // Re-arm while staying responsive to the stop signal. The
            // biased order makes an already-delivered signal win over
            // an expired timer.
            tokio::select! {
                biased;
                _ = stop_rx.recv() => break,
                _ = tokio::time::sleep_until(cycle_start + CYCLE_INTERVAL) => {}
            }
        }

        tracing::info!("Scheduler stopped after {} cycles", cycle);
        session
    }

    /// Probe every target concurrently and wait for the full fan-out.
    async fn fan_out(&self) -> Vec<ProbeOutcome> {
        let mut set = JoinSet::new();
        for (idx, target) in self.targets.iter().cloned().enumerate() {
            let prober = self.prober.clone();
            set.spawn(async move { (idx, prober.probe(&target).await) });
        }

        let mut outcomes: Vec<Option<ProbeOutcome>> = vec![None; self.targets.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => tracing::error!("Probe task failed: {}", e),
            }
        }

        // A slot left empty means its task died; degrade that target
        // alone rather than aborting the cycle for the rest.
        outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| ProbeOutcome::down(0, "probe task aborted")))
            .collect()
    }
}
