//! Plain-terminal rendering of cycle summaries.
//!
//! Consumes the scheduler's summary channel and prints one status line
//! per target per cycle. Rendering is presentation only; downtime is
//! derived from the state snapshot at render time, never cached.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::scheduler::{CycleSummary, TargetReport};

/// Render cycle summaries until the channel closes.
pub async fn run_renderer(mut rx: mpsc::Receiver<CycleSummary>) {
    while let Some(summary) = rx.recv().await {
        print!("{}", render_cycle(&summary));
    }
}

fn render_cycle(summary: &CycleSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "cycle {} ({}ms, next in {}ms)",
        summary.cycle,
        summary.elapsed.as_millis(),
        summary.next_delay.as_millis()
    );
    for report in &summary.reports {
        let _ = writeln!(out, "  {}", format_line(report, summary.observed));
    }
    out
}

fn format_line(report: &TargetReport, observed: DateTime<Utc>) -> String {
    let downtime_secs = report.state.total_downtime(observed).num_seconds();
    let mut line = format!(
        "{:<20} {:<12} {:>7} {:>6}ms  down {}s",
        report.target.name,
        report.target.engine,
        report.outcome.status,
        report.outcome.elapsed_ms,
        downtime_secs
    );
    if let Some(error) = &report.outcome.error {
        let _ = write!(line, "  ({})", error);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeOutcome, ProbeStatus, Target};
    use crate::tracker::TargetState;
    use std::time::Duration;

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn report(outcome: ProbeOutcome, state: TargetState) -> TargetReport {
        TargetReport {
            target: Target {
                name: "primary".to_string(),
                engine: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database: String::new(),
                user: String::new(),
                password: String::new(),
                tls_required: false,
            },
            outcome,
            state,
        }
    }

    #[test]
    fn test_format_line_up() {
        let mut state = TargetState::new();
        state.apply(ProbeStatus::Up, ts(0));
        let line = format_line(&report(ProbeOutcome::up(12), state), ts(0));
        assert!(line.contains("primary"));
        assert!(line.contains("UP"));
        assert!(line.contains("12ms"));
        assert!(line.contains("down 0s"));
        assert!(!line.contains('('));
    }

    #[test]
    fn test_format_line_down_derives_open_downtime() {
        let mut state = TargetState::new();
        state.apply(ProbeStatus::Down, ts(0));
        let line = format_line(
            &report(ProbeOutcome::down(5001, "probe timed out"), state),
            ts(7500),
        );
        assert!(line.contains("DOWN"));
        assert!(line.contains("down 7s"));
        assert!(line.contains("(probe timed out)"));
    }

    #[test]
    fn test_render_cycle_has_header_and_lines() {
        let summary = CycleSummary {
            cycle: 3,
            observed: ts(0),
            reports: vec![
                report(ProbeOutcome::up(1), TargetState::new()),
                report(ProbeOutcome::up(2), TargetState::new()),
            ],
            elapsed: Duration::from_millis(40),
            next_delay: Duration::from_millis(960),
        };
        let text = render_cycle(&summary);
        assert!(text.starts_with("cycle 3 (40ms, next in 960ms)"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_renderer_exits_when_channel_closes() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        tokio_test::block_on(run_renderer(rx));
    }
}
