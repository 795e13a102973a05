//! dbpulse - database liveness monitor.
//!
//! Probes configured database endpoints once a second, tracks each
//! target's downtime as non-overlapping intervals, and writes the
//! session log to CSV on exit.

mod config;
mod models;
mod probe;
mod report;
mod scheduler;
mod session;
mod shutdown;
mod tracker;

use std::sync::Arc;

use config::MonitorConfig;
use probe::WireProber;
use scheduler::Scheduler;
use shutdown::Shutdown;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dbpulse=info".parse()?),
        )
        .init();

    // Load configuration
    let cfg = MonitorConfig::load();
    let targets = config::load_targets(&cfg.targets_path)?;
    tracing::info!(
        "Monitoring {} targets from {}",
        targets.len(),
        cfg.targets_path
    );

    // First interrupt stops the scheduler; the listener handles the rest.
    let shutdown = Shutdown::new();
    let stop_rx = shutdown.subscribe();
    tokio::spawn(shutdown::listen(shutdown.clone()));

    let (summary_tx, summary_rx) = tokio::sync::mpsc::channel(16);
    let renderer = tokio::spawn(report::run_renderer(summary_rx));

    let scheduler =
        Scheduler::new(targets, Arc::new(WireProber)).with_summaries(summary_tx);
    let session = scheduler.run(stop_rx).await;

    // The scheduler dropped its sender; let the renderer drain.
    let _ = renderer.await;

    match &cfg.export_path {
        Some(path) => match session::export_to_file(&session.log, path) {
            Ok(rows) => tracing::info!("Session exported: {} rows to {}", rows, path),
            Err(e) => tracing::error!("Session export failed: {}", e),
        },
        None => tracing::info!("Session export disabled"),
    }

    Ok(())
}
