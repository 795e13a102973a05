//! Two-phase shutdown coordination.
//!
//! The first interrupt stops the scheduler, which finishes its cycle
//! in flight; a grace window then covers session finalization (report
//! drain and CSV export). Repeat interrupts inside the window are
//! ignored; one arriving after it forces the process down.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

/// Grace period granted to finalization after the first signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Coordinator for graceful shutdown.
///
/// Long-running tasks subscribe; the signal listener triggers.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Listen for interrupts and drive the two-phase protocol.
///
/// Meant to be spawned; runs until the process exits.
pub async fn listen(shutdown: Shutdown) {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Interrupt handler unavailable; running without graceful shutdown");
        return;
    }
    tracing::info!("Shutdown signal received; finishing the cycle in flight");
    shutdown.trigger();

    let deadline = Instant::now() + SHUTDOWN_GRACE;
    loop {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if Instant::now() < deadline {
            tracing::warn!("Still finalizing; repeat interrupt ignored during the grace period");
        } else {
            tracing::error!("Grace period elapsed; terminating immediately");
            std::process::exit(1);
        }
    }
}
