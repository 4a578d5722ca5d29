//! Background sweeping of expired throttle records.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use super::limiter::Throttle;

/// Periodically evicts records whose window has ended.
///
/// Admission already ignores expired records, so the janitor only bounds
/// memory for clients that stop sending requests.
pub struct Janitor {
    /// Signals the sweep loop to stop
    stop_tx: oneshot::Sender<()>,
    /// The sweep loop task
    handle: JoinHandle<()>,
}

impl Janitor {
    /// Spawn the sweep loop on the current tokio runtime.
    pub fn start(throttle: Arc<Throttle>, period: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(throttle, period, stop_rx));

        info!(period = ?period, "Throttle janitor started");

        Self { stop_tx, handle }
    }

    /// Stop the sweep loop and wait for it to finish.
    pub async fn shutdown(self) {
        // The loop may already be gone if the runtime is tearing down
        let _ = self.stop_tx.send(());
        let _ = self.handle.await;
        info!("Throttle janitor stopped");
    }
}

async fn run(throttle: Arc<Throttle>, period: Duration, mut stop_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing can have expired yet
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let removed = throttle.sweep(Utc::now());
                if removed > 0 {
                    debug!(removed = removed, "Swept expired throttle records");
                }
                trace!(tracked = throttle.tracked_clients(), "Throttle sweep complete");
            }
        }
    }
}
