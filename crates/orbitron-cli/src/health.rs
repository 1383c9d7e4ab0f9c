//! Backend connection monitor.
//!
//! A background task probes the backend on a fixed interval and publishes a
//! single connected/disconnected flag. It never touches the session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::ChatTransport;

/// Handle to the running monitor. The task stops when this is dropped.
#[derive(Debug)]
pub struct HealthMonitor {
    status: watch::Receiver<bool>,
    reprobe: Arc<Notify>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Last observed backend status.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    /// Probe again now instead of waiting for the next tick.
    pub fn reprobe(&self) {
        self.reprobe.notify_one();
    }

    /// A receiver that sees every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.clone()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start probing `transport` every `interval`. The first probe runs
/// immediately; until it answers the backend counts as disconnected.
pub fn spawn_monitor(transport: Arc<dyn ChatTransport>, interval: Duration) -> HealthMonitor {
    let (tx, status) = watch::channel(false);
    let reprobe = Arc::new(Notify::new());

    let task = tokio::spawn(run(transport, interval, tx, Arc::clone(&reprobe)));

    HealthMonitor {
        status,
        reprobe,
        task,
    }
}

async fn run(
    transport: Arc<dyn ChatTransport>,
    interval: Duration,
    tx: watch::Sender<bool>,
    reprobe: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = reprobe.notified() => {
                tracing::debug!("Forced backend probe");
                ticker.reset();
            }
        }

        let connected = match transport.probe().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Backend probe failed");
                false
            }
        };

        let changed = tx.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
        if changed {
            tracing::info!(connected, "Backend status changed");
        }

        if tx.is_closed() {
            break;
        }
    }
}
