use crate::ConnectionGauge;

use std::sync::Arc;

use log::info;
use tokio::sync::broadcast;

/// Coordinates a worker's graceful drain: one shot, observed by the accept
/// loop (stop taking new work) and by whoever waits for the exit condition.
#[derive(Clone)]
pub struct DrainController {
    gauge: Arc<ConnectionGauge>,
    drain_tx: broadcast::Sender<()>,
}

impl DrainController {
    pub fn new() -> Self {
        let (drain_tx, _) = broadcast::channel(1);
        Self {
            gauge: ConnectionGauge::new(),
            drain_tx,
        }
    }

    pub fn gauge(&self) -> Arc<ConnectionGauge> {
        Arc::clone(&self.gauge)
    }

    /// Enter draining: stop accepting new work, finish what is in flight.
    /// Repeat calls are no-ops.
    pub fn request_drain(&self) {
        if self.gauge.is_draining() {
            return;
        }
        self.gauge.begin_drain();
        info!(
            "Drain requested, {} connection(s) in flight",
            self.gauge.active()
        );
        let _ = self.drain_tx.send(());
    }

    pub fn is_draining(&self) -> bool {
        self.gauge.is_draining()
    }

    /// Resolve once a drain has been requested.
    pub async fn wait_drain(&self) {
        // Subscribe before checking the flag so a request_drain racing this
        // call is seen either way.
        let mut rx = self.drain_tx.subscribe();
        if self.gauge.is_draining() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Resolve once draining has started and the gauge has reached zero.
    pub async fn drained(&self) {
        self.wait_drain().await;
        self.gauge.wait_idle().await;
    }
}

impl Default for DrainController {
    fn default() -> Self {
        Self::new()
    }
}
