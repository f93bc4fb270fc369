use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;

/// In-flight request counter for one worker process.
///
/// The count is the sole gate for "safe to exit": a draining worker leaves
/// only once it reaches zero. Permits are RAII so the count also unwinds
/// correctly when a request panics.
pub struct ConnectionGauge {
    active: AtomicUsize,
    draining: AtomicBool,
    idle: Notify,
}

impl ConnectionGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            draining: AtomicBool::new(false),
            idle: Notify::new(),
        })
    }

    /// Count one request as in flight until the permit drops.
    pub fn acquire(self: &Arc<Self>) -> ConnectionPermit {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionPermit {
            gauge: Arc::clone(self),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Resolve once the active count is zero.
    ///
    /// Registers for the idle notification before re-checking the count, so
    /// a permit dropped between the check and the await is never missed.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct ConnectionPermit {
    gauge: Arc<ConnectionGauge>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        if self.gauge.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.gauge.idle.notify_waiters();
        }
    }
}
