use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle of the process currently occupying a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Spawned, not yet confirmed ready
    Starting,
    /// Serving traffic
    Running,
    /// Termination requested, waiting for the process to finish in-flight work
    Draining,
    /// No live process
    Exited,
    /// Crashed too often in quick succession; auto-restart stopped
    Failed,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotState::Starting => "starting",
            SlotState::Running => "running",
            SlotState::Draining => "draining",
            SlotState::Exited => "exited",
            SlotState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One pool position. The port is the slot's stable identity; processes
/// come and go through it, tagged with a generation so late events about a
/// previous occupant can be discarded.
#[derive(Debug)]
pub struct WorkerSlot {
    pub index: usize,
    pub port: u16,
    pub(crate) pid: Option<u32>,
    pub(crate) state: SlotState,
    pub(crate) generation: u64,
    pub(crate) restart_pending: bool,
    pub(crate) rapid_failures: u32,
    pub(crate) last_failure: Option<Instant>,
}

impl WorkerSlot {
    pub(crate) fn new(index: usize, port: u16) -> Self {
        Self {
            index,
            port,
            pid: None,
            state: SlotState::Exited,
            generation: 0,
            restart_pending: false,
            rapid_failures: 0,
            last_failure: None,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// At most one live process per slot at any time.
    pub fn is_live(&self) -> bool {
        self.pid.is_some()
    }

    /// Record an abnormal exit and return the rapid-failure count. A
    /// failure later than `window` after the previous one starts a fresh
    /// count.
    pub(crate) fn record_failure(&mut self, window: Duration) -> u32 {
        let now = Instant::now();
        match self.last_failure {
            Some(previous) if now.duration_since(previous) <= window => {
                self.rapid_failures += 1;
            }
            _ => {
                self.rapid_failures = 1;
            }
        }
        self.last_failure = Some(now);
        self.rapid_failures
    }

    pub(crate) fn reset_failures(&mut self) {
        self.rapid_failures = 0;
        self.last_failure = None;
    }
}
