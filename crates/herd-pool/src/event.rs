use crate::WorkerExit;

use std::path::PathBuf;

use tokio::sync::oneshot;

/// Everything that can happen to the pool. All state transitions go
/// through the supervisor's event loop, one event at a time.
#[derive(Debug)]
pub(crate) enum PoolEvent {
    /// A worker process fully terminated
    WorkerExited {
        slot: usize,
        generation: u64,
        exit: WorkerExit,
    },
    /// Readiness probe succeeded for a starting worker
    WorkerReady { slot: usize, generation: u64 },
    /// A scheduled single-slot restart timer fired
    RestartSlot { slot: usize, generation: u64 },
    /// Fleet-wide shutdown request
    ShutdownFleet {
        graceful: bool,
        done: Option<oneshot::Sender<()>>,
    },
    /// Fleet-wide drain-then-respawn request
    RestartFleet {
        graceful: bool,
        done: Option<oneshot::Sender<()>>,
    },
    /// Watch-service callback: something under the watched tree changed
    PathChanged { path: PathBuf },
    /// The watch quiet period elapsed with no newer change
    DebounceExpired { seq: u64 },
    /// A graceful session ran out of drain time
    DrainDeadline { session_id: u64 },
}
