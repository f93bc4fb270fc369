
use crate::probe::ReadyCheck;
use crate::spawner::{SpawnedWorker, Spawner, WorkerExit, WorkerSpec};
use crate::supervisor::PoolStatus;
use crate::{PoolResult, Supervisor, SupervisorHandle};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use herd_config::Config;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// What a fake worker does when the supervisor signals it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminateBehavior {
    /// The process exits cleanly as soon as it is signalled
    ExitCleanly,
    /// The signal is swallowed; the process keeps running until `kill`
    Ignore,
}

struct Inner {
    next_pid: u32,
    spawns: Vec<WorkerSpec>,
    exits: HashMap<u32, oneshot::Sender<WorkerExit>>,
    terminations: Vec<(u32, bool)>,
    behavior: TerminateBehavior,
}

/// In-process stand-in for `ProcessSpawner`. Every spawned "worker" is a
/// oneshot channel whose exit the test controls.
pub(crate) struct FakeSpawner {
    inner: Mutex<Inner>,
}

impl FakeSpawner {
    pub fn new(behavior: TerminateBehavior) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                next_pid: 1000,
                spawns: Vec::new(),
                exits: HashMap::new(),
                terminations: Vec::new(),
                behavior,
            }),
        })
    }

    pub fn spawn_count(&self) -> usize {
        self.inner.lock().unwrap().spawns.len()
    }

    pub fn spec(&self, n: usize) -> WorkerSpec {
        self.inner.lock().unwrap().spawns[n].clone()
    }

    pub fn terminations(&self) -> Vec<(u32, bool)> {
        self.inner.lock().unwrap().terminations.clone()
    }

    /// End the fake process, as if the real one exited with `exit`.
    pub fn kill(&self, pid: u32, exit: WorkerExit) {
        let sender = self.inner.lock().unwrap().exits.remove(&pid);
        if let Some(sender) = sender {
            let _ = sender.send(exit);
        }
    }
}

#[async_trait]
impl Spawner for FakeSpawner {
    async fn spawn(&self, spec: &WorkerSpec) -> PoolResult<SpawnedWorker> {
        let mut inner = self.inner.lock().unwrap();
        let pid = inner.next_pid;
        inner.next_pid += 1;
        inner.spawns.push(spec.clone());

        let (exit_tx, exit_rx) = oneshot::channel();
        inner.exits.insert(pid, exit_tx);

        let exit = async move { exit_rx.await.unwrap_or(clean_exit()) }.boxed();
        Ok(SpawnedWorker { pid, exit })
    }

    fn terminate(&self, pid: u32, forced: bool) -> PoolResult<()> {
        let (behavior, sender) = {
            let mut inner = self.inner.lock().unwrap();
            inner.terminations.push((pid, forced));
            let sender = match inner.behavior {
                TerminateBehavior::ExitCleanly => inner.exits.remove(&pid),
                TerminateBehavior::Ignore => None,
            };
            (inner.behavior, sender)
        };

        if behavior == TerminateBehavior::ExitCleanly
            && let Some(sender) = sender
        {
            let _ = sender.send(clean_exit());
        }
        Ok(())
    }
}

pub(crate) fn clean_exit() -> WorkerExit {
    WorkerExit {
        code: Some(0),
        signal: None,
    }
}

pub(crate) fn crash_exit() -> WorkerExit {
    WorkerExit {
        code: Some(1),
        signal: None,
    }
}

/// Small, fast timings so restart and debounce paths run in milliseconds.
pub(crate) fn test_config(workers: usize) -> Config {
    let mut config = Config::default();
    config.pool.workers = workers;
    config.pool.base_port = 9300;
    config.pool.server = String::from("apps/site");
    config.pool.watch_debounce_ms = 50;
    config.pool.ready_timeout_secs = 0;
    config.restart.initial_delay_ms = 10;
    config.restart.max_delay_ms = 40;
    config.restart.max_rapid_failures = 3;
    config.restart.window_secs = 30;
    config.drain.deadline_secs = 0;
    config
}

pub(crate) fn start_supervisor(
    config: Config,
    spawner: Arc<FakeSpawner>,
) -> (SupervisorHandle, JoinHandle<()>) {
    let (supervisor, handle) = Supervisor::new(config, spawner);
    let join = tokio::spawn(async move {
        supervisor.run().await.expect("supervisor run failed");
    });
    (handle, join)
}

/// What a fake readiness probe reports for every port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeBehavior {
    /// The worker answers its ready endpoint right away
    ReadyImmediately,
    /// The probe times out without an answer
    NeverReady,
}

/// In-process stand-in for `HttpProber`, recording every probed port.
pub(crate) struct FakeProber {
    behavior: ProbeBehavior,
    probed: Mutex<Vec<u16>>,
}

impl FakeProber {
    pub fn new(behavior: ProbeBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            probed: Mutex::new(Vec::new()),
        })
    }

    pub fn probed_ports(&self) -> Vec<u16> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReadyCheck for FakeProber {
    async fn wait_ready(&self, port: u16, _timeout: Duration) -> bool {
        self.probed.lock().unwrap().push(port);
        match self.behavior {
            ProbeBehavior::ReadyImmediately => true,
            ProbeBehavior::NeverReady => false,
        }
    }
}

pub(crate) fn start_supervisor_with_prober(
    config: Config,
    spawner: Arc<FakeSpawner>,
    prober: Arc<FakeProber>,
) -> (SupervisorHandle, JoinHandle<()>) {
    let (supervisor, handle) = Supervisor::with_prober(config, spawner, Some(prober));
    let join = tokio::spawn(async move {
        supervisor.run().await.expect("supervisor run failed");
    });
    (handle, join)
}

/// Block until the published pool status satisfies `pred`.
pub(crate) async fn wait_for_status(
    rx: &mut watch::Receiver<PoolStatus>,
    pred: impl Fn(&PoolStatus) -> bool,
) -> PoolStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let status = rx.borrow_and_update();
                if pred(&status) {
                    return status.clone();
                }
            }
            rx.changed().await.expect("status channel closed");
        }
    })
    .await
    .expect("timed out waiting for pool status")
}
