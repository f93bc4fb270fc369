//! Master-side supervision: the worker pool, crash-restart policy, and
//! fleet-wide shutdown/restart sessions.

mod error;
mod event;
mod probe;
mod session;
mod slot;
mod spawner;
mod supervisor;

#[cfg(test)]
mod tests;

pub use error::{PoolError, Result as PoolResult};
pub use slot::{SlotState, WorkerSlot};
pub use spawner::{ProcessSpawner, SpawnedWorker, Spawner, WorkerExit, WorkerSpec};
pub use supervisor::{PoolStatus, SlotSnapshot, Supervisor, SupervisorHandle};
