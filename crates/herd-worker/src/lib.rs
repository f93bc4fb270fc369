//! Worker-side harness: connection accounting, graceful drain, and
//! fault isolation around an application router.

mod connection_gauge;
mod drain;
mod error;
mod fault;
mod health;
mod worker;

#[cfg(test)]
mod tests;

pub use connection_gauge::{ConnectionGauge, ConnectionPermit};
pub use drain::DrainController;
pub use error::{Result as WorkerResult, WorkerError};
pub use fault::request_boundary;
pub use health::{HealthState, internal_routes};
pub use worker::{ExitKind, WorkerSettings, harness_router, run};
