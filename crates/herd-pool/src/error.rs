use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to spawn worker for slot {slot}: {source} {location}")]
    Spawn {
        slot: usize,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Failed to signal pid {pid}: {source} {location}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
        location: ErrorLocation,
    },

    #[error("Supervisor is no longer running {location}")]
    SupervisorGone { location: ErrorLocation },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl PoolError {
    #[track_caller]
    pub fn spawn(slot: usize, source: std::io::Error) -> Self {
        Self::Spawn {
            slot,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn supervisor_gone() -> Self {
        Self::SupervisorGone {
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for PoolError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
