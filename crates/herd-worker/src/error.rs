use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to bind port {port}: {source} {location}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Failed to install signal handler: {source} {location}")]
    Signal {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Serve loop failed: {source} {location}")]
    Serve {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Application configuration invalid: {message} {location}")]
    AppConfig {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl WorkerError {
    /// Create an application configuration fault.
    ///
    /// These are fatal at startup: a worker must fail fast rather than
    /// serve with invalid state.
    #[track_caller]
    pub fn app_config<S: Into<String>>(message: S) -> Self {
        Self::AppConfig {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for WorkerError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
