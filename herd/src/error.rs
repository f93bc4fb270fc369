use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HerdError {
    #[error("Logger error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown application reference '{reference}' {location}")]
    UnknownApp {
        reference: String,
        location: ErrorLocation,
    },

    #[error("Invalid application configuration: {source} {location}")]
    AppConfig {
        #[source]
        source: serde_json::Error,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] herd_config::ConfigError),

    #[error(transparent)]
    Pool(#[from] herd_pool::PoolError),

    #[error(transparent)]
    Worker(#[from] herd_worker::WorkerError),

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl HerdError {
    #[track_caller]
    pub fn logger(message: impl Into<String>) -> Self {
        Self::Logger {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_app(reference: impl Into<String>) -> Self {
        Self::UnknownApp {
            reference: reference.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for HerdError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for HerdError {
    #[track_caller]
    fn from(source: serde_json::Error) -> Self {
        Self::AppConfig {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HerdError>;
