use std::panic::Location;
use std::path::PathBuf;
use std::result::Result as StdResult;

use error_location::ErrorLocation;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("{category} error: {message} {location}")]
    Generic {
        category: &'static str,
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Create a pool-section error
    #[track_caller]
    pub fn pool<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Pool",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create a restart-section error
    #[track_caller]
    pub fn restart<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Restart",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create a drain-section error
    #[track_caller]
    pub fn drain<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Drain",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create a logging-section error
    #[track_caller]
    pub fn logging<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Logging",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create a general config error
    #[track_caller]
    pub fn config<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Config",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type ConfigErrorResult<T> = StdResult<T, ConfigError>;
