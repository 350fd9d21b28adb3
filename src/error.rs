//! Error types for the driving harness.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed configuration or scenario data. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("unknown situation `{0}`")]
    UnknownSituation(String),

    #[error("unknown traffic density `{0}`")]
    UnknownTrafficDensity(String),

    #[error("scenario catalog is empty")]
    EmptyCatalog,

    #[error("invalid observation shape: {0}")]
    InvalidShape(String),

    #[error("invalid action mapping: {0}")]
    InvalidActionMap(String),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Failure to read the scenario descriptor file.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("could not read scenario file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed scenario file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed scenario `{name}`: {source}")]
    Descriptor {
        name: String,
        #[source]
        source: ConfigurationError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scenario `{0}` not found in catalog")]
pub struct UnknownScenarioError(pub String);

/// Raised by the vehicle when its sensors have not produced data yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sensor data unavailable: {0}")]
pub struct SensorUnavailable(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend request `{call}` failed: {message}")]
    Call { call: &'static str, message: String },

    #[error("backend connection lost: {0}")]
    Disconnected(String),

    #[error("process lifecycle failure: {0}")]
    Process(String),
}

impl BackendError {
    pub fn call(call: &'static str, message: impl Into<String>) -> Self {
        Self::Call {
            call,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the environment to the training loop.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    UnknownScenario(#[from] UnknownScenarioError),

    #[error("operation interrupted during {0}")]
    Interrupted(&'static str),

    #[error("environment needs a reset before stepping")]
    NeedsReset,

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("ego vehicle could not be spawned for scenario `{0}`")]
    EgoSpawnFailed(String),
}

pub type Result<T> = std::result::Result<T, EnvError>;
