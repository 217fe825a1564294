//! Error types for the broadcast core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the external mixer process.
#[derive(Debug, Error)]
pub enum MixerError {
    /// The mixer binary is missing or could not be started.
    #[error("failed to spawn mixer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The mixer reported an error while querying a file.
    #[error("mixer probe failed: {0}")]
    Probe(String),

    #[error("unparsable bit rate: {0:?}")]
    UnparsableBitRate(String),

    #[error("mixer produced no output within {0:?}")]
    Timeout(Duration),

    #[error("mixer io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by [`crate::BroadcastEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("the effect {0} wasn't found")]
    EffectNotFound(String),

    #[error("effects directory {dir} is unreadable: {source}")]
    EffectsUnavailable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Mixer(#[from] MixerError),

    #[error("failed to open track {path}: {source}")]
    Track {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source did not detach within {0:?}")]
    DetachTimeout(Duration),

    #[error("no broadcast is running")]
    NotStreaming,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors while loading a [`crate::BroadcastConfig`] from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
