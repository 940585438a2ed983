//! Error types for the engine bridge.
//!
//! None of these cross into UI callers through `start`/`stop`/`send`; those
//! log and swallow. They surface through `try_send`, the spawner seam, the
//! schema seam and the discovery helper.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("engine {0} not captured")]
    StreamNotCaptured(&'static str),
}

/// A payload the message schema could not make sense of.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("engine is not running")]
    NotRunning,

    #[error("failed to write frame: {0}")]
    Write(#[source] std::io::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("plugin listing timed out after {0:?}")]
    ListTimeout(std::time::Duration),

    #[error("plugin listing failed: engine exited with {0}")]
    ListFailed(ExitStatus),

    #[error("plugin listing failed: {0}")]
    ListIo(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
