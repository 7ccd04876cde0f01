//! Error types for the worker runtime.

use hornet_core::{CloneError, ScriptError};
use thiserror::Error;

/// The closed set of host-visible failures.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("worker already exists: {0}")]
    AlreadyExists(String),

    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("worker not running: {0}")]
    WorkerNotRunning(String),

    #[error("failed to load script for worker: {0}")]
    ScriptLoadFailed(String),

    #[error("script evaluation failed: {0}")]
    ScriptEvaluation(ScriptError),

    #[error("runtime not available")]
    RuntimeUnavailable,

    #[error(transparent)]
    Clone(#[from] CloneError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
