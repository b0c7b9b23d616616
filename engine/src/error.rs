//! Error types for the hash engine and file watcher.
//!
//! Errors that can be detected before any background work begins are returned
//! synchronously from `HashEngine::start` and `FileWatcher::set_target`.
//! Errors that arise while a run is in flight are delivered on the engine's
//! signal channel as `HashSignal::Failed`, never thrown across threads.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the registry, the engine and the watcher.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested algorithm name is not registered
    #[error("unknown hash algorithm: {name}")]
    UnknownAlgorithm { name: String },

    /// Path is missing, not a regular file, or cannot be opened for reading
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Progress step count must be at least one
    #[error("invalid progress step count: {steps} (must be at least 1)")]
    InvalidStepCount { steps: u32 },

    /// `start` was called while a computation is still in flight
    #[error("a computation is already running")]
    AlreadyRunning,

    /// Read failure in the middle of a run
    #[error("failed to read file: {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker thread could not be spawned
    #[error("failed to spawn worker thread")]
    WorkerSpawn {
        #[source]
        source: io::Error,
    },

    /// The worker thread ended without delivering a result
    #[error("worker thread terminated unexpectedly")]
    WorkerPanicked,

    /// The filesystem notification backend refused to watch a path
    #[error("failed to watch: {}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
