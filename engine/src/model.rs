//! Core data model for hash computations and file watching.
//!
//! This module defines:
//! - HashRequest: one computation handed to the engine
//! - HashSignal: what the engine reports back
//! - ChecksumValue: a finished digest
//! - WatchTarget, WatchSignal: the watcher's target and what it reports

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Default number of progress steps per computation.
pub const DEFAULT_STEPS: u32 = 20;

/// A single computation request.
///
/// Created by the caller for each run and consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRequest {
    /// Identifier used to correlate log lines of one run
    pub id: Uuid,

    /// Registry name of the digest algorithm
    pub algorithm: String,

    /// File to hash
    pub path: PathBuf,

    /// Number of progress steps reported over the whole file
    pub steps: u32,
}

impl HashRequest {
    pub fn new(algorithm: impl Into<String>, path: impl Into<PathBuf>, steps: u32) -> Self {
        HashRequest {
            id: Uuid::new_v4(),
            algorithm: algorithm.into(),
            path: path.into(),
            steps,
        }
    }
}

/// A computed digest, rendered as lowercase hex without separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumValue {
    algorithm: String,
    #[serde(rename = "digest")]
    hex: String,
}

impl ChecksumValue {
    /// Create a checksum value from raw digest bytes
    pub fn from_bytes(algorithm: impl Into<String>, bytes: &[u8]) -> Self {
        ChecksumValue {
            algorithm: algorithm.into(),
            hex: hex::encode(bytes),
        }
    }

    /// Get the algorithm name
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Get the hex string representation
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Compare against a user-supplied digest, ignoring case and surrounding
    /// whitespace.
    pub fn matches(&self, expected: &str) -> bool {
        self.hex.eq_ignore_ascii_case(expected.trim())
    }

    /// Format as "algo:hex"
    pub fn to_string_with_algo(&self) -> String {
        format!("{}:{}", self.algorithm, self.hex)
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Signals emitted by the hash engine.
///
/// Within one run: zero or more `ProgressChanged` with strictly increasing
/// values, then exactly one of `Completed`, `Cancelled` or `Failed`.
#[derive(Debug)]
pub enum HashSignal {
    /// Quantized progress in `1..=steps`
    ProgressChanged(u32),
    /// The whole file was digested
    Completed(ChecksumValue),
    /// The run observed a cancellation request and stopped
    Cancelled,
    /// The run was abandoned because of an error
    Failed(EngineError),
}

impl HashSignal {
    /// Returns true if this signal ends a run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HashSignal::ProgressChanged(_))
    }
}

/// The file currently observed by the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub active: bool,
}

impl WatchTarget {
    /// An inactive target with no path.
    pub fn none() -> Self {
        WatchTarget::default()
    }

    pub fn active(path: &Path) -> Self {
        WatchTarget {
            path: path.to_path_buf(),
            active: true,
        }
    }
}

/// Signals emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// The target was removed; the watcher is now inactive
    Deleted,
    /// The target was renamed; carries the new absolute path
    Renamed(PathBuf),
}
