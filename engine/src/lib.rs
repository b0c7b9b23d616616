//! # hashgen engine - background file digests
//!
//! A headless library that computes the digest of one file at a time on a
//! background thread, with quantized progress and cooperative cancellation,
//! plus a watcher that tells the caller when that file is deleted or renamed.
//! Designed as the core behind any front end (CLI, GUI, automation).
//!
//! ## Basic Usage
//!
//! ```no_run
//! use hashgen_engine::{FileWatcher, HashEngine, HashSignal, WatchSignal, DEFAULT_STEPS};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = HashEngine::new();
//! let mut watcher = FileWatcher::new();
//!
//! let algorithm = engine.registry().default_algorithm();
//! watcher.set_target("C:\\data\\image.iso")?;
//! engine.start(algorithm, "C:\\data\\image.iso", DEFAULT_STEPS)?;
//!
//! let file_events = watcher.signals();
//! for signal in engine.signals().iter() {
//!     if let Ok(WatchSignal::Deleted) = file_events.try_recv() {
//!         engine.cancel();
//!     }
//!     match signal {
//!         HashSignal::ProgressChanged(step) => println!("{}/{}", step, DEFAULT_STEPS),
//!         HashSignal::Completed(digest) => { println!("{}", digest); break; }
//!         HashSignal::Cancelled => break,
//!         HashSignal::Failed(err) => return Err(err.into()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **registry**: algorithm names and digest constructors
//! - **engine**: single-flight background hashing
//! - **progress**: step quantization
//! - **watcher**: delete / rename notifications for one file
//! - **model**: requests, signals and digest values
//! - **config**: buffer size and watcher tunables
//! - **error**: error types

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod progress;
pub mod registry;
pub mod watcher;

// Re-export main types
pub use config::{EngineConfig, WatcherConfig};
pub use engine::HashEngine;
pub use error::EngineError;
pub use model::{ChecksumValue, HashRequest, HashSignal, WatchSignal, WatchTarget, DEFAULT_STEPS};
pub use progress::StepProgress;
pub use registry::{AlgorithmEntry, ChecksumHasher, DigestRegistry};
pub use watcher::FileWatcher;
