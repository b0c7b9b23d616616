//! Hash engine: single-flight background digest computation.
//!
//! `HashEngine::start` validates a request synchronously and hands it to a
//! dedicated worker thread. The worker streams the file through the selected
//! digest in fixed-size chunks and reports back on the engine's signal
//! channel:
//! - zero or more `HashSignal::ProgressChanged`, strictly increasing
//! - exactly one terminal `Completed`, `Cancelled` or `Failed`
//!
//! The engine state lives behind a mutex shared with the worker. The worker
//! enqueues its terminal signal and returns the engine to idle while holding
//! that lock, so a caller that has received the terminal signal can start the
//! next run right away, and two runs can never overlap.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{ChecksumValue, HashRequest, HashSignal};
use crate::progress::StepProgress;
use crate::registry::{ChecksumHasher, DigestRegistry};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

#[derive(Debug)]
enum RunState {
    Idle,
    Running { id: Uuid, cancel: Arc<AtomicBool> },
}

#[derive(Debug)]
struct Inner {
    run: RunState,
    worker: Option<JoinHandle<()>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // A worker never panics while holding the lock
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Computes one file digest at a time on a background thread.
pub struct HashEngine {
    registry: DigestRegistry,
    config: EngineConfig,
    inner: Arc<Mutex<Inner>>,
    sender: Sender<HashSignal>,
    receiver: Receiver<HashSignal>,
}

impl HashEngine {
    /// Engine over the built-in registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(DigestRegistry::builtin(), EngineConfig::default())
    }

    pub fn with_config(registry: DigestRegistry, config: EngineConfig) -> Self {
        let (sender, receiver) = unbounded();
        HashEngine {
            registry,
            config,
            inner: Arc::new(Mutex::new(Inner {
                run: RunState::Idle,
                worker: None,
            })),
            sender,
            receiver,
        }
    }

    pub fn registry(&self) -> &DigestRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receiver for every signal this engine emits, across all runs.
    pub fn signals(&self) -> Receiver<HashSignal> {
        self.receiver.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(lock(&self.inner).run, RunState::Running { .. })
    }

    /// Start hashing `path` with `algorithm`, reporting `steps` progress steps.
    ///
    /// Returns the run id once the worker is launched; the digest arrives on
    /// `signals()`.
    ///
    /// # Errors
    /// `AlreadyRunning`, `UnknownAlgorithm`, `FileNotFound` or
    /// `InvalidStepCount`, checked in that order. No signal is emitted for a
    /// rejected request.
    pub fn start(
        &self,
        algorithm: &str,
        path: impl AsRef<Path>,
        steps: u32,
    ) -> Result<Uuid, EngineError> {
        self.start_request(HashRequest::new(algorithm, path.as_ref(), steps))
    }

    pub fn start_request(&self, request: HashRequest) -> Result<Uuid, EngineError> {
        let mut inner = lock(&self.inner);

        if matches!(inner.run, RunState::Running { .. }) {
            return Err(EngineError::AlreadyRunning);
        }

        let hasher = self.registry.new_digest(&request.algorithm)?;
        let (file, total) = open_regular_file(&request.path)?;

        if request.steps < 1 {
            return Err(EngineError::InvalidStepCount {
                steps: request.steps,
            });
        }

        // The previous worker already delivered its terminal signal
        if let Some(previous) = inner.worker.take() {
            if previous.join().is_err() {
                warn!("previous hash worker panicked");
            }
        }

        let id = request.id;
        let cancel = Arc::new(AtomicBool::new(false));
        let run = Run {
            request,
            file,
            total,
            hasher,
            cancel: Arc::clone(&cancel),
            buffer_size: self.config.effective_buffer_size(),
        };
        let shared = Arc::clone(&self.inner);
        let sender = self.sender.clone();

        let handle = thread::Builder::new()
            .name("hash-worker".to_string())
            .spawn(move || {
                let guard = TerminalGuard::new(shared, sender.clone());
                let signal = run.execute(&sender);
                guard.deliver(signal);
            })
            .map_err(|source| EngineError::WorkerSpawn { source })?;

        inner.run = RunState::Running { id, cancel };
        inner.worker = Some(handle);
        Ok(id)
    }

    /// Request cooperative cancellation of the in-flight run, if any.
    ///
    /// Returns immediately. The run stops after its current read and reports
    /// `Cancelled`, unless it finished first.
    pub fn cancel(&self) {
        let inner = lock(&self.inner);
        if let RunState::Running { id, cancel } = &inner.run {
            debug!(run = %id, "cancellation requested");
            cancel.store(true, Ordering::Release);
        }
    }
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HashEngine {
    fn drop(&mut self) {
        let worker = {
            let mut inner = lock(&self.inner);
            if let RunState::Running { cancel, .. } = &inner.run {
                cancel.store(true, Ordering::Release);
            }
            inner.worker.take()
        };

        if let Some(handle) = worker {
            if handle.join().is_err() {
                warn!("hash worker panicked");
            }
        }
    }
}

fn open_regular_file(path: &Path) -> Result<(File, u64), EngineError> {
    let not_found = || EngineError::FileNotFound {
        path: path.to_path_buf(),
    };

    let file = File::open(path).map_err(|e| {
        debug!(path = %path.display(), error = %e, "cannot open file for hashing");
        not_found()
    })?;
    let metadata = file.metadata().map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    Ok((file, metadata.len()))
}

/// Delivers exactly one terminal signal for a run, even if the worker unwinds.
struct TerminalGuard {
    inner: Arc<Mutex<Inner>>,
    sender: Sender<HashSignal>,
    delivered: bool,
}

impl TerminalGuard {
    fn new(inner: Arc<Mutex<Inner>>, sender: Sender<HashSignal>) -> Self {
        TerminalGuard {
            inner,
            sender,
            delivered: false,
        }
    }

    fn deliver(mut self, signal: HashSignal) {
        self.finish(signal);
    }

    fn finish(&mut self, signal: HashSignal) {
        let mut inner = lock(&self.inner);
        let _ = self.sender.send(signal);
        inner.run = RunState::Idle;
        self.delivered = true;
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if !self.delivered {
            self.finish(HashSignal::Failed(EngineError::WorkerPanicked));
        }
    }
}

/// Everything one worker needs; owned by the worker thread.
struct Run {
    request: HashRequest,
    file: File,
    total: u64,
    hasher: Box<dyn ChecksumHasher>,
    cancel: Arc<AtomicBool>,
    buffer_size: usize,
}

impl Run {
    fn execute(self, sender: &Sender<HashSignal>) -> HashSignal {
        let Run {
            request,
            mut file,
            total,
            hasher,
            cancel,
            buffer_size,
        } = self;

        // `file` is dropped when this function returns, on every path
        run_to_signal(
            &request,
            &mut file,
            total,
            hasher,
            &cancel,
            buffer_size,
            sender,
        )
    }
}

fn run_to_signal<R: Read>(
    request: &HashRequest,
    reader: &mut R,
    total: u64,
    mut hasher: Box<dyn ChecksumHasher>,
    cancel: &AtomicBool,
    buffer_size: usize,
    sender: &Sender<HashSignal>,
) -> HashSignal {
    debug!(
        run = %request.id,
        algorithm = %request.algorithm,
        path = %request.path.display(),
        total,
        steps = request.steps,
        "hash run started"
    );

    let mut progress = StepProgress::new(total, request.steps);
    let outcome = digest_stream(
        reader,
        hasher.as_mut(),
        &mut progress,
        cancel,
        buffer_size,
        |value| {
            trace!(run = %request.id, value, "progress");
            let _ = sender.send(HashSignal::ProgressChanged(value));
        },
    );

    match outcome {
        Ok(StreamOutcome::Exhausted) => {
            let value = ChecksumValue::from_bytes(request.algorithm.clone(), &hasher.finalize());
            info!(run = %request.id, digest = %value.to_string_with_algo(), "hash run completed");
            HashSignal::Completed(value)
        }
        Ok(StreamOutcome::Cancelled) => {
            info!(run = %request.id, consumed = progress.consumed(), "hash run cancelled");
            HashSignal::Cancelled
        }
        Err(source) => {
            warn!(run = %request.id, error = %source, "hash run failed");
            HashSignal::Failed(EngineError::ReadError {
                path: request.path.clone(),
                source,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamOutcome {
    Exhausted,
    Cancelled,
}

/// Read `reader` to the end in `buffer_size` chunks, feeding `hasher`.
///
/// The cancellation flag is checked after every chunk. Finalization is left
/// to the caller.
fn digest_stream<R: Read>(
    reader: &mut R,
    hasher: &mut dyn ChecksumHasher,
    progress: &mut StepProgress,
    cancel: &AtomicBool,
    buffer_size: usize,
    mut on_progress: impl FnMut(u32),
) -> io::Result<StreamOutcome> {
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => return Ok(StreamOutcome::Exhausted),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        hasher.update(&buffer[..n]);

        if let Some(value) = progress.advance(n) {
            on_progress(value);
        }

        if cancel.load(Ordering::Acquire) {
            return Ok(StreamOutcome::Cancelled);
        }
    }
}
