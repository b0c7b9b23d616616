//! File presence watcher.
//!
//! Watches a single file for deletion and rename using the notify crate.
//! The parent directory is watched non-recursively and raw events are
//! forwarded to a listener thread, which filters them down to the tracked
//! file and emits `WatchSignal`s:
//! - `Deleted` once, after which the watcher is inactive
//! - `Renamed(new_path)`, after which the new path is tracked
//!
//! A rename whose destination is outside the watched directory only produces
//! a rename-from event. If no rename-to follows within the configured window
//! and the file is gone, it is reported as `Deleted`.

use crate::config::WatcherConfig;
use crate::error::EngineError;
use crate::model::{WatchSignal, WatchTarget};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

enum ListenerMsg {
    Fs(notify::Result<Event>),
    Stop,
}

fn lock(target: &Mutex<WatchTarget>) -> MutexGuard<'_, WatchTarget> {
    target.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Watches one file at a time for deletion and rename.
pub struct FileWatcher {
    config: WatcherConfig,
    sender: Sender<WatchSignal>,
    receiver: Receiver<WatchSignal>,
    target: Arc<Mutex<WatchTarget>>,
    active: Option<ActiveWatch>,
}

impl FileWatcher {
    pub fn new() -> Self {
        Self::with_config(WatcherConfig::default())
    }

    pub fn with_config(config: WatcherConfig) -> Self {
        let (sender, receiver) = unbounded();
        FileWatcher {
            config,
            sender,
            receiver,
            target: Arc::new(Mutex::new(WatchTarget::none())),
            active: None,
        }
    }

    /// Receiver for every signal this watcher emits.
    pub fn signals(&self) -> Receiver<WatchSignal> {
        self.receiver.clone()
    }

    /// Returns true while a target is being observed.
    pub fn is_active(&self) -> bool {
        lock(&self.target).active
    }

    /// The tracked path, following renames; `None` when inactive.
    pub fn target(&self) -> Option<PathBuf> {
        let target = lock(&self.target);
        target.active.then(|| target.path.clone())
    }

    /// Stop watching; equivalent to `set_target("")`.
    pub fn clear(&mut self) {
        self.active = None;
        *lock(&self.target) = WatchTarget::none();
    }

    /// Replace the watched file.
    ///
    /// An empty or nonexistent path leaves the watcher inactive; that is not
    /// an error. The previous listener is stopped and joined before this
    /// returns.
    ///
    /// # Errors
    /// `EngineError::Watch` if the notification backend cannot watch the
    /// file's directory.
    pub fn set_target(&mut self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        self.clear();

        let path = path.as_ref();
        let Some(tracked) = resolve_existing_file(path) else {
            debug!(path = %path.display(), "watch target does not exist; watcher inactive");
            return Ok(());
        };
        self.arm(tracked)
    }

    /// Watch an already resolved absolute path.
    fn arm(&mut self, tracked: PathBuf) -> Result<(), EngineError> {
        let directory = tracked
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let (control, events) = unbounded();
        let forward = control.clone();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = forward.send(ListenerMsg::Fs(res));
            },
            Config::default(),
        )
        .map_err(|source| EngineError::Watch {
            path: tracked.clone(),
            source,
        })?;

        let listener = Listener {
            tracked: tracked.clone(),
            pending: None,
            window: self.config.rename_window,
            target: Arc::clone(&self.target),
            signals: self.sender.clone(),
        };
        let handle = thread::Builder::new()
            .name("file-watcher".to_string())
            .spawn(move || listener.run(events))
            .map_err(|e| EngineError::Watch {
                path: tracked.clone(),
                source: notify::Error::io(e),
            })?;

        let mut active = ActiveWatch {
            watcher: Some(watcher),
            control,
            listener: Some(handle),
        };

        // Active before events can arrive, so a delete seen by the listener
        // is never overwritten here
        *lock(&self.target) = WatchTarget::active(&tracked);

        if let Some(watcher) = active.watcher.as_mut() {
            if let Err(source) = watcher.watch(&directory, RecursiveMode::NonRecursive) {
                *lock(&self.target) = WatchTarget::none();
                return Err(EngineError::Watch {
                    path: directory,
                    source,
                });
            }
        }

        // Deleted before the backend was watching: no event will ever arrive
        if !tracked.exists() {
            debug!(path = %tracked.display(), "watch target vanished while arming");
            *lock(&self.target) = WatchTarget::none();
            return Ok(());
        }

        debug!(path = %tracked.display(), "watching file");
        self.active = Some(active);
        Ok(())
    }
}

impl Default for FileWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute path of an existing regular file, keeping the final component
/// as given (a symlink is watched under its own name).
fn resolve_existing_file(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() || !path.is_file() {
        return None;
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = parent.canonicalize().ok()?;
    Some(parent.join(name))
}

/// Backend handle plus listener thread for one target.
struct ActiveWatch {
    watcher: Option<RecommendedWatcher>,
    control: Sender<ListenerMsg>,
    listener: Option<JoinHandle<()>>,
}

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        // Stop the backend first so no new events race the shutdown
        drop(self.watcher.take());
        let _ = self.control.send(ListenerMsg::Stop);
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                warn!("file watcher listener panicked");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRename {
    deadline: Instant,
    tracker: Option<usize>,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Listener {
    tracked: PathBuf,
    pending: Option<PendingRename>,
    window: Duration,
    target: Arc<Mutex<WatchTarget>>,
    signals: Sender<WatchSignal>,
}

impl Listener {
    fn run(mut self, events: Receiver<ListenerMsg>) {
        loop {
            let msg = match self.pending {
                Some(pending) => match events.recv_deadline(pending.deadline) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => {
                        if self.resolve_pending() == Flow::Stop {
                            return;
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                },
                None => match events.recv() {
                    Ok(msg) => msg,
                    Err(_) => return,
                },
            };

            match msg {
                ListenerMsg::Stop => return,
                ListenerMsg::Fs(Ok(event)) => {
                    if self.handle(event) == Flow::Stop {
                        return;
                    }
                }
                ListenerMsg::Fs(Err(e)) => warn!(error = %e, "file watch backend error"),
            }
        }
    }

    fn handle(&mut self, event: Event) -> Flow {
        let tracker = event.tracker();
        let paths = event.paths;

        match event.kind {
            EventKind::Remove(_) => {
                if paths.iter().any(|p| *p == self.tracked) {
                    return self.deleted();
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if paths.len() >= 2 && paths[0] == self.tracked {
                    self.renamed(paths[1].clone());
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                if paths.first() == Some(&self.tracked) {
                    self.begin_rename(tracker);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                if let (Some(pending), Some(new_path)) = (self.pending, paths.first()) {
                    let same_move = match (pending.tracker, tracker) {
                        (Some(a), Some(b)) => a == b,
                        _ => true,
                    };
                    if same_move {
                        self.renamed(new_path.clone());
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                // Backends that cannot tell the two halves apart report each
                // path separately
                for path in paths {
                    if path == self.tracked {
                        if !path.exists() {
                            self.begin_rename(tracker);
                        }
                    } else if self.pending.is_some() && path.exists() {
                        self.renamed(path);
                    }
                }
            }
            _ => {}
        }

        Flow::Continue
    }

    fn begin_rename(&mut self, tracker: Option<usize>) {
        self.pending = Some(PendingRename {
            deadline: Instant::now() + self.window,
            tracker,
        });
    }

    fn resolve_pending(&mut self) -> Flow {
        self.pending = None;
        if self.tracked.exists() {
            Flow::Continue
        } else {
            self.deleted()
        }
    }

    fn renamed(&mut self, new_path: PathBuf) {
        info!(from = %self.tracked.display(), to = %new_path.display(), "watched file renamed");
        self.pending = None;
        self.tracked = new_path.clone();
        lock(&self.target).path = new_path.clone();
        let _ = self.signals.send(WatchSignal::Renamed(new_path));
    }

    fn deleted(&mut self) -> Flow {
        info!(path = %self.tracked.display(), "watched file deleted");
        self.pending = None;
        lock(&self.target).active = false;
        let _ = self.signals.send(WatchSignal::Deleted);
        Flow::Stop
    }
}
