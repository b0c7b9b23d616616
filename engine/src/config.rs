//! Tunables for the engine and the watcher.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default read buffer: large enough to amortize syscalls, small enough to
/// keep progress responsive.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// How long a rename-from event waits for its rename-to half.
pub const DEFAULT_RENAME_WINDOW: Duration = Duration::from_millis(100);

/// Hash engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes requested per read call
    pub buffer_size: usize,
}

impl EngineConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Buffer size actually used; never zero.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// File watcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Rename pairing window; a vanished file with no rename-to inside this
    /// window is reported as deleted
    pub rename_window: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            rename_window: DEFAULT_RENAME_WINDOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(EngineConfig::default().buffer_size, 65536);
        assert_eq!(
            WatcherConfig::default().rename_window,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());

        let config: EngineConfig = serde_json::from_str(r#"{"buffer_size": 4096}"#).unwrap();
        assert_eq!(config.effective_buffer_size(), 4096);

        let watcher: WatcherConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(watcher.rename_window, DEFAULT_RENAME_WINDOW);

        let text = serde_json::to_string(&WatcherConfig::default()).unwrap();
        let back: WatcherConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, WatcherConfig::default());
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        let config = EngineConfig::default().with_buffer_size(0);
        assert_eq!(config.effective_buffer_size(), 1);
    }
}
