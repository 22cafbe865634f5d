//! Journal configuration.

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Default physical key prefix.
pub const DEFAULT_NAMESPACE: &str = "@";
/// Default commit debounce window.
pub const DEFAULT_COMMIT_DEBOUNCE_MS: u64 = 300;
/// Default history page size.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Tunables for the repository and session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Prefix in front of every physical key.
    pub namespace_prefix: String,
    /// Delay before a committed trip is written. `0` writes synchronously.
    pub commit_debounce_ms: u64,
    /// Number of trips per history page.
    pub window_size: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: DEFAULT_NAMESPACE.to_string(),
            commit_debounce_ms: DEFAULT_COMMIT_DEBOUNCE_MS,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl JournalConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Reads `TRIPLOG_NAMESPACE`, `TRIPLOG_COMMIT_DEBOUNCE_MS` and `TRIPLOG_WINDOW_SIZE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let namespace_prefix =
            env::var("TRIPLOG_NAMESPACE").unwrap_or(defaults.namespace_prefix);
        let commit_debounce_ms = env::var("TRIPLOG_COMMIT_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.commit_debounce_ms);
        let window_size = env::var("TRIPLOG_WINDOW_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.window_size);

        Self {
            namespace_prefix,
            commit_debounce_ms,
            window_size,
        }
    }

    /// Debounce window as a [`Duration`].
    pub fn commit_debounce(&self) -> Duration {
        Duration::from_millis(self.commit_debounce_ms)
    }

    /// Page size, never below one.
    pub fn effective_window_size(&self) -> usize {
        self.window_size.max(1)
    }
}
