//! Tuning knobs for the client synchronization layer.

use serde::Deserialize;
use std::time::Duration;

/// Synchronization tunables, loadable from an embedding application's
/// configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay before a reconciling fetch, in milliseconds.
    ///
    /// Gives the server's listing endpoints time to reflect the change the
    /// event announced before the authoritative re-read.
    pub reconcile_delay_ms: u64,
    /// Timeout applied to each reconciling fetch attempt, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Additional attempts after a failed reconciling fetch.
    pub fetch_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_delay_ms: 300,
            fetch_timeout_ms: 5_000,
            fetch_retries: 2,
        }
    }
}

impl SyncConfig {
    /// Returns the reconcile delay as a [`Duration`].
    #[must_use]
    pub const fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    /// Returns the fetch timeout as a [`Duration`].
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
