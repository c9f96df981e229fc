//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of tracks materialized on each side of the current one.
pub const DEFAULT_TRACK_WINDOW: usize = 5;

/// Default period of the remote poll and of position interpolation.
pub const DEFAULT_POLL_PERIOD_MS: u64 = 1000;

/// A "previous track" request beyond this elapsed position restarts the
/// current track instead of moving back.
pub const PREVIOUS_RESTART_THRESHOLD_MS: u64 = 5000;

/// Tunable parameters of the playback engine.
///
/// All fields default to sensible values, so a partial deserialization
/// (or `ConnectConfig::default()`) always yields a working configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Tracks materialized before and after the current one.
    pub track_window: usize,
    /// Period of the remote poll and of position interpolation, in
    /// milliseconds.
    pub poll_period_ms: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        ConnectConfig {
            track_window: DEFAULT_TRACK_WINDOW,
            poll_period_ms: DEFAULT_POLL_PERIOD_MS,
        }
    }
}

impl ConnectConfig {
    /// Poll period as a [`Duration`].
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
