//! Error types for the playback engine.

use thiserror::Error;

/// Result type for pmoconnect operations.
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Errors surfaced by the engine handle.
///
/// Transport and local-engine failures never reach this type: the engine
/// absorbs them into degraded state and logs them. What remains are
/// lifecycle errors of the engine task itself.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The engine task is gone; commands can no longer be delivered.
    #[error("player engine is no longer running")]
    EngineClosed,

    /// The engine task ended abnormally.
    #[error("player engine task failed: {0}")]
    Join(String),
}

// ============================================================================
// Tests
// ============================================================================
