//! Transient playback state.

use pmospotify::RepeatState;

/// Mutable playback attributes, updated by whichever authority produced
/// the latest observation.
///
/// All writes happen inside the engine's single reducer task; consumers
/// only ever see complete snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    /// True until the local engine reports ready, and again after it
    /// goes away.
    pub disabled: bool,
    /// Duration of the current item, in milliseconds.
    pub duration: u64,
    /// True when the local engine owns transport control.
    pub local: bool,
    /// True when playback is paused or nothing is playing.
    pub paused: bool,
    /// Position within the current item, in milliseconds. Advanced by
    /// interpolation between discrete local events.
    pub position: u64,
    /// Repeat mode as last observed or optimistically set.
    pub repeat: RepeatState,
    /// Shuffle flag as last observed or optimistically set.
    pub shuffle: bool,
    /// Volume percent, `0..=100`.
    pub volume: u8,
}

impl Default for PlayerState {
    fn default() -> Self {
        PlayerState {
            disabled: true,
            duration: 0,
            local: true,
            paused: true,
            position: 0,
            repeat: RepeatState::Off,
            shuffle: false,
            volume: 50,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
