//! Local playback engine seam.
//!
//! The in-process playback engine (the vendor SDK embedded alongside the
//! application) is adapted behind the [`LocalPlayer`] trait for direct
//! transport commands, plus a stream of [`LocalEvent`]s pushed into the
//! engine through [`LocalEventSender`](crate::player::LocalEventSender).
//! The engine never talks to the SDK in any other way.

use async_trait::async_trait;
use pmospotify::{RepeatState, TrackObject};
use thiserror::Error;

/// Errors surfaced by a [`LocalPlayer`] adapter.
#[derive(Debug, Error)]
pub enum LocalPlayerError {
    /// The underlying engine is not connected or not ready.
    #[error("local engine unavailable")]
    Unavailable,

    /// Any other adapter-specific failure.
    #[error("local engine error: {0}")]
    Other(String),
}

/// Direct transport commands understood by the local playback engine.
///
/// Implementations are thin adapters over the vendor SDK. Calls are
/// issued fire-and-forget by the engine; failures are logged, never
/// propagated.
#[async_trait]
pub trait LocalPlayer: Send + Sync {
    /// Resumes playback.
    async fn resume(&self) -> Result<(), LocalPlayerError>;

    /// Pauses playback.
    async fn pause(&self) -> Result<(), LocalPlayerError>;

    /// Seeks within the current track.
    async fn seek(&self, position_ms: u64) -> Result<(), LocalPlayerError>;

    /// Skips to the next track in the engine's own queue.
    async fn next_track(&self) -> Result<(), LocalPlayerError>;

    /// Moves back to the previous track in the engine's own queue.
    async fn previous_track(&self) -> Result<(), LocalPlayerError>;

    /// Current volume as the engine reports it, in `0.0..=1.0`.
    async fn volume(&self) -> Result<f64, LocalPlayerError>;
}

/// Playback context as the local engine reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalContextRef {
    /// Context URI, `None` when the engine plays outside any context.
    pub uri: Option<String>,
    /// Collection display name from the engine's metadata block.
    pub name: Option<String>,
}

/// The local engine's native short window around the current track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalTrackWindow {
    pub current_track: Option<TrackObject>,
    pub next_tracks: Vec<TrackObject>,
    pub previous_tracks: Vec<TrackObject>,
}

/// Discrete playback snapshot pushed by the local engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalPlaybackState {
    pub context: LocalContextRef,
    /// Track duration in milliseconds.
    pub duration: u64,
    /// Playback position in milliseconds.
    pub position: u64,
    pub paused: bool,
    pub repeat: RepeatState,
    pub shuffle: bool,
    pub track_window: LocalTrackWindow,
}

/// Events emitted by the local engine adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEvent {
    /// The engine came up and registered itself as a playback device.
    Ready { device_id: String },

    /// The engine went away; its device id is no longer valid.
    NotReady,

    /// A discrete playback state change. `None` means the engine has
    /// nothing to report because playback moved elsewhere.
    StateChanged(Option<LocalPlaybackState>),

    /// The engine failed to initialize.
    InitializationError(String),

    /// The engine could not authenticate; re-auth is the embedder's
    /// concern, the engine only records the failure.
    AuthenticationError(String),

    /// Account-level refusal, e.g. an insufficient subscription tier.
    AccountError(String),
}
