//! # pmoconnect - Spotify Playback Context Engine
//!
//! `pmoconnect` keeps a coherent "now playing" picture of a Spotify
//! account: which collection is playing, the track at its center, and a
//! navigable window of the tracks around it. It reconciles two
//! authorities that both report playback state:
//!
//! - the **local engine**, an in-process playback SDK that pushes
//!   discrete state events while it owns playback, and
//! - the **remote service**, the Spotify Web API, polled while playback
//!   happens on some other device.
//!
//! ## Features
//!
//! - **Dual authority**: local events and remote polls feed one reducer;
//!   exactly one source of truth is active at a time
//! - **Navigable context**: album/playlist windows computed circularly,
//!   so next/previous never fall off the edge of a collection
//! - **Cheap reconciliation**: collections are only refetched when the
//!   context or track identity actually changed
//! - **Optimistic navigation**: next/previous rotate the held window and
//!   update consumers immediately, ahead of remote confirmation
//! - **Async/Await**: one tokio task owns all mutable state; handles are
//!   cheap clones
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pmoconnect::{ConnectConfig, PlayerEvent, SpotifyPlayer};
//! use pmospotify::SpotifyClient;
//!
//! # struct MyPlayerAdapter;
//! # #[async_trait::async_trait]
//! # impl pmoconnect::LocalPlayer for MyPlayerAdapter {
//! #     async fn resume(&self) -> Result<(), pmoconnect::LocalPlayerError> { Ok(()) }
//! #     async fn pause(&self) -> Result<(), pmoconnect::LocalPlayerError> { Ok(()) }
//! #     async fn seek(&self, _: u64) -> Result<(), pmoconnect::LocalPlayerError> { Ok(()) }
//! #     async fn next_track(&self) -> Result<(), pmoconnect::LocalPlayerError> { Ok(()) }
//! #     async fn previous_track(&self) -> Result<(), pmoconnect::LocalPlayerError> { Ok(()) }
//! #     async fn volume(&self) -> Result<f64, pmoconnect::LocalPlayerError> { Ok(1.0) }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpotifyClient::new("access-token")?;
//!     let adapter = MyPlayerAdapter; // your SDK bridge
//!
//!     let (player, handle, _local_events) =
//!         SpotifyPlayer::spawn(Arc::new(client), Arc::new(adapter), ConnectConfig::default());
//!
//!     // React to context changes.
//!     let mut events = handle.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let PlayerEvent::ContextChanged(Some(context)) = event {
//!             println!("Now playing from: {}", context.name);
//!             if let Some(track) = &context.current {
//!                 println!("  current: {}", track.name);
//!             }
//!         }
//!     }
//!
//!     handle.shutdown().await?;
//!     player.wait().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`player`]: the engine task, its command handle and event stream
//! - [`context`]: context types and the unified snapshot-to-context
//!   builder
//! - [`window`]: circular windowing over a track collection
//! - [`reconcile`]: staleness rules deciding when a context is rebuilt
//! - [`state`]: the transient playback state both authorities update
//! - [`local`]: the seam for the in-process playback SDK
//! - [`source`]: the seam for the remote service, implemented by
//!   [`pmospotify::SpotifyClient`]
//! - [`config`]: window size and poll period
//! - [`error`]: error types and result alias
//!
//! ## How Reconciliation Works
//!
//! Every observed snapshot, local or remote, is reduced to two
//! identities: the context URI and the current track URI. If either
//! differs from the held context, or the held window holds fewer tracks
//! than a rebuild could produce, the collection is fetched once and a
//! fresh context is installed atomically. Identical snapshots are free:
//! no fetch, no rebuild, no notification.
//!
//! ## Scheduling
//!
//! Two timers, never running together:
//!
//! - while the local engine plays, a **seek** timer interpolates the
//!   position between its discrete events;
//! - while playback is remote, a **state** timer polls the Web API.
//!
//! Both run at the configured poll period and are re-derived from
//! playback state after every reducer step.

pub mod config;
pub mod context;
pub mod error;
pub mod local;
pub mod player;
pub mod reconcile;
pub mod source;
pub mod state;
pub mod window;

// Re-exports for convenience
pub use config::{
    ConnectConfig, DEFAULT_POLL_PERIOD_MS, DEFAULT_TRACK_WINDOW, PREVIOUS_RESTART_THRESHOLD_MS,
};
pub use context::{build_context, AlbumRef, Context, ContextKind, ContextSeed, ContextTrack};
pub use error::{ConnectError, Result};
pub use local::{
    LocalContextRef, LocalEvent, LocalPlaybackState, LocalPlayer, LocalPlayerError,
    LocalTrackWindow,
};
pub use player::{
    LocalEventSender, PlayerCommand, PlayerEvent, PlayerHandle, SpotifyPlayer,
};
pub use reconcile::Staleness;
pub use source::{RemoteCommand, RemoteSource};
pub use state::PlayerState;
pub use window::{compute_window, TrackWindow};

// Wire models consumers handle directly.
pub use pmospotify::{Device, PlayOffset, PlayTarget, RepeatState};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
