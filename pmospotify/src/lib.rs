//! # pmospotify
//!
//! Rust client for the Spotify Web API player endpoints.
//!
//! This crate provides the transport layer used by `pmoconnect`: typed
//! wire models, a bearer-token HTTP client and the player command set
//! (play/pause/seek/repeat/shuffle/volume/device transfer). It performs
//! no scheduling or state reconciliation of its own.
//!
//! ## Features
//!
//! - Current playback state and device enumeration
//! - Album/playlist resolution to a normalized track list
//! - Transport commands with optional device targeting
//! - Configurable base URL for proxy deployments and tests
//!
//! ## Example
//!
//! ```no_run
//! use pmospotify::{PlayOffset, PlayTarget, SpotifyClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpotifyClient::new("BQD...token")?;
//!
//!     // Start an album from its fourth track.
//!     let target = PlayTarget::context(
//!         "spotify:album:41MnTivkwTO3UUJ8DrqEJJ",
//!         Some(PlayOffset::Position(3)),
//!     );
//!     client.play(&target, None).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod models;

pub use client::{SpotifyClient, SpotifyClientBuilder, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{Result, SpotifyError};
pub use models::{
    AlbumObject, ArtistObject, Collection, CollectionKind, ContextRef, Device, ImageObject,
    Page, PlayOffset, PlayTarget, RemotePlaybackState, RepeatState, TrackObject,
};
