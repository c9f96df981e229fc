//! Wire models for the Spotify Web API player endpoints.
//!
//! Every struct here mirrors a JSON payload shape. Fields the player logic
//! does not consume are omitted; tolerant `#[serde(default)]` markers keep
//! deserialization working when the API leaves optional fields out.

use serde::{Deserialize, Serialize};

// ============================================================================
// Playback state (GET /me/player)
// ============================================================================

/// Snapshot of the user's current playback, as reported by the remote
/// service. `None` fields are genuinely nullable on the wire (private
/// sessions, local files, podcasts played on restricted devices).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemotePlaybackState {
    /// Playback context (album/playlist/...); null when playing from
    /// e.g. liked songs or a search result.
    #[serde(default)]
    pub context: Option<ContextRef>,
    /// Device the playback currently happens on.
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub is_playing: bool,
    /// Currently playing track; null between tracks or for ad breaks.
    #[serde(default)]
    pub item: Option<TrackObject>,
    /// Progress into the current item, milliseconds. Nullable.
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub repeat_state: RepeatState,
    #[serde(default)]
    pub shuffle_state: bool,
}

/// Reference to the collection a playback session was started from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContextRef {
    pub uri: String,
    /// API endpoint resolving the full collection.
    #[serde(default)]
    pub href: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A playback target known to the remote service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Device {
    /// Null for devices the API refuses to expose (restricted speakers).
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,
}

// ============================================================================
// Tracks and collections
// ============================================================================

/// A full track object as returned inside playback state and collections.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrackObject {
    /// Null for local files.
    #[serde(default)]
    pub id: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub album: AlbumObject,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArtistObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlbumObject {
    #[serde(default)]
    pub name: String,
    /// Cover art, largest first.
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageObject {
    pub url: String,
}

/// Which collection endpoint a context URI resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Album,
    Playlist,
}

/// An album or playlist normalized to a flat, ordered track list.
///
/// Playlist entries wrap their track one level deeper than album entries
/// and may be null (removed episodes, unavailable tracks); normalization
/// unwraps and drops them so consumers always see plain [`TrackObject`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub name: String,
    pub tracks: Vec<TrackObject>,
}

/// One page of a paginated collection listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AlbumPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks: Page<TrackObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlaylistPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks: Page<PlaylistItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PlaylistItem {
    #[serde(default)]
    pub track: Option<TrackObject>,
}

impl From<AlbumPayload> for Collection {
    fn from(payload: AlbumPayload) -> Self {
        Collection {
            name: payload.name,
            tracks: payload.tracks.items,
        }
    }
}

impl From<PlaylistPayload> for Collection {
    fn from(payload: PlaylistPayload) -> Self {
        Collection {
            name: payload.name,
            tracks: payload
                .tracks
                .items
                .into_iter()
                .filter_map(|item| item.track)
                .collect(),
        }
    }
}

// ============================================================================
// Repeat mode
// ============================================================================

/// Repeat mode, in the order the player cycles through it.
///
/// Unknown wire values fall back to `Off` rather than failing the whole
/// playback-state parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    Context,
    Track,
    #[default]
    #[serde(other)]
    Off,
}

impl RepeatState {
    /// Next mode in the OFF -> CONTEXT -> TRACK -> OFF cycle.
    pub fn next(self) -> Self {
        match self {
            RepeatState::Off => RepeatState::Context,
            RepeatState::Context => RepeatState::Track,
            RepeatState::Track => RepeatState::Off,
        }
    }

    /// Wire representation, as used by the repeat command endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatState::Off => "off",
            RepeatState::Context => "context",
            RepeatState::Track => "track",
        }
    }
}

// ============================================================================
// Play command body (PUT /me/player/play)
// ============================================================================

/// Body of the remote "play" command.
///
/// Without `context_uri` the command resumes the current item at
/// `position_ms`; with it, playback starts inside that collection at the
/// given `offset`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayTarget {
    pub position_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
}

impl PlayTarget {
    /// Resume the current item at `position_ms`, no context change.
    pub fn resume_at(position_ms: u64) -> Self {
        PlayTarget {
            position_ms,
            ..PlayTarget::default()
        }
    }

    /// Start `context_uri` from the beginning of the given offset.
    pub fn context(context_uri: impl Into<String>, offset: Option<PlayOffset>) -> Self {
        PlayTarget {
            position_ms: 0,
            context_uri: Some(context_uri.into()),
            offset,
        }
    }
}

/// Offset into a play context: either a zero-based track index or a
/// track URI. Serializes to `{"position": n}` / `{"uri": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayOffset {
    Position(usize),
    Uri(String),
}
