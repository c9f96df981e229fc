//! Playback context: what collection is playing and what surrounds the
//! current track.
//!
//! Both authorities feed the same pipeline: their snapshots are reduced
//! to a [`ContextSeed`], the seed's collection is fetched through the
//! remote service and [`build_context`] windows it around the current
//! track. Contexts are immutable once built; the engine replaces them
//! wholesale instead of patching them in place.

use tracing::warn;

use pmospotify::{
    ArtistObject, CollectionKind, RemotePlaybackState, TrackObject, DEFAULT_BASE_URL,
};

use crate::local::LocalPlaybackState;
use crate::source::RemoteSource;
use crate::window::compute_window;

/// Kind of collection a context URI points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind {
    Album,
    Playlist,
    /// A context the engine cannot resolve to a track listing (artist
    /// radio, show, ...).
    Other(String),
    /// No context at all.
    Unknown,
}

impl ContextKind {
    /// Parses the kind segment of a `spotify:<kind>:<id>` URI.
    pub fn from_uri(uri: &str) -> Self {
        match uri.split(':').nth(1) {
            Some("album") => ContextKind::Album,
            Some("playlist") => ContextKind::Playlist,
            Some(other) if !other.is_empty() => ContextKind::Other(other.to_string()),
            _ => ContextKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContextKind::Album => "album",
            ContextKind::Playlist => "playlist",
            ContextKind::Other(kind) => kind,
            ContextKind::Unknown => "unknown",
        }
    }

    /// The collection endpoint this kind resolves through, `None` for
    /// kinds the remote service cannot expand into a track listing.
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        match self {
            ContextKind::Album => Some(CollectionKind::Album),
            ContextKind::Playlist => Some(CollectionKind::Playlist),
            _ => None,
        }
    }
}

/// The id segment of a `spotify:<kind>:<id>` URI.
fn context_id_from_uri(uri: &str) -> Option<String> {
    uri.split(':')
        .nth(2)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Canonical collection endpoint for a context URI, for snapshots that
/// do not carry one (local engine snapshots never do).
fn default_collection_href(uri: &str) -> Option<String> {
    let kind = ContextKind::from_uri(uri);
    kind.collection_kind()?;
    let id = context_id_from_uri(uri)?;
    Some(format!("{DEFAULT_BASE_URL}/{}s/{id}", kind.as_str()))
}

/// Minimal album display data carried by a [`ContextTrack`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumRef {
    pub name: String,
    /// Largest cover image, when any.
    pub image_url: Option<String>,
}

/// A track as displayed in the navigable window.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextTrack {
    /// Track id, empty for local files.
    pub id: String,
    pub uri: String,
    pub name: String,
    pub artists: Vec<ArtistObject>,
    pub album: AlbumRef,
    /// Absolute index within the parent collection, `None` when the
    /// track could not be located in it.
    pub position: Option<usize>,
}

impl ContextTrack {
    /// Maps a wire track to display form; `position` starts unset.
    pub fn from_track(track: &TrackObject) -> Self {
        ContextTrack {
            id: track.id.clone().unwrap_or_default(),
            uri: track.uri.clone(),
            name: track.name.clone(),
            artists: track.artists.clone(),
            album: AlbumRef {
                name: track.album.name.clone(),
                image_url: track.album.images.first().map(|image| image.url.clone()),
            },
            position: None,
        }
    }

    fn at_position(track: &TrackObject, position: usize) -> Self {
        let mut out = Self::from_track(track);
        out.position = Some(position);
        out
    }
}

/// Snapshot of the playing collection and its navigable window.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Collection id from the context URI.
    pub id: Option<String>,
    /// Collection display name.
    pub name: String,
    /// Context URI, the identity compared during reconciliation.
    pub uri: Option<String>,
    /// API endpoint the collection was (or would be) fetched from.
    pub url: Option<String>,
    pub kind: ContextKind,
    /// Total tracks in the resolved collection, 0 while unresolved.
    pub length: usize,
    pub current: Option<ContextTrack>,
    /// Tracks before the current one, oldest first.
    pub prev: Vec<ContextTrack>,
    /// Tracks after the current one, closest first.
    pub next: Vec<ContextTrack>,
}

impl Context {
    /// URI of the current track, the other identity compared during
    /// reconciliation.
    pub fn current_uri(&self) -> Option<&str> {
        self.current.as_ref().map(|track| track.uri.as_str())
    }
}

/// Normalized ingestion form shared by both snapshot shapes.
///
/// Remote playback state and local engine snapshots disagree on nesting
/// and field names; both reduce to this before the single build path
/// runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSeed {
    pub uri: Option<String>,
    /// Collection endpoint; derived from the URI when the snapshot does
    /// not carry one.
    pub href: Option<String>,
    /// Display name already known upstream. Local snapshots carry the
    /// collection name in their metadata; remote builds leave this unset
    /// and take the fetched collection's name.
    pub name_hint: Option<String>,
    pub current: Option<TrackObject>,
}

impl ContextSeed {
    pub fn from_remote(state: &RemotePlaybackState) -> Self {
        ContextSeed {
            uri: state.context.as_ref().map(|context| context.uri.clone()),
            href: state.context.as_ref().and_then(|context| context.href.clone()),
            name_hint: None,
            current: state.item.clone(),
        }
    }

    pub fn from_local(state: &LocalPlaybackState) -> Self {
        let uri = state.context.uri.clone();
        let href = uri.as_deref().and_then(default_collection_href);
        ContextSeed {
            uri,
            href,
            name_hint: state.context.name.clone(),
            current: state.track_window.current_track.clone(),
        }
    }
}

/// Builds a [`Context`] from a seed, resolving the collection through
/// `source` and windowing it around the seed's current track.
///
/// Every failure mode degrades instead of failing: an unsupported or
/// absent context kind, a failed collection fetch and a current track
/// missing from the fetched listing all yield a valid context with empty
/// windows. Degraded contexts are retried or left alone by the staleness
/// rules in [`reconcile`](crate::reconcile).
pub async fn build_context<S>(seed: ContextSeed, source: &S, window: usize) -> Context
where
    S: RemoteSource + ?Sized,
{
    let kind = seed
        .uri
        .as_deref()
        .map(ContextKind::from_uri)
        .unwrap_or(ContextKind::Unknown);

    let mut context = Context {
        id: seed.uri.as_deref().and_then(context_id_from_uri),
        name: seed.name_hint.clone().unwrap_or_default(),
        uri: seed.uri.clone(),
        url: seed.href.clone(),
        kind,
        length: 0,
        current: seed.current.as_ref().map(ContextTrack::from_track),
        prev: Vec::new(),
        next: Vec::new(),
    };

    let Some(collection_kind) = context.kind.collection_kind() else {
        return context;
    };
    let Some(href) = seed.href.as_deref() else {
        return context;
    };

    let collection = match source.fetch_collection(href, collection_kind).await {
        Ok(collection) => collection,
        Err(err) => {
            warn!(
                uri = seed.uri.as_deref().unwrap_or(""),
                "Collection fetch failed: {err}"
            );
            return context;
        }
    };

    if context.name.is_empty() {
        context.name = collection.name.clone();
    }
    context.length = collection.tracks.len();

    let current_id = seed.current.as_ref().and_then(|track| track.id.as_deref());
    let computed = compute_window(&collection.tracks, current_id, window);

    if let (Some(position), Some(current)) = (computed.position, context.current.as_mut()) {
        current.position = Some(position);
    }
    context.prev = computed
        .prev
        .iter()
        .map(|&index| ContextTrack::at_position(&collection.tracks[index], index))
        .collect();
    context.next = computed
        .next
        .iter()
        .map(|&index| ContextTrack::at_position(&collection.tracks[index], index))
        .collect();

    context
}

// ============================================================================
// Tests
// ============================================================================
