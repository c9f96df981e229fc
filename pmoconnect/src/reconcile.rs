//! Staleness detection for the held context.
//!
//! Each observed snapshot, whether it came from the remote poll or from
//! a local engine event, is compared against the held context. Only a
//! stale context triggers the (fetch-heavy) rebuild; a steady stream of
//! identical snapshots costs nothing beyond the comparison.

use crate::context::Context;

/// Outcome of comparing an observed snapshot against the held context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Staleness {
    /// The observed context identity differs from the held one.
    pub context_changed: bool,
    /// The observed current-track identity differs from the held one.
    pub track_changed: bool,
    /// A rebuild could produce a fuller window than the held one.
    pub underfilled: bool,
}

impl Staleness {
    /// Whether any of the three conditions asks for a rebuild.
    pub fn is_stale(&self) -> bool {
        self.context_changed || self.track_changed || self.underfilled
    }
}

/// Compares observed identities against the held context.
///
/// Identities are compared by URI, not structurally: cosmetic changes in
/// a snapshot must not trigger a rebuild. `None` on either side only
/// matches `None` on the other.
pub fn evaluate(
    held: Option<&Context>,
    observed_context_uri: Option<&str>,
    observed_track_uri: Option<&str>,
    window: usize,
) -> Staleness {
    let held_context_uri = held.and_then(|context| context.uri.as_deref());
    let held_track_uri = held.and_then(|context| context.current_uri());

    Staleness {
        context_changed: observed_context_uri != held_context_uri,
        track_changed: observed_track_uri != held_track_uri,
        underfilled: held
            .map(|context| is_underfilled(context, window))
            .unwrap_or(false),
    }
}

/// Whether a rebuild could produce a fuller window than `context` holds.
///
/// Collections that can never fill a window are exempt: a single-track
/// context has legitimately empty windows, and a zero-length context is
/// only worth retrying when its kind is actually fetchable (a failed
/// album fetch should be retried, a podcast context never resolves).
pub fn is_underfilled(context: &Context, window: usize) -> bool {
    match context.length {
        0 => context.kind.collection_kind().is_some(),
        1 => false,
        _ => context.next.len() < window || context.prev.len() < window,
    }
}

// ============================================================================
// Tests
// ============================================================================
