//! Circular windowing over a track collection.
//!
//! Given a collection, the identity of the current track and a window
//! size, this module produces the collection indices of the tracks shown
//! before and after the current one. The collection is treated as
//! circular: a window larger than the remaining tracks wraps around and
//! repeats tracks as needed, so navigation never meets a negative or
//! out-of-range index.

use pmospotify::TrackObject;

/// Result of [`compute_window`].
///
/// Every produced index is taken modulo the collection length, so a
/// window entry's value is directly an index into the collection.
/// `prev` is ordered oldest first (the entry closest to the current
/// track is last); `next` is ordered closest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackWindow {
    /// Index of the current track, `None` when it could not be located.
    pub position: Option<usize>,
    /// Indices of the tracks before the current one.
    pub prev: Vec<usize>,
    /// Indices of the tracks after the current one.
    pub next: Vec<usize>,
}

/// Computes the circular window around `current_id` in `tracks`.
///
/// An unknown or absent `current_id` yields `position = None` and empty
/// windows: the track may have been removed from the collection, or the
/// fetch may have returned a partial listing. A single-track collection
/// also yields empty windows, since the only candidate neighbour would
/// be the current track itself. Otherwise both windows hold exactly
/// `window` entries; when the collection is shorter than the window the
/// walk wraps and tracks repeat.
pub fn compute_window(tracks: &[TrackObject], current_id: Option<&str>, window: usize) -> TrackWindow {
    let len = tracks.len();
    let position = current_id
        .and_then(|id| tracks.iter().position(|track| track.id.as_deref() == Some(id)));

    let Some(position) = position else {
        return TrackWindow::default();
    };
    if len <= 1 {
        return TrackWindow {
            position: Some(position),
            prev: Vec::new(),
            next: Vec::new(),
        };
    }

    let len_i = len as isize;
    let prev = (0..window)
        .map(|i| (position as isize - (window - i) as isize).rem_euclid(len_i) as usize)
        .collect();
    let next = (1..=window).map(|offset| (position + offset) % len).collect();

    TrackWindow {
        position: Some(position),
        prev,
        next,
    }
}

// ============================================================================
// Tests
// ============================================================================
