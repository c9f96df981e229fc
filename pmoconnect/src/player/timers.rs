//! Named repeating timers driving interpolation and polling.
//!
//! The engine runs at most two timers: "seek" advances the displayed
//! position between discrete local events, "state" polls the remote
//! service. Which ones run is a pure function of playback state, applied
//! after every reducer step.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

use crate::state::PlayerState;

/// Which timers should run, derived from playback state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TimerPolicy {
    /// Position interpolation while the local engine plays.
    pub seek: bool,
    /// Remote polling while playback is not local.
    pub state: bool,
}

impl TimerPolicy {
    /// Interpolate while the local engine plays, poll while playback is
    /// remote. Mutual exclusivity falls out of the `local` flag; local
    /// and paused stops both.
    pub fn for_state(state: &PlayerState) -> Self {
        TimerPolicy {
            seek: state.local && !state.paused,
            state: !state.local,
        }
    }
}

/// The two named timer slots.
///
/// A slot holds the armed sleep for its next fire, `None` while stopped.
/// The run loop clears a slot when it fires and [`apply`] re-arms it, so
/// a completed sleep is never polled again.
///
/// [`apply`]: PlayerTimers::apply
pub(crate) struct PlayerTimers {
    period: Duration,
    pub seek: Option<Pin<Box<Sleep>>>,
    pub state: Option<Pin<Box<Sleep>>>,
}

impl PlayerTimers {
    pub fn new(period: Duration) -> Self {
        PlayerTimers {
            period,
            seek: None,
            state: None,
        }
    }

    /// Starts and stops slots to match `policy`. A slot that is already
    /// running keeps its deadline; `restart_seek` forces a fresh seek
    /// deadline so interpolation realigns with a just-observed
    /// authoritative position.
    pub fn apply(&mut self, policy: TimerPolicy, restart_seek: bool) {
        if policy.seek {
            if self.seek.is_none() || restart_seek {
                self.seek = Some(Box::pin(sleep(self.period)));
            }
        } else {
            self.seek = None;
        }

        if policy.state {
            if self.state.is_none() {
                self.state = Some(Box::pin(sleep(self.period)));
            }
        } else {
            self.state = None;
        }
    }

    #[cfg(test)]
    pub fn seek_running(&self) -> bool {
        self.seek.is_some()
    }

    #[cfg(test)]
    pub fn state_running(&self) -> bool {
        self.state.is_some()
    }
}

/// Resolves when the slot's timer fires; never resolves while the slot
/// is stopped. Cancel-safe: the armed sleep lives in the slot, not in
/// the returned future.
pub(crate) async fn tick(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot.as_mut() {
        Some(sleep) => sleep.await,
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
