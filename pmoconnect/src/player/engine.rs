//! The engine task: a single reducer for every state transition.
//!
//! One spawned task owns all mutable state (held context, player state,
//! device list) and consumes a single message channel plus two named
//! timers. Context rebuilds are awaited inline, so at most one is ever
//! in flight and an install can never race a newer observation.

use std::mem;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use pmospotify::{Device, PlayOffset, PlayTarget, RemotePlaybackState, RepeatState};

use crate::config::{ConnectConfig, PREVIOUS_RESTART_THRESHOLD_MS};
use crate::context::{build_context, Context, ContextSeed, ContextTrack};
use crate::local::{LocalEvent, LocalPlaybackState, LocalPlayer};
use crate::player::timers::{tick, PlayerTimers, TimerPolicy};
use crate::player::{PlayerCommand, PlayerEvent, SharedSnapshot};
use crate::reconcile;
use crate::source::{RemoteCommand, RemoteSource};
use crate::state::PlayerState;

/// Everything the reducer consumes over its single channel.
#[derive(Debug)]
pub(crate) enum EngineMessage {
    Command(PlayerCommand),
    Local(LocalEvent),
}

/// Fire-and-forget calls into the local engine.
#[derive(Debug, Clone, Copy)]
enum LocalOp {
    Resume,
    Pause,
    Seek(u64),
    Next,
    Previous,
}

pub(crate) struct Engine {
    remote: Arc<dyn RemoteSource>,
    local: Arc<dyn LocalPlayer>,
    config: ConnectConfig,
    state: PlayerState,
    context: Option<Context>,
    devices: Vec<Device>,
    device_id: Option<String>,
    shared: Arc<SharedSnapshot>,
    events: broadcast::Sender<PlayerEvent>,
    /// Set when a handler observed an authoritative position, so the
    /// interpolation timer realigns to it.
    realign_seek: bool,
    shutdown: bool,
}

/// Drives the engine until shutdown or until every handle is dropped.
pub(crate) async fn run(mut rx: mpsc::Receiver<EngineMessage>, mut engine: Engine) {
    info!("Starting playback context engine");
    let mut timers = PlayerTimers::new(engine.config.poll_period());

    // Until a device list or a local event says otherwise, playback is
    // assumed remote so polling can discover the actual state.
    engine.recompute_authority();
    timers.apply(TimerPolicy::for_state(&engine.state), false);

    loop {
        tokio::select! {
            message = rx.recv() => {
                match message {
                    Some(message) => engine.handle_message(message).await,
                    None => break,
                }
            }
            _ = tick(&mut timers.seek) => {
                timers.seek = None;
                engine.handle_seek_tick();
            }
            _ = tick(&mut timers.state) => {
                timers.state = None;
                engine.poll_remote_state().await;
            }
        }

        if engine.shutdown {
            break;
        }
        let restart_seek = mem::take(&mut engine.realign_seek);
        timers.apply(TimerPolicy::for_state(&engine.state), restart_seek);
    }

    info!("Playback context engine stopped");
}

impl Engine {
    pub(crate) fn new(
        remote: Arc<dyn RemoteSource>,
        local: Arc<dyn LocalPlayer>,
        config: ConnectConfig,
        shared: Arc<SharedSnapshot>,
        events: broadcast::Sender<PlayerEvent>,
    ) -> Self {
        Engine {
            remote,
            local,
            config,
            state: PlayerState::default(),
            context: None,
            devices: Vec::new(),
            device_id: None,
            shared,
            events,
            realign_seek: false,
            shutdown: false,
        }
    }

    async fn handle_message(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Command(command) => self.handle_command(command).await,
            EngineMessage::Local(event) => self.handle_local_event(event).await,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, command: PlayerCommand) {
        debug!(?command, "Player command");
        match command {
            PlayerCommand::SetPlaying(play) => self.set_playing(play),
            PlayerCommand::Seek { position_ms } => self.seek(position_ms),
            PlayerCommand::SetVolume { percent } => self.set_volume(percent),
            PlayerCommand::SetShuffle(shuffle) => self.set_shuffle(shuffle),
            PlayerCommand::CycleRepeat => self.cycle_repeat(),
            PlayerCommand::NextTrack => self.next_track(),
            PlayerCommand::PreviousTrack => self.previous_track(),
            PlayerCommand::PlayContext { uri, offset } => self.play_context(uri, offset),
            PlayerCommand::TransferPlayback { device_id } => self.transfer_playback(device_id),
            PlayerCommand::RefreshDevices => self.refresh_devices().await,
            PlayerCommand::Shutdown => self.shutdown = true,
        }
    }

    /// Resume or pause on whichever authority owns playback.
    fn set_playing(&mut self, play: bool) {
        match (play, self.state.local) {
            (true, true) => self.issue_local(LocalOp::Resume),
            (false, true) => self.issue_local(LocalOp::Pause),
            (true, false) => {
                self.issue_remote(RemoteCommand::Play(PlayTarget::resume_at(self.state.position)));
            }
            (false, false) => self.issue_remote(RemoteCommand::Pause),
        }
    }

    fn seek(&mut self, position_ms: u64) {
        if self.state.local {
            self.issue_local(LocalOp::Seek(position_ms));
        } else {
            // No event stream from a remote device; adopt the position
            // up front and let the next poll correct it.
            self.issue_remote(RemoteCommand::Seek { position_ms });
            self.update_state(|state| state.position = position_ms);
        }
    }

    /// Volume always goes through the remote service; the local engine
    /// registers as a device there like any other.
    fn set_volume(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.issue_remote(RemoteCommand::SetVolume(percent));
        self.update_state(|state| state.volume = percent);
    }

    fn set_shuffle(&mut self, shuffle: bool) {
        self.issue_remote(RemoteCommand::SetShuffle(shuffle));
        self.update_state(|state| state.shuffle = shuffle);
    }

    fn cycle_repeat(&mut self) {
        let next = self.state.repeat.next();
        self.issue_remote(RemoteCommand::SetRepeat(next));
        self.update_state(|state| state.repeat = next);
    }

    fn next_track(&mut self) {
        if self.state.repeat == RepeatState::Track {
            self.restart_current();
            return;
        }
        if self.state.local {
            self.issue_local(LocalOp::Next);
            return;
        }
        self.shift_window(Direction::Forward);
    }

    fn previous_track(&mut self) {
        let restart = self.state.repeat == RepeatState::Track
            || self.state.position > PREVIOUS_RESTART_THRESHOLD_MS;
        if restart {
            self.restart_current();
            return;
        }
        if self.state.local {
            self.issue_local(LocalOp::Previous);
            return;
        }
        self.shift_window(Direction::Backward);
    }

    /// Restarts the current track from position zero on whichever
    /// authority owns playback.
    fn restart_current(&mut self) {
        if self.state.local {
            self.issue_local(LocalOp::Seek(0));
        } else {
            self.issue_remote(RemoteCommand::Seek { position_ms: 0 });
            self.update_state(|state| state.position = 0);
        }
    }

    /// Remote navigation: rotate the held window one step, tell the
    /// remote service to play the track it now centers on, and install
    /// the rotated context without waiting for the next poll to confirm.
    fn shift_window(&mut self, direction: Direction) {
        let Some(held) = self.context.as_ref() else {
            debug!("Navigation ignored: no context");
            return;
        };
        let Some(current) = held.current.clone() else {
            debug!("Navigation ignored: no current track");
            return;
        };
        let mut shifted = held.clone();

        let moved_to = match direction {
            Direction::Forward => {
                if shifted.next.is_empty() {
                    None
                } else {
                    Some(shifted.next.remove(0))
                }
            }
            Direction::Backward => shifted.prev.pop(),
        };

        let offset = match moved_to.as_ref() {
            Some(track) => Some(offset_for(track)),
            None => fallback_offset(&current, shifted.length, direction.step()),
        };
        let Some(offset) = offset else {
            debug!("Navigation ignored: window exhausted and position unresolved");
            return;
        };

        match direction {
            Direction::Forward => shifted.prev.insert(0, current),
            Direction::Backward => shifted.next.insert(0, current),
        }
        shifted.current = moved_to;

        self.issue_remote(RemoteCommand::Play(PlayTarget {
            position_ms: 0,
            context_uri: shifted.uri.clone(),
            offset: Some(offset),
        }));
        self.update_state(|state| state.position = 0);
        self.install_context(Some(shifted));
    }

    fn play_context(&mut self, uri: String, offset: Option<PlayOffset>) {
        self.issue_remote(RemoteCommand::Play(PlayTarget::context(uri, offset)));
    }

    fn transfer_playback(&mut self, device_id: String) {
        self.issue_remote(RemoteCommand::TransferPlayback { device_id });
    }

    async fn refresh_devices(&mut self) {
        let devices = match self.remote.fetch_devices().await {
            Ok(devices) => devices,
            Err(err) => {
                warn!("Device fetch failed: {err}");
                Vec::new()
            }
        };
        debug!(count = devices.len(), "Device list refreshed");
        self.devices = devices;
        *self.shared.devices.write().unwrap() = self.devices.clone();
        let _ = self
            .events
            .send(PlayerEvent::DevicesChanged(self.devices.clone()));
        self.recompute_authority();
    }

    /// Authority follows the device list: playback is local exactly when
    /// the device registered by the local engine is the active one.
    fn recompute_authority(&mut self) {
        let local = match self.device_id.as_deref() {
            Some(device_id) => self
                .devices
                .iter()
                .any(|device| device.id.as_deref() == Some(device_id) && device.is_active),
            None => false,
        };
        if local != self.state.local {
            info!(local, "Playback authority changed");
        }
        self.update_state(|state| state.local = local);
    }

    // ========================================================================
    // Local engine events
    // ========================================================================

    async fn handle_local_event(&mut self, event: LocalEvent) {
        match event {
            LocalEvent::Ready { device_id } => {
                info!(device_id, "Local engine ready");
                self.device_id = Some(device_id);
                *self.shared.device_id.write().unwrap() = self.device_id.clone();
                self.update_state(|state| state.disabled = false);
                // One immediate poll so the engine does not sit on stale
                // state until the next scheduled tick.
                self.poll_remote_state().await;
            }
            LocalEvent::NotReady => {
                info!("Local engine gone");
                self.device_id = None;
                *self.shared.device_id.write().unwrap() = None;
                self.update_state(|state| state.disabled = true);
            }
            LocalEvent::StateChanged(None) => {
                debug!("Local engine has nothing to play, authority moves remote");
                self.update_state(|state| state.local = false);
            }
            LocalEvent::StateChanged(Some(snapshot)) => self.apply_local_state(snapshot).await,
            LocalEvent::InitializationError(message) => {
                warn!(message, "Local engine initialization error");
            }
            LocalEvent::AuthenticationError(message) => {
                warn!(message, "Local engine authentication error");
            }
            LocalEvent::AccountError(message) => {
                warn!(message, "Local engine account error");
            }
        }
    }

    /// Reduces a discrete local snapshot. A local event is proof that
    /// the local engine plays, so it also claims authority.
    async fn apply_local_state(&mut self, snapshot: LocalPlaybackState) {
        let volume = match self.local.volume().await {
            Ok(volume) => (volume.clamp(0.0, 1.0) * 100.0).round() as u8,
            Err(err) => {
                debug!("Volume read failed: {err}");
                self.state.volume
            }
        };

        let staleness = reconcile::evaluate(
            self.context.as_ref(),
            snapshot.context.uri.as_deref(),
            snapshot
                .track_window
                .current_track
                .as_ref()
                .map(|track| track.uri.as_str()),
            self.config.track_window,
        );
        if staleness.is_stale() {
            debug!(
                context_changed = staleness.context_changed,
                track_changed = staleness.track_changed,
                underfilled = staleness.underfilled,
                "Local snapshot stale, rebuilding context"
            );
            let seed = ContextSeed::from_local(&snapshot);
            let context = build_context(seed, self.remote.as_ref(), self.config.track_window).await;
            self.install_context(Some(context));
        }

        self.realign_seek = true;
        self.update_state(|state| {
            state.duration = snapshot.duration;
            state.paused = snapshot.paused;
            state.position = snapshot.position;
            state.repeat = snapshot.repeat;
            state.shuffle = snapshot.shuffle;
            state.volume = volume;
            state.local = true;
        });
    }

    // ========================================================================
    // Remote polling
    // ========================================================================

    /// One remote poll: fetch the authoritative snapshot and reconcile.
    async fn poll_remote_state(&mut self) {
        let snapshot = match self.remote.fetch_state().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("Remote reports no active playback");
                return;
            }
            Err(err) => {
                warn!("Remote state poll failed: {err}");
                return;
            }
        };
        self.apply_remote_state(snapshot).await;
    }

    async fn apply_remote_state(&mut self, snapshot: RemotePlaybackState) {
        let staleness = reconcile::evaluate(
            self.context.as_ref(),
            snapshot.context.as_ref().map(|context| context.uri.as_str()),
            snapshot.item.as_ref().map(|item| item.uri.as_str()),
            self.config.track_window,
        );
        if staleness.is_stale() {
            debug!(
                context_changed = staleness.context_changed,
                track_changed = staleness.track_changed,
                underfilled = staleness.underfilled,
                "Remote snapshot stale, rebuilding context"
            );
            let seed = ContextSeed::from_remote(&snapshot);
            let context = build_context(seed, self.remote.as_ref(), self.config.track_window).await;
            self.install_context(Some(context));
        }

        self.realign_seek = true;
        self.update_state(|state| {
            if let Some(progress) = snapshot.progress_ms {
                state.position = progress;
            }
            if let Some(volume) = snapshot.device.volume_percent {
                state.volume = volume;
            }
            state.duration = snapshot
                .item
                .as_ref()
                .map(|item| item.duration_ms)
                .unwrap_or(0);
            state.paused = !snapshot.is_playing;
            state.repeat = snapshot.repeat_state;
            state.shuffle = snapshot.shuffle_state;
        });
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Advances the displayed position between discrete local events.
    fn handle_seek_tick(&mut self) {
        let step = self.config.poll_period_ms;
        self.update_state(|state| state.position = state.position.saturating_add(step));
    }

    // ========================================================================
    // Dispatch and publication
    // ========================================================================

    fn issue_remote(&self, command: RemoteCommand) {
        debug!(?command, "Issuing remote command");
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            if let Err(err) = remote.issue_command(command).await {
                warn!("Remote command failed: {err}");
            }
        });
    }

    fn issue_local(&self, op: LocalOp) {
        debug!(?op, "Issuing local engine call");
        let local = Arc::clone(&self.local);
        tokio::spawn(async move {
            let result = match op {
                LocalOp::Resume => local.resume().await,
                LocalOp::Pause => local.pause().await,
                LocalOp::Seek(position_ms) => local.seek(position_ms).await,
                LocalOp::Next => local.next_track().await,
                LocalOp::Previous => local.previous_track().await,
            };
            if let Err(err) = result {
                warn!(?op, "Local engine call failed: {err}");
            }
        });
    }

    fn update_state<F: FnOnce(&mut PlayerState)>(&mut self, update: F) {
        update(&mut self.state);
        *self.shared.state.write().unwrap() = self.state.clone();
        let _ = self
            .events
            .send(PlayerEvent::StateChanged(self.state.clone()));
    }

    fn install_context(&mut self, context: Option<Context>) {
        self.context = context;
        *self.shared.context.write().unwrap() = self.context.clone();
        let _ = self
            .events
            .send(PlayerEvent::ContextChanged(self.context.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

fn offset_for(track: &ContextTrack) -> PlayOffset {
    match track.position {
        Some(position) => PlayOffset::Position(position),
        None => PlayOffset::Uri(track.uri.clone()),
    }
}

/// Target offset for a shift past the materialized window: one step away
/// from the current position, modulo the collection length. `None` when
/// the context never resolved (unknown length or position), in which
/// case navigation is a no-op.
fn fallback_offset(current: &ContextTrack, length: usize, step: isize) -> Option<PlayOffset> {
    let position = current.position?;
    if length == 0 {
        return None;
    }
    let target = (position as isize + step).rem_euclid(length as isize) as usize;
    Some(PlayOffset::Position(target))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pmospotify::{
        Collection, CollectionKind, ContextRef, Device, RemotePlaybackState, Result, SpotifyError,
        TrackObject,
    };

    use super::*;
    use crate::context::ContextKind;
    use crate::local::{LocalContextRef, LocalPlayerError, LocalTrackWindow};

    // ========================================================================
    // Mocks
    // ========================================================================

    #[derive(Default)]
    struct MockRemote {
        state: Mutex<Option<RemotePlaybackState>>,
        collection: Mutex<Option<Collection>>,
        devices: Mutex<Vec<Device>>,
        state_fetches: AtomicUsize,
        collection_fetches: AtomicUsize,
        commands: Mutex<Vec<RemoteCommand>>,
    }

    impl MockRemote {
        fn commands(&self) -> Vec<RemoteCommand> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteSource for MockRemote {
        async fn fetch_state(&self) -> Result<Option<RemotePlaybackState>> {
            self.state_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.state.lock().unwrap().clone())
        }

        async fn fetch_collection(&self, _href: &str, _kind: CollectionKind) -> Result<Collection> {
            self.collection_fetches.fetch_add(1, Ordering::SeqCst);
            self.collection
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SpotifyError::NotFound("collection".to_string()))
        }

        async fn fetch_devices(&self) -> Result<Vec<Device>> {
            Ok(self.devices.lock().unwrap().clone())
        }

        async fn issue_command(&self, command: RemoteCommand) -> Result<()> {
            self.commands.lock().unwrap().push(command);
            Ok(())
        }
    }

    struct MockLocal {
        calls: Mutex<Vec<String>>,
        volume: f64,
    }

    impl Default for MockLocal {
        fn default() -> Self {
            MockLocal {
                calls: Mutex::new(Vec::new()),
                volume: 0.37,
            }
        }
    }

    impl MockLocal {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl LocalPlayer for MockLocal {
        async fn resume(&self) -> std::result::Result<(), LocalPlayerError> {
            self.record("resume");
            Ok(())
        }

        async fn pause(&self) -> std::result::Result<(), LocalPlayerError> {
            self.record("pause");
            Ok(())
        }

        async fn seek(&self, position_ms: u64) -> std::result::Result<(), LocalPlayerError> {
            self.record(format!("seek:{position_ms}"));
            Ok(())
        }

        async fn next_track(&self) -> std::result::Result<(), LocalPlayerError> {
            self.record("next");
            Ok(())
        }

        async fn previous_track(&self) -> std::result::Result<(), LocalPlayerError> {
            self.record("previous");
            Ok(())
        }

        async fn volume(&self) -> std::result::Result<f64, LocalPlayerError> {
            Ok(self.volume)
        }
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    fn track(id: &str) -> TrackObject {
        TrackObject {
            id: Some(id.to_string()),
            uri: format!("spotify:track:{id}"),
            name: id.to_uppercase(),
            duration_ms: 180_000,
            ..Default::default()
        }
    }

    fn album_collection() -> Collection {
        Collection {
            name: "Greatest".to_string(),
            tracks: ["a", "b", "c", "d", "e", "f", "g"]
                .iter()
                .map(|id| track(id))
                .collect(),
        }
    }

    fn album_snapshot(item_id: &str) -> RemotePlaybackState {
        RemotePlaybackState {
            context: Some(ContextRef {
                uri: "spotify:album:xyz".to_string(),
                href: Some("https://api.spotify.com/v1/albums/xyz".to_string()),
                kind: "album".to_string(),
            }),
            device: Device {
                id: Some("remote-box".to_string()),
                is_active: true,
                volume_percent: Some(65),
                ..Default::default()
            },
            is_playing: true,
            item: Some(track(item_id)),
            progress_ms: Some(12_000),
            repeat_state: RepeatState::Off,
            shuffle_state: false,
        }
    }

    fn local_snapshot(context_uri: &str, item_id: &str) -> LocalPlaybackState {
        LocalPlaybackState {
            context: LocalContextRef {
                uri: Some(context_uri.to_string()),
                name: Some("Greatest".to_string()),
            },
            duration: 180_000,
            position: 42_000,
            paused: false,
            repeat: RepeatState::Off,
            shuffle: false,
            track_window: LocalTrackWindow {
                current_track: Some(track(item_id)),
                ..Default::default()
            },
        }
    }

    struct Harness {
        engine: Engine,
        remote: Arc<MockRemote>,
        local: Arc<MockLocal>,
        events: broadcast::Receiver<PlayerEvent>,
    }

    fn harness() -> Harness {
        harness_with(MockRemote::default())
    }

    fn harness_with(remote: MockRemote) -> Harness {
        let remote = Arc::new(remote);
        let local = Arc::new(MockLocal::default());
        let (events_tx, events) = broadcast::channel(64);
        let engine = Engine::new(
            remote.clone(),
            local.clone(),
            ConnectConfig {
                track_window: 2,
                poll_period_ms: 1000,
            },
            Arc::new(SharedSnapshot::default()),
            events_tx,
        );
        Harness {
            engine,
            remote,
            local,
            events,
        }
    }

    /// Lets fire-and-forget tasks spawned by the engine run to completion.
    async fn drain() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn window_ids(tracks: &[ContextTrack]) -> Vec<&str> {
        tracks.iter().map(|track| track.id.as_str()).collect()
    }

    // ========================================================================
    // Remote reconciliation
    // ========================================================================

    #[tokio::test]
    async fn test_remote_snapshot_builds_context_and_state() {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });

        h.engine.apply_remote_state(album_snapshot("d")).await;

        let context = h.engine.context.as_ref().unwrap();
        assert_eq!(context.kind, ContextKind::Album);
        assert_eq!(context.name, "Greatest");
        assert_eq!(context.length, 7);
        assert_eq!(context.current.as_ref().unwrap().position, Some(3));
        assert_eq!(window_ids(&context.prev), vec!["b", "c"]);
        assert_eq!(window_ids(&context.next), vec!["e", "f"]);

        assert!(!h.engine.state.paused);
        assert_eq!(h.engine.state.position, 12_000);
        assert_eq!(h.engine.state.duration, 180_000);
        assert_eq!(h.engine.state.volume, 65);
        assert!(h.engine.realign_seek);
    }

    #[tokio::test]
    async fn test_identical_snapshots_fetch_once() {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });

        h.engine.apply_remote_state(album_snapshot("d")).await;
        h.engine.apply_remote_state(album_snapshot("d")).await;
        h.engine.apply_remote_state(album_snapshot("d")).await;

        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_track_change_rebuilds_window() {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });

        h.engine.apply_remote_state(album_snapshot("d")).await;
        h.engine.apply_remote_state(album_snapshot("e")).await;

        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 2);
        let context = h.engine.context.as_ref().unwrap();
        assert_eq!(context.current.as_ref().unwrap().position, Some(4));
        assert_eq!(window_ids(&context.prev), vec!["c", "d"]);
        assert_eq!(window_ids(&context.next), vec!["f", "g"]);
    }

    #[tokio::test]
    async fn test_context_change_rebuilds() {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });

        h.engine.apply_remote_state(album_snapshot("d")).await;

        let mut other = album_snapshot("d");
        other.context.as_mut().unwrap().uri = "spotify:album:other".to_string();
        h.engine.apply_remote_state(other).await;

        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(
            h.engine.context.as_ref().unwrap().uri.as_deref(),
            Some("spotify:album:other")
        );
    }

    #[tokio::test]
    async fn test_contextless_playback_settles() {
        let mut h = harness();
        let mut snapshot = album_snapshot("d");
        snapshot.context = None;

        h.engine.apply_remote_state(snapshot.clone()).await;
        h.engine.apply_remote_state(snapshot.clone()).await;
        h.engine.apply_remote_state(snapshot).await;

        // No fetchable context: built once, then left alone.
        let context = h.engine.context.as_ref().unwrap();
        assert_eq!(context.kind, ContextKind::Unknown);
        assert_eq!(context.length, 0);
        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_retries_on_next_snapshot() {
        let mut h = harness();

        h.engine.apply_remote_state(album_snapshot("d")).await;
        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(h.engine.context.as_ref().unwrap().length, 0);

        // The collection becomes available; the underfilled context is
        // rebuilt on the next otherwise-identical snapshot.
        *h.remote.collection.lock().unwrap() = Some(album_collection());
        h.engine.apply_remote_state(album_snapshot("d")).await;

        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(h.engine.context.as_ref().unwrap().length, 7);

        h.engine.apply_remote_state(album_snapshot("d")).await;
        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remote_snapshot_does_not_claim_authority() {
        let mut h = harness();
        h.engine.state.local = false;

        let mut snapshot = album_snapshot("d");
        snapshot.context = None;
        snapshot.progress_ms = None;
        snapshot.device.volume_percent = None;
        h.engine.state.position = 7_000;
        h.engine.state.volume = 30;

        h.engine.apply_remote_state(snapshot).await;

        // Nullable fields leave the previous values in place.
        assert_eq!(h.engine.state.position, 7_000);
        assert_eq!(h.engine.state.volume, 30);
        assert!(!h.engine.state.local);
    }

    // ========================================================================
    // Local engine events
    // ========================================================================

    #[tokio::test]
    async fn test_local_snapshot_claims_authority() {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });
        h.engine.state.local = false;

        h.engine
            .apply_local_state(local_snapshot("spotify:album:xyz", "d"))
            .await;

        assert!(h.engine.state.local);
        assert!(!h.engine.state.paused);
        assert_eq!(h.engine.state.position, 42_000);
        // Volume comes from the local engine itself, not the snapshot.
        assert_eq!(h.engine.state.volume, 37);
        assert!(h.engine.realign_seek);

        // The context was built through the collection endpoint derived
        // from the local context URI.
        let context = h.engine.context.as_ref().unwrap();
        assert_eq!(context.length, 7);
        assert_eq!(window_ids(&context.prev), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_local_snapshot_is_idempotent_too() {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });

        h.engine
            .apply_local_state(local_snapshot("spotify:album:xyz", "d"))
            .await;
        h.engine
            .apply_local_state(local_snapshot("spotify:album:xyz", "d"))
            .await;

        assert_eq!(h.remote.collection_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_empty_state_releases_authority() {
        let mut h = harness();
        h.engine.state.local = true;

        h.engine
            .handle_local_event(LocalEvent::StateChanged(None))
            .await;

        assert!(!h.engine.state.local);
    }

    #[tokio::test]
    async fn test_ready_enables_and_polls() {
        let mut h = harness_with(MockRemote {
            state: Mutex::new(Some(album_snapshot("d"))),
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });

        h.engine
            .handle_local_event(LocalEvent::Ready {
                device_id: "local-dev".to_string(),
            })
            .await;

        assert!(!h.engine.state.disabled);
        assert_eq!(h.engine.device_id.as_deref(), Some("local-dev"));
        assert_eq!(h.remote.state_fetches.load(Ordering::SeqCst), 1);
        assert!(h.engine.context.is_some());
    }

    #[tokio::test]
    async fn test_not_ready_disables() {
        let mut h = harness();
        h.engine.device_id = Some("local-dev".to_string());
        h.engine.state.disabled = false;

        h.engine.handle_local_event(LocalEvent::NotReady).await;

        assert!(h.engine.state.disabled);
        assert_eq!(h.engine.device_id, None);
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    async fn remote_playing_harness() -> Harness {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });
        h.engine.apply_remote_state(album_snapshot("d")).await;
        h.engine.state.local = false;
        h.engine.state.position = 1_000;
        h.remote.commands.lock().unwrap().clear();
        h
    }

    #[tokio::test]
    async fn test_next_track_shifts_window_optimistically() {
        let mut h = remote_playing_harness().await;
        while h.events.try_recv().is_ok() {}

        h.engine.next_track();
        drain().await;

        let context = h.engine.context.as_ref().unwrap();
        assert_eq!(context.current.as_ref().unwrap().id, "e");
        assert_eq!(window_ids(&context.prev), vec!["d", "b", "c"]);
        assert_eq!(window_ids(&context.next), vec!["f"]);
        assert_eq!(h.engine.state.position, 0);

        assert_eq!(
            h.remote.commands(),
            vec![RemoteCommand::Play(PlayTarget {
                position_ms: 0,
                context_uri: Some("spotify:album:xyz".to_string()),
                offset: Some(PlayOffset::Position(4)),
            })]
        );

        // Both the optimistic state and the rotated context were
        // published.
        let mut saw_context = false;
        while let Ok(event) = h.events.try_recv() {
            if let PlayerEvent::ContextChanged(Some(context)) = event {
                assert_eq!(context.current.as_ref().unwrap().id, "e");
                saw_context = true;
            }
        }
        assert!(saw_context);
    }

    #[tokio::test]
    async fn test_previous_track_shifts_back() {
        let mut h = remote_playing_harness().await;

        h.engine.previous_track();
        drain().await;

        let context = h.engine.context.as_ref().unwrap();
        assert_eq!(context.current.as_ref().unwrap().id, "c");
        assert_eq!(window_ids(&context.prev), vec!["b"]);
        assert_eq!(window_ids(&context.next), vec!["d", "e", "f"]);

        assert_eq!(
            h.remote.commands(),
            vec![RemoteCommand::Play(PlayTarget {
                position_ms: 0,
                context_uri: Some("spotify:album:xyz".to_string()),
                offset: Some(PlayOffset::Position(2)),
            })]
        );
    }

    #[tokio::test]
    async fn test_repeat_track_restarts_instead_of_skipping() {
        let mut h = remote_playing_harness().await;
        h.engine.state.repeat = RepeatState::Track;
        let before = h.engine.context.clone();

        h.engine.next_track();
        drain().await;

        assert_eq!(h.engine.context, before);
        assert_eq!(h.engine.state.position, 0);
        assert_eq!(
            h.remote.commands(),
            vec![RemoteCommand::Seek { position_ms: 0 }]
        );
    }

    #[tokio::test]
    async fn test_previous_track_past_threshold_restarts() {
        let mut h = remote_playing_harness().await;
        h.engine.state.position = 6_000;
        let before = h.engine.context.clone();

        h.engine.previous_track();
        drain().await;

        assert_eq!(h.engine.context, before);
        assert_eq!(h.engine.state.position, 0);
        assert_eq!(
            h.remote.commands(),
            vec![RemoteCommand::Seek { position_ms: 0 }]
        );
    }

    #[tokio::test]
    async fn test_navigation_falls_back_past_window() {
        let mut h = remote_playing_harness().await;
        {
            let context = h.engine.context.as_mut().unwrap();
            context.next.clear();
            context.current.as_mut().unwrap().position = Some(6);
        }

        h.engine.next_track();
        drain().await;

        // Window exhausted: the target index wraps around the collection
        // and the remote service resolves it.
        assert_eq!(
            h.remote.commands(),
            vec![RemoteCommand::Play(PlayTarget {
                position_ms: 0,
                context_uri: Some("spotify:album:xyz".to_string()),
                offset: Some(PlayOffset::Position(0)),
            })]
        );
        assert_eq!(h.engine.context.as_ref().unwrap().current, None);
    }

    #[tokio::test]
    async fn test_navigation_without_window_or_position_is_noop() {
        let mut h = harness();
        h.engine.state.local = false;

        // No context at all.
        h.engine.next_track();
        drain().await;
        assert!(h.remote.commands().is_empty());

        // Context without windows, length or resolved position.
        let mut snapshot = album_snapshot("d");
        snapshot.context = None;
        h.engine.apply_remote_state(snapshot).await;
        let before = h.engine.context.clone();

        h.engine.next_track();
        drain().await;

        assert!(h.remote.commands().is_empty());
        assert_eq!(h.engine.context, before);
    }

    #[tokio::test]
    async fn test_local_navigation_delegates_to_engine() {
        let mut h = harness_with(MockRemote {
            collection: Mutex::new(Some(album_collection())),
            ..Default::default()
        });
        h.engine.apply_remote_state(album_snapshot("d")).await;
        h.engine.state.local = true;
        h.engine.state.position = 1_000;
        let before = h.engine.context.clone();

        h.engine.next_track();
        h.engine.previous_track();
        drain().await;

        assert_eq!(h.local.calls(), vec!["next", "previous"]);
        assert!(h.remote.commands().is_empty());
        // The local engine will push the new state itself; the held
        // context is not rotated ahead of that.
        assert_eq!(h.engine.context, before);
    }

    // ========================================================================
    // Transport dispatch
    // ========================================================================

    #[tokio::test]
    async fn test_set_playing_dispatch() {
        let mut h = harness();

        h.engine.state.local = true;
        h.engine.set_playing(true);
        h.engine.set_playing(false);

        h.engine.state.local = false;
        h.engine.state.position = 30_000;
        h.engine.set_playing(true);
        h.engine.set_playing(false);
        drain().await;

        assert_eq!(h.local.calls(), vec!["resume", "pause"]);
        assert_eq!(
            h.remote.commands(),
            vec![
                RemoteCommand::Play(PlayTarget::resume_at(30_000)),
                RemoteCommand::Pause,
            ]
        );
    }

    #[tokio::test]
    async fn test_seek_dispatch_by_authority() {
        let mut h = harness();

        h.engine.state.local = true;
        h.engine.seek(90_000);
        drain().await;
        assert_eq!(h.local.calls(), vec!["seek:90000"]);
        assert_ne!(h.engine.state.position, 90_000);

        h.engine.state.local = false;
        h.engine.seek(120_000);
        drain().await;
        assert_eq!(
            h.remote.commands(),
            vec![RemoteCommand::Seek { position_ms: 120_000 }]
        );
        assert_eq!(h.engine.state.position, 120_000);
    }

    #[tokio::test]
    async fn test_mode_commands_always_remote() {
        let mut h = harness();
        h.engine.state.local = true;

        h.engine.set_volume(80);
        h.engine.set_shuffle(true);
        h.engine.cycle_repeat();
        drain().await;

        assert!(h.local.calls().is_empty());
        assert_eq!(
            h.remote.commands(),
            vec![
                RemoteCommand::SetVolume(80),
                RemoteCommand::SetShuffle(true),
                RemoteCommand::SetRepeat(RepeatState::Context),
            ]
        );
        assert_eq!(h.engine.state.volume, 80);
        assert!(h.engine.state.shuffle);
        assert_eq!(h.engine.state.repeat, RepeatState::Context);
    }

    #[tokio::test]
    async fn test_volume_is_clamped() {
        let mut h = harness();
        h.engine.set_volume(250);
        drain().await;

        assert_eq!(h.remote.commands(), vec![RemoteCommand::SetVolume(100)]);
        assert_eq!(h.engine.state.volume, 100);
    }

    #[tokio::test]
    async fn test_repeat_cycles_through_all_modes() {
        let mut h = harness();

        h.engine.cycle_repeat();
        h.engine.cycle_repeat();
        h.engine.cycle_repeat();
        drain().await;

        assert_eq!(
            h.remote.commands(),
            vec![
                RemoteCommand::SetRepeat(RepeatState::Context),
                RemoteCommand::SetRepeat(RepeatState::Track),
                RemoteCommand::SetRepeat(RepeatState::Off),
            ]
        );
        assert_eq!(h.engine.state.repeat, RepeatState::Off);
    }

    #[tokio::test]
    async fn test_play_context_and_transfer() {
        let mut h = harness();

        h.engine.play_context(
            "spotify:playlist:mix".to_string(),
            Some(PlayOffset::Position(3)),
        );
        h.engine.transfer_playback("other-dev".to_string());
        drain().await;

        assert_eq!(
            h.remote.commands(),
            vec![
                RemoteCommand::Play(PlayTarget::context(
                    "spotify:playlist:mix",
                    Some(PlayOffset::Position(3)),
                )),
                RemoteCommand::TransferPlayback {
                    device_id: "other-dev".to_string()
                },
            ]
        );
    }

    // ========================================================================
    // Devices and authority
    // ========================================================================

    #[tokio::test]
    async fn test_refresh_devices_recomputes_authority() {
        let mut h = harness();
        h.engine.device_id = Some("local-dev".to_string());

        *h.remote.devices.lock().unwrap() = vec![Device {
            id: Some("local-dev".to_string()),
            is_active: true,
            ..Default::default()
        }];
        h.engine.refresh_devices().await;
        assert!(h.engine.state.local);

        *h.remote.devices.lock().unwrap() = vec![
            Device {
                id: Some("local-dev".to_string()),
                is_active: false,
                ..Default::default()
            },
            Device {
                id: Some("kitchen".to_string()),
                is_active: true,
                ..Default::default()
            },
        ];
        h.engine.refresh_devices().await;
        assert!(!h.engine.state.local);
        assert_eq!(h.engine.devices.len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_engine_is_never_local() {
        let mut h = harness();
        h.engine.state.local = true;

        *h.remote.devices.lock().unwrap() = vec![Device {
            id: Some("kitchen".to_string()),
            is_active: true,
            ..Default::default()
        }];
        h.engine.refresh_devices().await;

        assert!(!h.engine.state.local);
    }

    // ========================================================================
    // Interpolation
    // ========================================================================

    #[tokio::test]
    async fn test_seek_tick_interpolates_position() {
        let mut h = harness();
        h.engine.state.position = 41_000;

        h.engine.handle_seek_tick();
        assert_eq!(h.engine.state.position, 42_000);

        h.engine.handle_seek_tick();
        assert_eq!(h.engine.state.position, 43_000);
    }
}
