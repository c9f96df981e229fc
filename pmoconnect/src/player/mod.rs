//! The assembled player: engine task, command handle, event stream.
//!
//! [`SpotifyPlayer::spawn`] wires the collaborators together and starts
//! the engine task. It hands back a [`PlayerHandle`] for commands and
//! snapshot reads, and a [`LocalEventSender`] the local engine adapter
//! pushes its events through. Everything the engine learns is published
//! twice: as shared snapshots readable at any time, and as
//! [`PlayerEvent`]s for consumers that want to react to changes.

mod engine;
mod timers;

use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

use pmospotify::{Device, PlayOffset};

use crate::config::ConnectConfig;
use crate::context::Context;
use crate::error::{ConnectError, Result};
use crate::local::{LocalEvent, LocalPlayer};
use crate::source::RemoteSource;
use crate::state::PlayerState;

use engine::EngineMessage;

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 64;

/// Commands accepted by [`PlayerHandle`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Resume (`true`) or pause (`false`) playback.
    SetPlaying(bool),
    /// Seek within the current track.
    Seek { position_ms: u64 },
    /// Set the playback volume, percent, clamped to 100.
    SetVolume { percent: u8 },
    /// Enable or disable shuffle.
    SetShuffle(bool),
    /// Advance the repeat mode one step in its cycle.
    CycleRepeat,
    /// Skip to the next track.
    NextTrack,
    /// Go back to the previous track, or restart the current one when
    /// it already played for a while.
    PreviousTrack,
    /// Start playing a collection from the given offset.
    PlayContext {
        uri: String,
        offset: Option<PlayOffset>,
    },
    /// Move playback to another device.
    TransferPlayback { device_id: String },
    /// Re-read the remote device list and recompute authority.
    RefreshDevices,
    /// Stop the engine task.
    Shutdown,
}

/// Notifications broadcast by the engine.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// The held context was replaced (or cleared).
    ContextChanged(Option<Context>),
    /// Playback state changed.
    StateChanged(PlayerState),
    /// The device list was refreshed.
    DevicesChanged(Vec<Device>),
}

/// Snapshots mirrored out of the engine task for synchronous reads.
#[derive(Default)]
pub(crate) struct SharedSnapshot {
    pub state: RwLock<PlayerState>,
    pub context: RwLock<Option<Context>>,
    pub devices: RwLock<Vec<Device>>,
    pub device_id: RwLock<Option<String>>,
}

/// Handle to a running engine: commands, snapshot reads, subscriptions.
/// Cheap to clone; the engine stops when the last handle and the local
/// event sender are gone.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<EngineMessage>,
    shared: Arc<SharedSnapshot>,
    events: broadcast::Sender<PlayerEvent>,
}

impl PlayerHandle {
    /// Sends a command to the engine.
    pub async fn command(&self, command: PlayerCommand) -> Result<()> {
        self.commands
            .send(EngineMessage::Command(command))
            .await
            .map_err(|_| ConnectError::EngineClosed)
    }

    /// Resume or pause playback.
    pub async fn set_playing(&self, play: bool) -> Result<()> {
        self.command(PlayerCommand::SetPlaying(play)).await
    }

    /// Seek within the current track.
    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        self.command(PlayerCommand::Seek { position_ms }).await
    }

    /// Set the playback volume percent.
    pub async fn set_volume(&self, percent: u8) -> Result<()> {
        self.command(PlayerCommand::SetVolume { percent }).await
    }

    /// Enable or disable shuffle.
    pub async fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        self.command(PlayerCommand::SetShuffle(shuffle)).await
    }

    /// Advance the repeat mode one step in its cycle.
    pub async fn cycle_repeat(&self) -> Result<()> {
        self.command(PlayerCommand::CycleRepeat).await
    }

    /// Skip to the next track.
    pub async fn next_track(&self) -> Result<()> {
        self.command(PlayerCommand::NextTrack).await
    }

    /// Go back to the previous track (or restart the current one).
    pub async fn previous_track(&self) -> Result<()> {
        self.command(PlayerCommand::PreviousTrack).await
    }

    /// Start playing a collection from the given offset.
    pub async fn play_context(
        &self,
        uri: impl Into<String>,
        offset: Option<PlayOffset>,
    ) -> Result<()> {
        self.command(PlayerCommand::PlayContext {
            uri: uri.into(),
            offset,
        })
        .await
    }

    /// Move playback to another device.
    pub async fn transfer_playback(&self, device_id: impl Into<String>) -> Result<()> {
        self.command(PlayerCommand::TransferPlayback {
            device_id: device_id.into(),
        })
        .await
    }

    /// Re-read the remote device list.
    pub async fn refresh_devices(&self) -> Result<()> {
        self.command(PlayerCommand::RefreshDevices).await
    }

    /// Stops the engine task.
    pub async fn shutdown(&self) -> Result<()> {
        self.command(PlayerCommand::Shutdown).await
    }

    /// Current playback state.
    pub fn player_state(&self) -> PlayerState {
        self.shared.state.read().unwrap().clone()
    }

    /// Currently held playback context, if any.
    pub fn context(&self) -> Option<Context> {
        self.shared.context.read().unwrap().clone()
    }

    /// Device list from the last refresh.
    pub fn devices(&self) -> Vec<Device> {
        self.shared.devices.read().unwrap().clone()
    }

    /// Device id the local engine registered under, while it is ready.
    pub fn device_id(&self) -> Option<String> {
        self.shared.device_id.read().unwrap().clone()
    }

    /// Subscribes to engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

/// Sender the local engine adapter delivers its events through.
#[derive(Clone)]
pub struct LocalEventSender {
    tx: mpsc::Sender<EngineMessage>,
}

impl LocalEventSender {
    pub async fn send(&self, event: LocalEvent) -> Result<()> {
        self.tx
            .send(EngineMessage::Local(event))
            .await
            .map_err(|_| ConnectError::EngineClosed)
    }
}

/// The running player engine.
pub struct SpotifyPlayer {
    join_handle: JoinHandle<()>,
}

impl SpotifyPlayer {
    /// Spawns the engine task over the given collaborators.
    pub fn spawn(
        remote: Arc<dyn RemoteSource>,
        local: Arc<dyn LocalPlayer>,
        config: ConnectConfig,
    ) -> (SpotifyPlayer, PlayerHandle, LocalEventSender) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(SharedSnapshot::default());

        let engine = engine::Engine::new(remote, local, config, Arc::clone(&shared), events.clone());
        let join_handle = tokio::spawn(engine::run(rx, engine));

        let handle = PlayerHandle {
            commands: tx.clone(),
            shared,
            events,
        };
        (SpotifyPlayer { join_handle }, handle, LocalEventSender { tx })
    }

    /// Waits for the engine task to finish, after
    /// [`PlayerHandle::shutdown`] or once every sender is dropped.
    pub async fn wait(self) -> Result<()> {
        if let Err(err) = self.join_handle.await {
            if err.is_cancelled() {
                warn!("Engine task cancelled: {err}");
                return Ok(());
            }
            return Err(ConnectError::Join(err.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
