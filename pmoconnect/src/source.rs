//! Remote playback service seam.

use async_trait::async_trait;
use pmospotify::{
    Collection, CollectionKind, Device, PlayTarget, RemotePlaybackState, RepeatState, Result,
    SpotifyClient,
};

/// Transport commands the engine issues to the remote service.
///
/// Commands address the currently active device; only
/// [`TransferPlayback`](RemoteCommand::TransferPlayback) names one
/// explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    /// Start or resume playback, optionally inside a context.
    Play(PlayTarget),
    /// Pause playback.
    Pause,
    /// Seek within the current track.
    Seek { position_ms: u64 },
    /// Set the repeat mode.
    SetRepeat(RepeatState),
    /// Enable or disable shuffle.
    SetShuffle(bool),
    /// Set the volume percent.
    SetVolume(u8),
    /// Move playback to another device.
    TransferPlayback { device_id: String },
}

/// The remote playback service as the engine consumes it.
///
/// [`SpotifyClient`] is the production implementation; tests substitute
/// recording mocks. The engine absorbs every failure into degraded state
/// and a log line, so implementations are free to just propagate errors.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Polls the remote playback state. `Ok(None)` means nothing is
    /// playing anywhere.
    async fn fetch_state(&self) -> Result<Option<RemotePlaybackState>>;

    /// Resolves a collection endpoint to its ordered track listing.
    async fn fetch_collection(&self, href: &str, kind: CollectionKind) -> Result<Collection>;

    /// Lists the devices known to the remote service.
    async fn fetch_devices(&self) -> Result<Vec<Device>>;

    /// Issues a fire-and-forget transport command.
    async fn issue_command(&self, command: RemoteCommand) -> Result<()>;
}

#[async_trait]
impl RemoteSource for SpotifyClient {
    async fn fetch_state(&self) -> Result<Option<RemotePlaybackState>> {
        self.playback_state().await
    }

    async fn fetch_collection(&self, href: &str, kind: CollectionKind) -> Result<Collection> {
        self.collection(href, kind).await
    }

    async fn fetch_devices(&self) -> Result<Vec<Device>> {
        self.devices().await
    }

    async fn issue_command(&self, command: RemoteCommand) -> Result<()> {
        match command {
            RemoteCommand::Play(target) => self.play(&target, None).await,
            RemoteCommand::Pause => self.pause(None).await,
            RemoteCommand::Seek { position_ms } => self.seek(position_ms, None).await,
            RemoteCommand::SetRepeat(state) => self.set_repeat(state, None).await,
            RemoteCommand::SetShuffle(shuffle) => self.set_shuffle(shuffle, None).await,
            RemoteCommand::SetVolume(volume) => self.set_volume(volume, None).await,
            RemoteCommand::TransferPlayback { device_id } => {
                self.transfer_playback(&device_id).await
            }
        }
    }
}
