//! Example: Drive the playback context engine against a real account
//!
//! This example demonstrates:
//! - Wiring a `SpotifyClient` and a local engine adapter into the player
//! - Subscribing to context and state notifications
//! - Issuing transport commands through the handle
//!
//! The local engine is stubbed out: without a vendor SDK in a terminal
//! process, playback stays on whatever device currently plays, and the
//! engine follows it through the remote poll.
//!
//! Run with:
//! ```bash
//! SPOTIFY_TOKEN=<access token> cargo run --example connect_player
//! ```

use std::sync::Arc;
use std::time::Duration;

use pmoconnect::{
    ConnectConfig, LocalPlayer, LocalPlayerError, PlayerEvent, SpotifyPlayer,
};
use pmospotify::SpotifyClient;

/// Stand-in for a real vendor SDK bridge. Every call is accepted and
/// dropped; a real adapter would forward them to the SDK instance.
struct StubEngine;

#[async_trait::async_trait]
impl LocalPlayer for StubEngine {
    async fn resume(&self) -> Result<(), LocalPlayerError> {
        Ok(())
    }

    async fn pause(&self) -> Result<(), LocalPlayerError> {
        Ok(())
    }

    async fn seek(&self, _position_ms: u64) -> Result<(), LocalPlayerError> {
        Ok(())
    }

    async fn next_track(&self) -> Result<(), LocalPlayerError> {
        Ok(())
    }

    async fn previous_track(&self) -> Result<(), LocalPlayerError> {
        Ok(())
    }

    async fn volume(&self) -> Result<f64, LocalPlayerError> {
        Ok(1.0)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmoconnect=debug,pmospotify=info".into()),
        )
        .init();

    let token = std::env::var("SPOTIFY_TOKEN")
        .map_err(|_| "set SPOTIFY_TOKEN to a Web API access token")?;
    let client = SpotifyClient::new(token)?;

    println!("=== Spotify Playback Context ===\n");

    let (player, handle, _local_events) = SpotifyPlayer::spawn(
        Arc::new(client),
        Arc::new(StubEngine),
        ConnectConfig::default(),
    );

    handle.refresh_devices().await?;

    let mut events = handle.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PlayerEvent::ContextChanged(Some(context)) => {
                    println!(
                        "\nContext: {} ({}, {} tracks)",
                        context.name,
                        context.kind.as_str(),
                        context.length
                    );
                    if let Some(track) = &context.current {
                        println!("  > {}", track.name);
                    }
                    for track in &context.next {
                        println!("    {}", track.name);
                    }
                }
                PlayerEvent::ContextChanged(None) => println!("\nContext cleared"),
                PlayerEvent::DevicesChanged(devices) => {
                    println!("\nDevices:");
                    for device in &devices {
                        let marker = if device.is_active { "*" } else { " " };
                        println!("  {marker} {} ({})", device.name, device.kind);
                    }
                }
                PlayerEvent::StateChanged(_) => {}
            }
        }
    });

    // Follow the account for a while, then leave everything as it was.
    tokio::time::sleep(Duration::from_secs(30)).await;

    handle.shutdown().await?;
    player.wait().await?;
    watcher.abort();

    Ok(())
}
