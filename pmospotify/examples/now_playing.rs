//! Example: Display the user's current Spotify playback
//!
//! This example demonstrates:
//! - Creating a Spotify client from a bearer token
//! - Fetching the current playback state
//! - Enumerating available devices
//!
//! Run with: SPOTIFY_TOKEN=BQD... cargo run --example now_playing

use pmospotify::{Result, SpotifyClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let token = std::env::var("SPOTIFY_TOKEN").unwrap_or_default();
    if token.is_empty() {
        eprintln!("Set SPOTIFY_TOKEN to a valid Web API bearer token");
        return Ok(());
    }

    println!("Spotify - Now Playing");
    println!("=====================\n");

    let client = SpotifyClient::new(token)?;

    match client.playback_state().await? {
        Some(state) => {
            println!("Playing: {}", state.is_playing);
            println!("Device:  {} ({})", state.device.name, state.device.kind);
            if let Some(item) = &state.item {
                let artists: Vec<&str> =
                    item.artists.iter().map(|a| a.name.as_str()).collect();
                println!("Track:   {} - {}", artists.join(", "), item.name);
                println!(
                    "Elapsed: {}s / {}s",
                    state.progress_ms.unwrap_or(0) / 1000,
                    item.duration_ms / 1000
                );
            }
            if let Some(context) = &state.context {
                println!("Context: {} ({})", context.uri, context.kind);
            }
        }
        None => println!("Nothing is playing right now."),
    }

    println!("\nAvailable devices:");
    for device in client.devices().await? {
        let marker = if device.is_active { "*" } else { " " };
        println!(
            "  {} {} ({}) volume={}",
            marker,
            device.name,
            device.kind,
            device
                .volume_percent
                .map(|v| v.to_string())
                .unwrap_or_else(|| "?".into())
        );
    }

    Ok(())
}
