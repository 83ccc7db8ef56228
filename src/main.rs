//! # Rover Link
//!
//! Host binary for the rover telemetry link.
//!
//! Connects to the rover bridge over TCP, drains its byte stream into a
//! telemetry session, and keeps reconnecting until shut down. Each
//! disconnect forces a session reset so two sessions' bytes are never mixed
//! mid-frame.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{info, warn};

use rover_link::config::Config;
use rover_link::link::{stream_into, RoverSocket};
use rover_link::odometry;
use rover_link::record::SessionRecorder;
use rover_link::session::TelemetrySession;
use rover_link::store::format_timestamp;

/// Default configuration file path, used when no argument is given
const DEFAULT_CONFIG_PATH: &str = "rover-link.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Rover Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let mut session = if config.record.enabled {
        let recorder = SessionRecorder::new(&config.record)?;
        info!("Recording session samples to {}", config.record.log_dir);
        TelemetrySession::with_recorder(recorder)
    } else {
        TelemetrySession::new()
    };

    info!(
        "Connecting to {}:{} (Ctrl+C to exit)",
        config.connection.host, config.connection.port
    );

    // Main loop: serve one connection at a time, reconnecting forever
    loop {
        let outcome = tokio::select! {
            result = serve_connection(&config, &mut session) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Ok(())) => info!("Connection closed by rover bridge"),
            Some(Err(err)) => warn!("Link error: {}", err),
            None => {
                info!("Received Ctrl+C, shutting down...");
                log_session_summary(&session, &config);
                break;
            }
        }

        log_session_summary(&session, &config);

        // A reconnect must never mix two sessions' bytes mid-frame
        session.reset_link();
        sleep(Duration::from_millis(config.connection.reconnect_interval_ms)).await;
    }

    Ok(())
}

/// Load the configuration file named on the command line, the default file
/// if it exists, or built-in defaults
fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        info!("Loading configuration from {}", path);
        return Ok(Config::load(&path)?);
    }

    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        info!("Loading configuration from {}", DEFAULT_CONFIG_PATH);
        return Ok(Config::load(DEFAULT_CONFIG_PATH)?);
    }

    info!("No configuration file found, using defaults");
    Ok(Config::default())
}

/// Connect once and drain the stream until it ends
async fn serve_connection(config: &Config, session: &mut TelemetrySession) -> Result<()> {
    let mut socket = RoverSocket::connect(&config.connection.host, config.connection.port).await?;
    stream_into(&mut socket, session, config.connection.read_buffer_bytes).await?;
    Ok(())
}

/// Log what the session holds: store shape and the integrated trajectory
fn log_session_summary(session: &TelemetrySession, config: &Config) {
    let store = session.store();
    if store.channel_names().is_empty() {
        return;
    }

    info!(
        "Session {:?}: {} channels, {} distinct timestamps, t={}",
        session.state(),
        store.channel_names().len(),
        store.ordered_timestamps().len(),
        format_timestamp(store.latest_timestamp())
    );

    let positions = odometry::trajectory(store, &config.odometry);
    match positions.last() {
        Some(position) => info!(
            "Trajectory: {} positions, final ({:.2}, {:.2}) heading {:.1} deg",
            positions.len(),
            position.x,
            position.y,
            position.heading_degrees
        ),
        None => info!("Trajectory: insufficient odometry data"),
    }
}
