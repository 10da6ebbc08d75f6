//! # Hitch Rover
//!
//! Drive a four-wheel trailer mover and its tongue actuator from a Joy-Con.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, default `config/default.toml`)
//!    - Set up logging with a tracing subscriber (stdout, optional daily file)
//!    - Open the five motor outputs; failure here exits non-zero
//!
//! 2. **Main Loop**
//!    - Wait for the controller, retrying at the reconnect interval
//!    - Tick at the configured rate: poll, ramp, mix, stale-input stop
//!    - Emergency stop and reconnect when the controller disappears
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C or SIGTERM
//!    - Emergency stop on every motor, then release all outputs
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- config/default.toml
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hitch_rover::config::{Config, LoggingConfig};
use hitch_rover::controller::JoyConConnector;
use hitch_rover::drive::Vehicle;
use hitch_rover::hardware::open_outputs;
use hitch_rover::supervisor::{ControlLoop, ControlSettings};
use hitch_rover::telemetry::TelemetryLogger;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Base name of the rolling log file
const LOG_FILE_NAME: &str = "hitch-rover.log";

fn config_path(mut args: impl Iterator<Item = String>) -> PathBuf {
    args.nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Install the global subscriber. The guard must live until exit or buffered
/// file output is lost.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if config.file_dir.trim().is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.file_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}

/// Resolves on the first Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path(std::env::args());
    let config = Config::load_or_default(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let _log_guard = init_logging(&config.logging);
    info!("Hitch Rover v{} starting...", env!("CARGO_PKG_VERSION"));
    if !path.exists() {
        warn!("{} not found, running on built-in defaults", path.display());
    }
    info!("Output backend: {:?}", config.hardware.backend);

    let outputs = open_outputs(&config.hardware).context("Failed to initialise motor outputs")?;
    let vehicle = Vehicle::from_config(outputs, &config.drive);
    let connector = JoyConConnector::new(config.controller.device_name.clone());

    let mut control = ControlLoop::new(vehicle, connector, ControlSettings::from_config(&config));
    if config.telemetry.enabled {
        match TelemetryLogger::new(&config.telemetry) {
            Ok(logger) => control = control.with_telemetry(logger),
            Err(e) => warn!("Telemetry disabled: {}", e),
        }
    }

    info!("Press Ctrl+C to exit");
    control
        .run(shutdown_signal())
        .await
        .context("Shutdown did not complete cleanly")?;

    info!("Goodbye");
    Ok(())
}
