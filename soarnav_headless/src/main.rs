use clap::Parser;
use common::config::{GpsConfig, SIMULATOR_DEVICE};
use dirs::data_local_dir;
use module_core::{EventBus, EventKind, Module};
use nmea::NmeaModule;
use receiver::ReceiverModule;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the GPS configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the configured receiver device.
    #[arg(short, long)]
    device: Option<String>,
    /// Override the configured baud rate.
    #[arg(short, long)]
    baud: Option<u32>,
    /// Override the adapter listen port.
    #[arg(short, long)]
    port: Option<u16>,
    /// Use the built-in NMEA simulator as the GPS source.
    #[arg(short, long)]
    sim: bool,
}

fn config_path(cli: &Cli) -> Result<PathBuf, ()> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    let mut path = data_local_dir().ok_or_else(|| {
        error!("Could not determine local data directory");
    })?;
    path.push("soarnav");
    path.push("gps.json");
    Ok(path)
}

/// Loads the configuration, creating a default file on first start.
fn load_config(path: &PathBuf) -> GpsConfig {
    match std::fs::read_to_string(path) {
        Ok(json) => match GpsConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                warn!("Broken config {}, using defaults: {e}", path.display());
                GpsConfig::default()
            }
        },
        Err(_) => {
            info!("No config at {}, creating defaults", path.display());
            let config = GpsConfig::default();
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match GpsConfig::to_json(&config) {
                Ok(json) => {
                    if let Err(e) = std::fs::write(path, json) {
                        warn!("Failed to write default config: {e}");
                    }
                }
                Err(e) => warn!("Failed to serialize default config: {e}"),
            }
            config
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = config_path(&cli)?;
    let mut config = load_config(&path);
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(baud) = cli.baud {
        config.baud = baud;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.sim {
        config.device = SIMULATOR_DEVICE.to_owned();
    }

    let eb = EventBus::default();
    let mut receiver = ReceiverModule::new(eb.context(), config.clone())
        .await
        .map_err(|e| {
            error!("Failed to bind the adapter listener: {e}");
        })?;
    let mut nmea = NmeaModule::with_config_path(eb.context(), config, path);

    let quit_ctx = eb.context();
    ctrlc::set_handler(move || {
        info!("Shutting down...");
        quit_ctx.publish(EventKind::QuitEvent);
    })
    .map_err(|e| {
        error!("Failed to install the signal handler: {e}");
    })?;

    // The subsystem never touches the OS clock itself; the sync request is
    // surfaced here for a privileged embedder to act on.
    let mut rx = eb.subscribe();
    let clock_watch = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match &event.kind {
                    EventKind::ClockSyncEvent(utc) => {
                        info!("GPS time available, system clock should be set to {utc} UTC");
                    }
                    EventKind::QuitEvent => break,
                    _ => {}
                },
                Err(_) => break,
            }
        }
    });

    info!("Starting modules...");
    let result = tokio::join!(receiver.run(), nmea.run()).0;
    let _ = clock_watch.await;
    result
}
