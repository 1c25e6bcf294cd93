//! tello-link — entry point.
//!
//! ```text
//! tello-link                        Connect with defaults and log telemetry
//! tello-link --config <path>        Use custom config TOML
//! tello-link --picture photo.jpg    Take one photo and save it
//! tello-link --json                 Print each flight update as JSON
//! tello-link --init-config          Write the default config and exit
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use tello_core::{Event, Payload, Subscriber, Tello, Topic};
use tello_link::config::{AppConfig, LoggingConfig};
use tello_link::report;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tello-link", about = "Connect to a Tello and stream its telemetry")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tello-link.toml")]
    config: PathBuf,

    /// Drone address (overrides config).
    #[arg(short, long)]
    drone: Option<IpAddr>,

    /// Connect timeout in seconds.
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Take a photo after connecting and save it here.
    #[arg(long)]
    picture: Option<PathBuf>,

    /// Print flight updates as JSON lines on stdout.
    #[arg(long)]
    json: bool,

    /// Write the default configuration to `--config` and exit.
    #[arg(long)]
    init_config: bool,
}

// ── Logging ──────────────────────────────────────────────────────

fn init_tracing(logging: &LoggingConfig) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.init_config {
        AppConfig::write_default(&cli.config)?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    let loaded = AppConfig::load(&cli.config);
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    if let Some(addr) = cli.drone {
        config.tello.network.drone_address = addr;
    }
    init_tracing(&config.logging)?;

    info!("tello-link v{}", env!("CARGO_PKG_VERSION"));
    match &loaded {
        Err(e) => warn!("invalid config {}: {e}; using defaults", cli.config.display()),
        Ok(_) if !cli.config.exists() => {
            info!("no config at {}; using defaults", cli.config.display());
        }
        Ok(_) => info!("config loaded from {}", cli.config.display()),
    }

    let tello = Tello::new(config.tello).await?;

    // ── 1. Subscribe ────────────────────────────────────────────

    let (file_tx, mut file_rx) = mpsc::unbounded_channel();
    let json = cli.json;
    let subscriber = Subscriber::new(move |event, payload| match (event, payload) {
        (Event::FlightDataUpdate, Payload::Telemetry(snapshot)) => {
            if json {
                match report::json_line(snapshot) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("telemetry not serialisable: {e}"),
                }
            } else {
                info!("{}", report::status_line(snapshot));
            }
        }
        (Event::FileReceived, Payload::File(file)) => {
            let _ = file_tx.send(file.clone());
        }
        (Event::LogUpdate | Event::WifiUpdate | Event::LightUpdate | Event::TimeUpdate, _) => {
            debug!(%event, "update");
        }
        (event, _) => info!(%event, "event"),
    });
    tello.subscribe(Topic::All, &subscriber);

    // ── 2. Connect ──────────────────────────────────────────────

    let timeout = Duration::from_secs(cli.timeout);
    if let Err(e) = tello.connect(timeout).await {
        error!("connect failed: {e}");
        tello.quit().await?;
        return Err(e.into());
    }
    info!(sensors = tello.sensor_names().len(), "connected");

    if cli.picture.is_some() {
        tello.take_picture().await?;
        info!("photo requested");
    }

    // ── 3. Run until Ctrl-C ─────────────────────────────────────

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("ctrl-c handler failed: {e}");
                }
                break;
            }
            Some(file) = file_rx.recv() => {
                let Some(path) = cli.picture.as_ref() else {
                    info!(bytes = file.data.len(), "file received, no --picture path");
                    continue;
                };
                match std::fs::write(path, &file.data) {
                    Ok(()) => info!(bytes = file.data.len(), "saved {}", path.display()),
                    Err(e) => error!("cannot save {}: {e}", path.display()),
                }
            }
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    tello.unsubscribe(Topic::All, &subscriber);
    tello.quit().await?;
    Ok(())
}
