//! # APRS Dashboard
//!
//! At-a-glance GPS, radio and power status for a mobile APRS station.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load the TOML configuration
//!    - Set up logging (stderr, or a daily rolling file)
//!    - Create the live state cache
//!
//! 2. **Background listeners**
//!    - KISS listener: TCP client to the KISS server, decodes AX.25 frames
//!    - Positioning listener: gpsd session, fix and sky reports
//!
//! 3. **Render loop**
//!    - Redraw the dashboard every refresh interval until Ctrl+C
//!
//! 4. **Graceful Shutdown**
//!    - Stop both listeners and wait for them to return
//!
//! Expected output on stderr (console surface, no log directory):
//! ```text
//! INFO aprs_dashboard: APRS Dashboard v0.1.0 starting for OE5ITH
//! INFO aprs_dashboard::kiss::listener: KISS listener started for 127.0.0.1:8001
//! INFO aprs_dashboard::gps::listener: Positioning listener started
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use aprs_dashboard::config::{Config, DisplayMode};
use aprs_dashboard::display::Dashboard;
use aprs_dashboard::gps::listener::PositionListener;
use aprs_dashboard::gps::session::GpsdSession;
use aprs_dashboard::kiss::listener::KissListener;
use aprs_dashboard::status::battery::open_fuel_gauge;
use aprs_dashboard::LiveState;

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "aprs-dashboard.log";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "aprs-dashboard", version, about = "Telemetry dashboard for a portable APRS station")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output surface, overrides the configuration
    #[arg(short, long, value_enum)]
    display: Option<DisplayMode>,

    /// Render a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)
            .context("Failed to load default configuration")?,
    };
    if let Some(mode) = cli.display {
        config.display.mode = mode;
    }

    let _log_guard = init_logging(&config)?;
    info!(
        "APRS Dashboard v{} starting for {}",
        env!("CARGO_PKG_VERSION"),
        config.station.callsign
    );

    let (state, frame_publisher, position_publisher) = LiveState::new();

    let kiss = KissListener::from_config(&config, frame_publisher).spawn();
    let gps = PositionListener::new(
        GpsdSession::new(config.gpsd.address()),
        position_publisher,
        config.gpsd.reconnect_interval(),
    )
    .spawn();

    let gauge = open_fuel_gauge(&config.battery);
    let mut dashboard = Dashboard::new(state, gauge, &config);

    if cli.once {
        dashboard
            .draw(&mut std::io::stdout())
            .await
            .context("Failed to draw dashboard")?;
    } else {
        let cancel = CancellationToken::new();
        let render = tokio::spawn(dashboard.run(std::io::stdout(), cancel.clone()));

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, shutting down...");

        cancel.cancel();
        if let Err(e) = render.await {
            tracing::warn!("Render loop ended abnormally: {}", e);
        }
    }

    kiss.shutdown().await;
    gps.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Install the tracing subscriber
///
/// Logs go to a daily rolling file when `logging.directory` is set, stderr
/// otherwise. `RUST_LOG` overrides the configured level.
///
/// # Returns
///
/// Guard that flushes the non-blocking file writer on drop
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid logging level")?;

    match &config.logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
