//! hidlink device runtime: binary entry point.
//!
//! # Usage
//!
//! ```text
//! hidlink-device [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Config file [env: HIDLINK_CONFIG]
//!   --bind <ADDR>       Override [link].bind_address
//!   --port <PORT>       Override [link].port
//!   --capture-stdin     Read captured input lines from stdin
//!   --write-config      Write the effective config to --config (or the
//!                       platform default) and exit
//! ```
//!
//! # What happens at startup
//!
//! 1. CLI arguments are parsed with `clap`.
//! 2. The TOML config is loaded; a missing file means defaults.
//! 3. `tracing_subscriber` is initialised.  `RUST_LOG` wins over the
//!    configured level.
//! 4. A Ctrl+C handler clears the shared running flag.
//! 5. The link server accepts hosts until the flag is cleared.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hidlink_device::application::execute_command::HidEmulator;
use hidlink_device::infrastructure::hid_emulation::mock::MockHidEmulator;
use hidlink_device::infrastructure::input_capture::pump_lines;
use hidlink_device::infrastructure::link::{run_server, LinkSettings};
use hidlink_device::infrastructure::storage::config::{
    config_file_path, load_config, save_config_to, DeviceConfig,
};

/// Buffered captured inputs per link before a slow link starts lagging.
const CAPTURE_CHANNEL_CAPACITY: usize = 256;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// hidlink device runtime.
///
/// Serves host links and drives HID emulation.
#[derive(Debug, Parser)]
#[command(
    name = "hidlink-device",
    about = "Serves hidlink command links and emulates a USB mouse and keyboard",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// Defaults to `device.toml` in the platform config directory.
    #[arg(long, env = "HIDLINK_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on, overriding the config file.
    #[arg(long)]
    bind: Option<String>,

    /// TCP port to listen on, overriding the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Read captured input lines from stdin and stream them to recording links.
    #[arg(long)]
    capture_stdin: bool,

    /// Write the effective config file and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn effective_config(&self) -> anyhow::Result<DeviceConfig> {
        let mut config = load_config(self.config.as_deref()).context("failed to load config")?;
        if let Some(bind) = &self.bind {
            config.link.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.link.port = port;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if cli.write_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => config_file_path()?,
        };
        save_config_to(&config, &path)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        info!("wrote config to {}", path.display());
        return Ok(());
    }

    let bind = config.link.socket_addr()?;
    let settings = LinkSettings::from(&config.link);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        frame_timeout_ms = settings.frame_timeout_ms,
        "hidlink-device starting"
    );

    // No hardware back-end is wired in yet; the mock logs every HID action.
    let emulator: Arc<dyn HidEmulator> = Arc::new(MockHidEmulator::new());

    let (capture_tx, _) = broadcast::channel(CAPTURE_CHANNEL_CAPACITY);
    if cli.capture_stdin {
        let tx = capture_tx.clone();
        tokio::spawn(async move {
            match pump_lines(BufReader::new(tokio::io::stdin()), tx).await {
                Ok(count) => info!(count, "stdin capture finished"),
                Err(e) => warn!("stdin capture failed: {e}"),
            }
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrlc = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received; shutting down");
            running_ctrlc.store(false, Ordering::SeqCst);
        }
    });

    run_server(bind, settings, emulator, capture_tx, running)
        .await
        .context("link server failed")?;

    info!("hidlink-device stopped");
    Ok(())
}
