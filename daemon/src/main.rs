mod config;
mod detector;
mod emission;
mod event;
mod filter;
mod monitor;
mod paths;
mod presence;
mod process;
mod snapshot;
mod status;
mod title;
mod window_title;

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::detector::Detector;
use crate::event::DaemonEvent;
use crate::monitor::MonitorHandle;
use crate::presence::ipc::DiscordIpcClient;
use crate::process::SystemProcessSource;

#[derive(Parser, Debug)]
#[command(name = "flstudio-presence", version)]
#[command(about = "Shows what you are doing in FL Studio as Discord Rich Presence")]
struct Args {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Detect FL Studio once, print the snapshot as JSON and exit
    #[arg(long)]
    detect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging ───────────────────────────────────────────────────────────────
    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = match args.config {
        Some(path) => path,
        None => paths::config_file_path()?,
    };
    let config = config::load_or_create(&config_path)?;

    if args.detect {
        let detector = Detector::new(SystemProcessSource::new(), config.update_interval());
        let snapshot = detector.current_snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        eprintln!();
        eprintln!("Edit {} and set [discord] application_id", config_path.display());
        eprintln!("to the numeric id of your Discord application");
        eprintln!("(https://discord.com/developers/applications), or delete the file");
        eprintln!("to restore the defaults.");
        std::process::exit(1);
    }

    let status_path = paths::status_file_path(&config_path);
    tracing::info!(
        config = %config_path.display(),
        "flstudio-presence v{} started",
        env!("CARGO_PKG_VERSION")
    );

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));
    spawn_signal_handlers(event_tx);

    let mut active_config = config;
    let mut monitor = start_monitor(&active_config, &status_path);

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::ConfigReloaded(new_config) => {
                if new_config == active_config {
                    continue;
                }
                tracing::info!("config reloaded; restarting monitor");
                monitor.stop().await;
                active_config = new_config;
                monitor = start_monitor(&active_config, &status_path);
            }
            DaemonEvent::Shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    monitor.stop().await;
    Ok(())
}

/// Builds a fresh detector and presence client for `config` and starts polling.
fn start_monitor(config: &Config, status_path: &Path) -> MonitorHandle {
    let detector = Arc::new(Detector::new(
        SystemProcessSource::new(),
        config.update_interval(),
    ));

    let presence = config
        .discord
        .enable_rich_presence
        .then(|| DiscordIpcClient::new(config.discord.application_id.trim()));
    if presence.is_none() {
        tracing::info!("rich presence disabled in config; only tracking status");
    }

    monitor::spawn(detector, presence, config.clone(), status_path.to_path_buf())
}

/// Forwards Ctrl+C (and SIGTERM on Unix) as [`DaemonEvent::Shutdown`].
fn spawn_signal_handlers(tx: mpsc::Sender<DaemonEvent>) {
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                if term.recv().await.is_some() {
                    let _ = tx.send(DaemonEvent::Shutdown).await;
                }
            }
            Err(e) => tracing::warn!("cannot listen for SIGTERM: {e}"),
        }
    });

    #[cfg(not(unix))]
    drop(tx);
}
