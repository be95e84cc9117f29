//! Probe Server – collects device info, camera frames and audio clips
//! posted by browsers and writes each one to disk.
//!
//! This binary:
//! 1. Reads configuration from `probe.conf` (or the path given as the
//!    first argument)
//! 2. Creates the data directory
//! 3. Runs the axum HTTP server until Ctrl-C / SIGTERM

mod error;
mod server;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use probe_common::config::{self, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "probe_server=info,probe_common=info,tower_http=info".into()),
        )
        .init();

    // ── load config ──────────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| Config::default_path().to_string());
    let config = config::load_or_default(&PathBuf::from(&config_path))
        .context("Config load failed")?;

    info!(
        "Probe Server starting (data_dir={}, port={})",
        config.data_dir.display(),
        config.listen_port
    );

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("Cannot create data directory {}", config.data_dir.display())
    })?;

    // ── ctrl-c ───────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        flag.store(true, Ordering::Relaxed);
    })
    .context("Cannot set Ctrl-C handler")?;

    // ── HTTP server ──────────────────────────────────────────────────
    server::run(&config, shutdown).await?;

    info!("Probe Server stopped");
    Ok(())
}
