//! consaver - Console Screensaver Daemon
//!
//! A lightweight daemon for the Linux console that watches input devices
//! for inactivity, saves the framebuffer contents, runs an external
//! screensaver program while idle, and restores the screen when input
//! resumes.

mod config;
mod controller;
mod display;
mod idle;
mod logging;
mod saver;
mod shutdown;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::controller::Controller;
use crate::display::{Framebuffer, Surface};
use crate::idle::ActivityMonitor;
use crate::logging::JsonlLogger;
use crate::saver::Supervisor;
use crate::shutdown::Shutdown;

/// Application version.
pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // Load configuration
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    // Ensure the data directory exists before logging starts
    std::fs::create_dir_all(config.logging.logs_dir())?;

    // Initialize tracing
    init_tracing(&config)?;

    info!("Starting consaver v{}", VERSION);

    let shutdown = Shutdown::new();
    shutdown::install_signal_handlers(&shutdown)?;
    saver::set_auto_reap()?;

    let surface =
        Framebuffer::open(&config.display.device).context("Display initialization failed")?;
    info!("Display is {}x{}", surface.width(), surface.height());

    let journal = JsonlLogger::new(config.logging.logs_dir())?;

    // Detach unless running in debug/foreground mode
    if !config.debug {
        nix::unistd::daemon(false, false).context("Failed to daemonize")?;
    }

    let monitor = ActivityMonitor::new(shutdown.clone());
    let supervisor = Supervisor::new(config.saver.command.clone());
    let mut controller = Controller::new(
        &config.monitor,
        surface,
        monitor,
        supervisor,
        shutdown,
        Some(journal),
    );
    controller.run()?;

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing: stderr in debug mode, an append-mode log file under
/// the data directory otherwise.
fn init_tracing(config: &Config) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.debug {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    } else {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.logging.logs_dir().join("consaver.log"))
            .context("Failed to open log file")?;
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(Arc::new(log_file)),
            )
            .with(filter)
            .init();
    }

    Ok(())
}
