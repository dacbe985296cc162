//! Cooperative shutdown flag, set from signal handlers and sampled between
//! poll ticks.

use anyhow::Result;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Cloneable stop-request handle shared between the signal handlers and the
/// controller loop.
#[derive(Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

static SIGNAL_SHUTDOWN: OnceLock<Shutdown> = OnceLock::new();

extern "C" fn handle_shutdown_signal(_signal: libc::c_int) {
    // Only the atomic store here; everything else waits for the loop.
    if let Some(shutdown) = SIGNAL_SHUTDOWN.get() {
        shutdown.request_stop();
    }
}

/// Install handlers for the shutdown signals (SIGINT, SIGTERM, SIGHUP,
/// SIGQUIT) that raise the given stop flag. SA_RESTART is deliberately not
/// set so an in-flight poll returns with EINTR and the flag is seen at once.
pub fn install_signal_handlers(shutdown: &Shutdown) -> Result<()> {
    let _ = SIGNAL_SHUTDOWN.set(shutdown.clone());

    let action = SigAction::new(
        SigHandler::Handler(handle_shutdown_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [
        Signal::SIGINT,
        Signal::SIGTERM,
        Signal::SIGHUP,
        Signal::SIGQUIT,
    ] {
        unsafe { sigaction(signal, &action)? };
    }

    info!("Shutdown signal handlers installed");
    Ok(())
}
