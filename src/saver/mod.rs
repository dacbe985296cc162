//! Saver child-process supervision: fire-and-forget spawn and terminate.
//!
//! SIGCHLD is set to SIG_IGN once at startup, so exited children are reaped
//! by the kernel and no wait call appears anywhere in the cycle.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::Pid;
use std::process::Command;
use tracing::{debug, warn};

/// Ask the kernel to auto-reap exited children. Called once before the
/// first spawn.
pub fn set_auto_reap() -> Result<()> {
    unsafe { signal::signal(Signal::SIGCHLD, SigHandler::SigIgn) }
        .context("Failed to ignore SIGCHLD")?;
    Ok(())
}

/// Launches and terminates the configured saver program. The controller
/// tracks at most one child at a time.
pub struct Supervisor {
    command: Vec<String>,
}

impl Supervisor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Start the saver program, returning its pid. The child inherits the
    /// console so it can draw; nothing is ever read back from it.
    pub fn spawn(&self) -> Result<Pid> {
        let (program, args) = self
            .command
            .split_first()
            .context("Saver command is empty")?;

        debug!("Executing command {}", program);
        let child = Command::new(program)
            .args(args)
            .spawn()
            .with_context(|| format!("Can't execute {}", program))?;

        let pid = Pid::from_raw(child.id() as i32);
        debug!("Saver pid is {}", pid);
        Ok(pid)
    }

    /// Send SIGTERM to the child. Never blocks; a child that already exited
    /// is not an error.
    pub fn terminate(pid: Pid) {
        match signal::kill(pid, Signal::SIGTERM) {
            Ok(()) => debug!("Sent SIGTERM to saver pid {}", pid),
            Err(Errno::ESRCH) => debug!("Saver pid {} already gone", pid),
            Err(e) => warn!("Failed to signal saver pid {}: {}", pid, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn spawn_and_terminate_round_trip() {
        set_auto_reap().unwrap();

        let supervisor = Supervisor::new(vec!["sleep".to_string(), "30".to_string()]);
        let pid = supervisor.spawn().unwrap();
        assert!(pid.as_raw() > 0);

        Supervisor::terminate(pid);
        // Idempotent: a second signal after exit must not panic or error.
        std::thread::sleep(Duration::from_millis(50));
        Supervisor::terminate(pid);
    }

    #[test]
    fn spawn_failure_is_reported_to_the_caller() {
        let supervisor = Supervisor::new(vec!["/definitely/not/a/real/saver".to_string()]);
        assert!(supervisor.spawn().is_err());
    }

    #[test]
    fn empty_command_is_an_error() {
        let supervisor = Supervisor::new(Vec::new());
        assert!(supervisor.spawn().is_err());
    }
}
