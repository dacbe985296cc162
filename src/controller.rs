//! The idle cycle: wait for inactivity, save the screen and start the
//! saver, wait for input, stop the saver and put the screen back.
//!
//! One logical thread of control; the only suspension points are the
//! bounded polls inside the activity monitor, so the stop flag is observed
//! within one tick from any phase.

use anyhow::{Context, Result};
use nix::unistd::Pid;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::display::{self, SnapshotBuffer, Surface};
use crate::idle::{ActivityMonitor, DeviceSet, WaitOutcome};
use crate::logging::JsonlLogger;
use crate::saver::Supervisor;
use crate::shutdown::Shutdown;

/// Owns every piece of the cycle: the display surface, the saved frame, the
/// device monitor, and the saver child (at most one at a time).
pub struct Controller<S: Surface> {
    device_paths: Vec<PathBuf>,
    timeout_seconds: u32,
    strict_reopen: bool,
    monitor: ActivityMonitor,
    supervisor: Supervisor,
    surface: S,
    snapshot: SnapshotBuffer,
    shutdown: Shutdown,
    journal: Option<JsonlLogger>,
    cycles_completed: u64,
}

impl<S: Surface> Controller<S> {
    pub fn new(
        monitor_config: &MonitorConfig,
        surface: S,
        monitor: ActivityMonitor,
        supervisor: Supervisor,
        shutdown: Shutdown,
        journal: Option<JsonlLogger>,
    ) -> Self {
        // Sized once to the display's resolution and reused every cycle.
        let snapshot = SnapshotBuffer::new(surface.width(), surface.height());
        Self {
            device_paths: monitor_config.devices.clone(),
            timeout_seconds: monitor_config.timeout_seconds,
            strict_reopen: monitor_config.strict_reopen,
            monitor,
            supervisor,
            surface,
            snapshot,
            shutdown,
            journal,
            cycles_completed: 0,
        }
    }

    /// Run idle cycles until a stop is requested.
    pub fn run(&mut self) -> Result<()> {
        // Every configured device must open at startup; a failure here is a
        // configuration error, before any wait phase begins.
        DeviceSet::open(&self.device_paths, true)
            .context("Initial open of input devices failed")?;

        self.journal(|j| j.log_session_start(crate::VERSION));
        info!(
            "Entering idle cycle: {} devices, {}s timeout",
            self.device_paths.len(),
            self.timeout_seconds
        );

        while !self.shutdown.stop_requested() {
            let Some(devices) = self.open_devices()? else {
                std::thread::sleep(self.monitor.tick());
                continue;
            };
            let outcome = self.monitor.wait_until_idle(&devices, self.timeout_seconds);
            drop(devices);
            if outcome == WaitOutcome::Stopped {
                break;
            }

            info!("Console idle for {}s, starting saver", self.timeout_seconds);
            let timeout_seconds = self.timeout_seconds;
            self.journal(|j| j.log_idle_start(timeout_seconds));

            display::hide_cursor();
            self.snapshot.capture_from(&self.surface, 0, 0);

            let child = match self.supervisor.spawn() {
                Ok(pid) => {
                    self.journal(|j| j.log_saver_spawned(pid.as_raw()));
                    Some(pid)
                }
                Err(e) => {
                    // The cycle carries on; there is just nothing to stop
                    // when input resumes.
                    error!("Failed to start saver: {:#}", e);
                    None
                }
            };

            let mut reopen_error = None;
            let outcome = match self.open_devices_until_ready() {
                Ok(Some(devices)) => {
                    self.monitor.wait_until_active(&devices, self.timeout_seconds)
                }
                Ok(None) => WaitOutcome::Stopped,
                Err(e) => {
                    reopen_error = Some(e);
                    WaitOutcome::Stopped
                }
            };
            if outcome == WaitOutcome::Activity {
                debug!("Input activity resumed");
            }

            // Whether input resumed, a stop was requested, or the re-open
            // failed, the saver is stopped and the console restored before
            // this cycle ends.
            self.finish_cycle(child);

            if let Some(e) = reopen_error {
                return Err(e);
            }
        }

        info!("Stop requested, leaving idle cycle");
        let cycles_completed = self.cycles_completed;
        self.journal(|j| j.log_session_end(cycles_completed));
        Ok(())
    }

    /// Terminate the saver (if one was started), restore the saved frame,
    /// and bring the cursor back.
    fn finish_cycle(&mut self, child: Option<Pid>) {
        if let Some(pid) = child {
            Supervisor::terminate(pid);
            self.journal(|j| j.log_saver_terminated(pid.as_raw()));
        }
        self.snapshot.restore_to(&mut self.surface, 0, 0);
        display::show_cursor();
        self.journal(|j| j.log_idle_end());
        self.cycles_completed += 1;
    }

    /// Open the device set under the configured re-open policy. Strict:
    /// any failure is fatal. Lenient: Ok(None) when nothing opened.
    fn open_devices(&self) -> Result<Option<DeviceSet>> {
        match DeviceSet::open(&self.device_paths, self.strict_reopen) {
            Ok(devices) => Ok(Some(devices)),
            Err(e) if self.strict_reopen => {
                Err(e.context("Re-opening input devices failed"))
            }
            Err(e) => {
                warn!("No input devices could be opened this cycle: {:#}", e);
                Ok(None)
            }
        }
    }

    /// Like `open_devices`, but under the lenient policy keeps retrying
    /// once per tick until a set opens or a stop is requested (Ok(None)).
    fn open_devices_until_ready(&self) -> Result<Option<DeviceSet>> {
        while !self.shutdown.stop_requested() {
            match self.open_devices()? {
                Some(devices) => return Ok(Some(devices)),
                None => std::thread::sleep(self.monitor.tick()),
            }
        }
        Ok(None)
    }

    fn journal<F>(&mut self, f: F)
    where
        F: FnOnce(&mut JsonlLogger) -> Result<()>,
    {
        if let Some(journal) = &mut self.journal {
            if let Err(e) = f(journal) {
                warn!("Failed to write journal event: {:#}", e);
            }
        }
    }
}
