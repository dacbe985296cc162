//! Idle/active wait loops over the monitored device set.
//!
//! Both waits poll with a bounded tick (one second in production) so the
//! shutdown flag is re-checked at least once per tick. Any readable byte on
//! any device counts as activity; the bytes themselves are discarded.

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::AsFd;
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::devices::{DeviceSet, MonitoredDevice};
use crate::shutdown::Shutdown;

const DEFAULT_TICK_MS: u16 = 1000;
const DRAIN_BUF_LEN: usize = 256;

/// How a wait phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The configured number of silent ticks elapsed.
    Idle,
    /// A monitored device became readable.
    Activity,
    /// The shutdown flag was raised.
    Stopped,
}

/// Polls a device set until the console goes idle or active again.
pub struct ActivityMonitor {
    shutdown: Shutdown,
    tick_ms: u16,
}

impl ActivityMonitor {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            tick_ms: DEFAULT_TICK_MS,
        }
    }

    /// Monitor with a custom poll tick. Production uses the one-second
    /// default; tests shorten it.
    pub fn with_tick(shutdown: Shutdown, tick: Duration) -> Self {
        let tick_ms = tick.as_millis().clamp(1, u16::MAX as u128) as u16;
        Self { shutdown, tick_ms }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms as u64)
    }

    /// Wait until no device has been readable for `timeout_seconds`
    /// consecutive ticks. Activity on any device resets the count.
    pub fn wait_until_idle(&self, devices: &DeviceSet, timeout_seconds: u32) -> WaitOutcome {
        debug!("Waiting for {} ticks of inactivity", timeout_seconds);

        let mut ticks = 0u32;
        while !self.shutdown.stop_requested() {
            if self.poll_once(devices) {
                trace!("Activity seen, resetting idle counter");
                ticks = 0;
            } else {
                ticks += 1;
                if ticks >= timeout_seconds {
                    return WaitOutcome::Idle;
                }
            }
        }
        WaitOutcome::Stopped
    }

    /// Wait until any device is readable. `timeout_seconds` mirrors
    /// `wait_until_idle`'s signature but does not bound this phase: only
    /// activity or a stop request ends it.
    pub fn wait_until_active(&self, devices: &DeviceSet, _timeout_seconds: u32) -> WaitOutcome {
        debug!("Waiting for input activity");

        while !self.shutdown.stop_requested() {
            if self.poll_once(devices) {
                return WaitOutcome::Activity;
            }
        }
        WaitOutcome::Stopped
    }

    /// Poll every device for up to one tick, draining whichever became
    /// readable. Returns whether any device signaled activity. A poll error
    /// is logged and treated the same as an empty ready-set.
    fn poll_once(&self, devices: &DeviceSet) -> bool {
        let mut fds: Vec<PollFd> = devices
            .iter()
            .map(|device| PollFd::new(device.file.as_fd(), PollFlags::POLLIN))
            .collect();

        match poll(&mut fds, PollTimeout::from(self.tick_ms)) {
            Ok(0) => {
                trace!("poll() timed out");
                false
            }
            Ok(_) => {
                let mut activity = false;
                for (device, fd) in devices.iter().zip(fds.iter()) {
                    let revents = fd.revents().unwrap_or(PollFlags::empty());
                    if revents.contains(PollFlags::POLLIN) {
                        activity = true;
                        drain(device);
                    }
                }
                activity
            }
            Err(e) => {
                warn!("poll() failed: {}", e);
                false
            }
        }
    }
}

/// Discard up to one buffer of pending input. What was read is irrelevant;
/// readability already counted as activity.
fn drain(device: &MonitoredDevice) {
    let mut buf = [0u8; DRAIN_BUF_LEN];
    let n = unsafe {
        libc::read(
            device.file.as_raw_fd(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        )
    };
    if n < 0 {
        debug!(
            "Read from {:?} failed: {}",
            device.path,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Instant;

    fn pipe_device(label: &str) -> ((PathBuf, File), File) {
        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        (
            (PathBuf::from(label), File::from(read_end)),
            File::from(write_end),
        )
    }

    #[test]
    fn idle_wait_returns_at_exact_tick_count() {
        let (device, _writer) = pipe_device("quiet");
        let devices = DeviceSet::from_files(vec![device]);
        let monitor = ActivityMonitor::with_tick(Shutdown::new(), Duration::from_millis(10));

        let start = Instant::now();
        let outcome = monitor.wait_until_idle(&devices, 3);
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::Idle);
        assert!(elapsed >= Duration::from_millis(30), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "returned late: {elapsed:?}");
    }

    #[test]
    fn activity_resets_the_idle_counter() {
        let (device, mut writer) = pipe_device("busy");
        let devices = DeviceSet::from_files(vec![device]);
        let monitor = ActivityMonitor::with_tick(Shutdown::new(), Duration::from_millis(20));

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            writer.write_all(b"x").unwrap();
            writer
        });

        let start = Instant::now();
        let outcome = monitor.wait_until_idle(&devices, 3);
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::Idle);
        // One tick elapsed before the byte; the full three-tick run of
        // silence can only start after it.
        assert!(elapsed >= Duration::from_millis(85), "counter was not reset: {elapsed:?}");
        let _ = handle.join().unwrap();
    }

    #[test]
    fn active_wait_returns_on_first_byte() {
        let (device, mut writer) = pipe_device("input");
        let devices = DeviceSet::from_files(vec![device]);
        let monitor = ActivityMonitor::with_tick(Shutdown::new(), Duration::from_millis(50));

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            writer.write_all(b"k").unwrap();
            writer
        });

        let start = Instant::now();
        let outcome = monitor.wait_until_active(&devices, 3);
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::Activity);
        assert!(elapsed < Duration::from_millis(500), "missed the wakeup: {elapsed:?}");
        let _ = handle.join().unwrap();
    }

    #[test]
    fn any_device_in_the_set_counts() {
        let (first, _first_writer) = pipe_device("first");
        let (second, mut second_writer) = pipe_device("second");
        let devices = DeviceSet::from_files(vec![first, second]);
        let monitor = ActivityMonitor::with_tick(Shutdown::new(), Duration::from_millis(20));

        second_writer.write_all(b"m").unwrap();
        assert_eq!(monitor.wait_until_active(&devices, 3), WaitOutcome::Activity);
    }

    #[test]
    fn both_waits_stop_when_the_flag_is_raised() {
        let (device_a, _writer_a) = pipe_device("a");
        let (device_b, _writer_b) = pipe_device("b");
        let shutdown = Shutdown::new();
        let monitor = ActivityMonitor::with_tick(shutdown.clone(), Duration::from_millis(20));

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            shutdown.request_stop();
        });

        let devices = DeviceSet::from_files(vec![device_a]);
        let start = Instant::now();
        assert_eq!(monitor.wait_until_idle(&devices, 1000), WaitOutcome::Stopped);
        assert!(start.elapsed() < Duration::from_millis(500));
        stopper.join().unwrap();

        // Flag already set: the active wait must not block at all.
        let devices = DeviceSet::from_files(vec![device_b]);
        assert_eq!(monitor.wait_until_active(&devices, 1000), WaitOutcome::Stopped);
    }
}
