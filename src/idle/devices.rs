//! The set of input devices watched for activity.

use anyhow::{bail, Result};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// One open input device.
#[derive(Debug)]
pub(crate) struct MonitoredDevice {
    pub(crate) path: PathBuf,
    pub(crate) file: File,
}

/// An ordered set of open input devices. The set is built fresh at the start
/// of each wait phase and closed when dropped at its end, so a poll call
/// always sees a consistent snapshot.
#[derive(Debug)]
pub struct DeviceSet {
    devices: Vec<MonitoredDevice>,
}

impl DeviceSet {
    /// Open every path in order. With `require_all`, any single failure
    /// fails the whole open; otherwise failures are logged and at least one
    /// device must open.
    pub fn open(paths: &[PathBuf], require_all: bool) -> Result<Self> {
        debug!("Opening {} input devices", paths.len());

        let mut devices = Vec::with_capacity(paths.len());
        let mut failures = 0usize;
        for path in paths {
            debug!("Opening device {:?}", path);
            match open_device(path) {
                Ok(file) => devices.push(MonitoredDevice {
                    path: path.clone(),
                    file,
                }),
                Err(e) => {
                    error!("Can't open device {:?}: {}", path, e);
                    failures += 1;
                }
            }
        }

        if require_all && failures > 0 {
            bail!(
                "{} of {} input devices failed to open",
                failures,
                paths.len()
            );
        }
        if devices.is_empty() {
            bail!("none of the configured input devices could be opened");
        }

        Ok(Self { devices })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &MonitoredDevice> {
        self.devices.iter()
    }

    #[cfg(test)]
    pub(crate) fn from_files(files: Vec<(PathBuf, File)>) -> Self {
        Self {
            devices: files
                .into_iter()
                .map(|(path, file)| MonitoredDevice { path, file })
                .collect(),
        }
    }
}

impl Drop for DeviceSet {
    fn drop(&mut self) {
        debug!("Closing {} input devices", self.devices.len());
    }
}

fn open_device(path: &Path) -> std::io::Result<File> {
    // Non-blocking so a drain read after poll can never stall the loop.
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}
