//! Console cursor control via the KDSETMODE ioctl on /dev/tty0.
//!
//! Switching the console to graphics mode stops the kernel from drawing the
//! text cursor (and console output) over the saver; text mode brings both
//! back. Failures are logged and never fatal — the cycle works without them,
//! just with a blinking cursor on top.

use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

const CONSOLE_DEVICE: &str = "/dev/tty0";

const KDSETMODE: libc::c_ulong = 0x4B3A;
const KD_TEXT: libc::c_int = 0;
const KD_GRAPHICS: libc::c_int = 1;

fn set_console_mode(mode: libc::c_int) {
    let file = match OpenOptions::new().write(true).open(CONSOLE_DEVICE) {
        Ok(file) => file,
        Err(e) => {
            warn!("Can't open {}: {}", CONSOLE_DEVICE, e);
            return;
        }
    };
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), KDSETMODE, mode) };
    if ret < 0 {
        warn!(
            "KDSETMODE ioctl failed on {}: {}",
            CONSOLE_DEVICE,
            std::io::Error::last_os_error()
        );
    }
}

/// Put the console into graphics mode, hiding the text cursor.
pub fn hide_cursor() {
    debug!("Hiding console cursor");
    set_console_mode(KD_GRAPHICS);
}

/// Put the console back into text mode, restoring the cursor.
pub fn show_cursor() {
    debug!("Showing console cursor");
    set_console_mode(KD_TEXT);
}
