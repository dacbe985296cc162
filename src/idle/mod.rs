//! Input-activity monitoring: the open device set and the idle/active wait
//! loops built on top of it.

mod devices;
mod monitor;

pub use devices::DeviceSet;
pub use monitor::{ActivityMonitor, WaitOutcome};
