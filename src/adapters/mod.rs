// Adapters layer: concrete buses, delays and reading sinks.

#[cfg(target_os = "linux")]
pub mod linux;
pub mod sim;
pub mod sink;

use crate::domain::ports::Delay;
use std::time::Duration;

/// Blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately; used with simulated buses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay(&mut self, _duration: Duration) {}
}
