use crate::utils::error::{LidarError, Result};
use std::time::{Duration, Instant};

/// Polling deadline shared by the drivers. A zero timeout never expires.
#[derive(Debug, Clone)]
pub struct TimeoutTimer {
    timeout: Duration,
    started: Instant,
    occurred: bool,
}

impl Default for TimeoutTimer {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl TimeoutTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            started: Instant::now(),
            occurred: false,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn start(&mut self) {
        self.started = Instant::now();
    }

    pub fn expired(&self) -> bool {
        !self.timeout.is_zero() && self.started.elapsed() > self.timeout
    }

    pub fn flag(&mut self) {
        self.occurred = true;
    }

    /// Returns whether a timeout happened since the last call, and clears it.
    pub fn take_occurred(&mut self) -> bool {
        std::mem::take(&mut self.occurred)
    }

    /// Calls `ready` until it reports true. Does not restart the window; call
    /// [`TimeoutTimer::start`] first.
    pub fn poll_until<F>(&mut self, waiting_for: &str, mut ready: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        loop {
            if ready()? {
                return Ok(());
            }
            if self.expired() {
                self.flag();
                tracing::warn!(
                    "Timed out after {:?} waiting for {}",
                    self.timeout,
                    waiting_for
                );
                return Err(LidarError::timeout(waiting_for));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_never_expires() {
        let mut timer = TimeoutTimer::default();
        timer.start();
        std::thread::sleep(Duration::from_millis(2));
        assert!(!timer.expired());
    }

    #[test]
    fn test_poll_until_times_out_and_flags() {
        let mut timer = TimeoutTimer::new(Duration::from_millis(5));
        timer.start();

        let err = timer.poll_until("range data", || Ok(false)).unwrap_err();
        assert!(matches!(err, LidarError::Timeout { .. }));
        assert!(err.to_string().contains("range data"));
        assert!(timer.take_occurred());
        assert!(!timer.take_occurred());
    }

    #[test]
    fn test_poll_until_returns_once_ready() {
        let mut timer = TimeoutTimer::new(Duration::from_secs(1));
        let mut polls = 0;
        timer.start();

        timer
            .poll_until("data", || {
                polls += 1;
                Ok(polls == 3)
            })
            .unwrap();
        assert_eq!(polls, 3);
        assert!(!timer.take_occurred());
    }

    #[test]
    fn test_poll_until_propagates_errors() {
        let mut timer = TimeoutTimer::new(Duration::from_secs(1));
        timer.start();
        let err = timer
            .poll_until("data", || Err(LidarError::bus("nack")))
            .unwrap_err();
        assert_eq!(err.code(), "bus");
    }
}
