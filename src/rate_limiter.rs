//! Minimum spacing between outbound requests
//!
//! A [`RequestThrottle`] remembers when the previous request started. Each
//! caller takes a turn through [`RequestThrottle::wait_turn`], which sleeps
//! until the interval has passed. The lock is held across the check, the
//! sleep and the update, so callers sharing one throttle are serialized.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Enforces a fixed minimum interval between request starts
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until a request may start, then mark it as started.
    ///
    /// Returns the instant recorded as the start of this request.
    pub fn wait_turn(&self) -> Instant {
        // A panic elsewhere cannot leave the Option half-written
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let delay = self.min_interval - elapsed;
                log::trace!("Throttling request for {:?}", delay);
                thread::sleep(delay);
            }
        }

        let now = Instant::now();
        *last = Some(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_turn_does_not_wait() {
        let throttle = RequestThrottle::new(Duration::from_secs(10));
        let start = Instant::now();
        throttle.wait_turn();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn consecutive_turns_are_spaced() {
        let interval = Duration::from_millis(30);
        let throttle = RequestThrottle::new(interval);

        let starts: Vec<Instant> = (0..5).map(|_| throttle.wait_turn()).collect();

        for pair in starts.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            assert!(gap >= interval, "gap {:?} shorter than {:?}", gap, interval);
        }
    }

    #[test]
    fn no_wait_after_interval_has_passed() {
        let throttle = RequestThrottle::new(Duration::from_millis(20));
        throttle.wait_turn();
        thread::sleep(Duration::from_millis(40));

        let before = Instant::now();
        throttle.wait_turn();
        assert!(before.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn shared_throttle_spaces_concurrent_callers() {
        let interval = Duration::from_millis(25);
        let throttle = Arc::new(RequestThrottle::new(interval));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                thread::spawn(move || throttle.wait_turn())
            })
            .collect();

        let mut starts: Vec<Instant> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        starts.sort();

        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= interval);
        }
    }
}
