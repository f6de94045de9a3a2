//! Minimum-interval request limiter shared by the import clients

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub(crate) struct RateLimiter {
    /// Earliest instant the next request may start
    next_slot: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            next_slot: Mutex::new(None),
            min_interval,
        }
    }

    /// Reserve the next slot, then sleep until it arrives
    ///
    /// Concurrent callers get slots one interval apart; the lock is not held
    /// while sleeping.
    pub(crate) async fn wait(&self) {
        let now = Instant::now();
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.min_interval);
            slot
        };

        if slot > now {
            tracing::debug!("Rate limiting: waiting {:?}", slot - now);
            tokio::time::sleep_until(slot.into()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let start = Instant::now();

        limiter.wait().await;
        let first = start.elapsed();
        limiter.wait().await;
        let second = start.elapsed();

        assert!(first < Duration::from_millis(100));
        assert!(second >= Duration::from_millis(180));
    }
}
