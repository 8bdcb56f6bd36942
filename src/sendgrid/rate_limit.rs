use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Fixed minimum-interval throttle shared by every outbound SendGrid call.
///
/// The lock is held across the wait so concurrent callers are spaced out
/// one interval apart rather than all waking at once.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `per_second <= 0` disables limiting.
    pub fn new(per_second: i64) -> Self {
        let min_interval = if per_second > 0 {
            Some(Duration::from_nanos(1_000_000_000 / per_second as u64))
        } else {
            None
        };

        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Wait until at least one interval has passed since the previous call started.
    pub async fn await_turn(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < interval {
                let wait = interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limiting SendGrid call");
                sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_back_to_back_calls_are_spaced() {
        let limiter = RateLimiter::new(10);
        assert_eq!(limiter.min_interval(), Some(Duration::from_millis(100)));

        let start = Instant::now();
        limiter.await_turn().await;
        limiter.await_turn().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let limiter = RateLimiter::new(1);

        let start = Instant::now();
        limiter.await_turn().await;

        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_disabled_limiter_never_waits() {
        for rate in [0, -5] {
            let limiter = RateLimiter::new(rate);
            assert!(limiter.min_interval().is_none());

            let start = Instant::now();
            for _ in 0..50 {
                limiter.await_turn().await;
            }
            assert!(start.elapsed() < Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_the_interval() {
        let limiter = Arc::new(RateLimiter::new(20));

        let start = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.await_turn().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // three calls at 50ms spacing need at least two full intervals
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
