//! Per-source rate limiter (spec.md §4.2). Guarded by its own mutex —
//! nothing outside this struct touches the cursor.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

pub struct RateLimiter {
    min_interval: Duration,
    throttle_cooldown: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, throttle_cooldown: Duration) -> Self {
        Self {
            min_interval,
            throttle_cooldown,
            next_allowed: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, Duration::from_secs(3))
    }

    /// Suspend until the next slot is free, or return `FetchError::Canceled`
    /// if `cancel` fires first. Reserves the following slot before
    /// returning so concurrent callers serialize correctly.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        let mut guard = self.next_allowed.lock().await;
        let now = Instant::now();
        let wait_until = guard.unwrap_or(now);

        if wait_until > now {
            let sleep = tokio::time::sleep_until(wait_until);
            tokio::select! {
                _ = sleep => {}
                _ = cancel.cancelled() => return Err(FetchError::Canceled),
            }
        }

        let effective_now = Instant::now();
        *guard = Some(effective_now + self.min_interval);
        Ok(())
    }

    /// HTTP 429 received: push the next allowed request back by the
    /// configured cooldown on top of the normal interval (spec.md §4.2,
    /// §8 scenario 4).
    pub async fn record_throttled(&self) {
        let mut guard = self.next_allowed.lock().await;
        let now = Instant::now();
        let base = guard.unwrap_or(now).max(now);
        *guard = Some(base + self.throttle_cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serializes_requests_at_configured_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(50), Duration::from_secs(3));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(45), "elapsed = {elapsed:?}");
    }

    #[tokio::test]
    async fn cancellation_aborts_the_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(5), Duration::from_secs(3));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel2.cancel();
        });

        let result = limiter.acquire(&cancel).await;
        assert!(matches!(result, Err(FetchError::Canceled)));
    }

    #[tokio::test]
    async fn throttle_adds_cooldown_on_top_of_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(10), Duration::from_millis(100));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        limiter.record_throttled().await;

        let start = Instant::now();
        limiter.acquire(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
