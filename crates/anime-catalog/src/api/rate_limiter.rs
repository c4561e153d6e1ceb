//! Client-side request spacing.
//!
//! One global gate: no two requests leave less than `min_interval` apart.
//! An optional rolling per-minute cap can be layered on top.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

const MINUTE: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Window {
    /// Last request timestamp
    last_request: Option<Instant>,
    /// Request timestamps in the last minute (only tracked with a cap)
    recent_requests: VecDeque<Instant>,
}

/// Minimum-interval rate limiter shared by every request type.
///
/// Waiters queue on a fair mutex, so requests leave in arrival order and
/// are delayed, never dropped.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_per_minute: Option<u32>,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(min_interval: Duration, max_per_minute: Option<u32>) -> Self {
        Self {
            min_interval,
            max_per_minute,
            window: Mutex::new(Window::default()),
        }
    }

    /// Wait until a request can be made, then record it
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;

        if let Some(max) = self.max_per_minute.filter(|max| *max > 0) {
            let now = Instant::now();
            while window
                .recent_requests
                .front()
                .is_some_and(|t| now.duration_since(*t) >= MINUTE)
            {
                window.recent_requests.pop_front();
            }

            if window.recent_requests.len() >= max as usize {
                if let Some(&oldest) = window.recent_requests.front() {
                    let ready_at = oldest + MINUTE;
                    tracing::debug!(
                        wait_ms = ready_at.saturating_duration_since(now).as_millis(),
                        "Rate limit: waiting for per-minute limit"
                    );
                    sleep_until(ready_at).await;
                    window.recent_requests.pop_front();
                }
            }
        }

        if let Some(last) = window.last_request {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(
                    wait_ms = (ready_at - now).as_millis(),
                    "Rate limit: waiting for request spacing"
                );
                sleep_until(ready_at).await;
            }
        }

        let request_time = Instant::now();
        window.last_request = Some(request_time);
        if self.max_per_minute.is_some() {
            window.recent_requests.push_back(request_time);
        }
    }

    /// Number of requests recorded in the last minute (per-minute cap only)
    pub async fn current_minute_count(&self) -> usize {
        let now = Instant::now();
        let mut window = self.window.lock().await;
        while window
            .recent_requests
            .front()
            .is_some_and(|t| now.duration_since(*t) >= MINUTE)
        {
            window.recent_requests.pop_front();
        }
        window.recent_requests.len()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(1000), None);

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }

        // First passes immediately, the next two wait one interval each
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert!(start.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_not_delayed() {
        let limiter = RateLimiter::new(Duration::from_millis(1000), None);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_queue() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500), None));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_minute_cap() {
        let limiter = RateLimiter::new(Duration::from_millis(10), Some(3));

        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }

        // Fourth request waits for the first to leave the window
        assert!(start.elapsed() >= MINUTE);
        assert_eq!(limiter.current_minute_count().await, 3);
    }

    #[tokio::test]
    async fn test_current_minute_count_without_cap() {
        let limiter = RateLimiter::new(Duration::from_millis(1), None);
        limiter.acquire().await;
        assert_eq!(limiter.current_minute_count().await, 0);
    }
}
