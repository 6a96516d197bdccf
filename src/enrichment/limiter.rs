/// Sliding-window rate limiter for outbound model calls
///
/// Keeps the instants of the last `max_calls` acquisitions. When the window is
/// full, `acquire()` sleeps until the oldest one falls out of it. Never rejects.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A `max_calls` of 0 is treated as 1.
    pub fn new(max_calls: usize, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        RateLimiter {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Wait until a call is allowed, then record it.
    ///
    /// The lock is held across the sleep so waiters are served in arrival order.
    pub async fn acquire(&self) {
        let mut calls = self.calls.lock().await;
        loop {
            let now = Instant::now();
            while calls
                .front()
                .is_some_and(|oldest| now.duration_since(*oldest) >= self.period)
            {
                calls.pop_front();
            }

            if calls.len() < self.max_calls {
                calls.push_back(now);
                return;
            }

            if let Some(oldest) = calls.front().copied() {
                let wait = self.period.saturating_sub(now.duration_since(oldest));
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
                tokio::time::sleep(wait).await;
            }
        }
    }
}
