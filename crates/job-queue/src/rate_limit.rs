//! Sliding-window limit on job starts.
//!
//! Independent of the worker count: workers bound how many jobs run at
//! once, the limiter bounds how fast new ones may start.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Allows at most `max` acquisitions in any `window`.
#[derive(Debug)]
pub struct RateLimiter {
    max: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        let max = max.max(1);
        Self {
            max,
            window,
            starts: Mutex::new(VecDeque::with_capacity(max)),
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now()).is_ok()
    }

    /// Wait until a slot is free, then take it.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire_at(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limit reached");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// `Err` carries how long until the oldest start leaves the window.
    fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut starts = self.starts.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(oldest) = starts.front() {
            if now.duration_since(*oldest) >= self.window {
                starts.pop_front();
            } else {
                break;
            }
        }

        if starts.len() < self.max {
            starts.push_back(now);
            return Ok(());
        }

        let oldest = starts.front().copied().unwrap_or(now);
        Err(self
            .window
            .saturating_sub(now.duration_since(oldest))
            .max(Duration::from_millis(1)))
    }
}
