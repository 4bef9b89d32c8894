//! Process-wide request rate limiter
//!
//! VK rejects clients that send more than a few requests per second. Every
//! outbound request from every account goes through one shared limiter:
//! - At most `capacity` requests are admitted per `period`
//! - The window slides: a slot frees once its admission is `period` old
//! - Callers that find the window full sleep (the task, not the thread)
//!
//! Time is read from `tokio::time`, so tests can drive it with a paused clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Sliding-window limiter shared by all accounts
///
/// Cloning yields another handle to the same window.
#[derive(Debug)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterState>>,
}

#[derive(Debug)]
struct RateLimiterState {
    /// Admission times still inside the window, oldest first
    admitted: VecDeque<Instant>,
    /// Requests allowed per window
    capacity: usize,
    /// Window length
    period: Duration,
    /// Total requests admitted (for stats)
    total_operations: u64,
    /// Acquisitions that had to sleep at least once (for stats)
    total_waits: u64,
}

impl RateLimiterState {
    /// Forget admissions that have left the window
    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.admitted.front() {
            if now.duration_since(oldest) >= self.period {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit now, or report how long until the oldest slot frees
    fn try_admit(&mut self, now: Instant) -> std::result::Result<(), Duration> {
        self.evict(now);

        if self.admitted.len() < self.capacity {
            self.admitted.push_back(now);
            self.total_operations += 1;
            return Ok(());
        }

        let oldest = self.admitted.front().copied().unwrap_or(now);
        Err((oldest + self.period).saturating_duration_since(now))
    }
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` requests per `period`
    ///
    /// A zero capacity is treated as one; config validation rejects it earlier.
    pub fn new(capacity: usize, period: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterState {
                admitted: VecDeque::with_capacity(capacity.max(1)),
                capacity: capacity.max(1),
                period,
                total_operations: 0,
                total_waits: 0,
            })),
        }
    }

    /// Wait for a free slot in the window and take it
    pub async fn acquire(&self) {
        let mut waited = false;

        loop {
            let wait_time = {
                let mut state = self.inner.lock().await;
                let now = Instant::now();

                match state.try_admit(now) {
                    Ok(()) => {
                        if waited {
                            state.total_waits += 1;
                        }
                        trace!(
                            "Admitted request, {}/{} slots used",
                            state.admitted.len(),
                            state.capacity
                        );
                        return;
                    }
                    Err(wait_time) => wait_time,
                }
            };

            // Sleep outside the lock so other tasks can inspect the window
            debug!("Rate limit reached, waiting {:.3}s", wait_time.as_secs_f64());
            waited = true;
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Take a slot only if one is free right now
    #[cfg(test)]
    async fn try_acquire(&self) -> bool {
        let mut state = self.inner.lock().await;
        state.try_admit(Instant::now()).is_ok()
    }

    /// Get current statistics about the window
    pub async fn stats(&self) -> RateStats {
        let mut state = self.inner.lock().await;
        state.evict(Instant::now());
        RateStats {
            in_window: state.admitted.len(),
            capacity: state.capacity,
            period: state.period,
            total_operations: state.total_operations,
            total_waits: state.total_waits,
        }
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Statistics about limiter usage
#[derive(Debug, Clone)]
pub struct RateStats {
    /// Admissions still counted against the current window
    pub in_window: usize,
    /// Requests allowed per window
    pub capacity: usize,
    /// Window length
    pub period: Duration,
    /// Total requests admitted since creation
    pub total_operations: u64,
    /// Admissions that had to wait for a slot
    pub total_waits: u64,
}
