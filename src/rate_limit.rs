use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::RateLimitExceeded;

// Sliding window limiter: at most `max_calls` permitted calls in any trailing `window`.
// One instance is shared by every request in the process.
pub struct RateLimiter {
    calls: Mutex<VecDeque<Instant>>, // timestamps of permitted calls, oldest first
    max_calls: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            calls: Mutex::new(VecDeque::with_capacity(max_calls as usize)),
            max_calls,
            window,
        }
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    // Run `operation` if the quota allows it, otherwise fail without running it.
    // The slot is taken before the operation starts, so a failed call still counts.
    pub async fn guard<F, Fut, T>(&self, operation: F) -> Result<T, RateLimitExceeded>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.try_acquire()?;
        Ok(operation().await)
    }

    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        self.try_acquire_at(Instant::now())
    }

    // Check-and-record happens under a single lock so concurrent callers can't overshoot
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut calls = self.lock();
        self.expire(&mut calls, now);

        if calls.len() < self.max_calls as usize {
            calls.push_back(now);
            debug!(used = calls.len(), max = self.max_calls, "Rate limit check: allowed");
            Ok(())
        } else {
            warn!(max = self.max_calls, window_secs = self.window.as_secs(), "Rate limit exceeded");
            Err(RateLimitExceeded)
        }
    }

    // Calls still available at `now`
    pub fn remaining(&self, now: Instant) -> u32 {
        let mut calls = self.lock();
        self.expire(&mut calls, now);
        self.max_calls.saturating_sub(calls.len() as u32)
    }

    // How long until a new call would be permitted. Zero when one is available now.
    pub fn retry_after(&self, now: Instant) -> Duration {
        let mut calls = self.lock();
        self.expire(&mut calls, now);

        if calls.len() < self.max_calls as usize {
            return Duration::ZERO;
        }
        match calls.front() {
            // a record expires once it is strictly older than the window
            Some(oldest) => {
                (self.window + Duration::from_secs(1)).saturating_sub(now.saturating_duration_since(*oldest))
            }
            None => Duration::ZERO,
        }
    }

    // Drop records older than `now - window`
    fn expire(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = calls.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // the queue is always left consistent, so a poisoned lock is still usable
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
