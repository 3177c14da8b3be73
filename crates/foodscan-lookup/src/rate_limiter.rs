//! # Rate Limiter
//!
//! Token bucket guarding outbound product lookups.
//!
//! ## Refill Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  capacity = 100, window = 60 s                                          │
//! │                                                                         │
//! │  admit()                                                                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  lock ──► refill:                                                       │
//! │             elapsed ≥ window   → tokens = capacity                      │
//! │             otherwise          → tokens += ⌊elapsed·capacity/window⌋    │
//! │                                  (last_refill moves only if > 0 added) │
//! │     │                                                                   │
//! │     ├── tokens > 0 ──► tokens -= 1, return                              │
//! │     │                                                                   │
//! │     └── tokens = 0 ──► unlock, sleep(window/capacity − elapsed),       │
//! │                        start over                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is never held across the sleep, so a caller dropped while
//! waiting has consumed nothing.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// Token-bucket admission control. Share one instance (behind an `Arc`)
/// among everything that talks to the same upstream.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Creates a full bucket.
    ///
    /// `capacity` and `window` are clamped to at least 1 token and 1 ms.
    pub fn new(capacity: u32, window: Duration) -> Self {
        RateLimiter {
            capacity: capacity.max(1),
            window: window.max(Duration::from_millis(1)),
            state: Mutex::new(BucketState {
                tokens: capacity.max(1),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until a token is available, then takes it. Never fails.
    pub async fn admit(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                self.refill(&mut state, now);

                if state.tokens > 0 {
                    state.tokens -= 1;
                    return;
                }

                self.token_interval()
                    .saturating_sub(now.saturating_duration_since(state.last_refill))
            };

            debug!(wait_ms = wait.as_millis() as u64, "Rate limiter suspending lookup");
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes a token if one is available right now.
    pub async fn try_admit(&self) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Tokens available right now.
    pub async fn available(&self) -> u32 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);

        if elapsed >= self.window {
            state.tokens = self.capacity;
            state.last_refill = now;
            return;
        }

        let added = elapsed.as_nanos() * u128::from(self.capacity) / self.window.as_nanos();
        if added > 0 {
            let added = u32::try_from(added).unwrap_or(u32::MAX);
            state.tokens = state.tokens.saturating_add(added).min(self.capacity);
            state.last_refill = now;
        }
    }

    /// Time for one token to accrue, rounded up so that waiting this long
    /// always yields at least one token.
    fn token_interval(&self) -> Duration {
        let window = self.window.as_nanos();
        let capacity = u128::from(self.capacity);
        let nanos = window.div_ceil(capacity);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_third_admit_waits_for_refill() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.admit().await;
        limiter.admit().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.admit().await;
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_window_resets_bucket() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.try_admit().await);
        }
        assert!(!limiter.try_admit().await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.available().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_refill_is_floored() {
        let limiter = RateLimiter::new(4, Duration::from_secs(60));
        for _ in 0..4 {
            limiter.admit().await;
        }

        // 14 s is less than one 15 s interval
        tokio::time::advance(Duration::from_secs(14)).await;
        assert_eq!(limiter.available().await, 0);

        // last_refill was not moved, so 16 s more makes 30 s → 2 tokens
        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(limiter.available().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_takes_nothing() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(10)));
        limiter.admit().await;

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.admit().await })
        };
        tokio::time::advance(Duration::from_secs(5)).await;
        waiter.abort();
        let _ = waiter.await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.try_admit().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_exceed_capacity() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.admit().await;
                Instant::now()
            }));
        }

        let mut admitted_at = Vec::new();
        for handle in handles {
            admitted_at.push(handle.await.unwrap());
        }

        let immediate = admitted_at.iter().filter(|t| **t == start).count();
        assert_eq!(immediate, 5);
        assert!(admitted_at
            .iter()
            .all(|t| t.duration_since(start) <= Duration::from_secs(61)));
    }
}
