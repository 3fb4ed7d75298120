//! Per-authority token buckets.
//!
//! Each authority gets `max` tokens refilled continuously over `window`.
//! Bucket mutation is atomic with respect to other callers: the whole map
//! sits behind one mutex, which is plenty at the request rates the ceiling
//! itself allows.

use crate::error::ResolveError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Shared token-bucket limiter keyed by authority.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    max: f64,
    window: Duration,
}

impl RateLimiter {
    /// `max` requests per `window` per authority.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max: f64::from(max),
            window,
        }
    }

    /// Takes one token for `authority`, refilling the bucket first.
    ///
    /// # Errors
    ///
    /// [`ResolveError::RateLimitExceeded`] when the bucket is empty.
    pub fn try_acquire(&self, authority: &str) -> Result<(), ResolveError> {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();

        let bucket = buckets.entry(authority.to_string()).or_insert(Bucket {
            tokens: self.max,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        let refill = elapsed.as_secs_f64() / self.window.as_secs_f64() * self.max;
        bucket.tokens = (bucket.tokens + refill).min(self.max);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(ResolveError::RateLimitExceeded(authority.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_up_to_max_then_refused() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.try_acquire("example.com").is_ok());
        }
        assert!(matches!(
            limiter.try_acquire("example.com"),
            Err(ResolveError::RateLimitExceeded(_))
        ));
    }

    #[test]
    fn authorities_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a.example").is_ok());
        assert!(limiter.try_acquire("b.example").is_ok());
        assert!(limiter.try_acquire("a.example").is_err());
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(10, Duration::from_millis(50));
        for _ in 0..10 {
            assert!(limiter.try_acquire("x").is_ok());
        }
        assert!(limiter.try_acquire("x").is_err());

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.try_acquire("x").is_ok());
    }
}
