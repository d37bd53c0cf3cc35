//! [`RateLimiter`]: a non-blocking token bucket guarding outbound sends.

use std::time::Instant;

/// A token bucket with a configurable sustained refill rate and burst capacity.
///
/// `try_acquire` never blocks; callers that fail to acquire a token translate the
/// failure into `RateLimitError` rather than queueing (`spec.md` §4.7).
pub struct RateLimiter {
    capacity: f64,
    refill_per_second: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a bucket starting full, refilling at `refill_per_second` tokens/second
    /// up to `capacity`.
    pub fn new(refill_per_second: f64, capacity: u32) -> Self {
        RateLimiter {
            capacity: capacity as f64,
            refill_per_second,
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    /// Attempts to consume a single token. Returns `true` iff one was available.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn admits_exactly_capacity_immediate_sends() {
        let mut limiter = RateLimiter::new(10.0, 20);
        for _ in 0..20 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn refills_after_one_over_rate_seconds() {
        let mut limiter = RateLimiter::new(10.0, 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        std::thread::sleep(Duration::from_millis(110));
        assert!(limiter.try_acquire());
    }
}
