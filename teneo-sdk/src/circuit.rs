//! [`CircuitBreaker`]: the three-state breaker protecting the webhook endpoint.

use std::time::{Duration, Instant};

use teneo_types::CircuitState;

/// CLOSED → OPEN → HALF_OPEN → CLOSED breaker, per `spec.md` §4.6.
///
/// Opens after `failure_threshold` consecutive failures; after `recovery_timeout`
/// elapses it allows exactly one probe; two consecutive probe successes close it
/// again, while any probe failure reopens it and restarts the timeout.
pub struct CircuitBreaker {
    state: CircuitState,
    failure_threshold: u32,
    recovery_timeout: Duration,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl CircuitBreaker {
    /// Creates a breaker starting `CLOSED`.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        CircuitBreaker {
            state: CircuitState::Closed,
            failure_threshold,
            recovery_timeout,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }

    /// Current breaker state, after lazily promoting `OPEN` to `HALF_OPEN` once the
    /// recovery timeout has elapsed.
    pub fn state(&mut self) -> CircuitState {
        if self.state == CircuitState::Open {
            if let Some(opened_at) = self.opened_at {
                if opened_at.elapsed() >= self.recovery_timeout {
                    self.state = CircuitState::HalfOpen;
                }
            }
        }
        self.state
    }

    /// Asks permission to attempt a delivery. Returns `false` while `OPEN`, or when
    /// `HALF_OPEN` and a probe is already in flight (only one probe is allowed at a
    /// time).
    pub fn allow_request(&mut self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    false
                } else {
                    self.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Records a successful delivery.
    pub fn on_success(&mut self) {
        match self.state() {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight = false;
                self.consecutive_successes += 1;
                if self.consecutive_successes >= 2 {
                    self.close();
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed delivery (including deliveries rejected outright by
    /// [`CircuitBreaker::allow_request`], which the caller should still report so the
    /// counters stay consistent with `spec.md` §8's "rejects the 6th attempt").
    pub fn on_failure(&mut self) {
        match self.state() {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failure_threshold {
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight = false;
                self.open();
            }
            CircuitState::Open => {}
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_precisely_on_the_fifth_consecutive_failure() {
        let mut breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        for _ in 0..4 {
            assert!(breaker.allow_request());
            breaker.on_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        assert!(breaker.allow_request());
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn half_open_permits_exactly_one_probe_after_timeout() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        assert!(breaker.allow_request());
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.allow_request());
        assert!(!breaker.allow_request());
    }

    #[test]
    fn closes_after_two_consecutive_probe_successes() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(1));
        breaker.allow_request();
        breaker.on_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.allow_request();
        breaker.on_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.allow_request();
        breaker.on_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn probe_failure_reopens_and_restarts_timeout() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.allow_request();
        breaker.on_failure();
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.allow_request();
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
