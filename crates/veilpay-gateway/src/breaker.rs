use std::sync::Mutex;
use tracing::{info, warn};
use veilpay_core::{AuthError, Config, TimestampMs};

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub fail_threshold: u32,
    pub open_timeout_ms: i64,
    pub success_threshold: u32,
}

impl BreakerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fail_threshold: config.breaker_fail_threshold,
            open_timeout_ms: config.breaker_open_timeout_ms as i64,
            success_threshold: config.breaker_success_threshold,
        }
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: TimestampMs,
}

// ── CircuitBreaker ───────────────────────────────────────────────────────────

/// Three-state circuit breaker guarding one upstream.
///
/// The mutex provides the happens-before edge between the threshold-th
/// consecutive failure and subsequent calls observing Open.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: 0,
            }),
        }
    }

    /// Admit a call, or fail fast with `BreakerOpen`. While Open, the
    /// upstream is never touched until `open_timeout_ms` has elapsed;
    /// the first admission after that runs in HalfOpen.
    pub fn check(&self, now_ms: TimestampMs) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                if now_ms - inner.opened_at >= self.config.open_timeout_ms {
                    info!("circuit breaker half-open; probing upstream");
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    Ok(())
                } else {
                    Err(AuthError::BreakerOpen)
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.consecutive_failures = 0;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    info!("circuit breaker closed after successful probes");
                    inner.state = BreakerState::Closed;
                    inner.consecutive_successes = 0;
                }
            }
            BreakerState::Closed | BreakerState::Open => {}
        }
    }

    pub fn on_failure(&self, now_ms: TimestampMs) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::HalfOpen => {
                // A single probe failure re-opens.
                warn!("circuit breaker re-opened from half-open");
                inner.state = BreakerState::Open;
                inner.opened_at = now_ms;
                inner.consecutive_failures = 0;
                inner.consecutive_successes = 0;
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.fail_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = now_ms;
                    inner.consecutive_failures = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker mutex poisoned").state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            fail_threshold: 5,
            open_timeout_ms: 50,
            success_threshold: 2,
        })
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let b = breaker();
        for _ in 0..4 {
            b.check(0).unwrap();
            b.on_failure(0);
        }
        assert_eq!(b.state(), BreakerState::Closed);
        b.on_failure(0);
        assert_eq!(b.state(), BreakerState::Open);
        assert!(matches!(b.check(10), Err(AuthError::BreakerOpen)));
    }

    #[test]
    fn success_resets_failure_run() {
        let b = breaker();
        for _ in 0..4 {
            b.on_failure(0);
        }
        b.on_success();
        for _ in 0..4 {
            b.on_failure(0);
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_after_timeout_then_closes_on_successes() {
        let b = breaker();
        for _ in 0..5 {
            b.on_failure(0);
        }
        assert!(matches!(b.check(49), Err(AuthError::BreakerOpen)));
        b.check(50).unwrap();
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.on_success();
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.on_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let b = breaker();
        for _ in 0..5 {
            b.on_failure(0);
        }
        b.check(60).unwrap();
        b.on_failure(60);
        assert_eq!(b.state(), BreakerState::Open);
        // The open window restarts from the probe failure.
        assert!(matches!(b.check(100), Err(AuthError::BreakerOpen)));
        b.check(110).unwrap();
        assert_eq!(b.state(), BreakerState::HalfOpen);
    }
}
