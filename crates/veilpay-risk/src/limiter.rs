use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use veilpay_core::{AuthError, TimestampMs};

// ── Policy ───────────────────────────────────────────────────────────────────

/// Maximum-N-events-per-window policy for one keyed window.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub max_events: usize,
    pub window_ms: i64,
}

impl RatePolicy {
    pub fn per_hour(max_events: usize) -> Self {
        Self { max_events, window_ms: 60 * 60 * 1000 }
    }
}

/// Which actor dimension a window is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterScope {
    User,
    Device,
    Ip,
    Merchant,
}

// ── RateLimiter ──────────────────────────────────────────────────────────────

/// Sliding-window attempt throttle with independent windows per
/// (scope, key). Windows are evicted lazily on query; contention is low,
/// so a single mutex over the map suffices.
pub struct RateLimiter {
    windows: Mutex<HashMap<(LimiterScope, String), VecDeque<TimestampMs>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { windows: Mutex::new(HashMap::new()) }
    }

    /// Admit and record one event, or fail with `RateLimited` carrying the
    /// time until the oldest in-window event slides out.
    pub fn check_and_record(
        &self,
        scope: LimiterScope,
        key: &str,
        policy: RatePolicy,
        now_ms: TimestampMs,
    ) -> Result<(), AuthError> {
        let mut windows = self.windows.lock().expect("limiter mutex poisoned");
        let window = windows.entry((scope, key.to_string())).or_default();

        let cutoff = now_ms - policy.window_ms;
        while window.front().is_some_and(|&t| t <= cutoff) {
            window.pop_front();
        }

        if window.len() >= policy.max_events {
            // A zero-capacity policy has no oldest event to wait out; the
            // whole window is the wait.
            let retry_after_ms = match window.front() {
                Some(&oldest) => (oldest + policy.window_ms - now_ms).max(1) as u64,
                None => policy.window_ms.max(1) as u64,
            };
            return Err(AuthError::RateLimited { retry_after_ms });
        }

        window.push_back(now_ms);
        Ok(())
    }

    /// Drop every event older than `retention_ms` and every emptied
    /// window. Run periodically so idle keys do not accumulate.
    pub fn prune(&self, retention_ms: i64, now_ms: TimestampMs) {
        let mut windows = self.windows.lock().expect("limiter mutex poisoned");
        let cutoff = now_ms - retention_ms;
        windows.retain(|_, window| {
            while window.front().is_some_and(|&t| t <= cutoff) {
                window.pop_front();
            }
            !window.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let policy = RatePolicy::per_hour(10);
        for i in 0..10 {
            limiter
                .check_and_record(LimiterScope::User, "u1", policy, 1_000 + i)
                .unwrap();
        }
        let err = limiter
            .check_and_record(LimiterScope::User, "u1", policy, 2_000)
            .unwrap_err();
        match err {
            AuthError::RateLimited { retry_after_ms } => {
                // Oldest event at t=1000 slides out at 1000 + 1h.
                assert_eq!(retry_after_ms, (1_000 + HOUR_MS - 2_000) as u64);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new();
        let policy = RatePolicy { max_events: 2, window_ms: 1_000 };
        limiter.check_and_record(LimiterScope::Ip, "1.2.3.4", policy, 0).unwrap();
        limiter.check_and_record(LimiterScope::Ip, "1.2.3.4", policy, 500).unwrap();
        assert!(limiter.check_and_record(LimiterScope::Ip, "1.2.3.4", policy, 900).is_err());
        // At t=1001 the first event has slid out.
        limiter.check_and_record(LimiterScope::Ip, "1.2.3.4", policy, 1_001).unwrap();
    }

    #[test]
    fn scopes_and_keys_are_independent() {
        let limiter = RateLimiter::new();
        let policy = RatePolicy { max_events: 1, window_ms: 1_000 };
        limiter.check_and_record(LimiterScope::User, "a", policy, 0).unwrap();
        limiter.check_and_record(LimiterScope::User, "b", policy, 0).unwrap();
        limiter.check_and_record(LimiterScope::Device, "a", policy, 0).unwrap();
        assert!(limiter.check_and_record(LimiterScope::User, "a", policy, 1).is_err());
    }

    #[test]
    fn prune_drops_idle_windows() {
        let limiter = RateLimiter::new();
        let policy = RatePolicy::per_hour(5);
        limiter.check_and_record(LimiterScope::User, "u1", policy, 0).unwrap();
        limiter.check_and_record(LimiterScope::User, "u2", policy, HOUR_MS).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);
        limiter.prune(HOUR_MS, HOUR_MS + 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
