use crate::blacklist::Blacklist;
use crate::profile::UserProfile;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;
use veilpay_core::constants::ATTEMPT_WINDOW_MS;
use veilpay_core::{AttemptRecord, Config, FraudThresholds, TimestampMs};

// ── Outcomes ─────────────────────────────────────────────────────────────────

/// Admission verdict derived from the summed strategy scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FraudAction {
    Allow,
    Warn,
    /// Request an additional factor before proceeding.
    Challenge,
    Block,
}

/// Result of one assessment: the total score, the verdict, and the
/// reasons that contributed (for logging and merchant alerts).
#[derive(Debug, Clone, Serialize)]
pub struct FraudAssessment {
    pub score: u32,
    pub action: FraudAction,
    pub reasons: Vec<String>,
}

struct Signal {
    score: u32,
    reason: Option<String>,
}

impl Signal {
    const NONE: Signal = Signal { score: 0, reason: None };

    fn flag(score: u32, reason: String) -> Self {
        Self { score, reason: Some(reason) }
    }
}

// ── Strategy tuning ──────────────────────────────────────────────────────────

const VELOCITY_BURST_WINDOW_MS: i64 = 5 * 60 * 1000;
const IMPOSSIBLE_TRAVEL_KMH: f64 = 900.0;
const FAST_TRAVEL_KMH: f64 = 300.0;
const DEVICE_CHURN_LIMIT: usize = 3;
const BLACKLIST_CAPACITY: usize = 10_000;

// ── FraudDetector ────────────────────────────────────────────────────────────

/// Seven-strategy risk scorer over a bounded sliding window of attempts.
///
/// `assess` is read-only; `record_attempt` appends to the window (pruning
/// anything past retention) and folds the attempt into the per-user
/// profile. Both are cheap, synchronous and mutex-guarded.
pub struct FraudDetector {
    thresholds: FraudThresholds,
    enable_time_of_day: bool,
    history: Mutex<HashMap<String, VecDeque<AttemptRecord>>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
    blacklist: Blacklist,
}

impl FraudDetector {
    pub fn new(thresholds: FraudThresholds, enable_time_of_day: bool) -> Self {
        Self {
            thresholds,
            enable_time_of_day,
            history: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            blacklist: Blacklist::new(BLACKLIST_CAPACITY),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fraud_thresholds, config.enable_time_of_day)
    }

    /// Score one attempt without recording it.
    pub fn assess(&self, attempt: &AttemptRecord, now_ms: TimestampMs) -> FraudAssessment {
        let profiles = self.profiles.lock().expect("profiles mutex poisoned");
        let profile = profiles.get(&attempt.actor_id).cloned().unwrap_or_default();
        drop(profiles);

        let signals = [
            self.velocity(attempt, now_ms),
            self.impossible_travel(attempt, &profile),
            self.device_churn(attempt, &profile),
            self.behavioural_deviation(attempt, &profile),
            self.ip_reputation(attempt, now_ms),
            self.time_of_day(attempt, &profile),
            self.amount_anomaly(attempt, &profile),
        ];

        let mut score = 0;
        let mut reasons = Vec::new();
        for s in signals {
            score += s.score;
            if let Some(r) = s.reason {
                reasons.push(r);
            }
        }

        let action = if score >= self.thresholds.block {
            FraudAction::Block
        } else if score >= self.thresholds.challenge {
            FraudAction::Challenge
        } else if score >= self.thresholds.warn {
            FraudAction::Warn
        } else {
            FraudAction::Allow
        };

        debug!(actor = %attempt.actor_id, score, ?action, "fraud assessment");
        FraudAssessment { score, action, reasons }
    }

    /// Append the attempt to the sliding window (pruning past retention)
    /// and fold it into the actor's profile.
    pub fn record_attempt(&self, attempt: AttemptRecord, now_ms: TimestampMs) {
        let cutoff = now_ms - ATTEMPT_WINDOW_MS;
        {
            let mut history = self.history.lock().expect("history mutex poisoned");
            let window = history.entry(attempt.actor_id.clone()).or_default();
            while window.front().is_some_and(|a| a.at_ms <= cutoff) {
                window.pop_front();
            }
            window.push_back(attempt.clone());
        }
        let mut profiles = self.profiles.lock().expect("profiles mutex poisoned");
        profiles.entry(attempt.actor_id.clone()).or_default().update(&attempt);
    }

    pub fn blacklist_ip(&self, ip: &str, ttl_ms: i64, now_ms: TimestampMs) {
        self.blacklist.add(ip, ttl_ms, now_ms);
    }

    // ── Strategies ───────────────────────────────────────────────────────────

    /// 1. Velocity: attempt counts in rolling burst and retention windows.
    fn velocity(&self, attempt: &AttemptRecord, now_ms: TimestampMs) -> Signal {
        let history = self.history.lock().expect("history mutex poisoned");
        let Some(window) = history.get(&attempt.actor_id) else {
            return Signal::NONE;
        };
        let burst =
            window.iter().filter(|a| now_ms - a.at_ms <= VELOCITY_BURST_WINDOW_MS).count();
        let daily = window.len();

        if burst >= 10 {
            Signal::flag(35, format!("{burst} attempts in 5 minutes"))
        } else if burst >= 5 {
            Signal::flag(20, format!("{burst} attempts in 5 minutes"))
        } else if daily >= 50 {
            Signal::flag(15, format!("{daily} attempts in 24 hours"))
        } else {
            Signal::NONE
        }
    }

    /// 2. Geolocation: impossible travel between consecutive samples.
    fn impossible_travel(&self, attempt: &AttemptRecord, profile: &UserProfile) -> Signal {
        let (Some(here), Some((there, then_ms))) = (attempt.location, profile.last_location)
        else {
            return Signal::NONE;
        };
        let hours = ((attempt.at_ms - then_ms).max(1) as f64) / 3_600_000.0;
        let kmh = here.distance_km(&there) / hours;
        if kmh > IMPOSSIBLE_TRAVEL_KMH {
            Signal::flag(40, format!("implied travel speed {kmh:.0} km/h"))
        } else if kmh > FAST_TRAVEL_KMH {
            Signal::flag(20, format!("implied travel speed {kmh:.0} km/h"))
        } else {
            Signal::NONE
        }
    }

    /// 3. Device-fingerprint churn.
    fn device_churn(&self, attempt: &AttemptRecord, profile: &UserProfile) -> Signal {
        let Some(fp) = &attempt.device_fingerprint else {
            return Signal::NONE;
        };
        let known = profile.device_fingerprints.contains(fp);
        let distinct = profile.device_fingerprints.len();
        if !known && distinct >= DEVICE_CHURN_LIMIT {
            Signal::flag(25, format!("new device after {distinct} distinct fingerprints"))
        } else if !known && distinct >= 1 {
            Signal::flag(10, "unrecognized device fingerprint".into())
        } else {
            Signal::NONE
        }
    }

    /// 4. Behavioural deviation: attempt cadence far off the EMA baseline.
    fn behavioural_deviation(&self, attempt: &AttemptRecord, profile: &UserProfile) -> Signal {
        let (Some(ema), Some(last)) = (profile.gap_ema_ms, profile.last_at_ms) else {
            return Signal::NONE;
        };
        // The baseline is noise until a handful of attempts exist.
        if ema <= 0.0 || profile.attempts < 5 {
            return Signal::NONE;
        }
        let gap = (attempt.at_ms - last).max(0) as f64;
        if gap < ema / 10.0 {
            Signal::flag(15, "attempt cadence far above baseline".into())
        } else {
            Signal::NONE
        }
    }

    /// 5. IP reputation.
    fn ip_reputation(&self, attempt: &AttemptRecord, now_ms: TimestampMs) -> Signal {
        match &attempt.ip {
            Some(ip) if self.blacklist.contains(ip, now_ms) => {
                Signal::flag(60, format!("ip {ip} is blacklisted"))
            }
            _ => Signal::NONE,
        }
    }

    /// 6. Time-of-day deviation. Disabled by default: without per-user
    /// timezones the UTC hour false-positives on travellers.
    fn time_of_day(&self, attempt: &AttemptRecord, profile: &UserProfile) -> Signal {
        if !self.enable_time_of_day {
            return Signal::NONE;
        }
        let Some((mean, std)) = profile.hour_stats() else {
            return Signal::NONE;
        };
        let hour = ((attempt.at_ms / 3_600_000) % 24) as f64;
        let dev = (hour - mean).abs().min(24.0 - (hour - mean).abs());
        if dev > 2.0 * std.max(1.0) {
            Signal::flag(15, format!("unusual hour {hour} (baseline {mean:.1})"))
        } else {
            Signal::NONE
        }
    }

    /// 7. Transaction amount anomaly: z-score over the actor's history.
    fn amount_anomaly(&self, attempt: &AttemptRecord, profile: &UserProfile) -> Signal {
        let (Some(amount), Some((mean, std))) = (attempt.amount, profile.amount_stats()) else {
            return Signal::NONE;
        };
        if std <= 0.0 {
            return Signal::NONE;
        }
        let z = (amount as f64 - mean) / std;
        if z > 3.0 {
            Signal::flag(30, format!("amount z-score {z:.1}"))
        } else if z > 2.0 {
            Signal::flag(15, format!("amount z-score {z:.1}"))
        } else {
            Signal::NONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilpay_core::GeoPoint;

    fn detector() -> FraudDetector {
        FraudDetector::new(FraudThresholds::default(), false)
    }

    fn attempt(actor: &str, at_ms: i64) -> AttemptRecord {
        AttemptRecord {
            actor_id: actor.into(),
            at_ms,
            location: None,
            device_fingerprint: None,
            ip: None,
            amount: None,
        }
    }

    #[test]
    fn clean_first_attempt_allows() {
        let d = detector();
        let a = d.assess(&attempt("u", 1_000), 1_000);
        assert_eq!(a.action, FraudAction::Allow);
        assert_eq!(a.score, 0);
        assert!(a.reasons.is_empty());
    }

    #[test]
    fn burst_velocity_scores() {
        let d = detector();
        for i in 0..10 {
            d.record_attempt(attempt("u", i * 1_000), i * 1_000);
        }
        let a = d.assess(&attempt("u", 10_000), 10_000);
        assert!(a.score >= 35, "score {}", a.score);
        assert!(a.reasons.iter().any(|r| r.contains("5 minutes")));
    }

    #[test]
    fn impossible_travel_flags() {
        let d = detector();
        let mut first = attempt("u", 0);
        first.location = Some(GeoPoint { lat: 48.85, lon: 2.35 }); // Paris
        d.record_attempt(first, 0);

        // New York one minute later.
        let mut second = attempt("u", 60_000);
        second.location = Some(GeoPoint { lat: 40.71, lon: -74.0 });
        let a = d.assess(&second, 60_000);
        assert!(a.reasons.iter().any(|r| r.contains("travel speed")), "{:?}", a.reasons);
        assert!(a.score >= 40);
    }

    #[test]
    fn blacklisted_ip_challenges() {
        let d = detector();
        d.blacklist_ip("203.0.113.7", 60_000, 0);
        let mut a = attempt("u", 1_000);
        a.ip = Some("203.0.113.7".into());
        let assessment = d.assess(&a, 1_000);
        assert_eq!(assessment.action, FraudAction::Challenge);
        assert_eq!(assessment.score, 60);
    }

    #[test]
    fn blacklist_expiry_clears_signal() {
        let d = detector();
        d.blacklist_ip("203.0.113.7", 1_000, 0);
        let mut a = attempt("u", 2_000);
        a.ip = Some("203.0.113.7".into());
        assert_eq!(d.assess(&a, 2_000).score, 0);
    }

    #[test]
    fn amount_anomaly_scores() {
        let d = detector();
        // Establish a €10-ish baseline over a day, one attempt per hour.
        for i in 0..20i64 {
            let mut a = attempt("u", i * 3_600_000);
            a.amount = Some(1_000 + (i as u64 % 3) * 10);
            d.record_attempt(a, i * 3_600_000);
        }
        let mut big = attempt("u", 21 * 3_600_000);
        big.amount = Some(500_000);
        let assessment = d.assess(&big, 21 * 3_600_000);
        assert!(assessment.reasons.iter().any(|r| r.contains("z-score")), "{:?}", assessment.reasons);
    }

    #[test]
    fn time_of_day_disabled_by_default() {
        let d = detector();
        for i in 0..10i64 {
            // Always at 09:00 UTC on consecutive days.
            d.record_attempt(attempt("u", i * 86_400_000 + 9 * 3_600_000), i * 86_400_000);
        }
        // 03:00 attempt: would deviate, but the strategy is off.
        let night = attempt("u", 10 * 86_400_000 + 3 * 3_600_000);
        let a = d.assess(&night, night.at_ms);
        assert!(!a.reasons.iter().any(|r| r.contains("hour")));
    }

    #[test]
    fn time_of_day_flags_when_enabled() {
        let d = FraudDetector::new(FraudThresholds::default(), true);
        for i in 0..10i64 {
            d.record_attempt(attempt("u", i * 86_400_000 + 9 * 3_600_000), i * 86_400_000);
        }
        let night = attempt("u", 10 * 86_400_000 + 21 * 3_600_000);
        let a = d.assess(&night, night.at_ms);
        assert!(a.reasons.iter().any(|r| r.contains("hour")), "{:?}", a.reasons);
    }

    #[test]
    fn stacked_signals_block() {
        let d = detector();
        d.blacklist_ip("203.0.113.9", 120_000_000, 0);
        for i in 0..12 {
            d.record_attempt(attempt("u", i * 1_000), i * 1_000);
        }
        let mut a = attempt("u", 13_000);
        a.ip = Some("203.0.113.9".into());
        let assessment = d.assess(&a, 13_000);
        assert_eq!(assessment.action, FraudAction::Block);
        assert!(assessment.score >= 80);
    }

    #[test]
    fn history_prunes_past_retention() {
        let d = detector();
        d.record_attempt(attempt("u", 0), 0);
        // Recording far in the future prunes the stale entry.
        d.record_attempt(attempt("u", ATTEMPT_WINDOW_MS + 1_000), ATTEMPT_WINDOW_MS + 1_000);
        let a = d.assess(&attempt("u", ATTEMPT_WINDOW_MS + 2_000), ATTEMPT_WINDOW_MS + 2_000);
        // Only one attempt left in the window, so no velocity signal.
        assert_eq!(a.score, 0);
    }
}
