use std::collections::BTreeSet;
use veilpay_core::{AttemptRecord, GeoPoint, TimestampMs};

/// Smoothing factor for the inter-attempt-gap baseline.
const GAP_EMA_ALPHA: f64 = 0.1;

/// Per-user behavioural baseline, updated on every recorded attempt.
///
/// Amount and hour statistics use Welford's online algorithm; the
/// inter-attempt gap uses an EMA. Nothing here stores factor material,
/// only interaction metadata.
#[derive(Debug, Default, Clone)]
pub struct UserProfile {
    pub attempts: u64,
    pub last_at_ms: Option<TimestampMs>,
    pub gap_ema_ms: Option<f64>,
    pub last_location: Option<(GeoPoint, TimestampMs)>,
    pub device_fingerprints: BTreeSet<String>,

    amount_n: u64,
    amount_mean: f64,
    amount_m2: f64,

    hour_n: u64,
    hour_mean: f64,
    hour_m2: f64,
}

impl UserProfile {
    pub fn update(&mut self, attempt: &AttemptRecord) {
        self.attempts += 1;

        if let Some(last) = self.last_at_ms {
            let gap = (attempt.at_ms - last).max(0) as f64;
            self.gap_ema_ms = Some(match self.gap_ema_ms {
                Some(ema) => ema + GAP_EMA_ALPHA * (gap - ema),
                None => gap,
            });
        }
        self.last_at_ms = Some(attempt.at_ms);

        if let Some(loc) = attempt.location {
            self.last_location = Some((loc, attempt.at_ms));
        }
        if let Some(fp) = &attempt.device_fingerprint {
            self.device_fingerprints.insert(fp.clone());
        }

        if let Some(amount) = attempt.amount {
            self.amount_n += 1;
            let x = amount as f64;
            let delta = x - self.amount_mean;
            self.amount_mean += delta / self.amount_n as f64;
            self.amount_m2 += delta * (x - self.amount_mean);
        }

        let hour = ((attempt.at_ms / 3_600_000) % 24) as f64;
        self.hour_n += 1;
        let delta = hour - self.hour_mean;
        self.hour_mean += delta / self.hour_n as f64;
        self.hour_m2 += delta * (hour - self.hour_mean);
    }

    /// Mean and standard deviation of observed amounts, once at least two
    /// samples exist.
    pub fn amount_stats(&self) -> Option<(f64, f64)> {
        if self.amount_n < 2 {
            return None;
        }
        let var = self.amount_m2 / (self.amount_n - 1) as f64;
        Some((self.amount_mean, var.sqrt()))
    }

    /// Mean and standard deviation of the attempt hour (UTC).
    pub fn hour_stats(&self) -> Option<(f64, f64)> {
        if self.hour_n < 2 {
            return None;
        }
        let var = self.hour_m2 / (self.hour_n - 1) as f64;
        Some((self.hour_mean, var.sqrt()))
    }
}
