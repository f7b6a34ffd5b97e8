use crate::breaker::BreakerState;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// EMA smoothing for upstream latency.
const LATENCY_EMA_ALPHA: f64 = 0.1;

// ── IntegrationMetrics ───────────────────────────────────────────────────────

/// Process-wide counters for the integration engine. Counters are atomic;
/// the latency EMA sits behind its own mutex. Read-only snapshots are the
/// only export; metrics feed no decision except the breaker's own
/// failure counter.
#[derive(Default)]
pub struct IntegrationMetrics {
    api_ok: AtomicU64,
    api_fail: AtomicU64,
    cache_ok: AtomicU64,
    cache_fail: AtomicU64,
    api_latency_ema_ms: Mutex<Option<f64>>,
}

impl IntegrationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_api_ok(&self, latency_ms: f64) {
        self.api_ok.fetch_add(1, Ordering::Relaxed);
        self.fold_latency(latency_ms);
    }

    pub fn record_api_fail(&self, latency_ms: f64) {
        self.api_fail.fetch_add(1, Ordering::Relaxed);
        self.fold_latency(latency_ms);
    }

    pub fn record_cache_ok(&self) {
        self.cache_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_fail(&self) {
        self.cache_fail.fetch_add(1, Ordering::Relaxed);
    }

    fn fold_latency(&self, latency_ms: f64) {
        let mut ema = self.api_latency_ema_ms.lock().expect("metrics mutex poisoned");
        *ema = Some(match *ema {
            Some(prev) => prev + LATENCY_EMA_ALPHA * (latency_ms - prev),
            None => latency_ms,
        });
    }

    pub fn snapshot(&self, breaker: BreakerState) -> MetricsSnapshot {
        MetricsSnapshot {
            api_ok: self.api_ok.load(Ordering::Relaxed),
            api_fail: self.api_fail.load(Ordering::Relaxed),
            cache_ok: self.cache_ok.load(Ordering::Relaxed),
            cache_fail: self.cache_fail.load(Ordering::Relaxed),
            api_latency_ema_ms: *self.api_latency_ema_ms.lock().expect("metrics mutex poisoned"),
            breaker: format!("{breaker:?}"),
        }
    }
}

/// Point-in-time view for operator dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub api_ok: u64,
    pub api_fail: u64,
    pub cache_ok: u64,
    pub cache_fail: u64,
    pub api_latency_ema_ms: Option<f64>,
    pub breaker: String,
}
