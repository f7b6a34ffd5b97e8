use serde::{Deserialize, Serialize};

// ── FallbackStrategy ─────────────────────────────────────────────────────────

/// How the integration engine combines the remote API and the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackStrategy {
    /// Call the API; fail otherwise.
    ApiOnly,
    /// Call the cache; fail otherwise.
    CacheOnly,
    /// Try the API (with retries); fall back to cache on failure.
    /// API successes are written through to the cache.
    ApiFirstCacheFallback,
    /// Serve from cache immediately; refresh from the API in the
    /// background, best-effort.
    CacheFirstApiSync,
}

// ── FraudThresholds ──────────────────────────────────────────────────────────

/// Score cut-offs for the fraud decision. Scores below `warn` allow,
/// below `challenge` warn, below `block` challenge, and at or above
/// `block` block the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudThresholds {
    pub warn: u32,
    pub challenge: u32,
    pub block: u32,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        Self { warn: 30, challenge: 60, block: 80 }
    }
}

// ── Config ───────────────────────────────────────────────────────────────────

/// Flat runtime configuration for the authentication core.
///
/// Defaults follow the deployment profile the system ships with; every
/// field can be overridden from JSON via serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ── Integration engine ───────────────────────────────────────────────────
    pub fallback_strategy: FallbackStrategy,
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub breaker_fail_threshold: u32,
    pub breaker_open_timeout_ms: u64,
    pub breaker_success_threshold: u32,
    pub api_timeout_ms: u64,
    pub cache_timeout_ms: u64,

    // ── Record / session lifecycle ───────────────────────────────────────────
    pub enrollment_cache_ttl_ms: i64,
    pub session_ttl_ms: i64,
    pub max_session_attempts: u32,

    // ── Enrollment policy ────────────────────────────────────────────────────
    pub min_factors: usize,
    pub max_factors: usize,
    pub min_categories: usize,
    pub enrollments_per_hour: usize,

    // ── Verification admission ───────────────────────────────────────────────
    pub verifications_per_hour_per_user: usize,
    pub verifications_per_hour_per_merchant: usize,

    // ── Fraud scoring ────────────────────────────────────────────────────────
    pub fraud_thresholds: FraudThresholds,
    /// Time-of-day scoring ships disabled: without per-user timezones it
    /// false-positives on travellers.
    pub enable_time_of_day: bool,

    // ── Fuzzy factor policy ──────────────────────────────────────────────────
    /// Image taps are binned onto an N×N grid.
    pub image_grid: u16,
    /// Chebyshev radius (in grid cells) accepted at comparison time.
    pub image_fuzzy_radius: u16,
    /// Exact number of taps an image-tap factor must carry.
    pub image_required_taps: usize,
    /// Samples a balance capture must contain.
    pub balance_sample_count: usize,
    /// Variance ceiling over the capture window (raw accelerometer
    /// units²); calibration default.
    pub balance_stability_variance: f64,
    /// Quantization step for balance samples; fuzzy comparison widens by
    /// one step per axis.
    pub balance_quant_step: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_strategy: FallbackStrategy::ApiFirstCacheFallback,
            max_retries: 3,
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 5000,
            breaker_fail_threshold: 5,
            breaker_open_timeout_ms: 30_000,
            breaker_success_threshold: 2,
            api_timeout_ms: 10_000,
            cache_timeout_ms: 5_000,

            enrollment_cache_ttl_ms: 86_400_000,
            session_ttl_ms: 300_000,
            max_session_attempts: 3,

            min_factors: 6,
            max_factors: 10,
            min_categories: 2,
            enrollments_per_hour: 10,

            verifications_per_hour_per_user: 60,
            verifications_per_hour_per_merchant: 600,

            fraud_thresholds: FraudThresholds::default(),
            enable_time_of_day: false,

            image_grid: 16,
            image_fuzzy_radius: 1,
            image_required_taps: 2,
            balance_sample_count: 50,
            balance_stability_variance: 2500.0,
            balance_quant_step: 64,
        }
    }
}
