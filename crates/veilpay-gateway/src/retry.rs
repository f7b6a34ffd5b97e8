use rand::Rng;
use veilpay_core::Config;

/// Exponential backoff bounds for upstream retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay_ms: config.initial_retry_delay_ms,
            max_delay_ms: config.max_retry_delay_ms,
        }
    }

    /// delay_i = min(initial · 2^(i−1), max_delay) for the i-th retry
    /// (1-based).
    pub fn backoff_delay_ms(&self, retry: u32) -> u64 {
        let exp = retry.saturating_sub(1).min(32);
        self.initial_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms)
    }

    /// Backoff plus up to 10% additive jitter, so synchronized clients
    /// spread out.
    pub fn jittered_delay_ms(&self, retry: u32) -> u64 {
        let base = self.backoff_delay_ms(retry);
        base + rand::thread_rng().gen_range(0..=base / 10)
    }
}
