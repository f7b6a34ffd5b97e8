use crate::api::{RemoteApi, RequestEnvelope};
use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::metrics::{IntegrationMetrics, MetricsSnapshot};
use crate::retry::RetryPolicy;
use crate::store::MemoryCache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use veilpay_core::{AuthError, Config, EnrollmentRecord, FallbackStrategy, TimestampMs};

/// Cache/storage key for a user's enrollment record.
pub fn record_key(user_id: &str) -> String {
    format!("enroll/{user_id}")
}

fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

/// Availability failures are the only ones that trip the breaker; a 4xx
/// response proves the upstream is alive.
fn counts_toward_breaker(e: &AuthError) -> bool {
    matches!(e, AuthError::Timeout | AuthError::Unavailable(_))
}

// ── IntegrationEngine ────────────────────────────────────────────────────────

/// Strategy-driven dispatch between the remote durable API and the local
/// enrollment cache, with retries, a circuit breaker per upstream and
/// atomically-maintained metrics.
pub struct IntegrationEngine {
    api: Arc<dyn RemoteApi>,
    cache: Arc<MemoryCache>,
    api_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    metrics: Arc<IntegrationMetrics>,
    strategy: FallbackStrategy,
    api_timeout_ms: u64,
    cache_timeout_ms: u64,
    cache_ttl_ms: i64,
}

impl IntegrationEngine {
    pub fn new(api: Arc<dyn RemoteApi>, config: &Config) -> Self {
        Self {
            api,
            cache: Arc::new(MemoryCache::new()),
            api_breaker: Arc::new(CircuitBreaker::new(BreakerConfig::from_config(config))),
            retry: RetryPolicy::from_config(config),
            metrics: Arc::new(IntegrationMetrics::new()),
            strategy: config.fallback_strategy,
            api_timeout_ms: config.api_timeout_ms,
            cache_timeout_ms: config.cache_timeout_ms,
            cache_ttl_ms: config.enrollment_cache_ttl_ms,
        }
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.api_breaker.state())
    }

    // ── Store ────────────────────────────────────────────────────────────────

    /// Persist `record` in the remote durable store and/or the cache,
    /// per the configured strategy. Under ApiFirstCacheFallback the API
    /// is the source of truth: its success is written through to the
    /// cache, its failure is surfaced (a cache-only copy would fake
    /// durability).
    pub async fn store_record(&self, record: &EnrollmentRecord) -> Result<(), AuthError> {
        match self.strategy {
            FallbackStrategy::ApiOnly => self.api_put(record).await,
            FallbackStrategy::CacheOnly => {
                self.cache_put(record).await;
                Ok(())
            }
            FallbackStrategy::ApiFirstCacheFallback => {
                self.api_put(record).await?;
                self.cache_put(record).await;
                Ok(())
            }
            FallbackStrategy::CacheFirstApiSync => {
                self.cache_put(record).await;
                self.spawn_api_put(record.clone());
                Ok(())
            }
        }
    }

    // ── Load ─────────────────────────────────────────────────────────────────

    pub async fn load_record(&self, user_id: &str) -> Result<Option<EnrollmentRecord>, AuthError> {
        match self.strategy {
            FallbackStrategy::ApiOnly => self.api_get(user_id).await,
            FallbackStrategy::CacheOnly => Ok(self.cache_get(user_id).await),
            FallbackStrategy::ApiFirstCacheFallback => match self.api_get(user_id).await {
                Ok(Some(record)) => {
                    self.cache_put(&record).await;
                    Ok(Some(record))
                }
                Ok(None) => {
                    // Durable store says gone; drop any stale cache copy.
                    self.cache.delete(&record_key(user_id));
                    Ok(None)
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "api read failed; falling back to cache");
                    match self.cache_get(user_id).await {
                        Some(record) => Ok(Some(record)),
                        None => Err(e),
                    }
                }
            },
            FallbackStrategy::CacheFirstApiSync => {
                let cached = self.cache_get(user_id).await;
                self.spawn_api_refresh(user_id.to_string());
                Ok(cached)
            }
        }
    }

    // ── Delete ───────────────────────────────────────────────────────────────

    /// Remove the cache and durable copies. Idempotent: an absent record
    /// is a success.
    pub async fn delete_record(&self, user_id: &str) -> Result<(), AuthError> {
        self.cache.delete(&record_key(user_id));
        match self.strategy {
            FallbackStrategy::CacheOnly => Ok(()),
            FallbackStrategy::CacheFirstApiSync => {
                self.spawn_api_delete(user_id.to_string());
                Ok(())
            }
            FallbackStrategy::ApiOnly | FallbackStrategy::ApiFirstCacheFallback => {
                match self.api_delete(user_id).await {
                    Ok(()) | Err(AuthError::NotFound(_)) => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }

    // ── API calls (retry + breaker + metrics) ────────────────────────────────

    async fn api_put(&self, record: &EnrollmentRecord) -> Result<(), AuthError> {
        self.with_retry(|| {
            let envelope = RequestEnvelope::for_user(&record.user_id, now_ms())
                .with_consent(record.consent.all_granted());
            self.api.put_record(envelope, record)
        })
        .await
    }

    async fn api_get(&self, user_id: &str) -> Result<Option<EnrollmentRecord>, AuthError> {
        self.with_retry(|| {
            let envelope = RequestEnvelope::for_user(user_id, now_ms());
            self.api.get_record(envelope, user_id)
        })
        .await
    }

    async fn api_delete(&self, user_id: &str) -> Result<(), AuthError> {
        self.with_retry(|| {
            let envelope = RequestEnvelope::for_user(user_id, now_ms());
            self.api.delete_record(envelope, user_id)
        })
        .await
    }

    /// Retry loop shared by every API call: breaker admission, per-call
    /// timeout, exponential backoff with jitter. Only retryable errors
    /// re-attempt; a 429 substitutes the server-supplied delay for the
    /// backoff.
    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, AuthError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let mut retries = 0u32;
        loop {
            self.api_breaker.check(now_ms())?;

            let started = std::time::Instant::now();
            let outcome =
                match tokio::time::timeout(Duration::from_millis(self.api_timeout_ms), call())
                    .await
                {
                    Ok(r) => r,
                    Err(_) => Err(AuthError::Timeout),
                };
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(v) => {
                    self.api_breaker.on_success();
                    self.metrics.record_api_ok(latency_ms);
                    return Ok(v);
                }
                Err(e) => {
                    self.metrics.record_api_fail(latency_ms);
                    if counts_toward_breaker(&e) {
                        self.api_breaker.on_failure(now_ms());
                    } else {
                        self.api_breaker.on_success();
                    }

                    retries += 1;
                    if !e.is_retryable() || retries > self.retry.max_retries {
                        return Err(e);
                    }
                    let delay_ms = match &e {
                        AuthError::RateLimited { retry_after_ms } => *retry_after_ms,
                        _ => self.retry.jittered_delay_ms(retries),
                    };
                    debug!(retry = retries, delay_ms, error = %e, "retrying api call");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    // ── Cache access ─────────────────────────────────────────────────────────

    /// Cache calls run under their own per-call bound. The in-process
    /// `MemoryCache` never suspends, so the bound only bites once a
    /// blocking cache implementation stands behind the same calls.
    async fn cache_put(&self, record: &EnrollmentRecord) {
        let bytes = match bincode::serialize(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode record for cache");
                return;
            }
        };
        let key = record_key(&record.user_id);
        let write = async { self.cache.put(&key, bytes, Some(self.cache_ttl_ms), now_ms()) };
        if tokio::time::timeout(Duration::from_millis(self.cache_timeout_ms), write)
            .await
            .is_err()
        {
            warn!(user_id = %record.user_id, "cache write timed out");
            self.metrics.record_cache_fail();
        }
    }

    /// A hit counts as cache_ok, a miss (or undecodable entry, or a
    /// timed-out read) as cache_fail.
    async fn cache_get(&self, user_id: &str) -> Option<EnrollmentRecord> {
        let read = async { self.cache.get(&record_key(user_id), now_ms()) };
        let bytes =
            match tokio::time::timeout(Duration::from_millis(self.cache_timeout_ms), read).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    warn!(user_id = %user_id, "cache read timed out");
                    self.metrics.record_cache_fail();
                    return None;
                }
            };
        match bytes.as_deref().map(bincode::deserialize::<EnrollmentRecord>) {
            Some(Ok(record)) => {
                self.metrics.record_cache_ok();
                Some(record)
            }
            Some(Err(e)) => {
                warn!(error = %e, "undecodable cache entry dropped");
                self.cache.delete(&record_key(user_id));
                self.metrics.record_cache_fail();
                None
            }
            None => {
                self.metrics.record_cache_fail();
                None
            }
        }
    }

    // ── Background sync (CacheFirstApiSync) ──────────────────────────────────

    fn spawn_api_put(&self, record: EnrollmentRecord) {
        let api = Arc::clone(&self.api);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let envelope = RequestEnvelope::for_user(&record.user_id, now_ms())
                .with_consent(record.consent.all_granted());
            match api.put_record(envelope, &record).await {
                Ok(()) => metrics.record_api_ok(started.elapsed().as_secs_f64() * 1000.0),
                Err(e) => {
                    metrics.record_api_fail(started.elapsed().as_secs_f64() * 1000.0);
                    warn!(user_id = %record.user_id, error = %e, "background api write failed");
                }
            }
        });
    }

    fn spawn_api_refresh(&self, user_id: String) {
        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let metrics = Arc::clone(&self.metrics);
        let ttl = self.cache_ttl_ms;
        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let envelope = RequestEnvelope::for_user(&user_id, now_ms());
            match api.get_record(envelope, &user_id).await {
                Ok(Some(record)) => {
                    metrics.record_api_ok(started.elapsed().as_secs_f64() * 1000.0);
                    match bincode::serialize(&record) {
                        Ok(bytes) => cache.put(&record_key(&user_id), bytes, Some(ttl), now_ms()),
                        Err(e) => warn!(error = %e, "failed to encode refreshed record"),
                    }
                }
                Ok(None) => {
                    metrics.record_api_ok(started.elapsed().as_secs_f64() * 1000.0);
                    cache.delete(&record_key(&user_id));
                }
                Err(e) => {
                    metrics.record_api_fail(started.elapsed().as_secs_f64() * 1000.0);
                    debug!(user_id = %user_id, error = %e, "background refresh failed");
                }
            }
        });
    }

    fn spawn_api_delete(&self, user_id: String) {
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            let envelope = RequestEnvelope::for_user(&user_id, now_ms());
            if let Err(e) = api.delete_record(envelope, &user_id).await {
                warn!(user_id = %user_id, error = %e, "background api delete failed");
            }
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
