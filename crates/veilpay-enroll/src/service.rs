use crate::attestation::AttestationProvider;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use veilpay_core::{
    AuthError, Config, ConsentFlags, EnrollmentRecord, FactorCategory, FactorDigest, FactorKind,
    TimestampMs,
};
use veilpay_crypto::uuid_v4;
use veilpay_factors::{process, FactorInput, ProcessorPolicy};
use veilpay_gateway::engine::record_key;
use veilpay_gateway::{IntegrationEngine, KeyValueStore};
use veilpay_risk::{LimiterScope, RateLimiter, RatePolicy};

// ── Request / result shapes ──────────────────────────────────────────────────

/// Raw enrollment submission from the capture surface.
pub struct EnrollmentRequest {
    pub factors: Vec<FactorInput>,
    pub consent: ConsentFlags,
    /// Display alias echoed back to the UI; never used as an identifier.
    pub alias: Option<String>,
    pub device_fingerprint: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentSuccess {
    pub user_id: String,
    pub alias: Option<String>,
    pub expires_at: TimestampMs,
}

/// Right-to-access export: enrolled kinds and metadata, never digests.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentExport {
    pub user_id: String,
    pub kinds: Vec<FactorKind>,
    pub created_at: TimestampMs,
    pub expires_at: TimestampMs,
    pub consent: ConsentFlags,
}

// ── EnrollmentService ────────────────────────────────────────────────────────

/// End-to-end enrollment orchestrator.
///
/// Persistence is ordered (local secure store, then the durable store via
/// the integration engine) with compensating deletes in reverse order on
/// partial failure. Durable-store access is serialized per user_id to
/// prevent lost updates.
pub struct EnrollmentService {
    config: Config,
    policy: ProcessorPolicy,
    attestation: Arc<dyn AttestationProvider>,
    limiter: Arc<RateLimiter>,
    engine: Arc<IntegrationEngine>,
    local_store: Arc<dyn KeyValueStore>,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EnrollmentService {
    pub fn new(
        config: Config,
        attestation: Arc<dyn AttestationProvider>,
        limiter: Arc<RateLimiter>,
        engine: Arc<IntegrationEngine>,
        local_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            policy: ProcessorPolicy::from_config(&config),
            config,
            attestation,
            limiter,
            engine,
            local_store,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    // ── enroll ───────────────────────────────────────────────────────────────

    pub async fn enroll(
        &self,
        request: EnrollmentRequest,
        now_ms: TimestampMs,
    ) -> Result<EnrollmentSuccess, AuthError> {
        // 1. Admission: platform integrity signals.
        let signals = self.attestation.platform_signals().await;
        if !signals.trustworthy {
            warn!(detail = %signals.detail, "enrollment blocked by attestation");
            return Err(AuthError::Auth("platform attestation rejected".into()));
        }

        // 2. Selection validation, before any digest is derived.
        let kinds: Vec<FactorKind> = request.factors.iter().map(|f| f.kind()).collect();
        self.validate_selection(&kinds, &request.consent)?;

        // 3. Rate limit. Enrollment predates the user_id, so the window is
        // keyed on the strongest actor hint the terminal supplies.
        let (scope, actor) = match (&request.device_fingerprint, &request.ip) {
            (Some(fp), _) => (LimiterScope::Device, fp.as_str()),
            (None, Some(ip)) => (LimiterScope::Ip, ip.as_str()),
            (None, None) => (LimiterScope::Device, "anonymous"),
        };
        self.limiter.check_and_record(
            scope,
            actor,
            RatePolicy::per_hour(self.config.enrollments_per_hour),
            now_ms,
        )?;

        // 4–5. Process factors (abort on first failure) and assemble.
        let digests = self.assemble_digests(&request.factors)?;
        let record = EnrollmentRecord {
            user_id: uuid_v4(),
            digests,
            created_at: now_ms,
            expires_at: now_ms + self.config.enrollment_cache_ttl_ms,
            consent: request.consent,
        };
        record.validate(
            self.config.min_factors,
            self.config.max_factors,
            self.config.min_categories,
        )?;

        // 6. Ordered persistence with compensation.
        let lock = self.user_lock(&record.user_id);
        let _guard = lock.lock().await;
        self.persist_new(&record).await?;

        // 7. Consent and outcome are audit-logged; digests never are.
        info!(
            target: "audit",
            user_id = %record.user_id,
            factors = record.digests.len(),
            consent_at = now_ms,
            "enrollment committed"
        );

        Ok(EnrollmentSuccess {
            user_id: record.user_id,
            alias: request.alias,
            expires_at: record.expires_at,
        })
    }

    /// Local secure store first, then the durable store through the
    /// engine. A later failure compensates the earlier write in reverse
    /// order; a failed compensation is surfaced to the operator audit
    /// channel as PartiallyPersisted, never to the end user.
    async fn persist_new(&self, record: &EnrollmentRecord) -> Result<(), AuthError> {
        let key = record_key(&record.user_id);
        let bytes = encode_record(record)?;
        self.local_store.put(&key, &bytes, Some(self.config.enrollment_cache_ttl_ms))?;

        if let Err(e) = self.engine.store_record(record).await {
            warn!(user_id = %record.user_id, error = %e, "durable store failed; compensating");
            if let Err(comp) = self.local_store.delete(&key) {
                error!(
                    target: "audit",
                    user_id = %record.user_id,
                    error = %comp,
                    "compensating delete failed; record partially persisted"
                );
                let partial = AuthError::PartiallyPersisted {
                    user_id: record.user_id.clone(),
                    detail: comp.to_string(),
                };
                error!(target: "audit", %partial, "operator action required");
            }
            return Err(map_upstream(e));
        }
        Ok(())
    }

    // ── retrieve / export ────────────────────────────────────────────────────

    /// The factor kinds a user must be able to re-perform.
    pub async fn retrieve_kinds(
        &self,
        user_id: &str,
        now_ms: TimestampMs,
    ) -> Result<Vec<FactorKind>, AuthError> {
        let record = self.load_valid(user_id, now_ms).await?;
        Ok(record.kinds())
    }

    /// Right-to-access export: metadata only.
    pub async fn export(
        &self,
        user_id: &str,
        now_ms: TimestampMs,
    ) -> Result<EnrollmentExport, AuthError> {
        let record = self.load_valid(user_id, now_ms).await?;
        Ok(EnrollmentExport {
            user_id: record.user_id.clone(),
            kinds: record.kinds(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            consent: record.consent,
        })
    }

    async fn load_valid(
        &self,
        user_id: &str,
        now_ms: TimestampMs,
    ) -> Result<EnrollmentRecord, AuthError> {
        match self.engine.load_record(user_id).await.map_err(map_upstream)? {
            Some(record) if !record.is_expired(now_ms) => Ok(record),
            Some(_) | None => Err(AuthError::NotEnrolled),
        }
    }

    // ── update ───────────────────────────────────────────────────────────────

    /// Replace a user's factors under the same user_id: delete + enroll,
    /// atomic at this boundary. On failure the prior record is restored.
    pub async fn update(
        &self,
        user_id: &str,
        request: EnrollmentRequest,
        now_ms: TimestampMs,
    ) -> Result<EnrollmentSuccess, AuthError> {
        let kinds: Vec<FactorKind> = request.factors.iter().map(|f| f.kind()).collect();
        self.validate_selection(&kinds, &request.consent)?;
        self.limiter.check_and_record(
            LimiterScope::User,
            user_id,
            RatePolicy::per_hour(self.config.enrollments_per_hour),
            now_ms,
        )?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let previous = self.load_valid(user_id, now_ms).await?;
        let digests = self.assemble_digests(&request.factors)?;
        let record = EnrollmentRecord {
            user_id: user_id.to_string(),
            digests,
            created_at: now_ms,
            expires_at: now_ms + self.config.enrollment_cache_ttl_ms,
            consent: request.consent,
        };
        record.validate(
            self.config.min_factors,
            self.config.max_factors,
            self.config.min_categories,
        )?;

        let key = record_key(user_id);
        self.local_store.put(&key, &encode_record(&record)?, Some(self.config.enrollment_cache_ttl_ms))?;

        if let Err(e) = self.engine.store_record(&record).await {
            warn!(user_id = %user_id, error = %e, "update failed; restoring previous record");
            let restore = encode_record(&previous).and_then(|bytes| {
                self.local_store.put(&key, &bytes, Some(self.config.enrollment_cache_ttl_ms))
            });
            if let Err(comp) = restore {
                error!(
                    target: "audit",
                    user_id = %user_id,
                    error = %comp,
                    "restore after failed update did not complete"
                );
            }
            return Err(map_upstream(e));
        }

        info!(target: "audit", user_id = %user_id, "enrollment updated");
        Ok(EnrollmentSuccess {
            user_id: user_id.to_string(),
            alias: request.alias,
            expires_at: record.expires_at,
        })
    }

    // ── delete ───────────────────────────────────────────────────────────────

    /// Right to erasure. Idempotent: succeeds whether or not a record
    /// exists.
    pub async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        self.engine.delete_record(user_id).await.map_err(map_upstream)?;
        self.local_store.delete(&record_key(user_id))?;
        info!(target: "audit", user_id = %user_id, "enrollment deleted");
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn validate_selection(
        &self,
        kinds: &[FactorKind],
        consent: &ConsentFlags,
    ) -> Result<(), AuthError> {
        let unique: BTreeSet<FactorKind> = kinds.iter().copied().collect();
        if unique.len() != kinds.len() {
            return Err(AuthError::validation("factors", "duplicate factor kind selected"));
        }
        if kinds.len() < self.config.min_factors || kinds.len() > self.config.max_factors {
            return Err(AuthError::validation(
                "factors",
                format!(
                    "factor count {} outside [{},{}]",
                    kinds.len(),
                    self.config.min_factors,
                    self.config.max_factors
                ),
            ));
        }
        let categories: BTreeSet<FactorCategory> = unique.iter().map(|k| k.category()).collect();
        if categories.len() < self.config.min_categories {
            return Err(AuthError::validation(
                "factors",
                format!("factors span {} categories, need {}", categories.len(), self.config.min_categories),
            ));
        }
        if unique.contains(&FactorKind::PatternNormal) && unique.contains(&FactorKind::PatternMicro)
        {
            return Err(AuthError::validation(
                "factors",
                "at most one pattern variant may be enrolled",
            ));
        }
        if !consent.all_granted() {
            return Err(AuthError::validation("consent", "all consent flags must be granted"));
        }
        Ok(())
    }

    fn assemble_digests(
        &self,
        factors: &[FactorInput],
    ) -> Result<BTreeMap<FactorKind, FactorDigest>, AuthError> {
        let mut digests = BTreeMap::new();
        for input in factors {
            let digest = process(input, &self.policy)?;
            digests.insert(input.kind(), digest);
        }
        Ok(digests)
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().expect("lock map poisoned");
        Arc::clone(
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

fn encode_record(record: &EnrollmentRecord) -> Result<Vec<u8>, AuthError> {
    bincode::serialize(record).map_err(|e| AuthError::Internal(format!("encode record: {e}")))
}

/// Network and breaker failures become one user-meaningful outcome; the
/// specifics stay in the logs.
fn map_upstream(e: AuthError) -> AuthError {
    match e {
        AuthError::Unavailable(_) | AuthError::Timeout | AuthError::BreakerOpen => {
            AuthError::TryAgainLater
        }
        other => other,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::{AttestationSummary, TrustingAttestation};
    use async_trait::async_trait;
    use veilpay_core::FallbackStrategy;
    use veilpay_factors::{BalanceSample, TapPoint};
    use veilpay_gateway::{MemoryApi, MemoryStore};

    const NOW: TimestampMs = 1_700_000_000_000;

    fn fast_config() -> Config {
        Config {
            fallback_strategy: FallbackStrategy::ApiFirstCacheFallback,
            max_retries: 0,
            initial_retry_delay_ms: 1,
            max_retry_delay_ms: 5,
            api_timeout_ms: 200,
            ..Config::default()
        }
    }

    fn service_with(api: Arc<MemoryApi>, config: Config) -> EnrollmentService {
        let engine = Arc::new(IntegrationEngine::new(
            Arc::clone(&api) as Arc<dyn veilpay_gateway::RemoteApi>,
            &config,
        ));
        EnrollmentService::new(
            config,
            Arc::new(TrustingAttestation),
            Arc::new(RateLimiter::new()),
            engine,
            Arc::new(MemoryStore::new()),
        )
    }

    fn six_factors() -> Vec<FactorInput> {
        let policy = ProcessorPolicy::default();
        vec![
            FactorInput::Pin { digits: "123456".into() },
            FactorInput::Colour { indices: vec![1, 4, 7] },
            FactorInput::Emoji { indices: vec![2, 9, 30] },
            FactorInput::RhythmTap { taps_ms: vec![0, 250, 650, 800], nonce: 7 },
            FactorInput::Nfc { uid: vec![4, 7, 33, 90] },
            FactorInput::Balance {
                samples: vec![BalanceSample { x: 5, y: -700, z: 9810 }; policy.balance_sample_count],
            },
        ]
    }

    fn request(factors: Vec<FactorInput>) -> EnrollmentRequest {
        EnrollmentRequest {
            factors,
            consent: ConsentFlags::granted(),
            alias: Some("my phone".into()),
            device_fingerprint: Some("device-A".into()),
            ip: Some("198.51.100.7".into()),
        }
    }

    // ── Happy path ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn enroll_round_trip() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(Arc::clone(&api), fast_config());

        let ok = service.enroll(request(six_factors()), NOW).await.unwrap();
        assert_eq!(ok.user_id.len(), 36);
        assert_eq!(ok.alias.as_deref(), Some("my phone"));
        assert_eq!(ok.expires_at, NOW + 86_400_000);
        assert_eq!(api.record_count(), 1);

        let kinds = service.retrieve_kinds(&ok.user_id, NOW).await.unwrap();
        assert_eq!(
            kinds,
            vec![
                FactorKind::Pin,
                FactorKind::Colour,
                FactorKind::Emoji,
                FactorKind::RhythmTap,
                FactorKind::Nfc,
                FactorKind::Balance,
            ]
        );
    }

    #[tokio::test]
    async fn export_contains_metadata_never_digests() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(api, fast_config());
        let ok = service.enroll(request(six_factors()), NOW).await.unwrap();

        let export = service.export(&ok.user_id, NOW).await.unwrap();
        assert_eq!(export.kinds.len(), 6);
        assert_eq!(export.created_at, NOW);
        let json = serde_json::to_string(&export).unwrap();
        assert!(!json.contains("digest"), "export must not mention digests: {json}");
    }

    // ── Validation ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn too_few_factors_rejected_before_persistence() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(Arc::clone(&api), fast_config());
        let mut factors = six_factors();
        factors.truncate(5);
        let err = service.enroll(request(factors), NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { field: "factors", .. }));
        assert_eq!(api.record_count(), 0);
    }

    #[tokio::test]
    async fn missing_consent_rejected() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(api, fast_config());
        let mut req = request(six_factors());
        req.consent.privacy = false;
        assert!(matches!(
            service.enroll(req, NOW).await.unwrap_err(),
            AuthError::Validation { field: "consent", .. }
        ));
    }

    #[tokio::test]
    async fn duplicate_kind_rejected() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(api, fast_config());
        let mut factors = six_factors();
        factors.push(FactorInput::Pin { digits: "999111".into() });
        assert!(service.enroll(request(factors), NOW).await.is_err());
    }

    #[tokio::test]
    async fn both_pattern_variants_rejected() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(api, fast_config());
        let mut factors = six_factors();
        let trace: Vec<veilpay_factors::PatternPoint> = (0..12)
            .map(|i| veilpay_factors::PatternPoint { x: i, y: i, t: i64::from(i) * 30 })
            .collect();
        factors.push(FactorInput::PatternNormal { points: trace.clone() });
        factors.push(FactorInput::PatternMicro { points: trace });
        assert!(service.enroll(request(factors), NOW).await.is_err());
    }

    #[tokio::test]
    async fn invalid_factor_input_aborts_enrollment() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(Arc::clone(&api), fast_config());
        let mut factors = six_factors();
        factors[0] = FactorInput::Pin { digits: "12".into() }; // too short
        let err = service.enroll(request(factors), NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { field: "pin", .. }));
        assert_eq!(api.record_count(), 0);
    }

    #[tokio::test]
    async fn single_category_rejected() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(api, fast_config());
        // Six behavioural factors, no second category.
        let trace: Vec<veilpay_factors::PatternPoint> = (0..12)
            .map(|i| veilpay_factors::PatternPoint { x: i, y: i * 3, t: i64::from(i) * 25 })
            .collect();
        let stylus: Vec<veilpay_factors::StylusPoint> = (0..12)
            .map(|i| veilpay_factors::StylusPoint {
                x: i,
                y: i,
                pressure: 0.5,
                t: i64::from(i) * 25,
            })
            .collect();
        let factors = vec![
            FactorInput::PatternMicro { points: trace.clone() },
            FactorInput::RhythmTap { taps_ms: vec![0, 250, 650, 800], nonce: 1 },
            FactorInput::MouseDraw { points: trace },
            FactorInput::StylusDraw { points: stylus },
            FactorInput::ImageTap {
                image_id: "img".into(),
                taps: vec![TapPoint { x: 0.2, y: 0.4 }, TapPoint { x: 0.7, y: 0.7 }],
            },
            FactorInput::Voice { pcm: vec![1u8; 32_000] },
        ];
        let err = service.enroll(request(factors), NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { field: "factors", .. }));
    }

    // ── Admission ────────────────────────────────────────────────────────────

    struct BlockingAttestation;

    #[async_trait]
    impl AttestationProvider for BlockingAttestation {
        async fn platform_signals(&self) -> AttestationSummary {
            AttestationSummary { trustworthy: false, detail: "rooted device".into() }
        }
    }

    #[tokio::test]
    async fn blocked_attestation_rejects_without_persistence() {
        let api = Arc::new(MemoryApi::new());
        let config = fast_config();
        let engine = Arc::new(IntegrationEngine::new(
            Arc::clone(&api) as Arc<dyn veilpay_gateway::RemoteApi>,
            &config,
        ));
        let service = EnrollmentService::new(
            config,
            Arc::new(BlockingAttestation),
            Arc::new(RateLimiter::new()),
            engine,
            Arc::new(MemoryStore::new()),
        );
        let err = service.enroll(request(six_factors()), NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::Auth(_)));
        assert_eq!(api.record_count(), 0);
    }

    #[tokio::test]
    async fn rate_limit_caps_enrollments_per_hour() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(Arc::clone(&api), fast_config());
        for i in 0..10 {
            service.enroll(request(six_factors()), NOW + i).await.unwrap();
        }
        let err = service.enroll(request(six_factors()), NOW + 100).await.unwrap_err();
        match err {
            AuthError::RateLimited { retry_after_ms } => assert!(retry_after_ms > 0),
            other => panic!("expected RateLimited, got {other:?}"),
        }
        // No persistence side effect from the rejected attempt.
        assert_eq!(api.record_count(), 10);
    }

    // ── Rollback ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn durable_failure_compensates_local_write() {
        let api = Arc::new(MemoryApi::new());
        let local = Arc::new(MemoryStore::new());
        let config = fast_config();
        let engine = Arc::new(IntegrationEngine::new(
            Arc::clone(&api) as Arc<dyn veilpay_gateway::RemoteApi>,
            &config,
        ));
        let service = EnrollmentService::new(
            config,
            Arc::new(TrustingAttestation),
            Arc::new(RateLimiter::new()),
            engine,
            Arc::clone(&local) as Arc<dyn KeyValueStore>,
        );

        api.set_offline(true);
        let err = service.enroll(request(six_factors()), NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::TryAgainLater));
        // The local copy was rolled back.
        assert!(local.scan_prefix("enroll/").unwrap().is_empty());
    }

    // ── Update / delete ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_replaces_digests_under_same_user_id() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(api, fast_config());
        let ok = service.enroll(request(six_factors()), NOW).await.unwrap();

        let mut factors = six_factors();
        factors[0] = FactorInput::Pin { digits: "654321".into() };
        let updated = service.update(&ok.user_id, request(factors), NOW + 1_000).await.unwrap();
        assert_eq!(updated.user_id, ok.user_id);

        // Same kinds, new digest material; the service still verifies.
        let kinds = service.retrieve_kinds(&ok.user_id, NOW + 2_000).await.unwrap();
        assert_eq!(kinds.len(), 6);
    }

    #[tokio::test]
    async fn update_of_unknown_user_is_not_enrolled() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(api, fast_config());
        let err = service
            .update("00000000-0000-4000-8000-000000000000", request(six_factors()), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotEnrolled));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let api = Arc::new(MemoryApi::new());
        let service = service_with(Arc::clone(&api), fast_config());
        let ok = service.enroll(request(six_factors()), NOW).await.unwrap();

        service.delete(&ok.user_id).await.unwrap();
        assert_eq!(api.record_count(), 0);
        // Deleting again, and deleting a never-enrolled user, both succeed.
        service.delete(&ok.user_id).await.unwrap();
        service.delete("never-enrolled").await.unwrap();

        assert!(matches!(
            service.retrieve_kinds(&ok.user_id, NOW).await.unwrap_err(),
            AuthError::NotEnrolled
        ));
    }
}
