use crate::proof::{emit_proof, ProofEnvelope};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use veilpay_core::{
    AttemptRecord, AuthError, Config, EnrollmentRecord, FactorDigest, FactorKind, GeoPoint,
    SessionState, TimestampMs, VerificationSession,
};
use veilpay_crypto::uuid_v4;
use veilpay_factors::compare_any;
use veilpay_gateway::{AlertPriority, IntegrationEngine, MerchantAlert};
use veilpay_risk::{FraudAction, FraudDetector, LimiterScope, RateLimiter, RatePolicy};

// ── Request / result shapes ──────────────────────────────────────────────────

pub struct CreateSessionRequest {
    pub user_id: String,
    pub merchant_id: String,
    /// Transaction amount in minor currency units.
    pub amount: u64,
    pub currency: String,
    pub device_fingerprint: Option<String>,
    pub ip: Option<String>,
    pub location: Option<GeoPoint>,
}

/// What the terminal needs to drive the factor ceremony.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub required_factors: Vec<FactorKind>,
    pub expires_at: TimestampMs,
}

#[derive(Debug)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub proof: Option<ProofEnvelope>,
}

/// Progress after an accepted submission.
#[derive(Debug)]
pub enum SubmitProgress {
    /// Factor matched; more are outstanding.
    AwaitingMore { remaining: usize },
    /// Every required factor matched; the session is decided and gone.
    Decided(VerificationOutcome),
}

/// One in-flight session plus the enrolled digests it verifies against.
/// Dropping the entry zeroizes every digest.
struct ActiveSession {
    session: VerificationSession,
    stored: BTreeMap<FactorKind, FactorDigest>,
}

// ── VerificationService ──────────────────────────────────────────────────────

/// Verification orchestrator: session lifecycle, admission, constant-time
/// comparison, decision. Sessions live in a process-wide table; each is
/// mutated by one logical task at a time under the table mutex.
pub struct VerificationService {
    config: Config,
    engine: Arc<IntegrationEngine>,
    fraud: Arc<FraudDetector>,
    limiter: Arc<RateLimiter>,
    alerts: Arc<dyn MerchantAlert>,
    sessions: Mutex<HashMap<String, ActiveSession>>,
}

impl VerificationService {
    pub fn new(
        config: Config,
        engine: Arc<IntegrationEngine>,
        fraud: Arc<FraudDetector>,
        limiter: Arc<RateLimiter>,
        alerts: Arc<dyn MerchantAlert>,
    ) -> Self {
        Self { config, engine, fraud, limiter, alerts, sessions: Mutex::new(HashMap::new()) }
    }

    // ── create_session ───────────────────────────────────────────────────────

    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
        now_ms: TimestampMs,
    ) -> Result<SessionInfo, AuthError> {
        // 1. Fraud admission.
        let attempt = AttemptRecord {
            actor_id: request.user_id.clone(),
            at_ms: now_ms,
            location: request.location,
            device_fingerprint: request.device_fingerprint.clone(),
            ip: request.ip.clone(),
            amount: Some(request.amount),
        };
        let assessment = self.fraud.assess(&attempt, now_ms);
        self.fraud.record_attempt(attempt, now_ms);

        if assessment.action == FraudAction::Block {
            warn!(
                target: "audit",
                user_id = %request.user_id,
                merchant_id = %request.merchant_id,
                score = assessment.score,
                "verification blocked by fraud detector"
            );
            self.alerts
                .send_alert(
                    &request.merchant_id,
                    AlertPriority::High,
                    "verification blocked",
                    &assessment.reasons.join("; "),
                )
                .await;
            return Err(AuthError::Auth("verification blocked".into()));
        }

        // 2. Rate limits: per user and per merchant.
        self.limiter.check_and_record(
            LimiterScope::User,
            &request.user_id,
            RatePolicy::per_hour(self.config.verifications_per_hour_per_user),
            now_ms,
        )?;
        self.limiter.check_and_record(
            LimiterScope::Merchant,
            &request.merchant_id,
            RatePolicy::per_hour(self.config.verifications_per_hour_per_merchant),
            now_ms,
        )?;

        // 3. Enrollment lookup.
        let record = match self.engine.load_record(&request.user_id).await {
            Ok(Some(r)) if !r.is_expired(now_ms) => r,
            Ok(_) => return Err(AuthError::NotEnrolled),
            Err(e) => {
                warn!(user_id = %request.user_id, error = %e, "enrollment lookup failed");
                return Err(AuthError::TryAgainLater);
            }
        };

        // 4. Factor policy: every enrolled factor by default; an elevated
        // score (Challenge) keeps the full set, which cannot be raised.
        let required = record.kinds();

        // 5. Session.
        let session_id = uuid_v4();
        let session = VerificationSession::new(
            session_id.clone(),
            request.user_id.clone(),
            request.merchant_id.clone(),
            request.amount,
            request.currency,
            request.device_fingerprint,
            request.ip,
            required.clone(),
            now_ms,
            self.config.session_ttl_ms,
        );
        let info = SessionInfo { session_id: session_id.clone(), required_factors: required, expires_at: session.expires_at };

        let EnrollmentRecord { digests, .. } = record;
        self.sessions
            .lock()
            .expect("session table poisoned")
            .insert(session_id.clone(), ActiveSession { session, stored: digests });

        info!(
            target: "audit",
            session_id = %session_id,
            user_id = %request.user_id,
            merchant_id = %request.merchant_id,
            fraud_score = assessment.score,
            "verification session created"
        );
        Ok(info)
    }

    // ── submit_factor ────────────────────────────────────────────────────────

    /// Submit the device-computed digest candidates for one factor.
    ///
    /// Every mismatch returns the same opaque `VerificationFailed`,
    /// whatever the factor and whether or not the attempt limit was hit;
    /// a caller can never learn which factor failed.
    pub fn submit_factor(
        &self,
        session_id: &str,
        kind: FactorKind,
        candidates: Vec<FactorDigest>,
        now_ms: TimestampMs,
    ) -> Result<SubmitProgress, AuthError> {
        let mut sessions = self.sessions.lock().expect("session table poisoned");
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| AuthError::NotFound(format!("session {session_id}")))?;

        // Expiry is enforced eagerly on every submission.
        if entry.session.state == SessionState::Expired || entry.session.is_expired(now_ms) {
            entry.session.state = SessionState::Expired;
            return Err(AuthError::SessionExpired);
        }
        if entry.session.state != SessionState::AwaitingFactor {
            return Err(AuthError::InvalidSessionState { state: entry.session.state });
        }
        if entry.session.completed_factors.contains(&kind) {
            return Err(AuthError::validation("factor", "factor already completed"));
        }
        if !entry.session.requires(kind) {
            return Err(AuthError::validation("factor", "factor not required for this session"));
        }

        let stored = entry
            .stored
            .get(&kind)
            .ok_or_else(|| AuthError::Internal("required factor has no stored digest".into()))?;

        if !compare_any(&candidates, stored) {
            entry.session.attempt_count += 1;
            if entry.session.attempt_count >= self.config.max_session_attempts {
                entry.session.state = SessionState::DecidedFailure;
                let session_user = entry.session.user_id.clone();
                sessions.remove(session_id);
                info!(
                    target: "audit",
                    session_id = %session_id,
                    user_id = %session_user,
                    "verification failed: attempt limit reached"
                );
            }
            // Opaque: byte-identical for every failing submission.
            return Err(AuthError::VerificationFailed);
        }

        // Match: record progress. The canonical candidate is retained so
        // the session owns what was submitted until it is destroyed.
        if let Some(first) = candidates.into_iter().next() {
            entry.session.submitted_digests.insert(kind, first);
        }
        entry.session.completed_factors.insert(kind);

        if !entry.session.is_complete() {
            let remaining =
                entry.session.required_factors.len() - entry.session.completed_factors.len();
            return Ok(SubmitProgress::AwaitingMore { remaining });
        }

        // Decide.
        entry.session.state = SessionState::Verifying;
        let proof =
            emit_proof(&entry.session.user_id, &entry.stored, session_id, now_ms);
        entry.session.state = SessionState::DecidedSuccess;
        let user_id = entry.session.user_id.clone();

        // The session is destroyed after decision; digests wipe on drop.
        sessions.remove(session_id);
        info!(
            target: "audit",
            session_id = %session_id,
            user_id = %user_id,
            commitment = %proof.commitment_hex(),
            "verification succeeded"
        );
        Ok(SubmitProgress::Decided(VerificationOutcome { verified: true, proof: Some(proof) }))
    }

    // ── Introspection / maintenance ──────────────────────────────────────────

    /// Current state of a live session, applying lazy expiry.
    pub fn session_state(
        &self,
        session_id: &str,
        now_ms: TimestampMs,
    ) -> Result<SessionState, AuthError> {
        let mut sessions = self.sessions.lock().expect("session table poisoned");
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| AuthError::NotFound(format!("session {session_id}")))?;
        if entry.session.state == SessionState::AwaitingFactor && entry.session.is_expired(now_ms)
        {
            entry.session.state = SessionState::Expired;
        }
        Ok(entry.session.state)
    }

    /// Periodic sweep removing expired sessions. Safe to run at any time;
    /// in-flight submissions re-check expiry themselves.
    pub fn prune_expired(&self, now_ms: TimestampMs) {
        let mut sessions = self.sessions.lock().expect("session table poisoned");
        sessions.retain(|_, e| {
            !e.session.is_expired(now_ms) && !e.session.state.is_terminal()
        });
    }

    #[cfg(test)]
    fn live_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
