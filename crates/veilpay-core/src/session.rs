use crate::factor::FactorKind;
use crate::types::{FactorDigest, TimestampMs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── SessionState ─────────────────────────────────────────────────────────────

/// Verification session state machine.
///
/// ```text
/// UuidInput ──create_session──▶ AwaitingFactor
/// AwaitingFactor ──submit(match, complete)──▶ Verifying ──▶ DecidedSuccess
/// AwaitingFactor ──submit(mismatch, over limit)──▶ DecidedFailure
/// any non-terminal ──timeout──▶ Expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    UuidInput,
    AwaitingFactor,
    Verifying,
    DecidedSuccess,
    DecidedFailure,
    Expired,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::DecidedSuccess | SessionState::DecidedFailure | SessionState::Expired
        )
    }
}

// ── VerificationSession ──────────────────────────────────────────────────────

/// One in-flight verification. Owned exclusively by the verifier task for
/// its lifetime; there is never a second concurrent writer.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub session_id: String,
    pub user_id: String,
    pub merchant_id: String,
    /// Transaction amount in minor currency units.
    pub amount: u64,
    pub currency: String,
    pub device_fingerprint: Option<String>,
    pub ip: Option<String>,
    /// Factors the user must re-perform, in natural order.
    pub required_factors: Vec<FactorKind>,
    pub completed_factors: BTreeSet<FactorKind>,
    pub submitted_digests: BTreeMap<FactorKind, FactorDigest>,
    pub state: SessionState,
    pub created_at: TimestampMs,
    pub expires_at: TimestampMs,
    pub attempt_count: u32,
}

impl VerificationSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        user_id: String,
        merchant_id: String,
        amount: u64,
        currency: String,
        device_fingerprint: Option<String>,
        ip: Option<String>,
        required_factors: Vec<FactorKind>,
        created_at: TimestampMs,
        ttl_ms: i64,
    ) -> Self {
        Self {
            session_id,
            user_id,
            merchant_id,
            amount,
            currency,
            device_fingerprint,
            ip,
            required_factors,
            completed_factors: BTreeSet::new(),
            submitted_digests: BTreeMap::new(),
            state: SessionState::AwaitingFactor,
            created_at,
            expires_at: created_at + ttl_ms,
            attempt_count: 0,
        }
    }

    pub fn is_expired(&self, now_ms: TimestampMs) -> bool {
        now_ms > self.expires_at
    }

    /// All required factors have a matching submission.
    pub fn is_complete(&self) -> bool {
        self.required_factors.iter().all(|k| self.completed_factors.contains(k))
    }

    pub fn requires(&self, kind: FactorKind) -> bool {
        self.required_factors.contains(&kind)
    }
}
