use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use veilpay_core::{AuthError, EnrollmentRecord, TimestampMs};
use veilpay_crypto::nonce_hex;

// ── Request envelope ─────────────────────────────────────────────────────────

/// Common fields carried by every remote API request. The server rejects
/// duplicate nonces within a five-minute window, so a fresh CSPRNG nonce
/// is drawn per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// 32 CSPRNG bytes, hex-encoded.
    pub nonce: String,
    /// ISO-8601 wall-clock timestamp.
    pub timestamp: String,
    /// Present on enrollment writes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr_consent: Option<bool>,
}

impl RequestEnvelope {
    pub fn for_user(user_id: &str, now_ms: TimestampMs) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            session_id: None,
            nonce: nonce_hex(),
            timestamp: iso8601(now_ms),
            gdpr_consent: None,
        }
    }

    pub fn for_session(session_id: &str, now_ms: TimestampMs) -> Self {
        Self {
            user_id: None,
            session_id: Some(session_id.to_string()),
            nonce: nonce_hex(),
            timestamp: iso8601(now_ms),
            gdpr_consent: None,
        }
    }

    pub fn with_consent(mut self, granted: bool) -> Self {
        self.gdpr_consent = Some(granted);
        self
    }
}

fn iso8601(now_ms: TimestampMs) -> String {
    chrono::DateTime::from_timestamp_millis(now_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ── Wire errors ──────────────────────────────────────────────────────────────

/// Error codes of the remote API's `{code, message, retry_after_ms?}`
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    Validation,
    Auth,
    RateLimited,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl From<ApiErrorBody> for AuthError {
    fn from(body: ApiErrorBody) -> Self {
        match body.code {
            ApiErrorCode::Validation => AuthError::Validation {
                field: "request",
                reason: body.message,
            },
            ApiErrorCode::Auth => AuthError::Auth(body.message),
            ApiErrorCode::RateLimited => AuthError::RateLimited {
                retry_after_ms: body.retry_after_ms.unwrap_or(1_000),
            },
            ApiErrorCode::NotFound => AuthError::NotFound(body.message),
            ApiErrorCode::Conflict => AuthError::Conflict(body.message),
            ApiErrorCode::Unavailable => AuthError::Unavailable(body.message),
            ApiErrorCode::Internal => AuthError::Internal(body.message),
        }
    }
}

// ── RemoteApi ────────────────────────────────────────────────────────────────

/// The remote durable store, as the core sees it. Implementations own the
/// transport (HTTP, TLS, certificates); the core only speaks this trait.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn put_record(
        &self,
        envelope: RequestEnvelope,
        record: &EnrollmentRecord,
    ) -> Result<(), AuthError>;

    async fn get_record(
        &self,
        envelope: RequestEnvelope,
        user_id: &str,
    ) -> Result<Option<EnrollmentRecord>, AuthError>;

    async fn delete_record(
        &self,
        envelope: RequestEnvelope,
        user_id: &str,
    ) -> Result<(), AuthError>;
}

// ── MemoryApi ────────────────────────────────────────────────────────────────

/// In-memory `RemoteApi` for development embeddings and tests. The
/// `set_offline` switch makes every call fail with `Unavailable`, which
/// is enough to exercise fallback and breaker paths end to end.
#[derive(Default)]
pub struct MemoryApi {
    records: std::sync::Mutex<std::collections::HashMap<String, EnrollmentRecord>>,
    offline: std::sync::atomic::AtomicBool,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().expect("api mutex poisoned").len()
    }

    fn admit(&self) -> Result<(), AuthError> {
        if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AuthError::Unavailable("remote api offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for MemoryApi {
    async fn put_record(
        &self,
        _envelope: RequestEnvelope,
        record: &EnrollmentRecord,
    ) -> Result<(), AuthError> {
        self.admit()?;
        self.records
            .lock()
            .expect("api mutex poisoned")
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn get_record(
        &self,
        _envelope: RequestEnvelope,
        user_id: &str,
    ) -> Result<Option<EnrollmentRecord>, AuthError> {
        self.admit()?;
        Ok(self.records.lock().expect("api mutex poisoned").get(user_id).cloned())
    }

    async fn delete_record(
        &self,
        _envelope: RequestEnvelope,
        user_id: &str,
    ) -> Result<(), AuthError> {
        self.admit()?;
        self.records.lock().expect("api mutex poisoned").remove(user_id);
        Ok(())
    }
}
