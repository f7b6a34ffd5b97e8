use crate::session::SessionState;
use thiserror::Error;

/// Domain error taxonomy for the authentication core.
///
/// Kinds map onto the remote API error codes one-to-one where a wire
/// counterpart exists; `is_retryable` is the single source of truth for
/// the gateway retry loop.
#[derive(Debug, Error)]
pub enum AuthError {
    // ── Input / invariant errors ─────────────────────────────────────────────
    #[error("validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("admission denied: {0}")]
    Auth(String),

    #[error("rate limited; retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    // ── Record / session errors ──────────────────────────────────────────────
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no valid enrollment for this user")]
    NotEnrolled,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("session has expired")]
    SessionExpired,

    #[error("operation not permitted in session state {state:?}")]
    InvalidSessionState { state: SessionState },

    /// Deliberately opaque: identical for every failing submission, so a
    /// caller can never learn which factor mismatched.
    #[error("verification failed")]
    VerificationFailed,

    // ── Upstream errors ──────────────────────────────────────────────────────
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream call timed out")]
    Timeout,

    #[error("circuit breaker is open")]
    BreakerOpen,

    #[error("temporarily unable to process; try again later")]
    TryAgainLater,

    // ── Operator-facing errors ───────────────────────────────────────────────
    /// A compensating delete failed during enrollment rollback. Surfaced to
    /// the operator audit channel, never to the end user.
    #[error("record for {user_id} is partially persisted: {detail}")]
    PartiallyPersisted { user_id: String, detail: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether the gateway retry loop may re-attempt the call.
    ///
    /// `RateLimited` is retryable only because the server supplies the
    /// delay; the retry loop substitutes `retry_after_ms` for backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Unavailable(_) | AuthError::Timeout | AuthError::RateLimited { .. }
        )
    }

    /// Convenience constructor for validation failures.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        AuthError::Validation { field, reason: reason.into() }
    }
}
