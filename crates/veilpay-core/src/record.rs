use crate::error::AuthError;
use crate::factor::{FactorCategory, FactorKind};
use crate::types::{FactorDigest, TimestampMs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── ConsentFlags ─────────────────────────────────────────────────────────────

/// GDPR consent captured at enrollment. A record is only valid when all
/// three are granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentFlags {
    pub terms: bool,
    pub privacy: bool,
    pub processing: bool,
}

impl ConsentFlags {
    pub fn all_granted(&self) -> bool {
        self.terms && self.privacy && self.processing
    }

    pub fn granted() -> Self {
        Self { terms: true, privacy: true, processing: true }
    }
}

// ── EnrollmentRecord ─────────────────────────────────────────────────────────

/// A user's enrolled factor digests plus lifecycle metadata.
///
/// Owned by the persistence boundary once committed. Digests never cross
/// back over that boundary after storage; only commitment proofs do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Device-owned UUIDv4; never derivable from server data.
    pub user_id: String,
    /// Ordered by the natural FactorKind order; keys are unique by
    /// construction.
    pub digests: BTreeMap<FactorKind, FactorDigest>,
    pub created_at: TimestampMs,
    /// Cache-copy expiry (created_at + 24 h by default).
    pub expires_at: TimestampMs,
    pub consent: ConsentFlags,
}

impl EnrollmentRecord {
    /// Check every record invariant: factor cardinality, category spread,
    /// consent, and pattern-variant exclusivity.
    pub fn validate(
        &self,
        min_factors: usize,
        max_factors: usize,
        min_categories: usize,
    ) -> Result<(), AuthError> {
        let n = self.digests.len();
        if n < min_factors || n > max_factors {
            return Err(AuthError::validation(
                "digests",
                format!("factor count {n} outside [{min_factors},{max_factors}]"),
            ));
        }

        let categories: BTreeSet<FactorCategory> =
            self.digests.keys().map(|k| k.category()).collect();
        if categories.len() < min_categories {
            return Err(AuthError::validation(
                "digests",
                format!(
                    "factors span {} categor{}, need at least {min_categories}",
                    categories.len(),
                    if categories.len() == 1 { "y" } else { "ies" },
                ),
            ));
        }

        if self.digests.contains_key(&FactorKind::PatternNormal)
            && self.digests.contains_key(&FactorKind::PatternMicro)
        {
            return Err(AuthError::validation(
                "digests",
                "at most one pattern variant may be enrolled",
            ));
        }

        if !self.consent.all_granted() {
            return Err(AuthError::validation("consent", "all consent flags must be granted"));
        }

        Ok(())
    }

    pub fn is_expired(&self, now_ms: TimestampMs) -> bool {
        now_ms > self.expires_at
    }

    /// Enrolled kinds in natural order.
    pub fn kinds(&self) -> Vec<FactorKind> {
        self.digests.keys().copied().collect()
    }
}
