use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Unix timestamp in milliseconds, UTC.
pub type TimestampMs = i64;

/// Length of every factor digest in bytes (SHA-256 output).
pub const DIGEST_LEN: usize = 32;

// ── FactorDigest ─────────────────────────────────────────────────────────────

/// Opaque 32-byte digest derived from a normalized factor input.
///
/// The only factor material that ever leaves the device. The buffer is
/// zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorDigest([u8; DIGEST_LEN]);

impl FactorDigest {
    pub fn from_bytes(b: [u8; DIGEST_LEN]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Hex rendering, for audit logs and commitments only.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Drop for FactorDigest {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for FactorDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactorDigest({}b)", DIGEST_LEN)
    }
}
