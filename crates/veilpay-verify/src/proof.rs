use serde::Serialize;
use std::collections::BTreeMap;
use veilpay_core::{FactorDigest, FactorKind, TimestampMs};
use veilpay_crypto::sha256;

/// Envelope format version. The commitment is a placeholder for a future
/// zero-knowledge proof; the envelope shape is frozen so the circuit can
/// slot in behind it without breaking callers.
pub const PROOF_VERSION: u32 = 1;

/// Opaque verification proof handed to the merchant on success.
#[derive(Debug, Clone, Serialize)]
pub struct ProofEnvelope {
    /// sha256(user_id ‖ for each kind in natural order: label ‖ digest).
    pub commitment: [u8; 32],
    pub version: u32,
    pub session_id: String,
    pub timestamp: TimestampMs,
}

impl ProofEnvelope {
    pub fn commitment_hex(&self) -> String {
        hex::encode(self.commitment)
    }
}

/// Build the commitment over the user's enrolled digests and wrap it with
/// the session metadata. The `BTreeMap` iterates in the natural factor
/// order, which is the committed ordering.
pub fn emit_proof(
    user_id: &str,
    digests: &BTreeMap<FactorKind, FactorDigest>,
    session_id: &str,
    now_ms: TimestampMs,
) -> ProofEnvelope {
    let mut material = Vec::with_capacity(user_id.len() + digests.len() * 48);
    material.extend_from_slice(user_id.as_bytes());
    for (kind, digest) in digests {
        material.extend_from_slice(kind.label().as_bytes());
        material.extend_from_slice(digest.as_bytes());
    }
    let commitment = sha256(&material);
    veilpay_crypto::wipe(&mut material);

    ProofEnvelope {
        commitment,
        version: PROOF_VERSION,
        session_id: session_id.to_string(),
        timestamp: now_ms,
    }
}
