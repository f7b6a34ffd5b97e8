//! Platform-authenticator processors (FACE, FINGERPRINT).
//!
//! The biometric template never leaves the platform boundary. The digest
//! binds only to the factor label and the device-attested key id:
//! sha256(label ‖ key_id).

use crate::input::PlatformAttestation;
use veilpay_core::{AuthError, FactorDigest, FactorKind};
use veilpay_crypto::{sha256, wipe};

pub fn process_platform(
    expected: FactorKind,
    attestation: &PlatformAttestation,
) -> Result<FactorDigest, AuthError> {
    if !matches!(expected, FactorKind::Face | FactorKind::Fingerprint) {
        return Err(AuthError::validation("attestation", "not a platform factor"));
    }
    if attestation.kind != expected {
        return Err(AuthError::validation(
            "attestation",
            format!("attestation for {} given to {} processor", attestation.kind, expected),
        ));
    }
    // `ok` is only set when the authenticator reported a STRONG-class
    // ceremony result.
    if !attestation.ok {
        return Err(AuthError::Auth("platform authenticator did not report success".into()));
    }
    if attestation.key_id.is_empty() {
        return Err(AuthError::validation("attestation", "empty attested key id"));
    }

    let mut buf = Vec::with_capacity(expected.label().len() + attestation.key_id.len());
    buf.extend_from_slice(expected.label().as_bytes());
    buf.extend_from_slice(attestation.key_id.as_bytes());
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}
