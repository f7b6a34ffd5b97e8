use async_trait::async_trait;

/// Condensed platform integrity verdict used for enrollment admission.
/// Concrete providers (SafetyNet/Play Integrity, App Attest, TPM quotes)
/// live at the platform boundary; the core only sees this summary.
#[derive(Debug, Clone)]
pub struct AttestationSummary {
    pub trustworthy: bool,
    pub detail: String,
}

/// Capability interface for platform attestation signals.
#[async_trait]
pub trait AttestationProvider: Send + Sync {
    async fn platform_signals(&self) -> AttestationSummary;
}

/// Provider that trusts every device. Development and test use only.
pub struct TrustingAttestation;

#[async_trait]
impl AttestationProvider for TrustingAttestation {
    async fn platform_signals(&self) -> AttestationSummary {
        AttestationSummary { trustworthy: true, detail: "attestation disabled".into() }
    }
}
