//! Factor dispatch: one pure processing function per kind, keyed by the
//! input tag.

use crate::input::FactorInput;
use crate::{image, knowledge, motion, platform, rhythm, sensor};
use veilpay_core::{AuthError, Config, FactorDigest, FactorKind};

// ── ProcessorPolicy ──────────────────────────────────────────────────────────

/// Policy knobs consumed by the fuzzy processors, lifted out of the flat
/// runtime config so the factor layer stays independent of the rest.
#[derive(Debug, Clone)]
pub struct ProcessorPolicy {
    pub image_grid: u16,
    pub image_fuzzy_radius: u16,
    pub image_required_taps: usize,
    pub balance_sample_count: usize,
    pub balance_stability_variance: f64,
    pub balance_quant_step: i32,
}

impl ProcessorPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image_grid: config.image_grid,
            image_fuzzy_radius: config.image_fuzzy_radius,
            image_required_taps: config.image_required_taps,
            balance_sample_count: config.balance_sample_count,
            balance_stability_variance: config.balance_stability_variance,
            balance_quant_step: config.balance_quant_step,
        }
    }
}

impl Default for ProcessorPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// Validate, normalize and digest one factor capture.
///
/// Deterministic on normalized input; rejects before hashing; 32-byte
/// output for every kind.
pub fn process(input: &FactorInput, policy: &ProcessorPolicy) -> Result<FactorDigest, AuthError> {
    match input {
        FactorInput::Pin { digits } => knowledge::process_pin(digits),
        FactorInput::Colour { indices } => knowledge::process_colour(indices),
        FactorInput::Emoji { indices } => knowledge::process_emoji(indices),
        FactorInput::Words { indices } => knowledge::process_words(indices),
        FactorInput::PatternNormal { points } => motion::process_pattern_normal(points),
        FactorInput::PatternMicro { points } => motion::process_pattern_micro(points),
        FactorInput::MouseDraw { points } => motion::process_mouse_draw(points),
        FactorInput::StylusDraw { points } => motion::process_stylus_draw(points),
        FactorInput::RhythmTap { taps_ms, nonce } => rhythm::process_rhythm(taps_ms, *nonce),
        FactorInput::ImageTap { image_id, taps } => {
            image::process_image_tap(image_id, taps, policy)
        }
        FactorInput::Voice { pcm } => sensor::process_voice(pcm),
        FactorInput::Balance { samples } => sensor::process_balance(samples, policy),
        FactorInput::Nfc { uid } => sensor::process_nfc(uid),
        FactorInput::Face { attestation } => {
            platform::process_platform(FactorKind::Face, attestation)
        }
        FactorInput::Fingerprint { attestation } => {
            platform::process_platform(FactorKind::Fingerprint, attestation)
        }
    }
}

/// Digest candidates for verification-time comparison.
///
/// Exact-match kinds yield exactly the processed digest; the fuzzy kinds
/// (IMAGE_TAP, BALANCE) yield the policy-bounded neighbourhood the
/// comparator must scan in constant time.
pub fn verification_candidates(
    input: &FactorInput,
    policy: &ProcessorPolicy,
) -> Result<Vec<FactorDigest>, AuthError> {
    match input {
        FactorInput::ImageTap { image_id, taps } => {
            image::candidate_digests(image_id, taps, policy)
        }
        FactorInput::Balance { samples } => sensor::balance_candidates(samples, policy),
        _ => Ok(vec![process(input, policy)?]),
    }
}
