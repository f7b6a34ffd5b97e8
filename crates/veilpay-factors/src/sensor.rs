//! Sensor-backed processors: voice capture, device-balance capture, NFC
//! tag possession.

use crate::input::BalanceSample;
use crate::processor::ProcessorPolicy;
use veilpay_core::constants::{VOICE_MAX_DURATION_MS, VOICE_MIN_DURATION_MS, VOICE_SAMPLE_RATE_HZ};
use veilpay_core::{AuthError, FactorDigest};
use veilpay_crypto::{sha256, wipe};

// ── Voice ────────────────────────────────────────────────────────────────────

/// 16-bit mono PCM at the policy sample rate.
const VOICE_BYTES_PER_MS: usize = (VOICE_SAMPLE_RATE_HZ as usize / 1000) * 2;

/// Voice digest: SHA-256 of the full PCM buffer, gated on capture
/// duration.
pub fn process_voice(pcm: &[u8]) -> Result<FactorDigest, AuthError> {
    let duration_ms = pcm.len() / VOICE_BYTES_PER_MS;
    if duration_ms < VOICE_MIN_DURATION_MS as usize || duration_ms > VOICE_MAX_DURATION_MS as usize
    {
        return Err(AuthError::validation(
            "voice",
            format!(
                "capture of {duration_ms} ms outside [{VOICE_MIN_DURATION_MS},{VOICE_MAX_DURATION_MS}]"
            ),
        ));
    }
    Ok(FactorDigest::from_bytes(sha256(pcm)))
}

// ── Balance ──────────────────────────────────────────────────────────────────

/// How-you-hold-it digest: the quantized mean accelerometer vector over a
/// stable capture window.
///
/// Per-sample data never enters the digest: two captures of the same
/// grip will not reproduce raw samples, so the digest binds to the
/// quantized resting orientation instead. Tolerance of one quantization
/// step per axis is provided at comparison time via
/// [`balance_candidates`].
pub fn process_balance(
    samples: &[BalanceSample],
    policy: &ProcessorPolicy,
) -> Result<FactorDigest, AuthError> {
    let q = quantized_mean(samples, policy)?;
    Ok(digest_quantized(q))
}

/// The exact digest plus every ±1-step neighbour (27 candidates).
pub fn balance_candidates(
    samples: &[BalanceSample],
    policy: &ProcessorPolicy,
) -> Result<Vec<FactorDigest>, AuthError> {
    let q = quantized_mean(samples, policy)?;
    let mut out = Vec::with_capacity(27);
    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                out.push(digest_quantized((q.0 + dx, q.1 + dy, q.2 + dz)));
            }
        }
    }
    Ok(out)
}

fn quantized_mean(
    samples: &[BalanceSample],
    policy: &ProcessorPolicy,
) -> Result<(i32, i32, i32), AuthError> {
    if samples.len() != policy.balance_sample_count {
        return Err(AuthError::validation(
            "balance",
            format!("expected {} samples, got {}", policy.balance_sample_count, samples.len()),
        ));
    }

    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|s| f64::from(s.x)).sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| f64::from(s.y)).sum::<f64>() / n;
    let mean_z = samples.iter().map(|s| f64::from(s.z)).sum::<f64>() / n;

    // The device must be held still: total variance over the window is
    // the stability signal.
    let variance = samples
        .iter()
        .map(|s| {
            (f64::from(s.x) - mean_x).powi(2)
                + (f64::from(s.y) - mean_y).powi(2)
                + (f64::from(s.z) - mean_z).powi(2)
        })
        .sum::<f64>()
        / n;
    if variance > policy.balance_stability_variance {
        return Err(AuthError::validation(
            "balance",
            format!("capture too unstable (variance {variance:.0})"),
        ));
    }

    let step = f64::from(policy.balance_quant_step);
    Ok((
        (mean_x / step).round() as i32,
        (mean_y / step).round() as i32,
        (mean_z / step).round() as i32,
    ))
}

fn digest_quantized(q: (i32, i32, i32)) -> FactorDigest {
    let mut buf = Vec::with_capacity(12);
    buf.extend_from_slice(&q.0.to_le_bytes());
    buf.extend_from_slice(&q.1.to_le_bytes());
    buf.extend_from_slice(&q.2.to_le_bytes());
    let digest = sha256(&buf);
    wipe(&mut buf);
    FactorDigest::from_bytes(digest)
}

// ── NFC ──────────────────────────────────────────────────────────────────────

/// NFC possession digest: SHA-256 of the raw tag UID.
pub fn process_nfc(uid: &[u8]) -> Result<FactorDigest, AuthError> {
    if uid.is_empty() {
        return Err(AuthError::validation("nfc", "empty tag uid"));
    }
    Ok(FactorDigest::from_bytes(sha256(uid)))
}
