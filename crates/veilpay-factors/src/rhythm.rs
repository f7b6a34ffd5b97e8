//! Rhythm-tap processor.
//!
//! The digest is derived from *relative* inter-tap intervals, scaled so
//! the largest interval maps to 1000. Tapping the same rhythm faster or
//! slower therefore produces the same digest; changing the rhythm's shape
//! does not. A per-enrollment nonce is mixed in so two users with the
//! same rhythm do not share a digest.

use veilpay_core::constants::{
    RHYTHM_INTERVAL_SCALE, RHYTHM_MAX_INTERVAL_MS, RHYTHM_MAX_TAPS, RHYTHM_MIN_CV,
    RHYTHM_MIN_INTERVAL_MS, RHYTHM_MIN_TAPS,
};
use veilpay_core::{AuthError, FactorDigest};
use veilpay_crypto::{sha256, wipe};

/// Validate taps, normalize intervals and digest them with the nonce.
pub fn process_rhythm(taps_ms: &[i64], nonce: u64) -> Result<FactorDigest, AuthError> {
    if taps_ms.len() < RHYTHM_MIN_TAPS || taps_ms.len() > RHYTHM_MAX_TAPS {
        return Err(AuthError::validation(
            "rhythm",
            format!("tap count {} outside [{RHYTHM_MIN_TAPS},{RHYTHM_MAX_TAPS}]", taps_ms.len()),
        ));
    }

    let intervals: Vec<i64> = taps_ms.windows(2).map(|w| w[1] - w[0]).collect();
    for &iv in &intervals {
        if !(RHYTHM_MIN_INTERVAL_MS..=RHYTHM_MAX_INTERVAL_MS).contains(&iv) {
            return Err(AuthError::validation(
                "rhythm",
                format!("inter-tap interval {iv} ms outside [{RHYTHM_MIN_INTERVAL_MS},{RHYTHM_MAX_INTERVAL_MS}]"),
            ));
        }
    }

    // Reject trivial rhythms: a metronome-flat tap pattern carries no
    // user-specific signal.
    let cv = coefficient_of_variation(&intervals);
    if cv < RHYTHM_MIN_CV {
        return Err(AuthError::validation(
            "rhythm",
            format!("rhythm too uniform (cv {cv:.3})"),
        ));
    }

    let max = intervals.iter().copied().max().unwrap_or(1);
    let mut buf = Vec::with_capacity(intervals.len() * 2 + 8);
    for &iv in &intervals {
        let scaled =
            ((iv as f64) * (RHYTHM_INTERVAL_SCALE as f64) / (max as f64)).round() as u16;
        buf.extend_from_slice(&scaled.to_le_bytes());
    }
    buf.extend_from_slice(&nonce.to_le_bytes());

    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

fn coefficient_of_variation(intervals: &[i64]) -> f64 {
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<i64>() as f64 / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let var = intervals.iter().map(|&i| (i as f64 - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() / mean
}
