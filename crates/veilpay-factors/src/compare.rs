//! Constant-time digest comparison.
//!
//! Callers never branch on intermediate bytes; the submitted digest is
//! consumed by value and therefore zeroized when it drops on exit,
//! whatever the outcome.

use veilpay_core::FactorDigest;
use veilpay_crypto::constant_time_eq;

/// Exact comparison of a submitted digest against the stored one.
pub fn compare(submitted: FactorDigest, stored: &FactorDigest) -> bool {
    constant_time_eq(submitted.as_bytes(), stored.as_bytes())
}

/// Fuzzy comparison: does the stored digest match *any* candidate?
///
/// Every candidate is compared; the loop runs to completion and the
/// result is OR-accumulated so execution time does not depend on which
/// (if any) candidate matched.
pub fn compare_any(candidates: &[FactorDigest], stored: &FactorDigest) -> bool {
    let mut found = 0u8;
    for candidate in candidates {
        found |= u8::from(constant_time_eq(candidate.as_bytes(), stored.as_bytes()));
    }
    found != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(b: u8) -> FactorDigest {
        FactorDigest::from_bytes([b; 32])
    }

    #[test]
    fn exact_match() {
        assert!(compare(digest(7), &digest(7)));
        assert!(!compare(digest(7), &digest(8)));
    }

    #[test]
    fn any_match_position_independent() {
        let stored = digest(5);
        assert!(compare_any(&[digest(5), digest(1), digest(2)], &stored));
        assert!(compare_any(&[digest(1), digest(2), digest(5)], &stored));
        assert!(!compare_any(&[digest(1), digest(2), digest(3)], &stored));
    }

    #[test]
    fn empty_candidate_set_never_matches() {
        assert!(!compare_any(&[], &digest(0)));
    }

    /// Timing-distribution check for the comparator: mean execution time
    /// for matching and non-matching inputs must stay within 30% of each
    /// other. Wall-clock sensitive, so not part of the default test run;
    /// execute with `cargo test -- --ignored` on a quiet machine.
    #[test]
    #[ignore]
    fn comparison_time_is_input_independent() {
        use std::time::Instant;

        const ROUNDS: u32 = 10_000;
        let a = digest(0xAA);
        let equal = digest(0xAA);
        let mut differs_first = [0xAAu8; 32];
        differs_first[0] = 0x00;
        let differs = FactorDigest::from_bytes(differs_first);

        let mut time = |other: &FactorDigest| {
            let start = Instant::now();
            let mut acc = false;
            for _ in 0..ROUNDS {
                acc ^= compare(a.clone(), other);
            }
            std::hint::black_box(acc);
            start.elapsed().as_nanos() as f64
        };

        let t_eq = time(&equal);
        let t_ne = time(&differs);
        let ratio = (t_eq - t_ne).abs() / t_eq.max(t_ne);
        assert!(ratio < 0.30, "timing skew {ratio:.2} exceeds tolerance");
    }
}
