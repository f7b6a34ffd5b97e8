//! Motion-factor processors: the two pattern variants and the two
//! free-draw factors.
//!
//! PATTERN_NORMAL normalizes the time axis onto 0..=1000 so the digest is
//! invariant under affine time scaling (the user may trace faster or
//! slower). PATTERN_MICRO keeps raw millisecond offsets, deliberately
//! binding the digest to the user's micro-timing.

use crate::input::{PatternPoint, StylusPoint};
use veilpay_core::constants::{DRAW_MIN_POINTS, PATTERN_MAX_POINTS, PATTERN_MIN_POINTS, PATTERN_TIME_SCALE};
use veilpay_core::{AuthError, FactorDigest};
use veilpay_crypto::{sha256, wipe};

fn check_pattern_bounds(points: &[PatternPoint], field: &'static str) -> Result<(), AuthError> {
    if points.len() < PATTERN_MIN_POINTS || points.len() > PATTERN_MAX_POINTS {
        return Err(AuthError::validation(
            field,
            format!("point count {} outside [{PATTERN_MIN_POINTS},{PATTERN_MAX_POINTS}]", points.len()),
        ));
    }
    Ok(())
}

/// Speed-invariant pattern digest. Each point serializes as
/// (x: 4 LE, y: 4 LE, t_norm: 4 LE) with t_norm = ((t − t₀)/(t_last − t₀))·1000.
pub fn process_pattern_normal(points: &[PatternPoint]) -> Result<FactorDigest, AuthError> {
    check_pattern_bounds(points, "pattern_normal")?;

    let t0 = points[0].t;
    let span = points[points.len() - 1].t - t0;

    let mut buf = Vec::with_capacity(points.len() * 12);
    for p in points {
        // A degenerate capture with zero time span maps every point to
        // offset 0; the spatial trace still carries the secret.
        let t_norm: u32 = if span > 0 {
            (((p.t - t0) * i64::from(PATTERN_TIME_SCALE)) / span) as u32
        } else {
            0
        };
        buf.extend_from_slice(&p.x.to_le_bytes());
        buf.extend_from_slice(&p.y.to_le_bytes());
        buf.extend_from_slice(&t_norm.to_le_bytes());
    }
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

/// Speed-dependent pattern digest: same layout, but t is the raw
/// millisecond offset from the first point.
pub fn process_pattern_micro(points: &[PatternPoint]) -> Result<FactorDigest, AuthError> {
    check_pattern_bounds(points, "pattern_micro")?;

    let t0 = points[0].t;
    let mut buf = Vec::with_capacity(points.len() * 12);
    for p in points {
        let offset = p.t - t0;
        if !(0..=i64::from(u32::MAX)).contains(&offset) {
            wipe(&mut buf);
            return Err(AuthError::validation("pattern_micro", "timestamp offset out of range"));
        }
        buf.extend_from_slice(&p.x.to_le_bytes());
        buf.extend_from_slice(&p.y.to_le_bytes());
        buf.extend_from_slice(&(offset as u32).to_le_bytes());
    }
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

/// Mouse free-draw digest: (x, y, t) concatenated LE, raw timestamps
/// offset to the capture start.
pub fn process_mouse_draw(points: &[PatternPoint]) -> Result<FactorDigest, AuthError> {
    if points.len() < DRAW_MIN_POINTS {
        return Err(AuthError::validation(
            "mouse_draw",
            format!("need at least {DRAW_MIN_POINTS} points, got {}", points.len()),
        ));
    }

    let t0 = points[0].t;
    let mut buf = Vec::with_capacity(points.len() * 16);
    for p in points {
        buf.extend_from_slice(&p.x.to_le_bytes());
        buf.extend_from_slice(&p.y.to_le_bytes());
        buf.extend_from_slice(&(p.t - t0).to_le_bytes());
    }
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}

/// Stylus free-draw digest: (x, y, pressure, t) concatenated LE;
/// pressure must lie in [0,1].
pub fn process_stylus_draw(points: &[StylusPoint]) -> Result<FactorDigest, AuthError> {
    if points.len() < DRAW_MIN_POINTS {
        return Err(AuthError::validation(
            "stylus_draw",
            format!("need at least {DRAW_MIN_POINTS} points, got {}", points.len()),
        ));
    }
    if let Some(p) = points.iter().find(|p| !(0.0..=1.0).contains(&p.pressure)) {
        return Err(AuthError::validation(
            "stylus_draw",
            format!("pressure {} outside [0,1]", p.pressure),
        ));
    }

    let t0 = points[0].t;
    let mut buf = Vec::with_capacity(points.len() * 20);
    for p in points {
        buf.extend_from_slice(&p.x.to_le_bytes());
        buf.extend_from_slice(&p.y.to_le_bytes());
        buf.extend_from_slice(&p.pressure.to_le_bytes());
        buf.extend_from_slice(&(p.t - t0).to_le_bytes());
    }
    let digest = sha256(&buf);
    wipe(&mut buf);
    Ok(FactorDigest::from_bytes(digest))
}
