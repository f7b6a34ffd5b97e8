//! Image-tap processor.
//!
//! Taps land in normalized [0,1]² coordinates and are binned onto a fixed
//! grid before hashing, so the digest only depends on which cells were
//! hit. Tolerance for slightly-off re-taps is handled at comparison time:
//! [`candidate_digests`] enumerates every cell combination within the
//! configured Chebyshev radius, and the comparator checks the submitted
//! digest against all of them in constant time.

use crate::input::TapPoint;
use crate::processor::ProcessorPolicy;
use veilpay_core::{AuthError, FactorDigest};
use veilpay_crypto::{sha256, wipe};

/// Bin a normalized coordinate onto the grid. 1.0 maps into the last cell.
fn bin(coord: f64, grid: u16) -> u16 {
    let cell = (coord * f64::from(grid)) as u16;
    cell.min(grid - 1)
}

fn validate(image_id: &str, taps: &[TapPoint], policy: &ProcessorPolicy) -> Result<(), AuthError> {
    if image_id.is_empty() {
        return Err(AuthError::validation("image_tap", "empty image id"));
    }
    if taps.len() != policy.image_required_taps {
        return Err(AuthError::validation(
            "image_tap",
            format!("expected exactly {} taps, got {}", policy.image_required_taps, taps.len()),
        ));
    }
    if let Some(t) = taps
        .iter()
        .find(|t| !(0.0..=1.0).contains(&t.x) || !(0.0..=1.0).contains(&t.y))
    {
        return Err(AuthError::validation(
            "image_tap",
            format!("tap ({}, {}) outside [0,1]²", t.x, t.y),
        ));
    }
    Ok(())
}

fn digest_cells(image_id: &str, cells: &[(u16, u16)]) -> FactorDigest {
    let mut buf = Vec::with_capacity(image_id.len() + cells.len() * 4);
    buf.extend_from_slice(image_id.as_bytes());
    for &(cx, cy) in cells {
        buf.extend_from_slice(&cx.to_le_bytes());
        buf.extend_from_slice(&cy.to_le_bytes());
    }
    let digest = sha256(&buf);
    wipe(&mut buf);
    FactorDigest::from_bytes(digest)
}

/// Exact digest over the binned tap cells, in tap order.
pub fn process_image_tap(
    image_id: &str,
    taps: &[TapPoint],
    policy: &ProcessorPolicy,
) -> Result<FactorDigest, AuthError> {
    validate(image_id, taps, policy)?;
    let cells: Vec<(u16, u16)> = taps
        .iter()
        .map(|t| (bin(t.x, policy.image_grid), bin(t.y, policy.image_grid)))
        .collect();
    Ok(digest_cells(image_id, &cells))
}

/// Every digest the submitted taps could legitimately match: the cross
/// product of each tap's grid neighbourhood within the fuzzy radius.
///
/// Candidate count is ((2r+1)^2)^taps, bounded by policy (81 at the
/// default two taps, radius 1).
pub fn candidate_digests(
    image_id: &str,
    taps: &[TapPoint],
    policy: &ProcessorPolicy,
) -> Result<Vec<FactorDigest>, AuthError> {
    validate(image_id, taps, policy)?;

    let grid = policy.image_grid;
    let r = i32::from(policy.image_fuzzy_radius);
    let centers: Vec<(u16, u16)> =
        taps.iter().map(|t| (bin(t.x, grid), bin(t.y, grid))).collect();

    // Per-tap neighbourhoods, clipped to the grid.
    let mut neighbourhoods: Vec<Vec<(u16, u16)>> = Vec::with_capacity(centers.len());
    for &(cx, cy) in &centers {
        let mut cells = Vec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                let nx = i32::from(cx) + dx;
                let ny = i32::from(cy) + dy;
                if (0..i32::from(grid)).contains(&nx) && (0..i32::from(grid)).contains(&ny) {
                    cells.push((nx as u16, ny as u16));
                }
            }
        }
        neighbourhoods.push(cells);
    }

    // Odometer walk over the cross product.
    let mut out = Vec::new();
    let mut idx = vec![0usize; neighbourhoods.len()];
    loop {
        let combo: Vec<(u16, u16)> =
            idx.iter().zip(&neighbourhoods).map(|(&i, n)| n[i]).collect();
        out.push(digest_cells(image_id, &combo));

        let mut pos = neighbourhoods.len();
        loop {
            if pos == 0 {
                return Ok(out);
            }
            pos -= 1;
            idx[pos] += 1;
            if idx[pos] < neighbourhoods[pos].len() {
                break;
            }
            idx[pos] = 0;
        }
    }
}
