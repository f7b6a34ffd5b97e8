use crate::types::TimestampMs;
use serde::{Deserialize, Serialize};

// ── GeoPoint ─────────────────────────────────────────────────────────────────

/// WGS-84 coordinate attached to an attempt, when the terminal supplies one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Great-circle distance to `other` in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lon1) = (self.lat.to_radians(), self.lon.to_radians());
        let (lat2, lon2) = (other.lat.to_radians(), other.lon.to_radians());
        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

// ── AttemptRecord ────────────────────────────────────────────────────────────

/// One authentication attempt as seen by the fraud detector. Entries are
/// append-only within a bounded sliding window and pruned on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub actor_id: String,
    pub at_ms: TimestampMs,
    pub location: Option<GeoPoint>,
    pub device_fingerprint: Option<String>,
    pub ip: Option<String>,
    /// Transaction amount in minor units, when the attempt is a payment.
    pub amount: Option<u64>,
}
