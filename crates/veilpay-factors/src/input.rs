use serde::{Deserialize, Serialize};
use veilpay_core::FactorKind;

// ── Capture point shapes ─────────────────────────────────────────────────────

/// One sampled point of a pattern or free-draw capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternPoint {
    pub x: i32,
    pub y: i32,
    /// Capture timestamp, Unix ms (only offsets within the capture matter).
    pub t: i64,
}

/// Stylus point: position, pressure in [0,1], timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StylusPoint {
    pub x: i32,
    pub y: i32,
    pub pressure: f32,
    pub t: i64,
}

/// Image tap in normalized [0,1]² coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapPoint {
    pub x: f64,
    pub y: f64,
}

/// One accelerometer sample (raw sensor units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Result of a platform-authenticator ceremony. The core only inspects
/// `ok` (STRONG-class success) and `key_id`; biometric templates never
/// cross this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAttestation {
    pub kind: FactorKind,
    pub ok: bool,
    pub key_id: String,
    pub attestation_bytes: Vec<u8>,
}

// ── FactorInput ──────────────────────────────────────────────────────────────

/// Raw capture for one factor, tagged by kind. Dispatch over factors is a
/// pure function table keyed by this tag: no trait objects, no
/// inheritance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FactorInput {
    Pin { digits: String },
    PatternNormal { points: Vec<PatternPoint> },
    Words { indices: Vec<u16> },
    Colour { indices: Vec<u8> },
    Emoji { indices: Vec<u8> },
    PatternMicro { points: Vec<PatternPoint> },
    RhythmTap { taps_ms: Vec<i64>, nonce: u64 },
    MouseDraw { points: Vec<PatternPoint> },
    StylusDraw { points: Vec<StylusPoint> },
    ImageTap { image_id: String, taps: Vec<TapPoint> },
    Voice { pcm: Vec<u8> },
    Face { attestation: PlatformAttestation },
    Fingerprint { attestation: PlatformAttestation },
    Nfc { uid: Vec<u8> },
    Balance { samples: Vec<BalanceSample> },
}

impl FactorInput {
    pub fn kind(&self) -> FactorKind {
        match self {
            FactorInput::Pin { .. } => FactorKind::Pin,
            FactorInput::PatternNormal { .. } => FactorKind::PatternNormal,
            FactorInput::Words { .. } => FactorKind::Words,
            FactorInput::Colour { .. } => FactorKind::Colour,
            FactorInput::Emoji { .. } => FactorKind::Emoji,
            FactorInput::PatternMicro { .. } => FactorKind::PatternMicro,
            FactorInput::RhythmTap { .. } => FactorKind::RhythmTap,
            FactorInput::MouseDraw { .. } => FactorKind::MouseDraw,
            FactorInput::StylusDraw { .. } => FactorKind::StylusDraw,
            FactorInput::ImageTap { .. } => FactorKind::ImageTap,
            FactorInput::Voice { .. } => FactorKind::Voice,
            FactorInput::Face { .. } => FactorKind::Face,
            FactorInput::Fingerprint { .. } => FactorKind::Fingerprint,
            FactorInput::Nfc { .. } => FactorKind::Nfc,
            FactorInput::Balance { .. } => FactorKind::Balance,
        }
    }
}
