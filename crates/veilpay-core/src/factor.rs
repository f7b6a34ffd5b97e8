use serde::{Deserialize, Serialize};
use std::fmt;

// ── FactorCategory ───────────────────────────────────────────────────────────

/// Regulatory category of an authentication factor. PSD3 strong customer
/// authentication requires an enrollment to span at least two of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactorCategory {
    /// Something the user knows.
    Knowledge,
    /// Something the user does (inherence, behavioral).
    Behavioral,
    /// Something the user is (inherence, biometric).
    Biometric,
    /// Something the user has.
    Possession,
    /// Somewhere the user is / how the device is held.
    Location,
}

// ── FactorKind ───────────────────────────────────────────────────────────────

/// Closed enumeration of the fifteen supported factors.
///
/// Declaration order is the natural order: every parallel collection
/// (commitment input, stored digest maps, candidate lists) sorts by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactorKind {
    Pin,
    PatternNormal,
    Words,
    Colour,
    Emoji,
    PatternMicro,
    RhythmTap,
    MouseDraw,
    StylusDraw,
    ImageTap,
    Voice,
    Face,
    Fingerprint,
    Nfc,
    Balance,
}

impl FactorKind {
    /// Every kind, in natural order.
    pub const ALL: [FactorKind; 15] = [
        FactorKind::Pin,
        FactorKind::PatternNormal,
        FactorKind::Words,
        FactorKind::Colour,
        FactorKind::Emoji,
        FactorKind::PatternMicro,
        FactorKind::RhythmTap,
        FactorKind::MouseDraw,
        FactorKind::StylusDraw,
        FactorKind::ImageTap,
        FactorKind::Voice,
        FactorKind::Face,
        FactorKind::Fingerprint,
        FactorKind::Nfc,
        FactorKind::Balance,
    ];

    pub fn category(&self) -> FactorCategory {
        match self {
            FactorKind::Pin
            | FactorKind::PatternNormal
            | FactorKind::Words
            | FactorKind::Colour
            | FactorKind::Emoji => FactorCategory::Knowledge,
            FactorKind::PatternMicro
            | FactorKind::RhythmTap
            | FactorKind::MouseDraw
            | FactorKind::StylusDraw
            | FactorKind::ImageTap
            | FactorKind::Voice => FactorCategory::Behavioral,
            FactorKind::Face | FactorKind::Fingerprint => FactorCategory::Biometric,
            FactorKind::Nfc => FactorCategory::Possession,
            FactorKind::Balance => FactorCategory::Location,
        }
    }

    /// Stable ASCII name used in proof commitments and platform digest labels.
    pub fn label(&self) -> &'static str {
        match self {
            FactorKind::Pin => "PIN",
            FactorKind::PatternNormal => "PATTERN_NORMAL",
            FactorKind::Words => "WORDS",
            FactorKind::Colour => "COLOUR",
            FactorKind::Emoji => "EMOJI",
            FactorKind::PatternMicro => "PATTERN_MICRO",
            FactorKind::RhythmTap => "RHYTHM_TAP",
            FactorKind::MouseDraw => "MOUSE_DRAW",
            FactorKind::StylusDraw => "STYLUS_DRAW",
            FactorKind::ImageTap => "IMAGE_TAP",
            FactorKind::Voice => "VOICE",
            FactorKind::Face => "FACE",
            FactorKind::Fingerprint => "FINGERPRINT",
            FactorKind::Nfc => "NFC",
            FactorKind::Balance => "BALANCE",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
