//! Protocol-fixed validation bounds for factor inputs. Runtime-tunable
//! policy lives in [`crate::config::Config`].

/// PIN length bounds (digits).
pub const PIN_MIN_LEN: usize = 4;
pub const PIN_MAX_LEN: usize = 12;

/// Colour-sequence bounds and palette size.
pub const COLOUR_MIN_LEN: usize = 3;
pub const COLOUR_MAX_LEN: usize = 6;
pub const COLOUR_PALETTE_SIZE: u8 = 12;

/// Emoji-sequence bounds and picker set size.
pub const EMOJI_MIN_LEN: usize = 3;
pub const EMOJI_MAX_LEN: usize = 8;
pub const EMOJI_SET_SIZE: u16 = 64;

/// Word-sequence bounds and dictionary size (BIP39-sized word list).
pub const WORDS_MIN_LEN: usize = 3;
pub const WORDS_MAX_LEN: usize = 10;
pub const WORDS_DICTIONARY_SIZE: u16 = 2048;

/// Pattern point-count bounds (both normal and micro-timing variants).
pub const PATTERN_MIN_POINTS: usize = 1;
pub const PATTERN_MAX_POINTS: usize = 300;
/// Speed-invariant patterns normalize the time axis onto 0..=1000.
pub const PATTERN_TIME_SCALE: u32 = 1000;

/// Rhythm-tap bounds.
pub const RHYTHM_MIN_TAPS: usize = 4;
pub const RHYTHM_MAX_TAPS: usize = 6;
pub const RHYTHM_MIN_INTERVAL_MS: i64 = 50;
pub const RHYTHM_MAX_INTERVAL_MS: i64 = 3000;
/// Coefficient-of-variation floor; rejects metronome-trivial rhythms.
pub const RHYTHM_MIN_CV: f64 = 0.05;
/// Intervals are rescaled so the largest maps to this value.
pub const RHYTHM_INTERVAL_SCALE: i64 = 1000;

/// Free-draw factors need enough points to carry entropy.
pub const DRAW_MIN_POINTS: usize = 10;

/// Voice capture duration bounds (ms) at the policy sample rate.
pub const VOICE_MIN_DURATION_MS: u32 = 500;
pub const VOICE_MAX_DURATION_MS: u32 = 10_000;
pub const VOICE_SAMPLE_RATE_HZ: u32 = 16_000;

/// PBKDF2 hardening floor.
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// Attempt history retained for fraud scoring (24 h).
pub const ATTEMPT_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
