//! veilpay-factors
//!
//! Digest processors for the fifteen factor kinds: input validation,
//! normalization and SHA-256 derivation, plus the constant-time digest
//! comparator (exact and fuzzy). Processors are pure and deterministic on
//! normalized input; invalid input is rejected before any hashing and
//! every intermediate buffer is wiped on exit.

pub mod compare;
pub mod image;
pub mod input;
pub mod knowledge;
pub mod motion;
pub mod platform;
pub mod processor;
pub mod rhythm;
pub mod sensor;

pub use compare::{compare, compare_any};
pub use input::{
    BalanceSample, FactorInput, PatternPoint, PlatformAttestation, StylusPoint, TapPoint,
};
pub use processor::{process, verification_candidates, ProcessorPolicy};
