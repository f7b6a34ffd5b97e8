//! veilpay-verify
//!
//! Verification orchestration: session lifecycle, constant-time factor
//! comparison and the final decision, plus the proof envelope emitted on
//! success. A session is owned by a single logical task for its lifetime
//! and is destroyed as soon as it is decided.

pub mod proof;
pub mod service;

pub use proof::{emit_proof, ProofEnvelope, PROOF_VERSION};
pub use service::{
    CreateSessionRequest, SessionInfo, SubmitProgress, VerificationOutcome, VerificationService,
};
