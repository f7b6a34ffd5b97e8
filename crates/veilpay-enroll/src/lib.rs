//! veilpay-enroll
//!
//! Enrollment orchestration: platform admission, factor validation and
//! digest assembly, rate limiting, and ordered persistence with
//! compensating rollback. The raw factor inputs never leave this
//! boundary; only 32-byte digests are persisted.

pub mod attestation;
pub mod service;

pub use attestation::{AttestationProvider, AttestationSummary, TrustingAttestation};
pub use service::{EnrollmentExport, EnrollmentRequest, EnrollmentService, EnrollmentSuccess};
