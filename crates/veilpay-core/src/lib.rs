//! veilpay-core
//!
//! Shared data model for the VeilPay authentication core: factor kinds and
//! digests, enrollment records, verification sessions, the flat runtime
//! configuration and the domain error taxonomy. Everything here is pure
//! data; orchestration lives in veilpay-enroll / veilpay-verify, and the
//! cryptography in veilpay-crypto.

pub mod attempt;
pub mod config;
pub mod constants;
pub mod error;
pub mod factor;
pub mod record;
pub mod session;
pub mod types;

pub use attempt::{AttemptRecord, GeoPoint};
pub use config::{Config, FallbackStrategy, FraudThresholds};
pub use error::AuthError;
pub use factor::{FactorCategory, FactorKind};
pub use record::{ConsentFlags, EnrollmentRecord};
pub use session::{SessionState, VerificationSession};
pub use types::{FactorDigest, TimestampMs, DIGEST_LEN};
