//! veilpay-risk
//!
//! Admission control for the authentication core: the keyed sliding-window
//! rate limiter and the multi-strategy fraud detector. Both are
//! constructor-built, mutex-guarded singletons injected into the
//! orchestrators; there is no ambient static state.

pub mod blacklist;
pub mod detector;
pub mod limiter;
pub mod profile;

pub use blacklist::Blacklist;
pub use detector::{FraudAction, FraudAssessment, FraudDetector};
pub use limiter::{LimiterScope, RateLimiter, RatePolicy};
