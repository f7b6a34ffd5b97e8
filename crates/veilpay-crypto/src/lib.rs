//! veilpay-crypto
//!
//! Cryptographic primitives for the authentication core: SHA-256-family
//! digesting, platform CSPRNG access, UUIDv4 generation, constant-time
//! equality and secure memory wiping. Everything here is pure, synchronous
//! and allocation-light; the hot comparison path allocates nothing beyond
//! the fixed 32-byte digest.

pub mod ct;
pub mod digest;
pub mod random;
pub mod wipe;

pub use ct::constant_time_eq;
pub use digest::{hmac_sha256, pbkdf2_sha256, sha256, CryptoError};
pub use random::{csprng_bytes, nonce_hex, uuid_v4};
pub use wipe::wipe;
