use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Minimum PBKDF2 iteration count accepted by [`pbkdf2_sha256`].
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// HMAC-SHA256 over `data` with `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// PBKDF2-HMAC-SHA256 key stretching.
///
/// Fails with `InvalidParameter` when `iterations` is below the hardening
/// floor or `out_len` is zero; otherwise infallible.
pub fn pbkdf2_sha256(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    if iterations < PBKDF2_MIN_ITERATIONS {
        return Err(CryptoError::InvalidParameter("iterations below 100000"));
    }
    if out_len == 0 {
        return Err(CryptoError::InvalidParameter("out_len must be non-zero"));
    }
    let mut out = vec![0u8; out_len];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    Ok(out)
}
