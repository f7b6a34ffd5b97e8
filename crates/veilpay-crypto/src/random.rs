use rand::rngs::OsRng;
use rand::RngCore;

/// `n` bytes from the platform CSPRNG. Never a non-cryptographic RNG.
pub fn csprng_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// 32 CSPRNG bytes rendered as 64 lowercase hex chars; used as the
/// per-request replay nonce on the wire.
pub fn nonce_hex() -> String {
    hex::encode(csprng_bytes(32))
}

/// RFC 4122 version-4 UUID: 16 CSPRNG bytes with the version nibble and
/// variant bits forced, canonical hyphenated rendering.
pub fn uuid_v4() -> String {
    let mut b = [0u8; 16];
    OsRng.fill_bytes(&mut b);
    b[6] = (b[6] & 0x0f) | 0x40;
    b[8] = (b[8] & 0x3f) | 0x80;
    format!(
        "{}-{}-{}-{}-{}",
        hex::encode(&b[0..4]),
        hex::encode(&b[4..6]),
        hex::encode(&b[6..8]),
        hex::encode(&b[8..10]),
        hex::encode(&b[10..16]),
    )
}
