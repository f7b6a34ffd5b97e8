use zeroize::Zeroize;

/// Overwrite `bytes` with zeroes through a compiler barrier.
///
/// A naive overwrite loop can be removed by dead-store elimination;
/// `zeroize` guarantees the stores survive. Every digest and temporary
/// factor buffer is disposed of through this function.
pub fn wipe(bytes: &mut [u8]) {
    bytes.zeroize();
}
