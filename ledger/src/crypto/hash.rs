//! # Hashing Utilities
//!
//! One hash function, used everywhere: **BLAKE3**. Fast on every platform,
//! parallelizable, and provably secure under standard assumptions. The
//! ledger uses it for withdrawal authorization message digests and for
//! checkpoint integrity tags.
//!
//! The original bridge deployment hashed with whatever its host chain
//! expected; this service is the authority on its own messages, so we use
//! the best tool and don't look back.

/// Compute the BLAKE3 hash of the input data as a fixed 32-byte array.
///
/// # Example
///
/// ```
/// use haven_ledger::crypto::blake3_hash;
///
/// let digest = blake3_hash(b"haven ledger");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}
