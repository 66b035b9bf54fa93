//! Deterministic string hashing for reproducible section selection.
//!
//! The hash is the classic polynomial rolling hash with base 31, computed
//! over Unicode scalar values with wrapping 32-bit arithmetic. It is not
//! cryptographic and not meant to be; it only has to give the same answer
//! for the same document on every machine and every run, so that rerunning
//! the tool picks the same paragraphs.

/// Hash `text` to a `u32`.
///
/// `acc = acc * 31 + code_point (mod 2^32)` for every character, starting
/// from zero. The empty string hashes to `0`.
pub fn stable_hash(text: &str) -> u32 {
    text.chars()
        .fold(0u32, |acc, c| acc.wrapping_mul(31).wrapping_add(c as u32))
}
