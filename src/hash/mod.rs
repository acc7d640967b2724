//! Hash function family for the Counting Bloom Filter and hash table.
//!
//! Ported from `hashfunctions.h` (scalar variants only — the AVX-512
//! vector forms in the source are out of scope). Each function is a type
//! implementing [`HashFn`] so that call sites monomorphize rather than
//! pay an indirect-call cost, matching the build-time `#define`-selected
//! hash function of the C source.

mod h2;
mod knuth;
mod murmur;
mod seeded_prng;

pub use h2::H2Hash;
pub use knuth::KnuthHash;
pub use murmur::MurmurHash3;
pub use seeded_prng::SeededPrngHash;

/// A 32-bit integer hash over a fixed-width key, plus the scheme for
/// deriving `k` Bloom-filter indices from it.
///
/// `hash32`/`hash64` produce the single "primary" hash shared by the
/// Bloom filter and the hash table when `SAME_HASH_FUNCTIONS` applies.
/// `bloom_indices` derives the full sequence of `k` bit positions, using
/// whichever scheme is natural to the implementor (double hashing for
/// the fixed mixing functions, PRNG iteration for [`SeededPrngHash`]).
pub trait HashFn: Clone + Copy + Default + Send + Sync + 'static {
    /// Hashes a 32-bit key (IPv4 prefix key or address).
    fn hash32(key: u32) -> u32;

    /// Hashes a 64-bit key (IPv6 reduced prefix key or address), by
    /// feeding both halves through the same mixing stage and finalizing
    /// with a byte-length of 8.
    fn hash64(key: u64) -> u32;

    /// Derives `k` Bloom-filter bit indices, each in `[0, m)`, from a
    /// precomputed primary hash `h1` of the key.
    fn bloom_indices(h1: u32, key_hash64: u64, k: usize, m: usize) -> Vec<usize>;
}

/// Standard double-hashing derivation shared by the mixing-function hashes:
/// `h_i = (h1 + i * h2) mod m`.
fn double_hash_indices(h1: u32, h2: u32, k: usize, m: usize) -> Vec<usize> {
    let m = m as u64;
    let h1 = h1 as u64;
    let h2 = h2 as u64;
    (0..k)
        .map(|i| ((h1.wrapping_add((i as u64).wrapping_mul(h2))) % m) as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_deterministic<H: HashFn>() {
        assert_eq!(H::hash32(12345), H::hash32(12345));
        assert_eq!(H::hash64(0x0011_2233_4455_6677), H::hash64(0x0011_2233_4455_6677));
    }

    #[test]
    fn murmur_is_deterministic() {
        assert_deterministic::<MurmurHash3>();
    }

    #[test]
    fn knuth_is_deterministic() {
        assert_deterministic::<KnuthHash>();
    }

    #[test]
    fn h2_is_deterministic() {
        assert_deterministic::<H2Hash>();
    }

    #[test]
    fn seeded_prng_is_deterministic() {
        assert_deterministic::<SeededPrngHash>();
    }

    #[test]
    fn double_hash_indices_are_bounded() {
        let idx = double_hash_indices(123, 456, 7, 64);
        assert_eq!(idx.len(), 7);
        assert!(idx.iter().all(|&i| i < 64));
    }
}
