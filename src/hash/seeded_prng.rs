//! Seeded-PRNG hash, the IPv4-optimized variant's `rand_r`-equivalent.
//!
//! Ported from the glibc `rand_r` recurrence used to derive the sequence of
//! Bloom indices in the baseline IPv4 source: the key seeds the generator,
//! and the `i`-th Bloom index is obtained by re-seeding with the previous
//! output (`h_{i+1} = prng(h_i)`) rather than double hashing.

use super::HashFn;

#[derive(Debug, Clone, Copy, Default)]
pub struct SeededPrngHash;

/// One step of the `rand_r` recurrence: `next = seed * 1103515245 + 12345`,
/// returning bits `[16, 31)` as the POSIX reference implementation does.
#[inline]
fn rand_r_step(seed: u32) -> u32 {
    let next = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    (next / 65536) % 32768
}

impl HashFn for SeededPrngHash {
    #[inline]
    fn hash32(key: u32) -> u32 {
        rand_r_step(key)
    }

    #[inline]
    fn hash64(key: u64) -> u32 {
        let lo = rand_r_step(key as u32);
        let hi = rand_r_step((key >> 32) as u32);
        rand_r_step(lo ^ hi)
    }

    fn bloom_indices(h1: u32, _key_hash64: u64, k: usize, m: usize) -> Vec<usize> {
        let mut indices = Vec::with_capacity(k);
        let mut h = h1;
        for _ in 0..k {
            indices.push((h as usize) % m);
            h = rand_r_step(h);
        }
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterated_sequence_is_deterministic() {
        let a = SeededPrngHash::bloom_indices(SeededPrngHash::hash32(7), 0, 5, 128);
        let b = SeededPrngHash::bloom_indices(SeededPrngHash::hash32(7), 0, 5, 128);
        assert_eq!(a, b);
    }

    #[test]
    fn indices_are_bounded() {
        let idx = SeededPrngHash::bloom_indices(SeededPrngHash::hash32(999), 0, 8, 64);
        assert!(idx.iter().all(|&i| i < 64));
    }
}
