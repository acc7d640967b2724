//! MurmurHash3 (32-bit finalization variant), ported from `murmurhash3_32`
//! in `hashfunctions.h`.

use super::{double_hash_indices, HashFn};

#[derive(Debug, Clone, Copy, Default)]
pub struct MurmurHash3;

/// One mixing stage, parameterized by the key-byte-length XORed in before
/// the finalization mix. The scalar C function inlines this for a single
/// 32-bit key (byte length 4); `hash64` reuses the stage for each half of
/// a 64-bit key before finalizing with byte length 8.
#[inline]
fn mix(mut key: u32) -> u32 {
    key = key.wrapping_mul(0xcc9e2d51);
    key = key.rotate_left(15);
    key = key.wrapping_mul(0x1b873593);
    key
}

#[inline]
fn finalize(mut h: u32, byte_len: u32) -> u32 {
    h ^= 0; // initial hash value
    h = h.rotate_left(13);
    h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    h ^= byte_len;

    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

impl HashFn for MurmurHash3 {
    #[inline]
    fn hash32(key: u32) -> u32 {
        finalize(mix(key), 4)
    }

    #[inline]
    fn hash64(key: u64) -> u32 {
        let lo = mix(key as u32);
        let hi = mix((key >> 32) as u32);
        finalize(lo ^ hi, 8)
    }

    fn bloom_indices(h1: u32, key_hash64: u64, k: usize, m: usize) -> Vec<usize> {
        // Second hash reuses the Knuth multiplicative mix over the full
        // 64-bit key, matching the source's use of a second, cheaper hash
        // for the double-hashing step.
        let h2 = (key_hash64.wrapping_mul(2654435761)) as u32;
        double_hash_indices(h1, h2, k, m)
    }
}
