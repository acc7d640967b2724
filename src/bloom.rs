//! Counting Bloom Filter — a membership oracle over prefix keys with
//! per-cell saturating counters enabling removal.
//!
//! Ported from the `bloomf_t` structure and `calc_num_hashes`/
//! `calc_bitmap_size`/`bloomf_insert`/`bloomf_query`/`bloomf_remove`
//! family in `bloomfwd_opt.c` (both baseline and v6 variants share this
//! shape; only the hash function and key width differ).

use std::marker::PhantomData;

use crate::error::CbfError;
use crate::hash::HashFn;

/// Sizing parameters derived from a target capacity and false-positive ratio.
///
/// - `m = ceil(n * log2(1/p) / ln 2)` — bitmap length.
/// - `k = ceil((m/n) * ln 2)` — hash count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomSizing {
    pub m: usize,
    pub k: usize,
}

impl BloomSizing {
    pub fn derive(capacity: usize, false_positive_ratio: f64) -> BloomSizing {
        let n = capacity.max(1) as f64;
        let p = false_positive_ratio;
        let m = (n * (1.0 / p).log2() / std::f64::consts::LN_2).ceil() as usize;
        let m = m.max(1);
        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as usize;
        BloomSizing { m, k: k.max(1) }
    }
}

/// A Counting Bloom Filter keyed on 32-bit or 64-bit integer keys via `H`.
///
/// `bitmap` tracks membership; `counters` is an 8-bit saturating counter per
/// cell, present so that [`remove`](CountingBloomFilter::remove) can
/// decrement safely instead of clearing bits that other keys still rely on.
#[derive(Debug, Clone)]
pub struct CountingBloomFilter<H: HashFn> {
    bitmap: Vec<bool>,
    counters: Vec<u8>,
    k: usize,
    _hash: PhantomData<H>,
}

impl<H: HashFn> CountingBloomFilter<H> {
    /// Allocates a filter sized for `capacity` elements at `false_positive_ratio`.
    pub fn new(capacity: usize, false_positive_ratio: f64) -> Self {
        let sizing = BloomSizing::derive(capacity, false_positive_ratio);
        Self::with_sizing(sizing)
    }

    pub fn with_sizing(sizing: BloomSizing) -> Self {
        CountingBloomFilter {
            bitmap: vec![false; sizing.m],
            counters: vec![0u8; sizing.m],
            k: sizing.k,
            _hash: PhantomData,
        }
    }

    pub fn bitmap_len(&self) -> usize {
        self.bitmap.len()
    }

    pub fn hash_count(&self) -> usize {
        self.k
    }

    fn indices32(&self, key: u32) -> Vec<usize> {
        let h1 = H::hash32(key);
        H::bloom_indices(h1, key as u64, self.k, self.bitmap.len())
    }

    fn indices64(&self, key: u64) -> Vec<usize> {
        let h1 = H::hash64(key);
        H::bloom_indices(h1, key, self.k, self.bitmap.len())
    }

    /// Inserts a 32-bit key. Sets the bit and saturating-increments the
    /// counter at each of the `k` derived indices. Never fails.
    pub fn insert32(&mut self, key: u32) {
        let idx = self.indices32(key);
        self.insert_indices(&idx);
    }

    /// Inserts a 64-bit key. See [`insert32`](Self::insert32).
    pub fn insert64(&mut self, key: u64) {
        let idx = self.indices64(key);
        self.insert_indices(&idx);
    }

    fn insert_indices(&mut self, idx: &[usize]) {
        for &i in idx {
            self.bitmap[i] = true;
            self.counters[i] = self.counters[i].saturating_add(1);
        }
    }

    /// Queries a 32-bit key. Returns `true` ("maybe present") iff every one
    /// of the `k` derived bits is set. Never a false negative for a key that
    /// was inserted and whose counters have not wrapped.
    pub fn query32(&self, key: u32) -> bool {
        self.indices32(key).iter().all(|&i| self.bitmap[i])
    }

    /// Queries a 64-bit key. See [`query32`](Self::query32).
    pub fn query64(&self, key: u64) -> bool {
        self.indices64(key).iter().all(|&i| self.bitmap[i])
    }

    /// Removes a 32-bit key: decrements each of the `k` counters, clearing
    /// the bit when a counter reaches zero.
    ///
    /// Counters are 8-bit and saturate at 255 on insert without being
    /// guarded; if a counter ever saturated, its true count is unknown and
    /// decrementing it further could clear a bit still relied on by another
    /// key. This is detected and reported rather than silently corrupting
    /// the filter.
    pub fn remove32(&mut self, key: u32) -> Result<(), CbfError> {
        let idx = self.indices32(key);
        self.remove_indices(&idx)
    }

    /// Removes a 64-bit key. See [`remove32`](Self::remove32).
    pub fn remove64(&mut self, key: u64) -> Result<(), CbfError> {
        let idx = self.indices64(key);
        self.remove_indices(&idx)
    }

    fn remove_indices(&mut self, idx: &[usize]) -> Result<(), CbfError> {
        if idx.iter().any(|&i| self.counters[i] == u8::MAX) {
            return Err(CbfError::SaturatedCounter);
        }
        for &i in idx {
            self.counters[i] -= 1;
            if self.counters[i] == 0 {
                self.bitmap[i] = false;
            }
        }
        Ok(())
    }

    /// Counts cells whose counter exceeds 1 — the number of observed
    /// collisions across the whole bitmap.
    ///
    /// The original `calc_num_collisions_bloomf` indexes `counters[i]` with
    /// the outer (class) loop variable rather than the inner (cell) one,
    /// which is almost certainly a bug; this counts with the inner index.
    pub fn collision_count(&self) -> usize {
        self.counters.iter().filter(|&&c| c > 1).count()
    }
}
