//! IPv4 forwarding table: two prefix-length classes (length 32, length
//! 24) backed by a CBF+HT pair each, plus a DLA covering everything up
//! to the DLA stride (default 20) and an optional default route.
//!
//! Ported from `fwtbl_t` and `store_prefix`/`lookup_address` in the
//! baseline/coop `bloomfwd_opt.c`.

use rayon::prelude::*;

use crate::bloom::CountingBloomFilter;
use crate::config::{BATCH_PARALLEL_THRESHOLD, IPV4_WIDTH};
use crate::cpe::Prefix;
use crate::error::ForwardingError;
use crate::hash::HashFn;
use crate::hashtable::HashTable;
use crate::table::BuildState;
use crate::dla::DirectLookupArray;

/// Class 0 = length 32 (most specific); class 1 = length 24.
const CLASS_LENGTHS: [u8; 2] = [32, 24];

struct ClassSlot<H: HashFn> {
    length: u8,
    cbf: CountingBloomFilter<H>,
    ht: HashTable<u32, H>,
}

pub struct Ipv4ForwardingTable<H: HashFn> {
    dla: DirectLookupArray,
    default_route: Option<u32>,
    classes: [Option<ClassSlot<H>>; 2],
    state: BuildState,
}

impl<H: HashFn> Ipv4ForwardingTable<H> {
    pub fn new(dla_stride: u8) -> Self {
        Ipv4ForwardingTable {
            dla: DirectLookupArray::new(dla_stride),
            default_route: None,
            classes: [None, None],
            state: BuildState::Empty,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    fn class_index_for_length(length: u8) -> Option<usize> {
        CLASS_LENGTHS.iter().position(|&l| l == length)
    }

    /// Sizes the class-0 (/32) and class-1 (/24) CBF+HT pairs from
    /// `(length, quantity)` capacity hints (as read from a
    /// prefix-distribution file). Entries for lengths other than 32/24
    /// are ignored; the DLA and default route need no sizing step.
    pub fn size_from_distribution(&mut self, records: &[(u8, u32)], false_positive_ratio: f64) {
        for &(length, quantity) in records {
            if let Some(idx) = Self::class_index_for_length(length) {
                self.classes[idx] = Some(ClassSlot {
                    length,
                    cbf: CountingBloomFilter::new(quantity as usize, false_positive_ratio),
                    ht: HashTable::new(quantity.max(1) as usize),
                });
            }
        }
        self.state = BuildState::Sized;
    }

    /// Inserts a prefix, already post-CPE so its length is one of
    /// `{0, dla_stride, 24, 32}`. Returns `true` if the entry is newly
    /// created, `false` if it updates an existing slot.
    pub fn store_prefix(&mut self, p: Prefix) -> Result<bool, ForwardingError> {
        if p.length > IPV4_WIDTH {
            return Err(ForwardingError::InvalidPrefix);
        }
        let canonical_key = p.canonical_key(IPV4_WIDTH);

        let created = if p.length == 0 {
            let created = self.default_route.is_none();
            self.default_route = Some(p.next_hop);
            created
        } else if p.length == self.dla.stride() {
            self.dla.store(IPV4_WIDTH, canonical_key, p.next_hop)
        } else {
            let idx = Self::class_index_for_length(p.length).ok_or(ForwardingError::UnsizedClass)?;
            let slot = self.classes[idx]
                .as_mut()
                .ok_or(ForwardingError::UnsizedClass)?;
            slot.cbf.insert32(canonical_key);
            slot.ht.store_next_hop(canonical_key, p.next_hop)
        };

        if self.state == BuildState::Sized || self.state == BuildState::Empty {
            self.state = BuildState::Populated;
        }
        Ok(created)
    }

    /// Finalizes the build, making the table queriable. Callable from any
    /// pre-`Queriable` state, including an empty table (default-route-only
    /// or fully empty tables are valid).
    pub fn finish_build(&mut self) {
        self.state = BuildState::Queriable;
    }

    /// Scalar lookup: tries class 0 (/32), then class 1 (/24), then the
    /// DLA, then the default route, in that order — longest prefix first.
    pub fn lookup_address(&self, addr: u32) -> Result<(bool, u32), ForwardingError> {
        if self.state != BuildState::Queriable {
            return Err(ForwardingError::NotBuilt);
        }
        Ok(self.lookup_address_unchecked(addr))
    }

    fn lookup_address_unchecked(&self, addr: u32) -> (bool, u32) {
        for slot in self.classes.iter().flatten() {
            let pfx_key = Self::canonicalize_for_class(addr, slot.length);
            if slot.cbf.query32(pfx_key) {
                let (hit, nh) = slot.ht.find_next_hop(pfx_key);
                if hit {
                    return (true, nh);
                }
            }
        }
        let (hit, nh) = self.dla.lookup(IPV4_WIDTH, addr);
        if hit {
            return (true, nh);
        }
        match self.default_route {
            Some(nh) => (true, nh),
            None => (false, 0),
        }
    }

    fn canonicalize_for_class(addr: u32, length: u8) -> u32 {
        if length == 0 {
            0
        } else {
            addr & (u32::MAX << (IPV4_WIDTH - length))
        }
    }

    /// Batched lookup, bit-identical to repeated scalar calls. Runs
    /// sequentially below [`BATCH_PARALLEL_THRESHOLD`], and fans out over
    /// `rayon` above it; per-index result ordering always matches the
    /// input order.
    pub fn lookup_batch(&self, addrs: &[u32]) -> Result<Vec<(bool, u32)>, ForwardingError> {
        if self.state != BuildState::Queriable {
            return Err(ForwardingError::NotBuilt);
        }
        if addrs.len() < BATCH_PARALLEL_THRESHOLD {
            Ok(addrs.iter().map(|&a| self.lookup_address_unchecked(a)).collect())
        } else {
            Ok(addrs
                .par_iter()
                .map(|&a| self.lookup_address_unchecked(a))
                .collect())
        }
    }
}
