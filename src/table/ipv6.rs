//! IPv6 forwarding table: up to 64 prefix-length classes (one per length
//! in `[1, 64]`, reduced-key upper-64-bit addressing), each backed by a
//! CBF+HT pair, plus an optional default route. No DLA: the v6 variant in
//! the source relies entirely on the class scan.
//!
//! Ported from the v6 `fwtbl_t` and `store_prefix`/`lookup_address` in
//! `bloomfwd-v6/src/bloomfwd_opt.c`. Class index `i` corresponds to
//! prefix length `64 - i` (`bloom_filter_id = 64 - len`).

use rayon::prelude::*;

use crate::bloom::CountingBloomFilter;
use crate::config::{BATCH_PARALLEL_THRESHOLD, IPV6_NUM_CLASSES, IPV6_WIDTH};
use crate::cpe::Prefix64;
use crate::error::ForwardingError;
use crate::hash::HashFn;
use crate::hashtable::HashTable;
use crate::table::BuildState;

struct ClassSlot<H: HashFn> {
    cbf: CountingBloomFilter<H>,
    ht: HashTable<u64, H, u128>,
}

pub struct Ipv6ForwardingTable<H: HashFn> {
    default_route: Option<u128>,
    classes: Vec<Option<ClassSlot<H>>>,
    /// Populated class indices, scanned in ascending order (longest
    /// prefix, i.e. smallest class index, first). Kept compact rather
    /// than scanning all 64 slots on every lookup.
    bf_ids: Vec<u8>,
    state: BuildState,
}

fn class_index_for_length(length: u8) -> usize {
    (IPV6_WIDTH - length) as usize
}

fn length_for_class_index(idx: u8) -> u8 {
    IPV6_WIDTH - idx
}

impl<H: HashFn> Ipv6ForwardingTable<H> {
    pub fn new() -> Self {
        Ipv6ForwardingTable {
            default_route: None,
            classes: (0..IPV6_NUM_CLASSES).map(|_| None).collect(),
            bf_ids: Vec::new(),
            state: BuildState::Empty,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Sizes one CBF+HT pair per `(length, quantity)` record present in
    /// the distribution file, for every length in `[1, 64]`.
    pub fn size_from_distribution(&mut self, records: &[(u8, u32)], false_positive_ratio: f64) {
        for &(length, quantity) in records {
            if length == 0 || length > IPV6_WIDTH {
                continue;
            }
            let idx = class_index_for_length(length);
            self.classes[idx] = Some(ClassSlot {
                cbf: CountingBloomFilter::new(quantity as usize, false_positive_ratio),
                ht: HashTable::new(quantity.max(1) as usize),
            });
        }
        self.bf_ids = (0..IPV6_NUM_CLASSES as u8)
            .filter(|&i| self.classes[i as usize].is_some())
            .collect();
        self.state = BuildState::Sized;
    }

    pub fn store_prefix(&mut self, p: Prefix64) -> Result<bool, ForwardingError> {
        if p.length > IPV6_WIDTH {
            return Err(ForwardingError::InvalidPrefix);
        }
        let canonical_key = p.canonical_key(IPV6_WIDTH);

        let created = if p.length == 0 {
            let created = self.default_route.is_none();
            self.default_route = Some(p.next_hop);
            created
        } else {
            let idx = class_index_for_length(p.length);
            let slot = self.classes[idx]
                .as_mut()
                .ok_or(ForwardingError::UnsizedClass)?;
            slot.cbf.insert64(canonical_key);
            slot.ht.store_next_hop(canonical_key, p.next_hop)
        };

        if self.state == BuildState::Sized || self.state == BuildState::Empty {
            self.state = BuildState::Populated;
        }
        Ok(created)
    }

    pub fn finish_build(&mut self) {
        self.state = BuildState::Queriable;
    }

    pub fn lookup_address(&self, addr: u64) -> Result<(bool, u128), ForwardingError> {
        if self.state != BuildState::Queriable {
            return Err(ForwardingError::NotBuilt);
        }
        Ok(self.lookup_address_unchecked(addr))
    }

    fn lookup_address_unchecked(&self, addr: u64) -> (bool, u128) {
        for &class_idx in &self.bf_ids {
            let length = length_for_class_index(class_idx);
            let pfx_key = if length == 0 {
                0
            } else {
                addr & (u64::MAX << (IPV6_WIDTH - length))
            };
            let slot = self.classes[class_idx as usize]
                .as_ref()
                .expect("bf_ids only lists populated classes");
            if slot.cbf.query64(pfx_key) {
                let (hit, nh) = slot.ht.find_next_hop(pfx_key);
                if hit {
                    return (true, nh);
                }
            }
        }
        match self.default_route {
            Some(nh) => (true, nh),
            None => (false, 0),
        }
    }

    pub fn lookup_batch(&self, addrs: &[u64]) -> Result<Vec<(bool, u128)>, ForwardingError> {
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

impl<H: HashFn> Default for Ipv6ForwardingTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::MurmurHash3;

    fn new_table() -> Ipv6ForwardingTable<MurmurHash3> {
        let mut t = Ipv6ForwardingTable::new();
        t.size_from_distribution(&[(32, 100)], 0.01);
        t
    }

    #[test]
    fn e7_v6_prefix_hit() {
        let mut t = new_table();
        // 2001:0db8::/32, reduced to the upper 64 bits.
        let key: u64 = 0x2001_0db8_0000_0000;
        t.store_prefix(Prefix64 { key, length: 32, next_hop: 1 }).unwrap();
        t.finish_build();
        let addr: u64 = 0x2001_0db8_0000_0000; // ...0001 in the lower half, irrelevant here
        let (hit, nh) = t.lookup_address(addr).unwrap();
        assert!(hit);
        assert_eq!(nh, 1);
    }

    #[test]
    fn lookup_before_build_is_not_built() {
        let t: Ipv6ForwardingTable<MurmurHash3> = Ipv6ForwardingTable::new();
        assert_eq!(t.lookup_address(0), Err(ForwardingError::NotBuilt));
    }

    #[test]
    fn class_index_matches_length_mapping() {
        assert_eq!(class_index_for_length(64), 0);
        assert_eq!(class_index_for_length(1), 63);
        assert_eq!(length_for_class_index(0), 64);
    }

    #[test]
    fn unsized_class_is_rejected() {
        let mut t: Ipv6ForwardingTable<MurmurHash3> = Ipv6ForwardingTable::new();
        t.size_from_distribution(&[(32, 10)], 0.01);
        let result = t.store_prefix(Prefix64 { key: 0, length: 48, next_hop: 1 });
        assert_eq!(result, Err(ForwardingError::UnsizedClass));
    }

    #[test]
    fn scalar_and_batch_agree() {
        let mut t = new_table();
        t.store_prefix(Prefix64 { key: 0x2001_0db8_0000_0000, length: 32, next_hop: 7 }).unwrap();
        t.finish_build();
        let addrs: Vec<u64> = (0..16).map(|i| 0x2001_0db8_0000_0000u64 | i).collect();
        let scalar: Vec<_> = addrs.iter().map(|&a| t.lookup_address(a).unwrap()).collect();
        let batch = t.lookup_batch(&addrs).unwrap();
        assert_eq!(scalar, batch);
    }
}
