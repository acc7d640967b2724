//! Controlled Prefix Expansion (CPE) — offline preprocessing that expands
//! short prefixes into `2^(T-l)` prefixes of canonical length `T`, so that
//! a fixed-stride lookup structure (the DLA, or a single prefix-length
//! class) resolves any of them with a single read.
//!
//! Ported from `btrie_node`, `btrie_insert`, `btrie_create`,
//! `btrie_perform_cpe`, `dla_create`/`dla_fill` in `ip-helpers/cpe.c`.
//! The binary trie that `btrie_insert`/`btrie_perform_cpe` build is kept
//! as an internal implementation detail; the public surface works in
//! terms of [`Prefix`] records in and out.

use std::collections::HashMap;

use crate::error::ForwardingError;

/// A single `(key, length, next_hop)` routing record. `key` need not be
/// canonicalized on input; expansion always canonicalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    pub key: u32,
    pub length: u8,
    pub next_hop: u32,
}

impl Prefix {
    /// Masks off the low-order `(width - length)` bits.
    pub fn canonical_key(&self, width: u8) -> u32 {
        if self.length == 0 {
            0
        } else if self.length >= width {
            self.key
        } else {
            self.key & (u32::MAX << (width - self.length))
        }
    }
}

/// Emits every length-`stride` descendant of the `(prefix, len)` node,
/// all carrying `next_hop`, without needing an actual trie node for each.
fn fill_subtree(stride: u8, prefix: u32, len: u8, next_hop: u32, out: &mut Vec<Prefix>) {
    let k = stride - len;
    let count = 1u64 << k;
    for i in 0..count {
        out.push(Prefix {
            key: (prefix << k) | (i as u32),
            length: stride,
            next_hop,
        });
    }
}

#[derive(Default)]
struct TrieNode {
    has_nhop: bool,
    next_hop: u32,
    left: Option<Box<TrieNode>>,
    right: Option<Box<TrieNode>>,
}

impl TrieNode {
    fn child_mut(&mut self, bit: u8) -> &mut Box<TrieNode> {
        if bit == 0 {
            self.left.get_or_insert_with(|| Box::new(TrieNode::default()))
        } else {
            self.right.get_or_insert_with(|| Box::new(TrieNode::default()))
        }
    }

    /// Inserts `(prefix, len)` reading bits MSB-first out of a value that
    /// is left-aligned within `len` bits (i.e. bit `i` is
    /// `(prefix >> (len - 1 - i)) & 1`). Returns `true` if an existing
    /// entry was overwritten (only possible when `allow_update`).
    fn insert(&mut self, prefix: u32, len: u8, next_hop: u32, allow_update: bool) -> bool {
        let mut node = self;
        for i in 0..len {
            let bit = ((prefix >> (len - 1 - i)) & 1) as u8;
            node = node.child_mut(bit);
        }
        let updated = node.has_nhop && allow_update;
        if !node.has_nhop || allow_update {
            node.has_nhop = true;
            node.next_hop = next_hop;
        }
        updated
    }

    /// Controlled Prefix Expansion: walks the trie carrying the nearest
    /// ancestor's next hop as `inherited`, and emits exactly one
    /// length-`stride` entry per descendant slot — a node's own next hop
    /// always overrides `inherited` for its own subtree, so a longer,
    /// already-present prefix keeps priority over a shorter ancestor's
    /// bulk expansion instead of being overwritten by it. Matches the
    /// effect of `btrie_perform_cpe`'s `allow_update = false` re-insertion,
    /// without producing duplicate entries for the same slot.
    fn expand(&mut self, stride: u8, prefix: u32, len: u8, out: &mut Vec<Prefix>) {
        self.expand_with(stride, prefix, len, None, out);
    }

    fn expand_with(
        &mut self,
        stride: u8,
        prefix: u32,
        len: u8,
        inherited: Option<u32>,
        out: &mut Vec<Prefix>,
    ) {
        let effective = if self.has_nhop { Some(self.next_hop) } else { inherited };
        self.has_nhop = false;

        if len == stride {
            if let Some(next_hop) = effective {
                out.push(Prefix { key: prefix, length: stride, next_hop });
            }
            return;
        }

        match (self.left.as_mut(), self.right.as_mut()) {
            (None, None) => {
                if let Some(next_hop) = effective {
                    fill_subtree(stride, prefix, len, next_hop, out);
                }
            }
            (left, right) => {
                match left {
                    Some(child) => child.expand_with(stride, prefix << 1, len + 1, effective, out),
                    None => {
                        if let Some(next_hop) = effective {
                            fill_subtree(stride, prefix << 1, len + 1, next_hop, out);
                        }
                    }
                }
                match right {
                    Some(child) => {
                        child.expand_with(stride, (prefix << 1) | 1, len + 1, effective, out)
                    }
                    None => {
                        if let Some(next_hop) = effective {
                            fill_subtree(stride, (prefix << 1) | 1, len + 1, next_hop, out);
                        }
                    }
                }
            }
        }
    }

}

/// Expands every prefix in `[start, end]` length range to canonical length
/// `stride`, preserving longer-prefix priority. Matches the three-pass
/// shape of `cpe.c`'s `main`: build a trie restricted to `[start, end]`,
/// then run `btrie_perform_cpe(.., stride, ..)`.
pub fn expand_range(prefixes: &[Prefix], start: u8, end: u8, stride: u8) -> Vec<Prefix> {
    let mut trie = TrieNode::default();
    for p in prefixes {
        if p.length >= start && p.length <= end {
            trie.insert(p.key, p.length, p.next_hop, true);
        }
    }
    let mut out = Vec::new();
    trie.expand(stride, 0, 0, &mut out);
    out
}

/// Groups raw prefixes into IPv4's three CPE partitions: DLA candidates
/// (length 1..=dla_stride, expanded to `dla_stride`), G1 (length
/// `dla_stride+1..=24`, expanded to 24), and G2 (length 25..=32, expanded
/// to 32). Length-0 prefixes (the default route) pass through unexpanded.
pub struct Ipv4CpeOutput {
    pub dla: Vec<Prefix>,
    pub g1: Vec<Prefix>,
    pub g2: Vec<Prefix>,
    pub default_route: Option<u32>,
}

pub fn perform_ipv4_cpe(prefixes: &[Prefix], dla_stride: u8) -> Ipv4CpeOutput {
    let default_route = prefixes
        .iter()
        .find(|p| p.length == 0)
        .map(|p| p.next_hop);
    Ipv4CpeOutput {
        dla: expand_range(prefixes, 1, dla_stride, dla_stride),
        g1: expand_range(prefixes, dla_stride + 1, 24, 24),
        g2: expand_range(prefixes, 25, 32, 32),
        default_route,
    }
}

/// A 64-bit-key prefix record, used for IPv6's reduced address space.
/// `next_hop` stays the full 128 bits of the address: only the lookup
/// key is reduced, never the value a lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix64 {
    pub key: u64,
    pub length: u8,
    pub next_hop: u128,
}

impl Prefix64 {
    pub fn canonical_key(&self, width: u8) -> u64 {
        if self.length == 0 {
            0
        } else if self.length >= width {
            self.key
        } else {
            self.key & (u64::MAX << (width - self.length))
        }
    }
}

/// Groups raw IPv6 (64-bit reduced) prefixes by exact length, one bucket
/// per populated class in `[1, 64]`, with no CPE stride expansion (the
/// v6 source stores each class at its own natural length rather than
/// expanding to a fixed stride, since the class count already spans every
/// length value).
pub fn partition_ipv6_by_length(prefixes: &[Prefix64]) -> HashMap<u8, Vec<Prefix64>> {
    let mut out: HashMap<u8, Vec<Prefix64>> = HashMap::new();
    for p in prefixes {
        if p.length == 0 || p.length > 64 {
            continue;
        }
        out.entry(p.length).or_default().push(*p);
    }
    out
}

/// Validates a raw prefix record against the address width before any CPE
/// or store_prefix call consumes it.
pub fn validate(p: &Prefix, width: u8) -> Result<(), ForwardingError> {
    if p.length > width {
        Err(ForwardingError::InvalidPrefix)
    } else {
        Ok(())
    }
}

/// Validates a 64-bit-key prefix record against the address width.
pub fn validate64(p: &Prefix64, width: u8) -> Result<(), ForwardingError> {
    if p.length > width {
        Err(ForwardingError::InvalidPrefix)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_count_matches_2_pow_k() {
        let prefixes = vec![Prefix {
            key: 0b1010_0000_0000_0000_0000_0000_0000_0000,
            length: 8,
            next_hop: 99,
        }];
        let expanded = expand_range(&prefixes, 1, 20, 20);
        assert_eq!(expanded.len(), 1 << (20 - 8));
        assert!(expanded.iter().all(|p| p.length == 20 && p.next_hop == 99));
    }

    #[test]
    fn longer_prefix_wins_over_expansion() {
        // /8 expanded to /20 would populate every matching slot, but an
        // explicit /20 inside that range must keep its own next hop.
        let short = Prefix {
            key: 10 << 24,
            length: 8,
            next_hop: 1,
        };
        let long = Prefix {
            key: (10 << 24) | (1 << 12),
            length: 20,
            next_hop: 2,
        };
        let expanded = expand_range(&[short, long], 1, 20, 20);
        // Every /8 descendant slot is covered exactly once: no duplicate
        // or conflicting entries for the /20 slot the /8 also spans.
        assert_eq!(expanded.len(), 1 << 12);
        let matches: Vec<_> = expanded.iter().filter(|p| p.key == long.key).collect();
        assert_eq!(matches.len(), 1, "the /20 slot must appear exactly once");
        assert_eq!(matches[0].next_hop, 2);
    }

    #[test]
    fn exact_stride_length_prefix_is_not_dropped() {
        // A prefix whose length exactly equals the expansion stride has no
        // shallower ancestor to fall back on; it must still produce its own
        // single-entry output instead of vanishing.
        let prefixes = vec![Prefix { key: 10 << 24, length: 20, next_hop: 5 }];
        let expanded = expand_range(&prefixes, 1, 20, 20);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].next_hop, 5);
        assert_eq!(expanded[0].key, 10 << 24);
    }

    #[test]
    fn ipv4_cpe_splits_into_three_partitions() {
        let prefixes = vec![
            Prefix { key: 0, length: 0, next_hop: 7 },
            Prefix { key: 10 << 24, length: 8, next_hop: 1 },
            Prefix { key: (192 << 24) | (168 << 16) | (1 << 8), length: 24, next_hop: 2 },
            Prefix { key: (192 << 24) | (168 << 16) | (1 << 8), length: 32, next_hop: 3 },
        ];
        let out = perform_ipv4_cpe(&prefixes, 20);
        assert_eq!(out.default_route, Some(7));
        assert!(!out.dla.is_empty());
        assert!(!out.g1.is_empty());
        assert_eq!(out.g2.len(), 1);
    }

    #[test]
    fn ipv6_partitions_by_exact_length() {
        let prefixes = vec![
            Prefix64 { key: 0x2001_0db8_0000_0000u64, length: 32, next_hop: 1 },
            Prefix64 { key: 0x2001_0db8_0000_0000u64, length: 48, next_hop: 2 },
        ];
        let parts = partition_ipv6_by_length(&prefixes);
        assert_eq!(parts.len(), 2);
        assert!(parts.contains_key(&32));
        assert!(parts.contains_key(&48));
    }

    #[test]
    fn validate_rejects_oversized_length() {
        let bad = Prefix { key: 0, length: 33, next_hop: 0 };
        assert_eq!(validate(&bad, 32), Err(ForwardingError::InvalidPrefix));
    }
}
