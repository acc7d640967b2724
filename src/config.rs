// config.rs — Compile-time configuration constants.
// Migrated from config.h (bloomfwd, baseline and v4/v6 variants).

/// Target false-positive ratio for Counting Bloom Filters.
/// Corresponds to `FALSE_POSITIVE_RATIO` in config.h.
pub const FALSE_POSITIVE_RATIO: f64 = 0.01;

/// DLA stride for IPv4: prefixes of length ≤ this are resolved by a single
/// indexed array read. Corresponds to the hard-coded `20` in `bloomfwd_opt.c`.
pub const IPV4_DLA_STRIDE: u8 = 20;

/// IPv4 address width in bits.
pub const IPV4_WIDTH: u8 = 32;

/// IPv6 reduced (upper-half) key width in bits used by the forwarding table.
pub const IPV6_WIDTH: u8 = 64;

/// Number of prefix-length classes for IPv6 (lengths 1..=64).
pub const IPV6_NUM_CLASSES: usize = 64;

/// Default lookup batch size. Matches a 512-bit vector lane of 32-bit lanes
/// and is the convenient multiple used throughout the source for `-b`.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Below this batch length, `lookup_batch` runs sequentially rather than
/// paying `rayon` fan-out overhead.
pub const BATCH_PARALLEL_THRESHOLD: usize = 4096;
