//! The top-level forwarding table: owns a DLA, a default route, and a set
//! of class-indexed `(CBF, HT)` pairs, and exposes `store_prefix`,
//! `lookup_address`, `lookup_batch`.
//!
//! Split into [`ipv4`] (`K = 2` classes) and [`ipv6`] (`K = 64` classes)
//! because the class layout and key width differ; both share the same
//! lifecycle state machine defined here.

pub mod ipv4;
pub mod ipv6;

pub use ipv4::Ipv4ForwardingTable;
pub use ipv6::Ipv6ForwardingTable;

/// Build-once, read-only-after lifecycle: `Empty -> Sized -> Populated ->
/// Queriable`. Lookups are disallowed before `Queriable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Empty,
    Sized,
    Populated,
    Queriable,
}
