//! Longest-prefix-match IP forwarding table — a composite Direct Lookup
//! Array / chained hash table / Counting Bloom Filter data plane, for
//! both IPv4 (32-bit keys) and IPv6 (64-bit reduced keys).

pub mod bloom;
pub mod cli;
pub mod config;
pub mod cpe;
pub mod diagnostics;
pub mod error;
pub mod hash;
pub mod hashtable;
pub mod dla;
pub mod ingest;
pub mod table;

pub use bloom::CountingBloomFilter;
pub use dla::DirectLookupArray;
pub use error::{CbfError, ForwardingError};
pub use hash::{H2Hash, HashFn, KnuthHash, MurmurHash3, SeededPrngHash};
pub use hashtable::HashTable;
pub use ingest::IngestError;
pub use table::{BuildState, Ipv4ForwardingTable, Ipv6ForwardingTable};

pub const LPMFWD_VERSION_STRING: &str = env!("CARGO_PKG_VERSION");
