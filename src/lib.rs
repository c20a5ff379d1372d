//! A longest-prefix-match forwarding table over pool-allocated IPv4 and
//! IPv6 tries: an IPv4 multibit stride trie (`ipv4`), an IPv6 binary
//! Patricia trie (`ipv6`), a shared shadow rule table (`shadow`) used to
//! resurrect less-specific prefixes on removal, and a named-arena lifecycle
//! layer (`lifecycle`) bundling both into a `Store` per caller.
//!
//! Ported from OpenFastPath/Marvell's mtrie lookup implementation, adapted
//! to a pre-reserved, single-writer-per-tree Rust arena.

pub mod error;
pub mod ipv4;
pub mod ipv6;
pub mod lifecycle;
pub mod next_hop;
pub mod prefix;
mod shadow;
pub mod stats;
pub mod store;

pub use error::LpmError;
pub use ipv4::{Ipv4Store, Ipv4Tree};
pub use ipv6::{Ipv6Store, Ipv6Tree};
pub use lifecycle::{init_global, term_global, ArenaHandle, ArenaRegistry, GLOBAL_ARENA_NAME};
pub use next_hop::NextHop;
pub use stats::{Ipv4Stats, Ipv6Stats, Stats};
pub use store::{Capacities, Store};

/// A VRF (virtual routing and forwarding instance) identifier. IPv4 trees
/// are scoped by `Vrf` at the shadow-rule-table layer; IPv6 trees are not
/// VRF-scoped at the trie level, matching the reference C.
pub type Vrf = u16;
