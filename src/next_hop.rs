use zerocopy::{Immutable, IntoBytes};

/// Bound on the opaque next-hop payload the core stores alongside a prefix.
///
/// The core never inspects a `NextHop`'s fields. It copies values around and,
/// on remove, compares them bytewise (`data_eq`) rather than relying on a
/// caller-provided `PartialEq`, matching the original C's `memcmp` on
/// `struct ofp_nh_entry`.
pub trait NextHop: Copy + Default + IntoBytes + Immutable {}

impl<T> NextHop for T where T: Copy + Default + IntoBytes + Immutable {}

/// Bytewise equality, mirroring `memcmp(&node[index].data, data, sizeof(...))`
/// in the reference implementation.
pub(crate) fn data_eq<D: NextHop>(a: &D, b: &D) -> bool {
    a.as_bytes() == b.as_bytes()
}
