//! The public `Store<D>` facade: one IPv4 stride trie plus one IPv6 binary
//! trie sharing a single pair of node pools.

use inetnum::addr::Prefix;

use crate::error::LpmError;
use crate::ipv4::{Ipv4Store, Ipv4Tree};
use crate::ipv6::{Ipv6Store, Ipv6Tree};
use crate::next_hop::NextHop;
use crate::prefix::{from_ipv4_parts, from_ipv6_parts, to_ipv4_parts, to_ipv6_parts};
use crate::shadow::DEFAULT_ROUTE_LIST_SIZE;
use crate::stats::Stats;
use crate::Vrf;

/// Pool sizes fixed at construction time and never resized afterward.
#[derive(Clone, Copy, Debug)]
pub struct Capacities {
    pub ipv4_small: usize,
    pub ipv4_large: usize,
    pub ipv4_rules: usize,
    pub ipv6_nodes: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Capacities {
            ipv4_small: 1024,
            ipv4_large: 128,
            ipv4_rules: DEFAULT_ROUTE_LIST_SIZE,
            ipv6_nodes: 65536,
        }
    }
}

/// Bundles one IPv4 arena/shadow table and one IPv6 arena behind a single
/// handle, the unit the lifecycle layer names and hands out.
pub struct Store<D> {
    v4: Ipv4Store<D>,
    v6: Ipv6Store<D>,
}

impl<D: NextHop> Store<D> {
    pub fn new(capacities: Capacities) -> Self {
        Store {
            v4: Ipv4Store::new(
                capacities.ipv4_small,
                capacities.ipv4_large,
                capacities.ipv4_rules,
            ),
            v6: Ipv6Store::new(capacities.ipv6_nodes),
        }
    }

    pub fn tree_init(&mut self) -> Result<Ipv4Tree, LpmError> {
        self.v4.tree_init()
    }

    pub fn tree_init_vrf(&mut self, vrf: Vrf) -> Result<Ipv4Tree, LpmError> {
        self.v4.tree_init_vrf(vrf)
    }

    pub fn tree6_init(&mut self) -> Result<Ipv6Tree, LpmError> {
        self.v6.tree_init()
    }

    pub fn insert(
        &mut self,
        tree: &Ipv4Tree,
        addr_be: u32,
        masklen: u8,
        data: D,
    ) -> Result<(), LpmError> {
        self.v4.insert(tree, addr_be, masklen, data)
    }

    pub fn remove(&mut self, tree: &Ipv4Tree, addr_be: u32, masklen: u8) -> Option<D> {
        self.v4.remove(tree, addr_be, masklen)
    }

    pub fn search(&self, tree: &Ipv4Tree, addr_be: u32) -> Option<D> {
        self.v4.search(tree, addr_be)
    }

    pub fn insert6(
        &mut self,
        tree: &Ipv6Tree,
        addr: &[u8; 16],
        masklen: u8,
        data: D,
    ) -> Result<Option<D>, LpmError> {
        self.v6.insert(tree, addr, masklen, data)
    }

    pub fn remove6(&mut self, tree: &Ipv6Tree, addr: &[u8; 16], masklen: u8) -> Option<D> {
        self.v6.remove(tree, addr, masklen)
    }

    pub fn search6(&self, tree: &Ipv6Tree, addr: &[u8; 16]) -> Option<D> {
        self.v6.search(tree, addr)
    }

    pub fn traverse6(&self, tree: &Ipv6Tree, sink: impl FnMut([u8; 16], u8, D)) {
        self.v6.traverse(tree, sink)
    }

    pub fn rule_add(&mut self, vrf: Vrf, addr_be: u32, masklen: u8, data: D) -> Result<(), LpmError> {
        self.v4.rule_add(vrf, addr_be, masklen, data)
    }

    pub fn rule_remove(&mut self, vrf: Vrf, addr_be: u32, masklen: u8) -> Option<D> {
        self.v4.rule_remove(vrf, addr_be, masklen)
    }

    pub fn rule_print(&self, vrf: Vrf, sink: impl FnMut(u32, u8, &D)) {
        self.v4.rule_print(vrf, sink)
    }

    pub fn stats(&self) -> Stats {
        Stats {
            v4: self.v4.stats(),
            v6: self.v6.stats(),
        }
    }

    /// Ergonomic `inetnum::addr::Prefix` sugar over [`Store::insert`] /
    /// [`Store::insert6`], dispatching on the prefix's address family.
    /// Returns `None` if `prefix`'s family doesn't match `tree`'s (an IPv4
    /// prefix against an `Ipv6Tree`, or vice versa).
    pub fn insert_prefix(
        &mut self,
        tree: &Ipv4Tree,
        prefix: Prefix,
        data: D,
    ) -> Option<Result<(), LpmError>> {
        let (addr_be, masklen) = to_ipv4_parts(prefix)?;
        Some(self.insert(tree, addr_be, masklen, data))
    }

    pub fn insert_prefix6(
        &mut self,
        tree: &Ipv6Tree,
        prefix: Prefix,
        data: D,
    ) -> Option<Result<Option<D>, LpmError>> {
        let (addr, masklen) = to_ipv6_parts(prefix)?;
        Some(self.insert6(tree, &addr, masklen, data))
    }

    pub fn search_prefix(&self, tree: &Ipv4Tree, prefix: Prefix) -> Option<D> {
        let (addr_be, _masklen) = to_ipv4_parts(prefix)?;
        self.search(tree, addr_be)
    }

    pub fn search_prefix6(&self, tree: &Ipv6Tree, prefix: Prefix) -> Option<D> {
        let (addr, _masklen) = to_ipv6_parts(prefix)?;
        self.search6(tree, &addr)
    }

    pub fn remove_prefix(&mut self, tree: &Ipv4Tree, prefix: Prefix) -> Option<D> {
        let (addr_be, masklen) = to_ipv4_parts(prefix)?;
        self.remove(tree, addr_be, masklen)
    }

    pub fn remove_prefix6(&mut self, tree: &Ipv6Tree, prefix: Prefix) -> Option<D> {
        let (addr, masklen) = to_ipv6_parts(prefix)?;
        self.remove6(tree, &addr, masklen)
    }
}

/// Builds an `inetnum::addr::Prefix` from a stored IPv4 rule's raw parts,
/// the form [`Ipv4Store::rule_print`] and traversal sinks receive. Returns
/// `None` only if `masklen` is out of range (never the case for data this
/// crate wrote itself).
pub fn ipv4_rule_prefix(addr_be: u32, masklen: u8) -> Option<Prefix> {
    from_ipv4_parts(addr_be, masklen)
}

/// Builds an `inetnum::addr::Prefix` from a stored IPv6 node's raw parts, the
/// form [`Ipv6Store::traverse`] sinks receive.
pub fn ipv6_node_prefix(addr: [u8; 16], masklen: u8) -> Option<Prefix> {
    from_ipv6_parts(addr, masklen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Default, zerocopy::IntoBytes, zerocopy::Immutable)]
    #[repr(C)]
    struct Nh(u32);

    #[test]
    fn store_bundles_v4_and_v6_independently() {
        let mut store = Store::<Nh>::new(Capacities {
            ipv4_small: 16,
            ipv4_large: 2,
            ipv4_rules: 16,
            ipv6_nodes: 64,
        });

        let v4 = store.tree_init().unwrap();
        let v6 = store.tree6_init().unwrap();

        store
            .insert(&v4, u32::from_be_bytes([10, 0, 0, 0]).to_be(), 8, Nh(1))
            .unwrap();
        store
            .insert6(&v6, &[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 32, Nh(2))
            .unwrap();

        assert_eq!(
            store
                .search(&v4, u32::from_be_bytes([10, 1, 2, 3]).to_be())
                .map(|d| d.0),
            Some(1)
        );
        assert_eq!(
            store
                .search6(
                    &v6,
                    &[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1]
                )
                .map(|d| d.0),
            Some(2)
        );
    }

    #[test]
    fn prefix_sugar_dispatches_on_address_family() {
        use std::net::{IpAddr, Ipv4Addr};

        let mut store = Store::<Nh>::new(Capacities {
            ipv4_small: 16,
            ipv4_large: 2,
            ipv4_rules: 16,
            ipv6_nodes: 64,
        });
        let v4 = store.tree_init().unwrap();
        let v6 = store.tree6_init().unwrap();

        let prefix = Prefix::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)), 8).unwrap();
        assert!(store.insert_prefix(&v4, prefix, Nh(7)).unwrap().is_ok());
        assert_eq!(store.search_prefix(&v4, prefix).map(|d| d.0), Some(7));

        // Wrong family against this tree: sugar reports "not applicable",
        // not a miss.
        assert!(store.insert_prefix6(&v6, prefix, Nh(9)).is_none());

        assert_eq!(store.remove_prefix(&v4, prefix).map(|d| d.0), Some(7));
        assert_eq!(store.search_prefix(&v4, prefix), None);
    }
}
