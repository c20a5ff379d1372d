//! The IPv4 stride trie: a multibit LPM trie over 32-bit keys with
//! reference-counted subtrees, plus the public `Ipv4Store` facade that
//! bundles the trie arena together with the shadow rule table so that
//! `insert`/`remove` can keep both in lock-step.
//!
//! Ported from OpenFastPath/Marvell's mtrie lookup implementation
//! (`ofp_rtl_insert`/`ofp_rtl_search`/`ofp_rtl_remove`), adapted to a
//! pre-reserved Rust arena with an explicit `VACANT` sentinel in place of
//! the original's overloaded zero masklen.

use std::sync::atomic::{fence, Ordering};

use crate::error::LpmError;
use crate::ipv4::arena::{Ipv4Arena, NodeRef, VACANT};
use crate::ipv4::canonicalize;
use crate::next_hop::{data_eq, NextHop};
use crate::shadow::{ShadowMatch, ShadowRuleTable};
use crate::stats::Ipv4Stats;
use crate::Vrf;

/// Total address width in bits.
const IPV4_LENGTH: u8 = 32;
/// Width, in bits, of the root level.
const IPV4_FIRST_LEVEL: u8 = 13;
/// Width, in bits, of every interior level after the root.
const IPV4_LEVEL: u8 = 4;

/// A lightweight handle to one VRF's root within a shared [`Ipv4Store`].
/// Carries no trie state of its own; all storage lives in the arena and
/// shadow table the handle was obtained from.
#[derive(Clone, Copy, Debug)]
pub struct Ipv4Tree {
    pub(crate) vrf: Vrf,
    pub(crate) root: usize,
}

impl Ipv4Tree {
    pub fn vrf(&self) -> Vrf {
        self.vrf
    }
}

/// Owns the IPv4 node arena and shadow rule table for every VRF tree carved
/// from it. This is the "named arena" unit the lifecycle layer registers
/// under a name; see [`crate::lifecycle`].
pub struct Ipv4Store<D> {
    arena: Ipv4Arena<D>,
    shadow: ShadowRuleTable<D>,
}

impl<D: NextHop> Ipv4Store<D> {
    pub fn new(small_capacity: usize, large_capacity: usize, rule_capacity: usize) -> Self {
        Ipv4Store {
            arena: Ipv4Arena::new(small_capacity, large_capacity),
            shadow: ShadowRuleTable::new(rule_capacity),
        }
    }

    /// Carves a new root (`vrf = 0`) out of the large-node pool.
    pub fn tree_init(&mut self) -> Result<Ipv4Tree, LpmError> {
        self.tree_init_vrf(0)
    }

    /// Carves a new root for `vrf` out of the large-node pool.
    pub fn tree_init_vrf(&mut self, vrf: Vrf) -> Result<Ipv4Tree, LpmError> {
        let root = self.arena.alloc_large()?;
        Ok(Ipv4Tree { vrf, root })
    }

    /// Inserts `(addr_be, masklen) -> data` into `tree`'s trie and records
    /// the prefix in the shadow rule table.
    pub fn insert(
        &mut self,
        tree: &Ipv4Tree,
        addr_be: u32,
        masklen: u8,
        data: D,
    ) -> Result<(), LpmError> {
        self.insert_trie(tree, addr_be, masklen, data)?;
        let addr = canonicalize(addr_be, masklen);
        self.shadow.add(tree.vrf, addr, masklen, data)
    }

    fn insert_trie(
        &mut self,
        tree: &Ipv4Tree,
        addr_be: u32,
        masklen: u8,
        data: D,
    ) -> Result<(), LpmError> {
        let addr = canonicalize(addr_be, masklen);
        let mut node = NodeRef::Large(tree.root);
        let mut low = 0u8;
        let mut high = IPV4_FIRST_LEVEL;

        loop {
            self.arena.inc_ref_node(node);

            if masklen <= high {
                let node_size = self.arena.node_size(node);
                let (i_lo, i_hi) = entry_range(addr, masklen, low, high, node_size);
                for idx in i_lo..i_hi {
                    let mut e = self.arena.entry(node, idx);
                    if e.masklen <= masklen || e.masklen > high {
                        e.data = data;
                        e.masklen = masklen;
                        self.arena.set_entry(node, idx, e);
                    }
                }
                break;
            }

            let idx = single_index(addr, low, high);
            let mut e = self.arena.entry(node, idx);
            if e.next.is_none() {
                let id = self.arena.alloc_small()?;
                e.next = Some(id);
            }
            if e.masklen == VACANT {
                e.masklen = masklen;
            }
            let child = e.next.expect("just ensured above");
            self.arena.set_entry(node, idx, e);
            node = NodeRef::Small(child);

            low = high;
            high += IPV4_LEVEL;
        }

        fence(Ordering::Release);
        Ok(())
    }

    /// Walks from the root, returning the next-hop of the most specific
    /// prefix covering `addr_be`, or `None`.
    pub fn search(&self, tree: &Ipv4Tree, addr_be: u32) -> Option<D> {
        let addr = u32::from_be(addr_be);
        let mut node = NodeRef::Large(tree.root);
        let mut low = 0u8;
        let mut high = IPV4_FIRST_LEVEL;
        let mut best: Option<D> = None;

        loop {
            let idx = single_index(addr, low, high);
            let e = self.arena.entry(node, idx);

            if e.masklen == VACANT && e.next.is_none() {
                return best;
            }
            if e.masklen != VACANT && e.masklen <= high {
                best = Some(e.data);
            }
            match e.next {
                None => return best,
                Some(id) => node = NodeRef::Small(id),
            }

            low = high;
            high += IPV4_LEVEL;
        }
    }

    /// Removes `(addr_be, masklen)`, resurrecting the best remaining
    /// less-specific prefix at the level the removed one occupied.
    /// Returns the removed data, or `None` if the prefix was unknown.
    pub fn remove(&mut self, tree: &Ipv4Tree, addr_be: u32, masklen: u8) -> Option<D> {
        let addr = canonicalize(addr_be, masklen);
        let idx_rule = self.shadow.find(tree.vrf, addr, masklen)?;
        let removed_data = self.shadow.data_at(idx_rule);
        // Clear the rule before searching for a survivor: otherwise the
        // rule being removed would be its own "best surviving" candidate.
        self.shadow.clear(idx_rule);

        let survivor = self.remove_trie(tree, addr, masklen, removed_data);

        if let Some(s) = survivor {
            // Trie-only reinsertion: the survivor's shadow rule already
            // exists (it was never removed) and must not be touched.
            let _ = self.insert_trie(tree, s.addr.to_be(), s.masklen, s.data);
        }

        Some(removed_data)
    }

    fn remove_trie(
        &mut self,
        tree: &Ipv4Tree,
        addr: u32,
        masklen: u8,
        removed_data: D,
    ) -> Option<ShadowMatch<D>> {
        let mut node = NodeRef::Large(tree.root);
        let mut low = 0u8;
        let mut high = IPV4_FIRST_LEVEL;

        loop {
            self.arena.dec_ref_node(node);

            if masklen <= high {
                let node_size = self.arena.node_size(node);
                let (i_lo, i_hi) = entry_range(addr, masklen, low, high, node_size);
                for idx in i_lo..i_hi {
                    let mut e = self.arena.entry(node, idx);
                    if e.masklen == masklen && data_eq(&e.data, &removed_data) {
                        e.masklen = if e.next.is_none() { VACANT } else { high + 1 };
                        self.arena.set_entry(node, idx, e);
                    }
                }
                let survivor =
                    self.shadow
                        .find_prefix_match(tree.vrf, addr, masklen, low);
                fence(Ordering::Release);
                return survivor;
            }

            let idx = single_index(addr, low, high);
            let mut e = self.arena.entry(node, idx);
            match e.next {
                Some(child_id) => {
                    let child = NodeRef::Small(child_id);
                    if self.arena.ref_count_node(child) == 1 && e.masklen > high {
                        e.masklen = VACANT;
                        e.next = None;
                        self.arena.set_entry(node, idx, e);
                    }
                    node = child;
                }
                None => return None,
            }

            low = high;
            high += IPV4_LEVEL;
        }
    }

    pub fn rule_add(&mut self, vrf: Vrf, addr_be: u32, masklen: u8, data: D) -> Result<(), LpmError> {
        let addr = canonicalize(addr_be, masklen);
        self.shadow.add(vrf, addr, masklen, data)
    }

    pub fn rule_remove(&mut self, vrf: Vrf, addr_be: u32, masklen: u8) -> Option<D> {
        let addr = canonicalize(addr_be, masklen);
        let idx = self.shadow.find(vrf, addr, masklen)?;
        let data = self.shadow.data_at(idx);
        self.shadow.clear(idx);
        Some(data)
    }

    pub fn rule_print(&self, vrf: Vrf, mut sink: impl FnMut(u32, u8, &D)) {
        self.shadow
            .for_each(vrf, |addr, masklen, data| sink(addr.to_be(), masklen, data));
    }

    pub fn stats(&self) -> Ipv4Stats {
        Ipv4Stats {
            nodes_allocated: self.arena.nodes_allocated(),
            max_nodes_allocated: self.arena.max_nodes_allocated(),
            small_capacity: self.arena.small_capacity() as u32,
            large_capacity: self.arena.large_capacity() as u32,
            rules_used: self.shadow.len() as u32,
            rules_capacity: self.shadow.capacity() as u32,
        }
    }
}

/// The single-index descent formula shared by insert/search/remove when the
/// prefix being handled extends beyond the current level:
/// `(addr << low) >> (low + 32 - high)`.
fn single_index(addr: u32, low: u8, high: u8) -> usize {
    let addr = addr as u64;
    let low = low as u32;
    let high = high as u32;
    let shift_right = low + IPV4_LENGTH as u32 - high;
    ((addr << low) >> shift_right) as usize
}

/// The half-open entry range `[i_lo, i_hi)` a prefix of `masklen` occupies
/// within a node spanning `[low, high)`. `masklen == 0` (the default route)
/// is handled as an explicit full-node-fill case: computing it through the
/// same shift arithmetic as every other masklen would shift by 32 bits,
/// which is undefined behavior for a 32-bit value in C and just wrong in
/// Rust, rather than the "wrap to 0" the original relied on. Any other
/// masklen whose computed end would overflow is clamped to `node_size`
/// rather than wrapped.
fn entry_range(addr: u32, masklen: u8, low: u8, high: u8, node_size: usize) -> (usize, usize) {
    if masklen == 0 {
        return (0, node_size);
    }
    let masklen = masklen as u32;
    let low = low as u32;
    let high = high as u32;

    // Stay in u32 here, matching `single_index`: the left shift is meant to
    // discard the address bits already consumed by ancestor levels by
    // letting them shift out past bit 31, exactly as the original's
    // `uint32_t` arithmetic does. Widening to u64 keeps those high bits
    // around instead of discarding them, producing indices far outside the
    // node.
    let addr_be_right = addr >> (IPV4_LENGTH as u32 - masklen);
    let shift_left = IPV4_LENGTH as u32 - masklen + low;
    let shift_right = low + IPV4_LENGTH as u32 - high;

    let i_lo = ((addr_be_right << shift_left) >> shift_right) as usize;
    let i_hi_raw = ((addr_be_right.wrapping_add(1) << shift_left) >> shift_right) as usize;
    let i_hi = if i_hi_raw == 0 || i_hi_raw > node_size {
        node_size
    } else {
        i_hi_raw
    };
    (i_lo, i_hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Default, zerocopy::IntoBytes, zerocopy::Immutable)]
    #[repr(C)]
    struct Nh(u32);

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from_be_bytes([a, b, c, d]).to_be()
    }

    #[test]
    fn default_route_matches_everything() {
        let mut store = Ipv4Store::<Nh>::new(64, 4, 64);
        let tree = store.tree_init().unwrap();
        store.insert(&tree, ip(0, 0, 0, 0), 0, Nh(1)).unwrap();
        assert_eq!(store.search(&tree, ip(8, 8, 8, 8)).map(|d| d.0), Some(1));
    }

    #[test]
    fn scenario_s1_to_s4_overlapping_resurrection() {
        let mut store = Ipv4Store::<Nh>::new(64, 4, 64);
        let tree = store.tree_init().unwrap();

        store.insert(&tree, ip(0, 0, 0, 0), 0, Nh(0xA)).unwrap();
        assert_eq!(store.search(&tree, ip(8, 8, 8, 8)).map(|d| d.0), Some(0xA));

        store.insert(&tree, ip(10, 0, 0, 0), 8, Nh(0xB)).unwrap();
        assert_eq!(
            store.search(&tree, ip(10, 1, 2, 3)).map(|d| d.0),
            Some(0xB)
        );

        store.insert(&tree, ip(10, 1, 0, 0), 16, Nh(0xC)).unwrap();
        assert_eq!(
            store.search(&tree, ip(10, 1, 2, 3)).map(|d| d.0),
            Some(0xC)
        );

        store.remove(&tree, ip(10, 1, 0, 0), 16);
        assert_eq!(
            store.search(&tree, ip(10, 1, 2, 3)).map(|d| d.0),
            Some(0xB)
        );
    }

    #[test]
    fn host_route_is_exact() {
        let mut store = Ipv4Store::<Nh>::new(64, 4, 64);
        let tree = store.tree_init().unwrap();
        store
            .insert(&tree, ip(192, 168, 1, 1), 32, Nh(0xD))
            .unwrap();
        assert_eq!(
            store.search(&tree, ip(192, 168, 1, 1)).map(|d| d.0),
            Some(0xD)
        );
        assert_eq!(store.search(&tree, ip(192, 168, 1, 2)), None);
    }

    #[test]
    fn insert_then_remove_restores_prior_state() {
        let mut store = Ipv4Store::<Nh>::new(64, 4, 64);
        let tree = store.tree_init().unwrap();
        let before = store.stats().nodes_allocated;

        store.insert(&tree, ip(10, 0, 0, 0), 24, Nh(1)).unwrap();
        let removed = store.remove(&tree, ip(10, 0, 0, 0), 24);
        assert_eq!(removed.map(|d| d.0), Some(1));
        assert_eq!(store.search(&tree, ip(10, 0, 0, 5)), None);
        assert_eq!(store.stats().nodes_allocated, before);
    }

    #[test]
    fn reinsert_overwrites_prior_data() {
        let mut store = Ipv4Store::<Nh>::new(64, 4, 64);
        let tree = store.tree_init().unwrap();
        store.insert(&tree, ip(172, 16, 0, 0), 12, Nh(1)).unwrap();
        store.insert(&tree, ip(172, 16, 0, 0), 12, Nh(2)).unwrap();
        assert_eq!(
            store.search(&tree, ip(172, 16, 5, 5)).map(|d| d.0),
            Some(2)
        );
    }

    #[test]
    fn stride_boundary_prefix_terminates_in_root() {
        let mut store = Ipv4Store::<Nh>::new(64, 4, 64);
        let tree = store.tree_init().unwrap();
        // /13 terminates exactly at the root's level boundary.
        store.insert(&tree, ip(8, 0, 0, 0), 13, Nh(7)).unwrap();
        assert_eq!(store.search(&tree, ip(8, 7, 255, 255)).map(|d| d.0), Some(7));
        assert_eq!(store.stats().nodes_allocated, 0);
    }

    #[test]
    fn arena_exhaustion_aborts_without_partial_commit() {
        let mut store = Ipv4Store::<Nh>::new(0, 4, 64);
        let tree = store.tree_init().unwrap();
        let err = store.insert(&tree, ip(10, 0, 0, 1), 32, Nh(1)).unwrap_err();
        assert_eq!(err, LpmError::ArenaExhausted);
        assert_eq!(store.search(&tree, ip(10, 0, 0, 1)), None);
    }
}
