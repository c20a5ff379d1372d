//! The IPv6 binary trie: a 1-bit-per-level Patricia-style trie over
//! 128-bit keys, plus the public `Ipv6Store` facade bundling the node pool.
//!
//! Ported from OpenFastPath/Marvell's mtrie lookup implementation
//! (`ofp_rtl_insert6`/`ofp_rtl_remove6`/`ofp_rtl_traverse6`).

use std::sync::atomic::{fence, Ordering};

use crate::error::LpmError;
use crate::ipv6::arena::{Ipv6Arena, Ipv6NodeId};
use crate::ipv6::{bit_at, reset_bit, set_bit};
use crate::next_hop::NextHop;
use crate::stats::Ipv6Stats;

/// Maximum trie depth: 128 address bits plus the root's own level.
const MAX_STACK: usize = 129;

/// A handle to one IPv6 tree's root within a shared [`Ipv6Store`]. IPv6
/// trees are not VRF-scoped at the trie level, matching the reference C
/// (only the IPv4 shadow rule table threads a VRF through).
#[derive(Clone, Copy, Debug)]
pub struct Ipv6Tree {
    pub(crate) root: Ipv6NodeId,
}

/// Owns the IPv6 node pool shared by every tree carved from it via
/// [`Ipv6Store::tree_init`].
pub struct Ipv6Store<D> {
    arena: Ipv6Arena<D>,
}

impl<D: NextHop> Ipv6Store<D> {
    pub fn new(capacity: usize) -> Self {
        Ipv6Store {
            arena: Ipv6Arena::new(capacity),
        }
    }

    /// Allocates a fresh root node and returns a handle to it.
    pub fn tree_init(&mut self) -> Result<Ipv6Tree, LpmError> {
        let root = self.arena.alloc()?;
        Ok(Ipv6Tree { root })
    }

    /// Inserts `(addr, masklen) -> data`. Returns `Ok(None)` if this is a
    /// new prefix, `Ok(Some(existing))` without overwriting if a node
    /// already carries valid data at this exact depth (duplicate insert),
    /// or `Err(ArenaExhausted)` if the pool ran out mid-insert (in which
    /// case every node allocated during this call is freed before
    /// returning, leaving no partial structure attached).
    pub fn insert(
        &mut self,
        tree: &Ipv6Tree,
        addr: &[u8; 16],
        masklen: u8,
        data: D,
    ) -> Result<Option<D>, LpmError> {
        if masklen == 0 {
            if self.arena.has_valid_data(tree.root) {
                return Ok(Some(self.arena.data(tree.root)));
            }
            self.arena.set_data(tree.root, data);
            fence(Ordering::Release);
            return Ok(None);
        }

        let mut last = tree.root;
        let mut cur = Some(tree.root);
        let mut depth = 0u8;
        while depth < masklen {
            match cur {
                Some(n) => {
                    last = n;
                    cur = self.arena.child(n, bit_at(addr, depth));
                    depth += 1;
                }
                None => break,
            }
        }

        if let Some(existing) = cur {
            // The full path already exists. A node that already carries
            // valid data is a duplicate insert of the same prefix, left
            // untouched; a node reached only as an ancestor of a longer
            // prefix is promoted to also carry this (shorter) prefix's
            // data, rather than silently discarding it.
            if self.arena.has_valid_data(existing) {
                return Ok(Some(self.arena.data(existing)));
            }
            self.arena.set_data(existing, data);
            fence(Ordering::Release);
            return Ok(None);
        }

        let mut allocated: Vec<Ipv6NodeId> = Vec::new();
        let result = (|| -> Result<(), LpmError> {
            let term = self.arena.alloc()?;
            allocated.push(term);
            self.arena.set_data(term, data);

            let mut node = term;
            let mut bit = masklen - 1;
            let mut d = depth;
            while d < masklen {
                let tmp = self.arena.alloc()?;
                allocated.push(tmp);
                self.arena.set_child(tmp, bit_at(addr, bit), Some(node));
                node = tmp;
                bit -= 1;
                d += 1;
            }

            self.arena.set_child(last, bit_at(addr, bit), Some(node));
            Ok(())
        })();

        match result {
            Ok(()) => {
                fence(Ordering::Release);
                Ok(None)
            }
            Err(e) => {
                for id in allocated {
                    self.arena.free(id);
                }
                Err(e)
            }
        }
    }

    /// Descends following `addr`'s bits, returning the most specific
    /// covering prefix's data, or `None`.
    pub fn search(&self, tree: &Ipv6Tree, addr: &[u8; 16]) -> Option<D> {
        let mut node = tree.root;
        let mut best = self.arena.has_valid_data(node).then(|| self.arena.data(node));
        let mut depth = 0u8;
        loop {
            if depth >= 128 {
                return best;
            }
            match self.arena.child(node, bit_at(addr, depth)) {
                Some(next) => {
                    node = next;
                    if self.arena.has_valid_data(node) {
                        best = Some(self.arena.data(node));
                    }
                    depth += 1;
                }
                None => return best,
            }
        }
    }

    /// Removes `(addr, masklen)`, freeing the target node and any
    /// ancestor that becomes childless and data-less as a result (never
    /// the root). Returns the removed data, or `None` if unknown.
    pub fn remove(&mut self, tree: &Ipv6Tree, addr: &[u8; 16], masklen: u8) -> Option<D> {
        if masklen == 0 {
            if !self.arena.has_valid_data(tree.root) {
                return None;
            }
            let data = self.arena.data(tree.root);
            self.arena.clear_valid_data(tree.root);
            fence(Ordering::Release);
            return Some(data);
        }

        let mut stack = [Ipv6NodeId::default(); MAX_STACK];
        let mut node = tree.root;
        let mut depth = 0u8;
        while depth < masklen {
            stack[depth as usize] = node;
            match self.arena.child(node, bit_at(addr, depth)) {
                Some(next) => {
                    node = next;
                    depth += 1;
                }
                None => return None,
            }
        }

        if !self.arena.has_valid_data(node) {
            return None;
        }
        let removed = self.arena.data(node);
        self.arena.clear_valid_data(node);

        if self.arena.left(node).is_some() || self.arena.right(node).is_some() {
            fence(Ordering::Release);
            return Some(removed);
        }
        self.arena.free(node);

        let mut depth = masklen - 1;
        let mut bit = masklen - 1;
        loop {
            let parent = stack[depth as usize];
            let b = bit_at(addr, bit);
            self.arena.set_child(parent, b, None);
            if self.arena.child(parent, !b).is_some() || self.arena.has_valid_data(parent) {
                break;
            }
            if depth == 0 {
                break;
            }
            self.arena.free(parent);
            depth -= 1;
            bit -= 1;
        }

        fence(Ordering::Release);
        Some(removed)
    }

    /// Emits `(key, depth, data)` for every node with valid data, in
    /// pre-order, iteratively.
    pub fn traverse(&self, tree: &Ipv6Tree, mut sink: impl FnMut([u8; 16], u8, D)) {
        const VISITED_LEFT: u8 = 1;
        const VISITED_RIGHT: u8 = 2;

        let mut key = [0u8; 16];
        let mut visited = [0u8; MAX_STACK];
        let mut stack = [tree.root; MAX_STACK];
        let mut node = tree.root;
        let mut depth: i32 = 0;

        loop {
            if self.arena.has_valid_data(node) && visited[depth as usize] == 0 {
                sink(key, depth as u8, self.arena.data(node));
            }
            stack[depth as usize] = node;

            if let Some(l) = self.arena.left(node) {
                if visited[depth as usize] & VISITED_LEFT == 0 {
                    node = l;
                    reset_bit(&mut key, depth as u8);
                    visited[depth as usize] |= VISITED_LEFT;
                    depth += 1;
                    continue;
                }
            }
            if let Some(r) = self.arena.right(node) {
                if visited[depth as usize] & VISITED_RIGHT == 0 {
                    node = r;
                    set_bit(&mut key, depth as u8);
                    visited[depth as usize] |= VISITED_RIGHT;
                    depth += 1;
                    continue;
                }
            }

            visited[depth as usize] = 0;
            reset_bit(&mut key, depth as u8);
            depth -= 1;
            if depth < 0 {
                break;
            }
            node = stack[depth as usize];
        }
    }

    pub fn stats(&self) -> Ipv6Stats {
        Ipv6Stats {
            nodes_allocated: self.arena.nodes_allocated(),
            max_nodes_allocated: self.arena.max_nodes_allocated(),
            capacity: self.arena.capacity() as u32,
        }
    }
}
