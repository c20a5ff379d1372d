//! The IPv4 node pool: a pre-reserved set of small (16-entry) and large
//! (8192-entry) node blocks, threaded into a singly-linked free list through
//! each small node's first entry.

use crate::error::LpmError;
use crate::next_hop::NextHop;

pub(crate) const SMALL_ENTRIES: usize = 16;
pub(crate) const LARGE_ENTRIES: usize = 8192;

/// Sentinel `masklen` meaning "never written". Distinct from every real
/// masklen (0..=32) so that a literal default-route insert (`masklen == 0`)
/// stays distinguishable from a never-touched slot; storing the literal
/// masklen including 0 for both would make an inserted default route
/// indistinguishable from an empty slot and unreachable through the
/// generic per-entry search path.
pub(crate) const VACANT: u8 = u8::MAX;

/// One slot of a small or large node.
///
/// `masklen == VACANT` means never written. `masklen` may also exceed the
/// node's `high` bound (while still being `< VACANT`), in which case it is
/// only a "there is a child beyond this level" marker and carries no
/// terminal payload of its own (see the IPv4 replication invariant in the
/// module docs of [`crate::ipv4::trie`]).
#[derive(Clone, Copy)]
pub(crate) struct Ipv4Entry<D> {
    pub masklen: u8,
    pub data: D,
    pub next: Option<SmallNodeId>,
}

impl<D: NextHop> Default for Ipv4Entry<D> {
    fn default() -> Self {
        Ipv4Entry {
            masklen: VACANT,
            data: D::default(),
            next: None,
        }
    }
}

/// Identifies a small (16-entry) node within [`Ipv4Arena`]'s small pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct SmallNodeId(u32);

/// Identifies any node a trie walk may currently be sitting on: the root
/// large node, or one of the small nodes reached through a `next` pointer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum NodeRef {
    Large(usize),
    Small(SmallNodeId),
}

struct SmallNode<D> {
    /// Reference count: number of parent entries whose `next` points here,
    /// plus one while the node is reachable as the active subtree root
    /// during descent. Freed when it reaches zero.
    ref_count: u32,
    /// Valid only while the node sits on the free list.
    free_next: Option<SmallNodeId>,
    entries: [Ipv4Entry<D>; SMALL_ENTRIES],
}

/// The single root node of an IPv4 tree: 8192 entries, lives for the
/// lifetime of the tree (no free path).
pub(crate) struct LargeNode<D> {
    /// Tracked for parity with the reference C's `inc_use_reference` on
    /// every level including the root; never consulted to free the root.
    ref_count: u32,
    entries: [Ipv4Entry<D>; LARGE_ENTRIES],
}

pub(crate) struct Ipv4Arena<D> {
    small: Vec<SmallNode<D>>,
    free_head: Option<SmallNodeId>,
    nodes_allocated: u32,
    max_nodes_allocated: u32,
    large: Vec<LargeNode<D>>,
    /// Large nodes are never freed, so a simple watermark suffices.
    large_in_use: usize,
}

impl<D: NextHop> Ipv4Arena<D> {
    /// Builds a pool with `small_capacity` small nodes (pre-linked into the
    /// free list) and `large_capacity` large-node blocks (each allocated
    /// up front; there is no large-node free list, since roots live for
    /// the lifetime of their tree and are never reclaimed individually).
    pub(crate) fn new(small_capacity: usize, large_capacity: usize) -> Self {
        let mut small = Vec::with_capacity(small_capacity);
        for i in 0..small_capacity {
            let next = if i + 1 < small_capacity {
                Some(SmallNodeId((i + 1) as u32))
            } else {
                None
            };
            small.push(SmallNode {
                ref_count: 0,
                free_next: next,
                entries: [Ipv4Entry::default(); SMALL_ENTRIES],
            });
        }
        let free_head = if small_capacity > 0 {
            Some(SmallNodeId(0))
        } else {
            None
        };
        let mut large = Vec::with_capacity(large_capacity);
        for _ in 0..large_capacity {
            large.push(LargeNode {
                ref_count: 0,
                entries: [Ipv4Entry::default(); LARGE_ENTRIES],
            });
        }
        Ipv4Arena {
            small,
            free_head,
            nodes_allocated: 0,
            max_nodes_allocated: 0,
            large,
            large_in_use: 0,
        }
    }

    pub(crate) fn nodes_allocated(&self) -> u32 {
        self.nodes_allocated
    }

    pub(crate) fn max_nodes_allocated(&self) -> u32 {
        self.max_nodes_allocated
    }

    pub(crate) fn small_capacity(&self) -> usize {
        self.small.len()
    }

    pub(crate) fn large_capacity(&self) -> usize {
        self.large.len()
    }

    /// Hands out a zeroed small node with `ref_count = 0`, or fails if the
    /// free list is exhausted.
    pub(crate) fn alloc_small(&mut self) -> Result<SmallNodeId, LpmError> {
        let id = self.free_head.ok_or(LpmError::ArenaExhausted)?;
        let node = &mut self.small[id.0 as usize];
        self.free_head = node.free_next.take();
        node.ref_count = 0;
        node.entries = [Ipv4Entry::default(); SMALL_ENTRIES];
        self.nodes_allocated += 1;
        if self.nodes_allocated > self.max_nodes_allocated {
            self.max_nodes_allocated = self.nodes_allocated;
        }
        Ok(id)
    }

    /// Returns `id` to the free list. Callers must only do this once the
    /// node's `ref_count` has reached zero.
    pub(crate) fn free_small(&mut self, id: SmallNodeId) {
        let node = &mut self.small[id.0 as usize];
        node.free_next = self.free_head;
        self.free_head = Some(id);
        self.nodes_allocated = self.nodes_allocated.saturating_sub(1);
    }

    /// Allocates one large-node block. Callers reserve exactly one large
    /// node per tree at tree-init time; large nodes live for the lifetime
    /// of the tree and are never returned to a free list.
    pub(crate) fn alloc_large(&mut self) -> Result<usize, LpmError> {
        if self.large_in_use < self.large.len() {
            let idx = self.large_in_use;
            self.large_in_use += 1;
            Ok(idx)
        } else {
            Err(LpmError::ArenaExhausted)
        }
    }

    pub(crate) fn ref_count(&self, id: SmallNodeId) -> u32 {
        self.small[id.0 as usize].ref_count
    }

    pub(crate) fn inc_ref(&mut self, id: SmallNodeId) {
        self.small[id.0 as usize].ref_count += 1;
    }

    /// Decrements `id`'s ref count, freeing it back to the free list the
    /// moment the count reaches zero, and returns the new value.
    pub(crate) fn dec_ref(&mut self, id: SmallNodeId) -> u32 {
        let node = &mut self.small[id.0 as usize];
        node.ref_count = node.ref_count.saturating_sub(1);
        let new_count = node.ref_count;
        if new_count == 0 {
            self.free_small(id);
        }
        new_count
    }

    /// Reads one entry through a [`NodeRef`], regardless of whether it
    /// names the large root or a small interior node.
    pub(crate) fn entry(&self, node: NodeRef, index: usize) -> Ipv4Entry<D> {
        match node {
            NodeRef::Large(idx) => self.large[idx].entries[index],
            NodeRef::Small(id) => self.small[id.0 as usize].entries[index],
        }
    }

    pub(crate) fn set_entry(&mut self, node: NodeRef, index: usize, entry: Ipv4Entry<D>) {
        match node {
            NodeRef::Large(idx) => self.large[idx].entries[index] = entry,
            NodeRef::Small(id) => self.small[id.0 as usize].entries[index] = entry,
        }
    }

    pub(crate) fn node_size(&self, node: NodeRef) -> usize {
        match node {
            NodeRef::Large(_) => LARGE_ENTRIES,
            NodeRef::Small(_) => SMALL_ENTRIES,
        }
    }

    pub(crate) fn inc_ref_node(&mut self, node: NodeRef) {
        match node {
            NodeRef::Large(idx) => self.large[idx].ref_count += 1,
            NodeRef::Small(id) => self.inc_ref(id),
        }
    }

    /// Decrements `node`'s ref count and returns the new value. The root
    /// (large) node is never freed regardless of the count it reaches.
    pub(crate) fn dec_ref_node(&mut self, node: NodeRef) -> u32 {
        match node {
            NodeRef::Large(idx) => {
                let n = &mut self.large[idx];
                n.ref_count = n.ref_count.saturating_sub(1);
                n.ref_count
            }
            NodeRef::Small(id) => self.dec_ref(id),
        }
    }

    pub(crate) fn ref_count_node(&self, node: NodeRef) -> u32 {
        match node {
            NodeRef::Large(idx) => self.large[idx].ref_count,
            NodeRef::Small(id) => self.ref_count(id),
        }
    }
}
