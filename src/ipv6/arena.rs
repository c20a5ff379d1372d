//! The IPv6 node pool: a pre-reserved flat pool of binary trie nodes
//! threaded into a doubly-linked free list through the same `left`/`right`
//! fields a live node uses for its children.

use crate::error::LpmError;
use crate::next_hop::NextHop;

/// Identifies a node within [`Ipv6Arena`]'s pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct Ipv6NodeId(u32);

struct Ipv6Node<D> {
    left: Option<Ipv6NodeId>,
    right: Option<Ipv6NodeId>,
    valid_data: bool,
    data: D,
}

impl<D: NextHop> Default for Ipv6Node<D> {
    fn default() -> Self {
        Ipv6Node {
            left: None,
            right: None,
            valid_data: false,
            data: D::default(),
        }
    }
}

pub(crate) struct Ipv6Arena<D> {
    nodes: Vec<Ipv6Node<D>>,
    free_head: Option<Ipv6NodeId>,
    nodes_allocated: u32,
    max_nodes_allocated: u32,
}

impl<D: NextHop> Ipv6Arena<D> {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity);
        for i in 0..capacity {
            nodes.push(Ipv6Node {
                left: if i == 0 {
                    None
                } else {
                    Some(Ipv6NodeId((i - 1) as u32))
                },
                right: if i + 1 < capacity {
                    Some(Ipv6NodeId((i + 1) as u32))
                } else {
                    None
                },
                valid_data: false,
                data: D::default(),
            });
        }
        let free_head = if capacity > 0 {
            Some(Ipv6NodeId(0))
        } else {
            None
        };
        Ipv6Arena {
            nodes,
            free_head,
            nodes_allocated: 0,
            max_nodes_allocated: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn nodes_allocated(&self) -> u32 {
        self.nodes_allocated
    }

    pub(crate) fn max_nodes_allocated(&self) -> u32 {
        self.max_nodes_allocated
    }

    /// Pops the free-list head, zeroes it, and returns its id.
    pub(crate) fn alloc(&mut self) -> Result<Ipv6NodeId, LpmError> {
        let id = self.free_head.ok_or(LpmError::ArenaExhausted)?;
        let next_head = self.nodes[id.0 as usize].right;
        if let Some(new_head) = next_head {
            self.nodes[new_head.0 as usize].left = None;
        }
        self.free_head = next_head;

        let node = &mut self.nodes[id.0 as usize];
        node.left = None;
        node.right = None;
        node.valid_data = false;
        node.data = D::default();

        self.nodes_allocated += 1;
        if self.nodes_allocated > self.max_nodes_allocated {
            self.max_nodes_allocated = self.nodes_allocated;
        }
        Ok(id)
    }

    /// Pushes `id` onto the head of the free list, patching the old head's
    /// back-link.
    pub(crate) fn free(&mut self, id: Ipv6NodeId) {
        let old_head = self.free_head;
        {
            let node = &mut self.nodes[id.0 as usize];
            node.left = None;
            node.right = old_head;
        }
        if let Some(head) = old_head {
            self.nodes[head.0 as usize].left = Some(id);
        }
        self.free_head = Some(id);
        self.nodes_allocated = self.nodes_allocated.saturating_sub(1);
    }

    pub(crate) fn left(&self, id: Ipv6NodeId) -> Option<Ipv6NodeId> {
        self.nodes[id.0 as usize].left
    }

    pub(crate) fn right(&self, id: Ipv6NodeId) -> Option<Ipv6NodeId> {
        self.nodes[id.0 as usize].right
    }

    pub(crate) fn child(&self, id: Ipv6NodeId, bit: bool) -> Option<Ipv6NodeId> {
        if bit {
            self.right(id)
        } else {
            self.left(id)
        }
    }

    pub(crate) fn set_child(&mut self, id: Ipv6NodeId, bit: bool, child: Option<Ipv6NodeId>) {
        let node = &mut self.nodes[id.0 as usize];
        if bit {
            node.right = child;
        } else {
            node.left = child;
        }
    }

    pub(crate) fn has_valid_data(&self, id: Ipv6NodeId) -> bool {
        self.nodes[id.0 as usize].valid_data
    }

    pub(crate) fn data(&self, id: Ipv6NodeId) -> D {
        self.nodes[id.0 as usize].data
    }

    pub(crate) fn set_data(&mut self, id: Ipv6NodeId, data: D) {
        let node = &mut self.nodes[id.0 as usize];
        node.valid_data = true;
        node.data = data;
    }

    pub(crate) fn clear_valid_data(&mut self, id: Ipv6NodeId) {
        self.nodes[id.0 as usize].valid_data = false;
    }
}
