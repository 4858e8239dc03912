use crate::coalesce::free_list::FreeNode;
use core::ptr;

/// Bump allocator over the free-node array carved into the arena's metadata
/// area. Monotonic: `allocate` hands out the next slot, nothing is ever
/// returned. An exhausted pool degrades split/coalesce quality (callers skip
/// node creation) but never corrupts block headers.
pub struct NodePool {
    nodes: *mut FreeNode,
    capacity: usize,
    used: usize,
}

impl NodePool {
    /// # Safety
    /// `nodes` must point to `capacity` writable `FreeNode` slots that
    /// outlive this value.
    pub unsafe fn new(nodes: *mut FreeNode, capacity: usize) -> Self {
        NodePool {
            nodes,
            capacity,
            used: 0,
        }
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.capacity
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next node with all fields reset, or null when the pool is exhausted.
    pub unsafe fn allocate(&mut self) -> *mut FreeNode {
        if self.used >= self.capacity {
            return ptr::null_mut();
        }

        let node = self.nodes.add(self.used);
        self.used += 1;

        (*node).next = ptr::null_mut();
        (*node).prev = ptr::null_mut();
        (*node).header = ptr::null_mut();
        (*node).list_index = 0;

        node
    }
}
