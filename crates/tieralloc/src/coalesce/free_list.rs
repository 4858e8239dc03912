use crate::coalesce::block::BlockHeader;
use crate::util::{ALIGNMENT, MEDIUM_REGION_MAX, SMALL_REGION_MAX};
use core::ptr;

/// Metadata record linking a free block into one of the three segregated
/// lists. Nodes live in the bump pool, never on the host heap, and are only
/// ever unlinked -- the pool does not reclaim them individually.
#[repr(C)]
pub struct FreeNode {
    pub next: *mut FreeNode,
    pub prev: *mut FreeNode,
    pub header: *mut BlockHeader,
    pub list_index: usize,
}

const _: () = assert!(core::mem::size_of::<FreeNode>() % ALIGNMENT == 0);
const _: () = assert!(core::mem::align_of::<FreeNode>() == ALIGNMENT);

/// Free list index for a user-visible size: 0 for SMALL, 1 for MEDIUM,
/// 2 for LARGE.
#[inline]
pub const fn list_index_for(size: usize) -> usize {
    if size <= SMALL_REGION_MAX {
        0
    } else if size <= MEDIUM_REGION_MAX {
        1
    } else {
        2
    }
}

/// The three coalesce free lists. `heads` points at the head slots carved
/// into the arena's metadata area, so the lists themselves never touch the
/// host heap.
///
/// Each list is kept sorted ascending by `current_size`, which turns the
/// best-fit scan into an early-exit walk.
pub struct FreeLists {
    heads: *mut *mut FreeNode,
}

impl FreeLists {
    /// # Safety
    /// `heads` must point to `COALESCE_LISTS_COUNT` writable, null-initialized
    /// head slots that outlive this value.
    pub unsafe fn new(heads: *mut *mut FreeNode) -> Self {
        FreeLists { heads }
    }

    /// # Safety
    /// `list_index` must be a valid list index.
    #[inline]
    pub unsafe fn head(&self, list_index: usize) -> *mut FreeNode {
        *self.heads.add(list_index)
    }

    /// Unlink `node` from its list and clear the block's back-reference.
    ///
    /// # Safety
    /// `node` must be null or currently linked into the list recorded in its
    /// `list_index`.
    pub unsafe fn remove(&self, node: *mut FreeNode) {
        if node.is_null() {
            return;
        }

        let list_index = (*node).list_index;

        if !(*node).prev.is_null() {
            (*(*node).prev).next = (*node).next;
        } else {
            *self.heads.add(list_index) = (*node).next;
        }

        if !(*node).next.is_null() {
            (*(*node).next).prev = (*node).prev;
        }

        (*node).prev = ptr::null_mut();
        (*node).next = ptr::null_mut();

        if !(*node).header.is_null() {
            (*(*node).header).free_node = ptr::null_mut();
        }
    }

    /// Link `node` into `list_index`, keeping the list sorted ascending by
    /// block size, and point the block back at its node.
    ///
    /// # Safety
    /// `node` must be unlinked and its `header` must point to a valid free
    /// block header.
    pub unsafe fn insert_sorted(&self, node: *mut FreeNode, list_index: usize) {
        if node.is_null() || (*node).header.is_null() {
            return;
        }

        (*node).list_index = list_index;
        let node_size = (*(*node).header).current_size;

        let head = self.heads.add(list_index);
        let mut current = *head;
        let mut prev: *mut FreeNode = ptr::null_mut();

        while !current.is_null()
            && !(*current).header.is_null()
            && (*(*current).header).current_size < node_size
        {
            prev = current;
            current = (*current).next;
        }

        if !prev.is_null() {
            (*prev).next = node;
        } else {
            *head = node;
        }

        (*node).prev = prev;
        (*node).next = current;

        if !current.is_null() {
            (*current).prev = node;
        }

        (*(*node).header).free_node = node;
    }

    /// Smallest free block in `list_index` whose total size satisfies
    /// `total_size`, or null. The list is sorted, so the first satisfying
    /// node is the best fit.
    ///
    /// # Safety
    /// `list_index` must be a valid list index.
    pub unsafe fn best_fit(&self, total_size: usize, list_index: usize) -> *mut BlockHeader {
        let mut current = *self.heads.add(list_index);

        while !current.is_null() {
            let header = (*current).header;
            if !header.is_null() && (*header).is_free && (*header).current_size >= total_size {
                return header;
            }
            current = (*current).next;
        }

        ptr::null_mut()
    }

    /// Number of nodes currently linked into `list_index`.
    ///
    /// # Safety
    /// `list_index` must be a valid list index.
    pub unsafe fn len(&self, list_index: usize) -> usize {
        let mut count = 0;
        let mut current = *self.heads.add(list_index);
        while !current.is_null() {
            count += 1;
            current = (*current).next;
        }
        count
    }
}
