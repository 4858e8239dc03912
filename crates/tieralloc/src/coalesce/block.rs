use crate::coalesce::free_list::FreeNode;
use crate::coalesce::region::Region;
use crate::util::ALIGNMENT;
use core::ptr;

/// Boundary-tag header prefixed to every coalesce block. The user payload
/// starts at `header + HEADER_SIZE` and is 8-byte aligned.
///
/// `prev_size` is the `current_size` of the physically previous block, or 0
/// for the first block of a region -- it is what makes backward merging
/// possible without a footer.
#[repr(C)]
pub struct BlockHeader {
    /// Total bytes of this block, header included.
    pub current_size: usize,
    /// Total bytes of the physically previous block, 0 if first in region.
    pub prev_size: usize,
    /// Back-reference into the free list while the block is free, else null.
    pub free_node: *mut FreeNode,
    pub is_free: bool,
}

pub const HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);
const _: () = assert!(core::mem::align_of::<BlockHeader>() == ALIGNMENT);

impl BlockHeader {
    /// Header of the block whose payload starts at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be a payload pointer previously produced by `user_ptr`.
    #[inline(always)]
    pub unsafe fn from_user_ptr(ptr: *mut u8) -> *mut BlockHeader {
        ptr.sub(HEADER_SIZE) as *mut BlockHeader
    }

    /// Payload pointer of `block`.
    ///
    /// # Safety
    /// `block` must point to a valid header.
    #[inline(always)]
    pub unsafe fn user_ptr(block: *mut BlockHeader) -> *mut u8 {
        (block as *mut u8).add(HEADER_SIZE)
    }

    /// The physically next block within `region`, or null when `block` is
    /// the last one.
    ///
    /// # Safety
    /// `block` must be a valid header inside `region`.
    pub unsafe fn next_in_region(block: *mut BlockHeader, region: *mut Region) -> *mut BlockHeader {
        if block.is_null() || region.is_null() {
            return ptr::null_mut();
        }
        let block_end = (block as *mut u8).add((*block).current_size);
        if block_end >= (*region).end {
            return ptr::null_mut();
        }
        block_end as *mut BlockHeader
    }

    /// The physically previous block, or null when `prev_size` is 0.
    ///
    /// # Safety
    /// `block` must be a valid header whose `prev_size` is either 0 or the
    /// size of a live neighbor header.
    #[inline]
    pub unsafe fn prev_of(block: *mut BlockHeader) -> *mut BlockHeader {
        if (*block).prev_size == 0 {
            return ptr::null_mut();
        }
        (block as *mut u8).sub((*block).prev_size) as *mut BlockHeader
    }

    /// Whether the header address falls inside `region`.
    ///
    /// # Safety
    /// `region` must point to a valid descriptor.
    #[inline]
    pub unsafe fn in_region(block: *mut BlockHeader, region: *mut Region) -> bool {
        let p = block as *mut u8;
        p >= (*region).start && p < (*region).end
    }
}
