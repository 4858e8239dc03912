use crate::coalesce::free_list::FreeNode;
use crate::coalesce::region::Region;
use crate::platform;
use crate::util::{
    align_up, ALIGNMENT, COALESCE_LISTS_COUNT, FSA_ARENA_SIZE, MAX_REGIONS, PAGE_SIZE,
    TOTAL_VIRTUAL_MEMORY,
};
use core::fmt;
use core::mem;
use core::ptr;

/// Why `init` refused to bring the allocator up. Deliberately `Copy` and
/// heap-free: an allocator cannot allocate to report failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The running system's page size is not the 4 KiB the layout assumes.
    PageSizeMismatch { system: usize },
    /// The OS declined the virtual-memory reservation.
    ReservationFailed,
    /// The metadata carve did not fit inside the reservation.
    LayoutOverflow,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::PageSizeMismatch { system } => write!(
                f,
                "system page size {} does not match the required {}",
                system, PAGE_SIZE
            ),
            InitError::ReservationFailed => {
                write!(f, "failed to reserve {} bytes of virtual memory", TOTAL_VIRTUAL_MEMORY)
            }
            InitError::LayoutOverflow => write!(f, "arena metadata layout does not fit"),
        }
    }
}

impl std::error::Error for InitError {}

/// The single contiguous reservation, carved. Guard pages sit on the first
/// and last page; everything between them is, in order: the region
/// descriptor table, the coalesce free-list heads, the free-node pool, the
/// FSA arena, and the pool of region slots.
///
/// All pointers reference the interior of the one mapping; dropping the
/// layout does not unmap (destruction is explicit via `release`).
pub struct ArenaLayout {
    base: *mut u8,
    /// First byte past the head guard page.
    pub usable: *mut u8,
    /// Bytes between the guard pages.
    pub usable_size: usize,
    /// `MAX_REGIONS` inert region descriptors.
    pub regions: *mut Region,
    /// `COALESCE_LISTS_COUNT` null-initialized list heads.
    pub free_lists: *mut *mut FreeNode,
    /// Bump pool of free nodes, zero-initialized by the fresh mapping.
    pub nodes: *mut FreeNode,
    pub max_nodes: usize,
    pub fsa_start: *mut u8,
    pub fsa_end: *mut u8,
    /// Offset (from `usable`) where the region pool begins.
    pub region_pool_offset: usize,
}

impl ArenaLayout {
    /// Reserve and carve the arena. On any failure the reservation is gone
    /// and nothing leaks.
    pub fn reserve() -> Result<ArenaLayout, InitError> {
        let system = platform::system_page_size();
        if system != PAGE_SIZE {
            return Err(InitError::PageSizeMismatch { system });
        }

        unsafe {
            let base = platform::map_anonymous(TOTAL_VIRTUAL_MEMORY);
            if base.is_null() {
                return Err(InitError::ReservationFailed);
            }

            // Head and tail guard pages: any stray dereference past either
            // end of the arena traps instead of corrupting neighbors.
            platform::protect_none(base, PAGE_SIZE);
            platform::protect_none(base.add(TOTAL_VIRTUAL_MEMORY - PAGE_SIZE), PAGE_SIZE);

            let usable = base.add(PAGE_SIZE);
            let usable_size = TOTAL_VIRTUAL_MEMORY - PAGE_SIZE * 2;
            let mut offset = 0usize;

            offset = align_up(offset, ALIGNMENT);
            let regions = usable.add(offset) as *mut Region;
            offset += MAX_REGIONS * mem::size_of::<Region>();
            for i in 0..MAX_REGIONS {
                regions.add(i).write(Region::inert());
            }

            offset = align_up(offset, ALIGNMENT);
            let free_lists = usable.add(offset) as *mut *mut FreeNode;
            offset += COALESCE_LISTS_COUNT * mem::size_of::<*mut FreeNode>();
            for i in 0..COALESCE_LISTS_COUNT {
                free_lists.add(i).write(ptr::null_mut());
            }

            if offset >= usable_size {
                platform::unmap(base, TOTAL_VIRTUAL_MEMORY);
                return Err(InitError::LayoutOverflow);
            }

            // A tenth of the arena indexes free blocks; the floor keeps tiny
            // configurations workable.
            let nodes_memory = usable_size / 10;
            let mut max_nodes = nodes_memory / mem::size_of::<FreeNode>();
            if max_nodes < 10_000 {
                max_nodes = 10_000;
            }

            offset = align_up(offset, ALIGNMENT);
            let nodes = usable.add(offset) as *mut FreeNode;
            offset += max_nodes * mem::size_of::<FreeNode>();

            let fsa_size = align_up(FSA_ARENA_SIZE, PAGE_SIZE);
            offset = align_up(offset, ALIGNMENT);
            if offset + fsa_size > usable_size {
                platform::unmap(base, TOTAL_VIRTUAL_MEMORY);
                return Err(InitError::LayoutOverflow);
            }

            let fsa_start = usable.add(offset);
            let fsa_end = fsa_start.add(fsa_size);
            offset += fsa_size;

            let region_pool_offset = align_up(offset, ALIGNMENT);

            Ok(ArenaLayout {
                base,
                usable,
                usable_size,
                regions,
                free_lists,
                nodes,
                max_nodes,
                fsa_start,
                fsa_end,
                region_pool_offset,
            })
        }
    }

    /// Unmap the whole reservation, guard pages included.
    ///
    /// # Safety
    /// No pointer into the arena may be used afterwards.
    pub unsafe fn release(&self) {
        platform::unmap(self.base, TOTAL_VIRTUAL_MEMORY);
    }
}
