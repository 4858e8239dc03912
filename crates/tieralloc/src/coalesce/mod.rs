pub mod block;
pub mod free_list;
pub mod node_pool;
pub mod region;

use crate::arena::ArenaLayout;
use crate::util::{
    align_down, align_up, is_aligned, ALIGNMENT, COALESCE_LISTS_COUNT, LARGE_ALLOC_THRESHOLD,
    REGION_COUNT_BY_TYPE,
};
use block::{BlockHeader, HEADER_SIZE};
use core::ptr;
use free_list::{list_index_for, FreeLists};
use node_pool::NodePool;
use region::{Region, RegionManager, RegionType};

/// Boundary-tag best-fit allocator over the arena's region pool. Serves
/// every request below `LARGE_ALLOC_THRESHOLD` that the FSA tier declined,
/// splitting blocks on allocation and merging physical neighbors on free.
pub struct CoalesceTier {
    lists: FreeLists,
    nodes: NodePool,
    regions: RegionManager,
}

/// Block size the carve cascade targets for a region of `region_type` with
/// `remaining` bytes left: SMALL and MEDIUM carve uniformly, LARGE walks a
/// descending preference ladder.
fn carve_block_size(region_type: RegionType, remaining: usize) -> usize {
    match region_type {
        RegionType::Small => align_up(4 * 1024 + HEADER_SIZE, ALIGNMENT),
        RegionType::Medium => align_up(64 * 1024 + HEADER_SIZE, ALIGNMENT),
        RegionType::Large => {
            let ladder = [
                10 * 1024 * 1024,
                5 * 1024 * 1024,
                2 * 1024 * 1024,
                1024 * 1024,
            ];
            for step in ladder {
                let candidate = align_up(step + HEADER_SIZE, ALIGNMENT);
                if remaining >= candidate {
                    return candidate;
                }
            }
            align_up(512 * 1024 + HEADER_SIZE, ALIGNMENT)
        }
    }
}

impl CoalesceTier {
    /// Build the tier over an arena layout. Call `prime` before serving
    /// requests.
    ///
    /// # Safety
    /// `layout` must come from a successful `ArenaLayout::reserve` and
    /// outlive this value.
    pub unsafe fn new(layout: &ArenaLayout) -> Self {
        CoalesceTier {
            lists: FreeLists::new(layout.free_lists),
            nodes: NodePool::new(layout.nodes, layout.max_nodes),
            regions: RegionManager::new(
                layout.regions,
                layout.usable,
                layout.usable_size,
                layout.region_pool_offset,
            ),
        }
    }

    /// Commission one region of each type so the first requests of every
    /// class find a populated list. False when the arena cannot hold them.
    pub unsafe fn prime(&mut self) -> bool {
        for i in 0..REGION_COUNT_BY_TYPE {
            let region = self.regions.allocate(RegionType::from_index(i));
            if region.is_null() {
                return false;
            }
            self.initialize_region(region);
        }
        true
    }

    /// Whether `ptr` falls inside any commissioned region.
    pub unsafe fn contains(&self, ptr_val: *mut u8) -> bool {
        self.regions.contains(ptr_val)
    }

    /// Allocate `size` user bytes. Null when no list and no fresh region can
    /// satisfy the request.
    pub unsafe fn allocate(&mut self, size: usize) -> *mut u8 {
        if size >= LARGE_ALLOC_THRESHOLD {
            return ptr::null_mut();
        }

        let total_size = align_up(size + HEADER_SIZE, ALIGNMENT);
        let region_type = RegionType::for_size(size);
        let list_index = region_type as usize;

        let mut best_fit = self.find_fit(total_size, list_index);

        if best_fit.is_null() {
            let region = self.regions.allocate(region_type);
            if region.is_null() {
                return ptr::null_mut();
            }
            self.initialize_region(region);
            best_fit = self.find_fit(total_size, list_index);
        }

        if best_fit.is_null() {
            return ptr::null_mut();
        }

        if !(*best_fit).free_node.is_null() {
            self.lists.remove((*best_fit).free_node);
            (*best_fit).free_node = ptr::null_mut();
        }
        (*best_fit).is_free = false;

        let remaining = (*best_fit).current_size - total_size;
        if remaining >= HEADER_SIZE + ALIGNMENT {
            let min_split = if region_type == RegionType::Large {
                align_up(1024 * 1024 + HEADER_SIZE, ALIGNMENT)
            } else {
                align_up(4 * 1024 + HEADER_SIZE, ALIGNMENT)
            };
            if remaining >= min_split {
                let leftover = align_down(remaining, ALIGNMENT);
                self.split(best_fit, total_size, leftover, remaining);
            }
        }

        let result = BlockHeader::user_ptr(best_fit);
        debug_assert!(is_aligned(result as usize, ALIGNMENT));
        result
    }

    /// Free the block whose payload is `ptr`, merging it with free physical
    /// neighbors. Returns the freed block's user bytes, or 0 for null,
    /// out-of-region, and already-free pointers (nothing is mutated in
    /// those cases).
    pub unsafe fn free(&mut self, ptr_val: *mut u8) -> usize {
        if ptr_val.is_null() {
            return 0;
        }

        let mut block = BlockHeader::from_user_ptr(ptr_val);
        let region = self.regions.region_for_ptr(block as *mut u8);
        if region.is_null() {
            return 0;
        }
        if (*block).is_free {
            return 0;
        }
        // A header swallowed by an earlier merge is zeroed; a stale pointer
        // into it is not a live block.
        if (*block).current_size < HEADER_SIZE + ALIGNMENT {
            return 0;
        }

        let user_size = (*block).current_size - HEADER_SIZE;
        (*block).is_free = true;

        let prev = BlockHeader::prev_of(block);
        if !prev.is_null() && BlockHeader::in_region(prev, region) && (*prev).is_free {
            if !(*prev).free_node.is_null() {
                self.lists.remove((*prev).free_node);
            }
            self.merge(prev, block, region);
            block = prev;
        }

        let next = BlockHeader::next_in_region(block, region);
        if !next.is_null() && (*next).is_free {
            if !(*next).free_node.is_null() {
                self.lists.remove((*next).free_node);
            }
            self.merge(block, next, region);
        }

        let node = self.nodes.allocate();
        if !node.is_null() {
            (*node).header = block;
            let list_index = list_index_for((*block).current_size - HEADER_SIZE);
            self.lists.insert_sorted(node, list_index);
        }

        user_size
    }

    /// Best fit in the class list, falling through to the larger-class lists.
    unsafe fn find_fit(&self, total_size: usize, list_index: usize) -> *mut BlockHeader {
        let mut best_fit = self.lists.best_fit(total_size, list_index);
        let mut i = list_index + 1;
        while best_fit.is_null() && i < COALESCE_LISTS_COUNT {
            best_fit = self.lists.best_fit(total_size, i);
            i += 1;
        }
        best_fit
    }

    /// Cut the tail of `block` into a new free block at the high address.
    /// The allocated block keeps the unusable tail `remaining - leftover` so
    /// the new header lands 8-byte aligned.
    unsafe fn split(
        &mut self,
        block: *mut BlockHeader,
        total_size: usize,
        leftover: usize,
        remaining: usize,
    ) {
        if leftover < HEADER_SIZE + ALIGNMENT {
            return;
        }
        if self.nodes.is_exhausted() {
            return;
        }

        (*block).current_size = total_size + (remaining - leftover);

        let new_addr = (block as *mut u8).add((*block).current_size);
        debug_assert!(is_aligned(new_addr as usize, ALIGNMENT));

        let new_block = new_addr as *mut BlockHeader;
        new_block.write(BlockHeader {
            current_size: leftover,
            prev_size: (*block).current_size,
            free_node: ptr::null_mut(),
            is_free: true,
        });

        let region = self.regions.region_for_ptr(block as *mut u8);
        if !region.is_null() {
            let next = BlockHeader::next_in_region(new_block, region);
            if !next.is_null() {
                (*next).prev_size = leftover;
            }
        }

        let node = self.nodes.allocate();
        if !node.is_null() {
            (*node).header = new_block;
            let list_index = list_index_for(leftover - HEADER_SIZE);
            self.lists.insert_sorted(node, list_index);
        }
    }

    /// Fold `second` into `first`. The swallowed header is zeroed and its
    /// node unlinked; the next physical block's `prev_size` is patched.
    unsafe fn merge(&mut self, first: *mut BlockHeader, second: *mut BlockHeader, region: *mut Region) {
        let first_end = (first as *mut u8).add((*first).current_size);
        if first_end != second as *mut u8 {
            return;
        }

        (*first).current_size += (*second).current_size;

        let next = BlockHeader::next_in_region(first, region);
        if !next.is_null() {
            (*next).prev_size = (*first).current_size;
        }

        (*second).current_size = 0;
        (*second).prev_size = 0;
        (*second).is_free = false;
        if !(*second).free_node.is_null() {
            self.lists.remove((*second).free_node);
            (*second).free_node = ptr::null_mut();
        }
    }

    /// Carve a fresh region into free blocks by the split-size schedule and
    /// index every block. A dry node pool stops the carve, leaving the rest
    /// of the region un-indexed.
    unsafe fn initialize_region(&mut self, region: *mut Region) {
        if region.is_null() {
            return;
        }

        let region_type = (*region).region_type;
        let mut current = (*region).start;
        if !is_aligned(current as usize, ALIGNMENT) {
            current = align_up(current as usize, ALIGNMENT) as *mut u8;
        }

        let mut remaining = (*region).end as usize - current as usize;
        let mut prev_block_size = 0usize;
        let five_mib = align_up(5 * 1024 * 1024 + HEADER_SIZE, ALIGNMENT);

        while remaining > HEADER_SIZE + ALIGNMENT {
            let target = carve_block_size(region_type, remaining);
            let block_size = if target <= remaining {
                target
            } else {
                align_up(remaining, ALIGNMENT)
            };
            if block_size < HEADER_SIZE + ALIGNMENT {
                break;
            }
            if !self.place_free_block(current, block_size, prev_block_size) {
                return;
            }

            prev_block_size = block_size;
            current = current.add(block_size);
            remaining -= block_size;

            // LARGE regions stop descending once the ladder bottoms out:
            // everything left becomes one trailing block.
            if region_type == RegionType::Large
                && prev_block_size >= five_mib
                && remaining < five_mib
                && remaining >= HEADER_SIZE + ALIGNMENT
            {
                let last_block_size = align_up(remaining, ALIGNMENT);
                self.place_free_block(current, last_block_size, prev_block_size);
                return;
            }
        }

        if remaining >= HEADER_SIZE + ALIGNMENT {
            let block_size = align_up(remaining, ALIGNMENT);
            self.place_free_block(current, block_size, prev_block_size);
        }
    }

    /// Write a free block header at `memory` and link it into its list.
    /// False when the node pool is exhausted (the header is written but the
    /// block stays unreachable).
    unsafe fn place_free_block(
        &mut self,
        memory: *mut u8,
        block_size: usize,
        prev_block_size: usize,
    ) -> bool {
        let block = memory as *mut BlockHeader;
        block.write(BlockHeader {
            current_size: block_size,
            prev_size: prev_block_size,
            free_node: ptr::null_mut(),
            is_free: true,
        });

        let node = self.nodes.allocate();
        if node.is_null() {
            return false;
        }

        (*node).header = block;
        let list_index = list_index_for(block_size - HEADER_SIZE);
        self.lists.insert_sorted(node, list_index);
        true
    }

    // ------------------------------------------------------------------
    // Introspection for statistics and dumps
    // ------------------------------------------------------------------

    pub unsafe fn used_regions(&self) -> usize {
        self.regions.used_count()
    }

    pub unsafe fn used_regions_of(&self, region_type: RegionType) -> usize {
        self.regions.used_count_of(region_type)
    }

    pub unsafe fn free_list_len(&self, list_index: usize) -> usize {
        self.lists.len(list_index)
    }

    pub fn nodes_used(&self) -> usize {
        self.nodes.used()
    }

    pub fn nodes_capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Walk every commissioned region, printing each block's address, total
    /// size, free flag and `prev_size`.
    #[cfg(feature = "stats")]
    pub unsafe fn dump_blocks(&self) {
        use crate::util::MAX_REGIONS;

        println!("=== Coalesce Allocator Blocks ===");

        for i in 0..MAX_REGIONS {
            let region = self.regions.get(i);
            if !(*region).is_used {
                continue;
            }

            println!(
                "Region {} [{}] ({:p} - {:p}):",
                i,
                (*region).region_type.name(),
                (*region).start,
                (*region).end
            );

            let mut current = (*region).start;
            let mut block_num = 0usize;
            while current < (*region).end {
                let block = current as *mut BlockHeader;
                println!(
                    "  Block {}: addr={:p}, size={}, free={}, prev_size={}",
                    block_num,
                    block,
                    (*block).current_size,
                    if (*block).is_free { "yes" } else { "no" },
                    (*block).prev_size
                );
                block_num += 1;
                if (*block).current_size == 0 {
                    break;
                }
                current = current.add((*block).current_size);
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carve_schedule_small_medium_uniform() {
        let small = carve_block_size(RegionType::Small, 32 * 1024 * 1024);
        let medium = carve_block_size(RegionType::Medium, 32 * 1024 * 1024);
        assert_eq!(small, align_up(4 * 1024 + HEADER_SIZE, ALIGNMENT));
        assert_eq!(medium, align_up(64 * 1024 + HEADER_SIZE, ALIGNMENT));
        // The schedule ignores `remaining` for uniform classes.
        assert_eq!(carve_block_size(RegionType::Small, 8192), small);
    }

    #[test]
    fn carve_schedule_large_descends() {
        let mib = 1024 * 1024;
        let with_header = |n: usize| align_up(n + HEADER_SIZE, ALIGNMENT);

        assert_eq!(
            carve_block_size(RegionType::Large, 32 * mib),
            with_header(10 * mib)
        );
        assert_eq!(
            carve_block_size(RegionType::Large, 6 * mib),
            with_header(5 * mib)
        );
        assert_eq!(
            carve_block_size(RegionType::Large, 3 * mib),
            with_header(2 * mib)
        );
        assert_eq!(
            carve_block_size(RegionType::Large, mib + HEADER_SIZE),
            with_header(mib)
        );
        // Below the ladder the fallback step applies even if it overshoots;
        // the carve loop then clamps to the remaining bytes.
        assert_eq!(
            carve_block_size(RegionType::Large, mib / 2),
            with_header(512 * 1024)
        );
    }
}
