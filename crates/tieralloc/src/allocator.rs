use crate::arena::{ArenaLayout, InitError};
use crate::coalesce::CoalesceTier;
use crate::fsa::{self, FsaTier};
use crate::large::PassthroughTier;
use crate::util::{align_up, is_aligned, ALIGNMENT, FSA_SIZES_COUNT, LARGE_ALLOC_THRESHOLD};
use core::ptr;

#[cfg(feature = "stats")]
use crate::coalesce::block::{BlockHeader, HEADER_SIZE};
#[cfg(feature = "stats")]
use crate::coalesce::region::RegionType;
#[cfg(feature = "stats")]
use crate::stats::Statistics;
#[cfg(feature = "stats")]
use crate::util::{COALESCE_LISTS_COUNT, MAX_REGIONS, SMALL_REGION_MAX};

struct AllocatorInner {
    layout: ArenaLayout,
    fsa: FsaTier,
    coalesce: CoalesceTier,
    passthrough: PassthroughTier,
    #[cfg(feature = "stats")]
    stats: Statistics,
}

/// The allocator front door. One explicitly constructed value owns the
/// whole arena; there is no hidden process-global instance.
///
/// `alloc` aligns the request and picks a tier: FSA for small sizes,
/// the coalesce tier below `LARGE_ALLOC_THRESHOLD`, the host allocator
/// above it. `free` classifies the pointer back to its tier by address
/// range.
///
/// The type holds raw pointers into its arena and is deliberately neither
/// `Send` nor `Sync`: every operation runs to completion on one thread.
/// A concurrency wrapper is a separate layer.
pub struct MemoryAllocator {
    inner: Option<AllocatorInner>,
}

impl MemoryAllocator {
    pub const fn new() -> Self {
        MemoryAllocator { inner: None }
    }

    /// Reserve the arena, carve the metadata, thread the FSA pools and
    /// prime one coalesce region of each type. Idempotent: a second call on
    /// an initialized instance is a no-op `Ok`.
    ///
    /// On failure nothing stays mapped and the instance remains
    /// uninitialized.
    pub fn init(&mut self) -> Result<(), InitError> {
        if self.inner.is_some() {
            return Ok(());
        }

        let layout = ArenaLayout::reserve()?;

        unsafe {
            let fsa = FsaTier::new(layout.fsa_start, layout.fsa_end);
            let mut coalesce = CoalesceTier::new(&layout);
            if !coalesce.prime() {
                layout.release();
                return Err(InitError::LayoutOverflow);
            }

            self.inner = Some(AllocatorInner {
                layout,
                fsa,
                coalesce,
                passthrough: PassthroughTier::new(),
                #[cfg(feature = "stats")]
                stats: Statistics::default(),
            });
        }

        Ok(())
    }

    /// Unmap the arena and reset to the uninitialized state. Safe to call
    /// on an uninitialized instance. Stats builds report a leak warning
    /// when allocations and frees do not balance.
    pub fn destroy(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };

        #[cfg(feature = "stats")]
        if inner.stats.total_allocations != inner.stats.total_frees {
            eprintln!(
                "WARNING: memory leak detected: fsa_allocs={} coalesce_allocs={} large_allocs={} still_allocated={} bytes",
                inner.stats.fsa_alloc_count,
                inner.stats.coalesce_alloc_count,
                inner.stats.large_alloc_count,
                inner.stats.current_allocated
            );
        }

        unsafe {
            inner.layout.release();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Allocate `size` bytes, 8-byte aligned. Null for `size == 0` and when
    /// every eligible tier is exhausted.
    ///
    /// # Safety
    /// The instance must stay alive (and not be destroyed) for as long as
    /// the returned pointer is used.
    pub unsafe fn alloc(&mut self, size: usize) -> *mut u8 {
        let Some(inner) = self.inner.as_mut() else {
            debug_assert!(false, "allocator is not initialized");
            return ptr::null_mut();
        };

        if size == 0 {
            return ptr::null_mut();
        }

        let aligned_size = align_up(size, ALIGNMENT);

        let result = if aligned_size < LARGE_ALLOC_THRESHOLD {
            let class = fsa::size_class(aligned_size);
            let mut result = ptr::null_mut();

            if class < FSA_SIZES_COUNT {
                result = inner.fsa.alloc(class);
                #[cfg(feature = "stats")]
                if !result.is_null() {
                    inner.stats.fsa_alloc_count += 1;
                    inner.stats.record_allocation(crate::util::FSA_SIZES[class]);
                }
            }

            if result.is_null() {
                result = inner.coalesce.allocate(aligned_size);
                #[cfg(feature = "stats")]
                if !result.is_null() {
                    inner.stats.coalesce_alloc_count += 1;
                    let block = BlockHeader::from_user_ptr(result);
                    inner.stats.record_allocation((*block).current_size - HEADER_SIZE);
                }
            }

            result
        } else {
            let result = inner.passthrough.alloc(aligned_size);
            #[cfg(feature = "stats")]
            if !result.is_null() {
                inner.stats.large_alloc_count += 1;
                inner.stats.record_allocation(aligned_size);
            }
            result
        };

        debug_assert!(is_aligned(result as usize, ALIGNMENT));
        result
    }

    /// Release `ptr`. Null is a no-op. Pointers outside the FSA arena and
    /// every region are forwarded to the host `free`; without the `stats`
    /// feature a pass-through allocation and a foreign pointer cannot be
    /// told apart, and both take that path.
    ///
    /// # Safety
    /// `ptr` must be null, a live pointer from `alloc`, or a pointer owned
    /// by the host allocator. No access through `ptr` may happen afterwards.
    pub unsafe fn free(&mut self, ptr_val: *mut u8) {
        let Some(inner) = self.inner.as_mut() else {
            debug_assert!(false, "allocator is not initialized");
            return;
        };

        if ptr_val.is_null() {
            return;
        }

        if inner.fsa.contains(ptr_val) {
            match inner.fsa.free(ptr_val) {
                Some(_block_size) => {
                    #[cfg(feature = "stats")]
                    inner.stats.record_free(_block_size);
                }
                None => debug_assert!(false, "FSA arena pointer landed in no pool"),
            }
        } else if inner.coalesce.contains(ptr_val) {
            let _freed = inner.coalesce.free(ptr_val);
            #[cfg(feature = "stats")]
            if _freed != 0 {
                inner.stats.record_free(_freed);
            }
        } else {
            let _registered = inner.passthrough.free(ptr_val);
            #[cfg(feature = "stats")]
            if let Some(bytes) = _registered {
                inner.stats.record_free(bytes);
            }
        }
    }

    /// Snapshot of the counters. Zeroed for an uninitialized instance.
    #[cfg(feature = "stats")]
    pub fn statistics(&self) -> Statistics {
        self.inner
            .as_ref()
            .map(|inner| inner.stats)
            .unwrap_or_default()
    }

    /// Number of commissioned coalesce regions.
    #[cfg(feature = "stats")]
    pub fn used_regions(&self) -> usize {
        self.inner
            .as_ref()
            .map(|inner| unsafe { inner.coalesce.used_regions() })
            .unwrap_or(0)
    }

    /// Print aggregate counters, region usage, per-pool FSA occupancy,
    /// per-list free-block counts and node-pool usage.
    #[cfg(feature = "stats")]
    pub fn dump_stat(&self) {
        let Some(inner) = self.inner.as_ref() else {
            println!("Allocator not initialized");
            return;
        };

        let stats = &inner.stats;
        println!("=== Memory Allocator Statistics ===");
        println!("Total allocations: {}", stats.total_allocations);
        println!("Total frees: {}", stats.total_frees);
        println!("Current allocated: {} bytes", stats.current_allocated);
        println!("Peak allocated: {} bytes", stats.peak_allocated);
        println!("FSA allocations: {}", stats.fsa_alloc_count);
        println!("Coalesce allocations: {}", stats.coalesce_alloc_count);
        println!("Large allocations: {}", stats.large_alloc_count);

        unsafe {
            println!();
            println!("Region Usage:");
            println!(
                "  Total used: {}/{}",
                inner.coalesce.used_regions(),
                MAX_REGIONS
            );
            println!(
                "  Small regions (<={}KB): {}",
                SMALL_REGION_MAX / 1024,
                inner.coalesce.used_regions_of(RegionType::Small)
            );
            println!(
                "  Medium regions (<=1MB): {}",
                inner.coalesce.used_regions_of(RegionType::Medium)
            );
            println!(
                "  Large regions (<=10MB): {}",
                inner.coalesce.used_regions_of(RegionType::Large)
            );

            println!();
            println!("FSA Pool Usage:");
            for pool in inner.fsa.pools() {
                let total = pool.total_blocks();
                let usage = pool.used_blocks() as f64 / total as f64 * 100.0;
                println!(
                    "  Size {} bytes: {}/{} blocks ({:.1}%)",
                    pool.block_size,
                    pool.used_blocks(),
                    total,
                    usage
                );
            }

            println!();
            println!("Coalesce Free Lists:");
            let list_names = ["Small (<=10KB)", "Medium (<=1MB)", "Large (<=10MB)"];
            for (i, name) in list_names.iter().enumerate().take(COALESCE_LISTS_COUNT) {
                println!("  {}: {} free blocks", name, inner.coalesce.free_list_len(i));
            }

            println!();
            println!(
                "Free nodes: {}/{} used ({:.1}%)",
                inner.coalesce.nodes_used(),
                inner.coalesce.nodes_capacity(),
                inner.coalesce.nodes_used() as f64 / inner.coalesce.nodes_capacity() as f64
                    * 100.0
            );
        }
        println!();
    }

    /// Walk every active region and print its blocks.
    #[cfg(feature = "stats")]
    pub fn dump_blocks(&self) {
        let Some(inner) = self.inner.as_ref() else {
            println!("Allocator not initialized");
            return;
        };
        unsafe {
            inner.coalesce.dump_blocks();
        }
    }

    #[cfg(not(feature = "stats"))]
    pub fn dump_stat(&self) {}

    #[cfg(not(feature = "stats"))]
    pub fn dump_blocks(&self) {}
}

impl Default for MemoryAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryAllocator {
    fn drop(&mut self) {
        self.destroy();
    }
}
