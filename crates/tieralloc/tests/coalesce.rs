//! Coalesce-tier behavior: round-trips, neighbor merging in both orders,
//! best-fit selection, double-free handling and region lifecycle.

use tieralloc::MemoryAllocator;

fn initialized() -> MemoryAllocator {
    let mut allocator = MemoryAllocator::new();
    allocator.init().expect("allocator init failed");
    allocator
}

// ---------------------------------------------------------------------------
// Round-trip through the coalesce tier with full pattern fills
// ---------------------------------------------------------------------------

#[test]
fn coalesce_round_trip() {
    let mut a = initialized();
    let sizes = [1024usize, 8192, 32768, 65536];
    let mut blocks = Vec::new();
    let primed_regions = a.used_regions();

    unsafe {
        for &size in &sizes {
            let block = a.alloc(size);
            assert!(!block.is_null(), "alloc({}) returned null", size);
            core::ptr::write_bytes(block, 0xCC, size);
            assert_eq!(block.read(), 0xCC);
            assert_eq!(block.add(size - 1).read(), 0xCC);
            blocks.push(block);
        }

        for &block in blocks.iter().rev() {
            a.free(block);
        }

        // The freed space satisfies the largest request again without
        // commissioning another region.
        let again = a.alloc(65536);
        assert!(!again.is_null());
        assert_eq!(a.used_regions(), primed_regions);
        a.free(again);
    }

    let stats = a.statistics();
    assert_eq!(stats.coalesce_alloc_count, sizes.len() + 1);
    assert_eq!(stats.total_allocations, stats.total_frees);
    assert_eq!(stats.current_allocated, 0);
    a.destroy();
}

// ---------------------------------------------------------------------------
// Merging two physically adjacent blocks, in either free order, yields one
// contiguous block of the summed size -- observed by the follow-up
// allocation landing exactly on the merged block
// ---------------------------------------------------------------------------

unsafe fn merge_scenario(a: &mut MemoryAllocator, free_lower_first: bool) {
    // Four uniform small-region blocks come off the sorted free list at
    // descending adjacent addresses: a0 > b > c > d.
    let a0 = a.alloc(4096);
    let b = a.alloc(4096);
    let c = a.alloc(4096);
    let d = a.alloc(4096);
    assert!(!a0.is_null() && !b.is_null() && !c.is_null() && !d.is_null());

    let spacing = a0 as usize - b as usize;
    assert_eq!(spacing, b as usize - c as usize, "blocks are not adjacent");
    assert_eq!(spacing, c as usize - d as usize, "blocks are not adjacent");

    // b and c sit between two allocated guards (a0 above, d below), so the
    // merge may only combine the two of them.
    if free_lower_first {
        a.free(c);
        a.free(b);
    } else {
        a.free(b);
        a.free(c);
    }

    // A request for the exact summed payload can only be satisfied by the
    // merged block, and must land on the lower block's address.
    let merged = a.alloc(spacing + 4096);
    assert_eq!(
        merged, c,
        "adjacent free blocks did not merge into one contiguous block"
    );

    a.free(merged);
    a.free(a0);
    a.free(d);
}

#[test]
fn adjacent_blocks_merge_freeing_upper_first() {
    let mut a = initialized();
    unsafe {
        merge_scenario(&mut a, false);
    }
    let stats = a.statistics();
    assert_eq!(stats.total_allocations, stats.total_frees);
    a.destroy();
}

#[test]
fn adjacent_blocks_merge_freeing_lower_first() {
    let mut a = initialized();
    unsafe {
        merge_scenario(&mut a, true);
    }
    let stats = a.statistics();
    assert_eq!(stats.total_allocations, stats.total_frees);
    a.destroy();
}

// ---------------------------------------------------------------------------
// Best fit picks the smallest satisfying block: a split remainder beats the
// pristine larger blocks
// ---------------------------------------------------------------------------

#[test]
fn best_fit_prefers_smallest_satisfying_block() {
    let mut a = initialized();

    unsafe {
        // Soak up the medium region's odd-sized trailing block so the
        // remaining free list holds only uniform blocks.
        let trailing = a.alloc(49152);
        assert!(!trailing.is_null());

        // Splits one uniform block, leaving a remainder in the same span.
        let m = a.alloc(32768);
        assert!(!m.is_null());

        // The remainder is the smallest block that satisfies this request;
        // best fit must choose it over the untouched larger blocks, which
        // places the result inside the block `m` came from.
        let p = a.alloc(20000);
        assert!(!p.is_null());
        let offset = p as usize - m as usize;
        assert!(
            offset > 0 && offset < 66_000,
            "best fit ignored the split remainder (offset {})",
            offset
        );

        a.free(p);
        a.free(m);
        a.free(trailing);
    }

    let stats = a.statistics();
    assert_eq!(stats.total_allocations, stats.total_frees);
    a.destroy();
}

// ---------------------------------------------------------------------------
// Double free of a coalesce block is a no-op; free-then-alloc of the same
// size may hand the same address back intact
// ---------------------------------------------------------------------------

#[test]
fn double_free_is_noop() {
    let mut a = initialized();

    unsafe {
        // Allocated guards on both sides keep the middle block unmerged.
        let x = a.alloc(4096);
        let y = a.alloc(4096);
        let z = a.alloc(4096);
        assert!(!x.is_null() && !y.is_null() && !z.is_null());

        a.free(y);
        let after_first = a.statistics();

        a.free(y); // double free: no-op
        let after_second = a.statistics();
        assert_eq!(after_first, after_second);

        // The freed block is the best fit for the same request; headers
        // survived the free/alloc cycle.
        let y2 = a.alloc(4096);
        assert_eq!(y2, y);
        core::ptr::write_bytes(y2, 0x5A, 4096);
        assert_eq!(y2.add(4095).read(), 0x5A);

        a.free(y2);
        a.free(z);
        a.free(x);
    }

    let stats = a.statistics();
    assert_eq!(stats.total_allocations, stats.total_frees);
    a.destroy();
}

// ---------------------------------------------------------------------------
// Regions are commissioned lazily up to the slot table, then allocation
// fails; freeing makes the space servable again
// ---------------------------------------------------------------------------

#[test]
fn region_slots_exhaust_and_recover() {
    let mut a = initialized();
    let size = 9 * 1024 * 1024; // three per LARGE region, no split
    let mut live = Vec::new();

    unsafe {
        loop {
            let p = a.alloc(size);
            if p.is_null() {
                break;
            }
            live.push(p);
            assert!(live.len() < 1000, "allocation never exhausted");
        }

        // Every slot is commissioned and none can serve another request.
        assert_eq!(a.used_regions(), 16);
        assert!(!live.is_empty());

        for &p in &live {
            a.free(p);
        }

        // Merged space serves the same request again without new slots.
        let p = a.alloc(size);
        assert!(!p.is_null());
        assert_eq!(a.used_regions(), 16);
        a.free(p);
    }

    let stats = a.statistics();
    assert_eq!(stats.total_allocations, stats.total_frees);
    assert_eq!(stats.current_allocated, 0);
    a.destroy();
}
