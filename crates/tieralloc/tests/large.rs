//! Pass-through tier behavior: the 10 MiB boundary, host round-trips and
//! foreign pointers.

use tieralloc::MemoryAllocator;

const MIB: usize = 1024 * 1024;

fn initialized() -> MemoryAllocator {
    let mut allocator = MemoryAllocator::new();
    allocator.init().expect("allocator init failed");
    allocator
}

// ---------------------------------------------------------------------------
// Oversized requests round-trip through the host allocator
// ---------------------------------------------------------------------------

#[test]
fn large_passthrough_round_trip() {
    let mut a = initialized();

    unsafe {
        let first = a.alloc(11 * MIB);
        let second = a.alloc(20 * MIB);
        assert!(!first.is_null());
        assert!(!second.is_null());

        core::ptr::write_bytes(first, 0x11, 4096);
        core::ptr::write_bytes(second, 0x22, 4096);
        assert_eq!(first.read(), 0x11);
        assert_eq!(first.add(4095).read(), 0x11);
        assert_eq!(second.read(), 0x22);
        assert_eq!(second.add(4095).read(), 0x22);

        let stats = a.statistics();
        assert_eq!(stats.large_alloc_count, 2);
        assert_eq!(stats.total_allocations, 2);

        a.free(first);
        a.free(second);
    }

    let stats = a.statistics();
    assert_eq!(stats.large_alloc_count, 2, "per-tier counts are cumulative");
    assert_eq!(stats.total_frees, 2);
    assert_eq!(stats.current_allocated, 0);
    a.destroy();
}

// ---------------------------------------------------------------------------
// The threshold itself goes to pass-through; just below it stays in-arena
// ---------------------------------------------------------------------------

#[test]
fn tier_boundary_at_threshold() {
    let mut a = initialized();

    unsafe {
        let over = a.alloc(10 * MIB);
        assert!(!over.is_null());
        let stats = a.statistics();
        assert_eq!(stats.large_alloc_count, 1);
        assert_eq!(stats.coalesce_alloc_count, 0);

        let under = a.alloc(10 * MIB - 16);
        assert!(!under.is_null());
        let stats = a.statistics();
        assert_eq!(stats.large_alloc_count, 1);
        assert_eq!(stats.coalesce_alloc_count, 1);

        a.free(over);
        a.free(under);
    }

    let stats = a.statistics();
    assert_eq!(stats.total_frees, 2);
    assert_eq!(stats.current_allocated, 0);
    a.destroy();
}

// ---------------------------------------------------------------------------
// A pointer the allocator never produced is forwarded to the host free
// ---------------------------------------------------------------------------

#[test]
fn foreign_pointer_forwards_to_host() {
    let mut a = initialized();

    unsafe {
        let foreign = libc::malloc(128) as *mut u8;
        assert!(!foreign.is_null());

        // Must not crash, must not disturb the counters; the host allocator
        // reclaims the memory.
        a.free(foreign);
    }

    let stats = a.statistics();
    assert_eq!(stats.total_frees, 0);
    assert_eq!(stats.total_allocations, 0);
    a.destroy();
}
