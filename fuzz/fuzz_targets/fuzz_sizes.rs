#![no_main]

use libfuzzer_sys::fuzz_target;
use std::cell::RefCell;
use tieralloc::MemoryAllocator;

// Fuzz target that exercises size boundaries and alignment.
// Interprets input as a series of u32 sizes, allocates each, writes to the
// full extent, verifies alignment and content, and frees.

thread_local! {
    static ALLOCATOR: RefCell<MemoryAllocator> = RefCell::new(MemoryAllocator::new());
}

fuzz_target!(|data: &[u8]| {
    ALLOCATOR.with(|cell| {
        let mut allocator = cell.borrow_mut();
        if allocator.init().is_err() {
            return;
        }

        let mut i = 0;
        while i + 4 <= data.len() {
            let raw_size = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
            i += 4;

            // Cap to keep pass-through traffic reasonable (16 MiB crosses
            // the large threshold, so every tier still gets hit).
            let size = (raw_size as usize) % (16 * 1024 * 1024);

            let ptr = unsafe { allocator.alloc(size) };
            if size == 0 {
                assert!(ptr.is_null(), "alloc(0) must return null");
                continue;
            }
            if ptr.is_null() {
                continue; // exhaustion is a valid outcome
            }

            assert_eq!(
                ptr as usize % 8,
                0,
                "alloc({}) returned unaligned pointer {:p}",
                size,
                ptr
            );

            // Write to full extent -- this must not trap.
            unsafe {
                std::ptr::write_bytes(ptr, 0xBB, size);
            }

            // Spot-check the extremes.
            unsafe {
                assert_eq!(*ptr, 0xBB);
                assert_eq!(*ptr.add(size - 1), 0xBB);
            }

            unsafe { allocator.free(ptr) };
        }
    });
});
