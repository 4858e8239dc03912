#![no_main]

use libfuzzer_sys::fuzz_target;
use std::cell::RefCell;
use tieralloc::MemoryAllocator;

/// Fuzz target that interprets a byte slice as a sequence of allocator
/// operations.
///
/// Each operation is encoded as:
///   byte 0: opcode (bit 0: 0=alloc, 1=free; bit 2 scales the size up so
///           large-region and pass-through paths get traffic)
///   byte 1-2: size (little-endian u16)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// We track up to 64 live pointers. One allocator instance lives for the
/// whole fuzz session; every run returns it to an empty state.
const MAX_SLOTS: usize = 64;

thread_local! {
    static ALLOCATOR: RefCell<MemoryAllocator> = RefCell::new(MemoryAllocator::new());
}

fuzz_target!(|data: &[u8]| {
    ALLOCATOR.with(|cell| {
        let mut allocator = cell.borrow_mut();
        if allocator.init().is_err() {
            return;
        }

        let mut slots: [*mut u8; MAX_SLOTS] = [std::ptr::null_mut(); MAX_SLOTS];
        let mut sizes: [usize; MAX_SLOTS] = [0; MAX_SLOTS];

        let mut i = 0;
        while i + 4 <= data.len() {
            let opcode = data[i];
            let mut size = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize;
            if opcode & 0x04 != 0 {
                size <<= 8;
            }
            let slot = (data[i + 3] as usize) % MAX_SLOTS;
            i += 4;

            if opcode & 0x01 == 0 {
                // alloc
                if !slots[slot].is_null() {
                    unsafe { allocator.free(slots[slot]) };
                }
                let ptr = unsafe { allocator.alloc(size) };
                slots[slot] = ptr;
                sizes[slot] = size;
                if size == 0 {
                    assert!(ptr.is_null(), "alloc(0) must return null");
                }
                if !ptr.is_null() {
                    assert_eq!(ptr as usize % 8, 0, "misaligned pointer for size {}", size);
                    unsafe {
                        std::ptr::write_bytes(ptr, 0xAA, std::cmp::min(size, 256));
                    }
                }
            } else {
                // free
                if !slots[slot].is_null() {
                    // The pattern must still be there: blocks may never
                    // alias while live.
                    let check = std::cmp::min(sizes[slot], 256);
                    for j in 0..check {
                        assert_eq!(
                            unsafe { *slots[slot].add(j) },
                            0xAA,
                            "live block corrupted at offset {}",
                            j
                        );
                    }
                    unsafe { allocator.free(slots[slot]) };
                    slots[slot] = std::ptr::null_mut();
                    sizes[slot] = 0;
                }
            }
        }

        // Cleanup
        for slot in &mut slots {
            if !slot.is_null() {
                unsafe { allocator.free(*slot) };
                *slot = std::ptr::null_mut();
            }
        }
    });
});
