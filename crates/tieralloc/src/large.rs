//! Pass-through tier: requests at or above `LARGE_ALLOC_THRESHOLD` never
//! touch the arena and are forwarded verbatim to the host allocator.
//!
//! Stats builds keep a side registry mapping the returned pointer to its
//! aligned size so the dispatcher can balance the byte counters on free.
//! Without the `stats` feature a pass-through pointer is indistinguishable
//! from a foreign pointer; both are handed to the host `free`.

#[cfg(feature = "stats")]
use std::collections::HashMap;

pub struct PassthroughTier {
    #[cfg(feature = "stats")]
    registry: HashMap<usize, usize>,
}

impl PassthroughTier {
    pub fn new() -> Self {
        PassthroughTier {
            #[cfg(feature = "stats")]
            registry: HashMap::new(),
        }
    }

    /// Forward `size` bytes to the host allocator, registering the result.
    ///
    /// # Safety
    /// `size` must be non-zero.
    pub unsafe fn alloc(&mut self, size: usize) -> *mut u8 {
        let ptr = libc::malloc(size) as *mut u8;

        #[cfg(feature = "stats")]
        if !ptr.is_null() {
            self.registry.insert(ptr as usize, size);
        }

        ptr
    }

    /// Forward `ptr` to the host `free`. Returns the registered size when
    /// the pointer was a tracked pass-through allocation.
    ///
    /// # Safety
    /// `ptr` must be null, a pass-through allocation, or a pointer the host
    /// allocator owns.
    pub unsafe fn free(&mut self, ptr: *mut u8) -> Option<usize> {
        #[cfg(feature = "stats")]
        let registered = self.registry.remove(&(ptr as usize));
        #[cfg(not(feature = "stats"))]
        let registered: Option<usize> = None;

        libc::free(ptr as *mut libc::c_void);
        registered
    }
}

impl Default for PassthroughTier {
    fn default() -> Self {
        Self::new()
    }
}
