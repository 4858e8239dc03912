/// Allocation counters, maintained only in stats builds. Per-tier counts
/// are cumulative successes; `current_allocated` tracks the bytes each tier
/// actually dedicated to live allocations and `peak_allocated` its
/// high-water mark.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub total_allocations: usize,
    pub total_frees: usize,
    pub fsa_alloc_count: usize,
    pub coalesce_alloc_count: usize,
    pub large_alloc_count: usize,
    pub current_allocated: usize,
    pub peak_allocated: usize,
}

impl Statistics {
    pub fn record_allocation(&mut self, bytes: usize) {
        self.total_allocations += 1;
        self.current_allocated += bytes;
        if self.current_allocated > self.peak_allocated {
            self.peak_allocated = self.current_allocated;
        }
    }

    pub fn record_free(&mut self, bytes: usize) {
        self.total_frees += 1;
        self.current_allocated = self.current_allocated.saturating_sub(bytes);
    }
}
