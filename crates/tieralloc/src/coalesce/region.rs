use crate::util::{
    ALIGNMENT, MAX_REGIONS, MEDIUM_REGION_MAX, REGION_SIZE, SMALL_REGION_MAX,
};
use core::ptr;

/// Size class of a coalesce region. Doubles as the free-list index for the
/// class (SMALL = 0, MEDIUM = 1, LARGE = 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RegionType {
    Small = 0,
    Medium,
    Large,
}

impl RegionType {
    /// Region type that serves a user-visible request of `size` bytes.
    #[inline]
    pub const fn for_size(size: usize) -> RegionType {
        if size <= SMALL_REGION_MAX {
            RegionType::Small
        } else if size <= MEDIUM_REGION_MAX {
            RegionType::Medium
        } else {
            RegionType::Large
        }
    }

    pub const fn from_index(index: usize) -> RegionType {
        match index {
            0 => RegionType::Small,
            1 => RegionType::Medium,
            _ => RegionType::Large,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RegionType::Small => "SMALL",
            RegionType::Medium => "MEDIUM",
            RegionType::Large => "LARGE",
        }
    }
}

/// One slot of the region descriptor table. Created inert at init,
/// commissioned on demand, never decommissioned.
#[repr(C)]
pub struct Region {
    pub start: *mut u8,
    pub end: *mut u8,
    pub is_used: bool,
    pub region_type: RegionType,
}

const _: () = assert!(core::mem::size_of::<Region>() % ALIGNMENT == 0);

impl Region {
    pub const fn inert() -> Region {
        Region {
            start: ptr::null_mut(),
            end: ptr::null_mut(),
            is_used: false,
            region_type: RegionType::Small,
        }
    }
}

/// Hands out `REGION_SIZE` windows of the arena's region pool to descriptor
/// slots, and answers pointer-to-region queries.
pub struct RegionManager {
    regions: *mut Region,
    usable: *mut u8,
    usable_size: usize,
    next_offset: usize,
}

impl RegionManager {
    /// # Safety
    /// `regions` must point to `MAX_REGIONS` initialized descriptors inside
    /// the arena; `usable` and `usable_size` must describe the guarded
    /// reservation's interior; `first_offset` is where the region pool
    /// starts within it.
    pub unsafe fn new(
        regions: *mut Region,
        usable: *mut u8,
        usable_size: usize,
        first_offset: usize,
    ) -> Self {
        RegionManager {
            regions,
            usable,
            usable_size,
            next_offset: first_offset,
        }
    }

    /// Commission the first inert slot with the next region window.
    /// Null when every slot is used or the arena is out of space.
    pub unsafe fn allocate(&mut self, region_type: RegionType) -> *mut Region {
        for i in 0..MAX_REGIONS {
            let region = self.regions.add(i);
            if (*region).is_used {
                continue;
            }

            if self.next_offset + REGION_SIZE > self.usable_size {
                return ptr::null_mut();
            }

            (*region).start = self.usable.add(self.next_offset);
            (*region).end = (*region).start.add(REGION_SIZE);
            (*region).is_used = true;
            (*region).region_type = region_type;

            self.next_offset += REGION_SIZE;
            return region;
        }
        ptr::null_mut()
    }

    /// Descriptor of the active region containing `ptr`, or null.
    pub unsafe fn region_for_ptr(&self, ptr_val: *mut u8) -> *mut Region {
        for i in 0..MAX_REGIONS {
            let region = self.regions.add(i);
            if (*region).is_used && ptr_val >= (*region).start && ptr_val < (*region).end {
                return region;
            }
        }
        ptr::null_mut()
    }

    /// Whether `ptr` falls inside any active region.
    pub unsafe fn contains(&self, ptr_val: *mut u8) -> bool {
        !self.region_for_ptr(ptr_val).is_null()
    }

    /// Descriptor at `index`, active or not.
    ///
    /// # Safety
    /// `index` must be below `MAX_REGIONS`.
    #[inline]
    pub unsafe fn get(&self, index: usize) -> *mut Region {
        self.regions.add(index)
    }

    /// Number of commissioned regions.
    pub unsafe fn used_count(&self) -> usize {
        let mut count = 0;
        for i in 0..MAX_REGIONS {
            if (*self.regions.add(i)).is_used {
                count += 1;
            }
        }
        count
    }

    /// Number of commissioned regions of `region_type`.
    pub unsafe fn used_count_of(&self, region_type: RegionType) -> usize {
        let mut count = 0;
        for i in 0..MAX_REGIONS {
            let region = self.regions.add(i);
            if (*region).is_used && (*region).region_type == region_type {
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_for_size_boundaries() {
        assert_eq!(RegionType::for_size(1), RegionType::Small);
        assert_eq!(RegionType::for_size(SMALL_REGION_MAX), RegionType::Small);
        assert_eq!(RegionType::for_size(SMALL_REGION_MAX + 1), RegionType::Medium);
        assert_eq!(RegionType::for_size(MEDIUM_REGION_MAX), RegionType::Medium);
        assert_eq!(RegionType::for_size(MEDIUM_REGION_MAX + 1), RegionType::Large);
    }

    #[test]
    fn from_index_round_trip() {
        for i in 0..3 {
            assert_eq!(RegionType::from_index(i) as usize, i);
        }
    }

    #[test]
    fn slots_exhaust_on_table_and_space() {
        // A descriptor table over a 3-region pool: the fourth commission
        // fails on space, not on slots. The pool bytes are reserved but
        // never touched.
        let mut table: Vec<Region> = (0..MAX_REGIONS).map(|_| Region::inert()).collect();
        let mut pool: Vec<u8> = Vec::with_capacity(3 * REGION_SIZE);
        let usable = pool.as_mut_ptr();
        let mut manager =
            unsafe { RegionManager::new(table.as_mut_ptr(), usable, 3 * REGION_SIZE, 0) };

        unsafe {
            for i in 0..3 {
                let region = manager.allocate(RegionType::Small);
                assert!(!region.is_null());
                assert_eq!((*region).start, usable.add(i * REGION_SIZE));
                assert_eq!((*region).end, usable.add((i + 1) * REGION_SIZE));
            }
            assert!(manager.allocate(RegionType::Small).is_null());
            assert_eq!(manager.used_count(), 3);
            assert_eq!(manager.used_count_of(RegionType::Small), 3);
            assert_eq!(manager.used_count_of(RegionType::Large), 0);
        }
    }
}
