pub mod allocator;
pub mod arena;
pub mod coalesce;
pub mod fsa;
pub mod large;
pub mod platform;
#[cfg(feature = "stats")]
pub mod stats;
pub mod util;

pub use allocator::MemoryAllocator;
pub use arena::InitError;
