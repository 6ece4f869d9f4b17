//! Various allocators implementation.

/// The allocator trait and the error kinds crossing the boundary.
pub(crate) mod allocator;
pub use allocator::align_allocation;
pub use allocator::AllocationError;
pub use allocator::Allocator;

/// A list of all the allocators, embedded in Mutator
pub(crate) mod allocators;
pub use allocators::AllocatorInfo;
pub use allocators::AllocatorSelector;
pub use allocators::Allocators;

/// Bump pointer allocator
mod bumpallocator;
pub use bumpallocator::{BumpAllocator, BumpTarget};

mod large_object_allocator;
pub use large_object_allocator::LargeObjectAllocator;
