//! Utilities used by other modules, including allocators, heap management, metadata, etc.

/// An abstract of memory address and object reference.
pub mod address;
/// Allocators
pub mod alloc;
/// Constants used in MMTk
pub mod constants;
/// Calculation, conversion and rounding for memory related numbers.
pub mod conversions;
/// Heap layout, the block pool and the GC trigger.
pub mod heap;
/// Logger initialization
pub mod logger;
/// Manual allocation outside the heap, optionally counted in the heap usage.
pub mod malloc;
/// Mapping, committing and zeroing memory.
pub mod memory;
/// Per-object metadata kept on the side of the heap.
pub mod metadata;
/// Forwarding addresses of moved objects.
pub mod object_forwarding;
/// Opaque pointers and thread handles of the host.
pub mod opaque_pointer;
/// MMTk command line options.
pub mod options;
/// Helpers missing from the standard library.
pub(crate) mod rust_util;

/// Finalization
pub(crate) mod finalizable_processor;
/// Liveness queries for weak references.
pub(crate) mod reference_processor;
/// Verifying the heap after a collection.
pub(crate) mod sanity {
    pub(crate) mod sanity_checker;
}

#[cfg(test)]
pub mod test_util;

pub use self::address::Address;
pub use self::address::ObjectReference;
pub use self::opaque_pointer::*;
