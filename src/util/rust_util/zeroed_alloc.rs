//! Allocation of large vectors whose initial values are all zero.
//!
//! `vec![AtomicUsize::new(0); n]` does not compile, and building such a vector element by element
//! touches every page up front. The side bitmaps cover the whole reserved heap, which can be
//! gigabytes of address space, so we ask the allocator for pre-zeroed memory instead and let the
//! OS hand out pages lazily.
use std::alloc::{alloc_zeroed, handle_alloc_error, Layout};

/// Allocate a `Vec<T>` of all-zero values, with the given length and capacity.
///
/// # Safety
///
/// No constructor of `T` is called. The caller must ensure that a value with all bits being zero
/// is meaningful for type `T`.
pub(crate) unsafe fn new_zeroed_vec<T>(size: usize) -> Vec<T> {
    if size == 0 || std::mem::size_of::<T>() == 0 {
        return Vec::new();
    }
    let layout = match Layout::array::<T>(size) {
        Ok(layout) => layout,
        Err(e) => panic!("Cannot allocate a zeroed vec of {} elements: {}", size, e),
    };
    let ptr = alloc_zeroed(layout) as *mut T;
    if ptr.is_null() {
        handle_alloc_error(layout);
    }
    Vec::from_raw_parts(ptr, size, size)
}
