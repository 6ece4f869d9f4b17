//! Manual allocation outside the heap, with the library malloc.
//!
//! Each function has two versions:
//! * a plain version, with the signature of the C library function;
//! * a counted version, which adds the bytes to the used bytes of an MMTk instance. The caller
//!   passes the sizes back when it reallocates or frees, so the count stays balanced.
//!
//! Counted bytes are part of [`crate::memory_manager::used_bytes`], and count against the heap
//! size when deciding whether to collect.

use crate::util::Address;
use crate::MMTK;

/// Allocate memory. Similar to libc's malloc.
pub fn malloc(size: usize) -> Address {
    Address::from_mut_ptr(unsafe { libc::malloc(size) })
}

/// Allocate memory, and count it into the heap of `mmtk`.
pub fn counted_malloc(mmtk: &MMTK, size: usize) -> Address {
    let res = malloc(size);
    if !res.is_zero() {
        mmtk.get_plan().increase_malloc_bytes_by(size);
    }
    res
}

/// Allocate zeroed memory for `num` elements of `size` bytes. Similar to libc's calloc.
pub fn calloc(num: usize, size: usize) -> Address {
    Address::from_mut_ptr(unsafe { libc::calloc(num, size) })
}

/// Allocate zeroed memory, and count it into the heap of `mmtk`.
pub fn counted_calloc(mmtk: &MMTK, num: usize, size: usize) -> Address {
    let res = calloc(num, size);
    if !res.is_zero() {
        mmtk.get_plan().increase_malloc_bytes_by(num * size);
    }
    res
}

/// Resize an allocation. Similar to libc's realloc.
pub fn realloc(addr: Address, size: usize) -> Address {
    Address::from_mut_ptr(unsafe { libc::realloc(addr.to_mut_ptr(), size) })
}

/// Resize a counted allocation of `old_size` bytes. If the call fails, `addr` is still allocated
/// and the count is unchanged.
pub fn realloc_with_old_size(mmtk: &MMTK, addr: Address, size: usize, old_size: usize) -> Address {
    let res = realloc(addr, size);
    if size != 0 && res.is_zero() {
        return res;
    }
    let plan = mmtk.get_plan();
    if !addr.is_zero() {
        plan.decrease_malloc_bytes_by(old_size);
    }
    if size != 0 {
        plan.increase_malloc_bytes_by(size);
    }
    res
}

/// Free memory returned by this module. Similar to libc's free.
pub fn free(addr: Address) {
    unsafe { libc::free(addr.to_mut_ptr()) }
}

/// Free a counted allocation of `old_size` bytes.
pub fn free_with_size(mmtk: &MMTK, addr: Address, old_size: usize) {
    free(addr);
    if !addr.is_zero() {
        mmtk.get_plan().decrease_malloc_bytes_by(old_size);
    }
}
