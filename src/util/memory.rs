use crate::util::constants::BYTES_IN_PAGE;
use crate::util::conversions::raw_align_up;
use crate::util::Address;
use libc::{PROT_NONE, PROT_READ, PROT_WRITE};
use std::io::{Error, Result};

/// Reserve `size` bytes of address space aligned to `align`, without backing memory.
/// The range is inaccessible until it is [`commit`]ted. Returns the start of the range.
pub fn reserve_aligned(size: usize, align: usize) -> Result<Address> {
    debug_assert!(align.is_power_of_two() && align >= BYTES_IN_PAGE);
    let size = raw_align_up(size, BYTES_IN_PAGE);
    // Over-reserve and trim, so the start can be aligned.
    let padded = size + align;
    let flags = libc::MAP_ANON | libc::MAP_PRIVATE | libc::MAP_NORESERVE;
    let ret = unsafe { libc::mmap(std::ptr::null_mut(), padded, PROT_NONE, flags, -1, 0) };
    if ret == libc::MAP_FAILED {
        return Err(Error::last_os_error());
    }
    let raw = Address::from_mut_ptr(ret);
    let start = raw.align_up(align);
    let end = start + size;
    let raw_end = raw + padded;
    if start > raw {
        munmap(raw, start - raw)?;
    }
    if raw_end > end {
        munmap(end, raw_end - end)?;
    }
    Ok(start)
}

/// Make a reserved range readable and writable. Fresh pages read as zero.
pub fn commit(start: Address, size: usize) -> Result<()> {
    wrap_libc_call(
        &|| unsafe { libc::mprotect(start.to_mut_ptr(), size, PROT_READ | PROT_WRITE) },
        0,
    )
}

/// Give the physical pages of a committed range back to the OS and make the range
/// inaccessible again. The address space stays reserved.
pub fn decommit(start: Address, size: usize) -> Result<()> {
    wrap_libc_call(
        &|| unsafe { libc::madvise(start.to_mut_ptr(), size, libc::MADV_DONTNEED) },
        0,
    )?;
    wrap_libc_call(
        &|| unsafe { libc::mprotect(start.to_mut_ptr(), size, PROT_NONE) },
        0,
    )
}

/// Release a range of address space.
pub fn munmap(start: Address, size: usize) -> Result<()> {
    wrap_libc_call(&|| unsafe { libc::munmap(start.to_mut_ptr(), size) }, 0)
}

/// Fill a committed range with zeros.
pub fn zero(start: Address, len: usize) {
    unsafe { std::ptr::write_bytes(start.to_mut_ptr::<u8>(), 0, len) }
}

fn wrap_libc_call<T: PartialEq>(f: &dyn Fn() -> T, expect: T) -> Result<()> {
    let ret = f();
    if ret == expect {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}
