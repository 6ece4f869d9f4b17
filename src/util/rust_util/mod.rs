//! Workarounds for things the standard library does not provide.

pub(crate) mod zeroed_alloc;
