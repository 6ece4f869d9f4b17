//! Thread handles the host passes in, and gets back in upcalls.

use crate::util::Address;
use libc::c_void;

/// A host pointer that the collector stores and hands back, but never reads through.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct OpaquePointer(*mut c_void);

// The pointee is never accessed on our side.
unsafe impl Sync for OpaquePointer {}
unsafe impl Send for OpaquePointer {}

impl OpaquePointer {
    /// A null pointer, for threads the host has not told us about yet.
    pub const UNINITIALIZED: Self = Self(std::ptr::null_mut());

    pub fn from_address(addr: Address) -> Self {
        OpaquePointer(addr.to_mut_ptr::<c_void>())
    }
}

/// Identifies a host thread. The host chooses the representation (a thread pointer, an id, ...)
/// and gets the same value back in [`crate::vm::Upcalls`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VMThread(pub OpaquePointer);

impl VMThread {
    pub const UNINITIALIZED: Self = Self(OpaquePointer::UNINITIALIZED);
}

/// A thread that owns a [`crate::plan::Mutator`]. Functions taking one run on that thread.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VMMutatorThread(pub VMThread);

/// A GC thread: a [`crate::scheduler::GCWorker`] or the [`crate::scheduler::GCController`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VMWorkerThread(pub VMThread);
