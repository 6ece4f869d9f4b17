use super::allocator::{AllocationError, Allocator};
use crate::util::opaque_pointer::*;
use crate::util::Address;
use crate::MMTK;

/// An allocator for the large object space. Every allocation takes its own run of blocks, so
/// there is no fast path and no thread-local buffer.
#[repr(C)]
pub struct LargeObjectAllocator {
    /// [`VMThread`] associated with this allocator instance
    pub tls: VMThread,
    mmtk: &'static MMTK,
}

impl LargeObjectAllocator {
    pub(crate) fn new(tls: VMThread, mmtk: &'static MMTK) -> Self {
        LargeObjectAllocator { tls, mmtk }
    }
}

impl Allocator for LargeObjectAllocator {
    fn get_tls(&self) -> VMThread {
        self.tls
    }

    fn get_mmtk(&self) -> &'static MMTK {
        self.mmtk
    }

    fn does_thread_local_allocation(&self) -> bool {
        false
    }

    fn alloc(&mut self, size: usize, align: usize, offset: usize) -> Address {
        self.alloc_slow(size, align, offset)
    }

    fn alloc_slow_once(
        &mut self,
        size: usize,
        align: usize,
        offset: usize,
    ) -> Result<Address, AllocationError> {
        let plan = self.mmtk.get_plan();
        plan.los
            .alloc_object(size, align, offset, self.mmtk.mutator_limit_blocks())
    }
}
