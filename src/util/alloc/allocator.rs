use strum_macros::EnumIter;

use crate::util::opaque_pointer::*;
use crate::util::Address;
use crate::MMTK;

/// The kinds of allocation failure reported to the host through
/// [`crate::vm::Upcalls::out_of_memory`].
///
/// The discriminants cross the boundary as plain integers, so they are part of the contract with
/// the host and must never change. [`AllocationError::verify_encoding`] checks them at start-up.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
pub enum AllocationError {
    /// The heap limit is reached, and a collection did not free enough memory.
    HeapOutOfMemory = 0,
    /// The operating system refused to map memory for the heap.
    MmapOutOfMemory = 1,
}

impl AllocationError {
    /// Decode an error from its integer encoding.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(AllocationError::HeapOutOfMemory),
            1 => Some(AllocationError::MmapOutOfMemory),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        self as i32
    }

    /// Check that every error decodes back to itself. Panics on mismatch.
    pub fn verify_encoding() {
        use strum::IntoEnumIterator;
        for err in AllocationError::iter() {
            let raw = err.to_raw();
            assert_eq!(
                AllocationError::from_raw(raw),
                Some(err),
                "AllocationError {:?} is encoded as {} but does not decode back",
                err,
                raw
            );
        }
        assert_eq!(AllocationError::HeapOutOfMemory.to_raw(), 0);
        assert_eq!(AllocationError::MmapOutOfMemory.to_raw(), 1);
    }
}

/// Return the first address at or above `region` such that `(address + offset) % align == 0`.
/// `align` must be a power of two.
pub fn align_allocation(region: Address, align: usize, offset: usize) -> Address {
    debug_assert!(align.is_power_of_two());
    let mask = align - 1;
    let delta = 0usize
        .wrapping_sub(offset)
        .wrapping_sub(region.as_usize())
        & mask;
    region + delta
}

/// An allocator owned by a mutator. Allocators hand out memory from the spaces of the plan, and
/// run the slow path (polling, triggering collections, reporting out-of-memory) when their
/// local buffer is exhausted.
pub trait Allocator: Send {
    /// The thread that owns this allocator.
    fn get_tls(&self) -> VMThread;

    fn get_mmtk(&self) -> &'static MMTK;

    /// Does this allocator keep a thread-local buffer that [`Allocator::retire`] gives back?
    fn does_thread_local_allocation(&self) -> bool;

    /// Allocate `size` bytes such that `(result + offset) % align == 0`. The memory is zeroed.
    fn alloc(&mut self, size: usize, align: usize, offset: usize) -> Address;

    /// Try once to get more memory and allocate. Called by [`Allocator::alloc_slow`].
    fn alloc_slow_once(
        &mut self,
        size: usize,
        align: usize,
        offset: usize,
    ) -> Result<Address, AllocationError>;

    /// Give the thread-local buffer back to the space, so a collection can see it as full.
    fn retire(&mut self) {}

    /// The slow path. If a collection is pending, the mutator is parked first. If the allocation
    /// fails with the heap exhausted, a collection is requested and the allocation retried once.
    /// If that fails too and soft references are registered, an emergency collection clears
    /// them, and the allocation is retried once more. If it still fails, the host is told through
    /// the out-of-memory upcall, and a zero address is returned.
    fn alloc_slow(&mut self, size: usize, align: usize, offset: usize) -> Address {
        self.alloc_slow_inline(size, align, offset)
    }

    #[inline(always)]
    fn alloc_slow_inline(&mut self, size: usize, align: usize, offset: usize) -> Address {
        let tls = self.get_tls();
        let mmtk = self.get_mmtk();
        let mut gc_attempted = false;
        let mut emergency_attempted = false;

        loop {
            if mmtk.should_block_mutator() {
                trace!("A collection is pending. Park before taking more memory.");
                self.retire();
                mmtk.get_upcalls().block_for_gc(VMMutatorThread(tls));
            }

            match self.alloc_slow_once(size, align, offset) {
                Ok(addr) => return addr,
                Err(AllocationError::HeapOutOfMemory)
                    if !gc_attempted && mmtk.is_collection_enabled() =>
                {
                    debug!(
                        "Allocation of {} bytes failed. Trigger a collection and retry.",
                        size
                    );
                    gc_attempted = true;
                    mmtk.get_plan().gc_trigger.on_pending_allocation(size + align);
                    self.retire();
                    mmtk.request_gc();
                    mmtk.get_upcalls().block_for_gc(VMMutatorThread(tls));
                }
                Err(AllocationError::HeapOutOfMemory)
                    if !emergency_attempted
                        && mmtk.is_collection_enabled()
                        && mmtk.reference_processors.soft.has_candidates() =>
                {
                    debug!(
                        "Allocation of {} bytes failed after a collection. Trigger an emergency collection.",
                        size
                    );
                    emergency_attempted = true;
                    self.retire();
                    mmtk.set_emergency_collection(true);
                    mmtk.request_gc();
                    mmtk.get_upcalls().block_for_gc(VMMutatorThread(tls));
                }
                Err(err) => {
                    warn!(
                        "Failed to allocate {} bytes (align {}, offset {}): {:?}",
                        size, align, offset, err
                    );
                    mmtk.get_upcalls().out_of_memory(tls, err);
                    return Address::ZERO;
                }
            }
        }
    }
}
