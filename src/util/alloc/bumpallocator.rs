use super::allocator::{align_allocation, AllocationError, Allocator};
use crate::util::constants::BYTES_IN_BLOCK;
use crate::util::conversions::{blocks_to_bytes, bytes_to_blocks_up};
use crate::util::heap::BlockState;
use crate::util::opaque_pointer::*;
use crate::util::Address;
use crate::MMTK;

/// Which space a bump allocator takes its blocks from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BumpTarget {
    /// The default (evacuating) space, for mutators.
    Default,
    /// The immortal space, for mutators.
    Immortal,
    /// To-space blocks of the default space, for GC workers copying objects.
    Copy,
}

impl BumpTarget {
    fn block_state(self) -> BlockState {
        match self {
            BumpTarget::Default => BlockState::Allocating,
            BumpTarget::Immortal => BlockState::Immortal,
            BumpTarget::Copy => BlockState::CopyTarget,
        }
    }
}

/// A bump pointer allocator. It owns one block at a time and bumps a cursor through it. The
/// fields are `#[repr(C)]` so a host can inline the fast path, reading `cursor` and `limit`.
#[repr(C)]
pub struct BumpAllocator {
    /// [`VMThread`] associated with this allocator instance
    pub tls: VMThread,
    /// Current cursor for bump pointer
    pub cursor: Address,
    /// Limit for bump pointer
    pub limit: Address,
    target: BumpTarget,
    mmtk: &'static MMTK,
}

impl BumpAllocator {
    pub(crate) fn new(tls: VMThread, target: BumpTarget, mmtk: &'static MMTK) -> Self {
        BumpAllocator {
            tls,
            cursor: Address::ZERO,
            limit: Address::ZERO,
            target,
            mmtk,
        }
    }

    pub fn target(&self) -> BumpTarget {
        self.target
    }

    /// Forget the current block without giving it back.
    pub fn reset(&mut self) {
        self.cursor = Address::ZERO;
        self.limit = Address::ZERO;
    }

    fn limit_blocks(&self) -> usize {
        match self.target {
            BumpTarget::Copy => self.mmtk.gc_limit_blocks(),
            _ => self.mmtk.mutator_limit_blocks(),
        }
    }

    #[inline(always)]
    fn alloc_fast(&mut self, size: usize, align: usize, offset: usize) -> Option<Address> {
        let result = align_allocation(self.cursor, align, offset);
        let fits = result
            .as_usize()
            .checked_add(size)
            .is_some_and(|end| end <= self.limit.as_usize());
        if !fits {
            None
        } else {
            self.cursor = result + size;
            trace!(
                "Bump allocation size: {}, result: {}, new_cursor: {}, limit: {}",
                size,
                result,
                self.cursor,
                self.limit
            );
            Some(result)
        }
    }

    /// Take a new block, or a run of blocks for an object that does not fit in one block.
    fn acquire_region(
        &mut self,
        size: usize,
        align: usize,
        offset: usize,
    ) -> Result<Address, AllocationError> {
        let plan = self.mmtk.get_plan();
        let limit_blocks = self.limit_blocks();

        if size.saturating_add(align) > BYTES_IN_BLOCK {
            // Objects this big cannot be evacuated. Put them in the large object space, unless
            // they are immortal anyway.
            return match self.target {
                BumpTarget::Default => {
                    plan.los.alloc_object(size, align, offset, limit_blocks)
                }
                BumpTarget::Immortal => {
                    if size >= blocks_to_bytes(plan.pr.total_blocks()) {
                        return Err(AllocationError::HeapOutOfMemory);
                    }
                    let nblocks = bytes_to_blocks_up(size + align);
                    let start = plan.pr.acquire(nblocks, BlockState::Immortal, limit_blocks)?;
                    Ok(align_allocation(start, align, offset))
                }
                BumpTarget::Copy => Err(AllocationError::HeapOutOfMemory),
            };
        }

        let start = plan
            .pr
            .acquire(1, self.target.block_state(), limit_blocks)?;
        trace!("{:?} allocator acquired block {}", self.target, start);
        self.retire();
        self.cursor = start;
        self.limit = start + BYTES_IN_BLOCK;
        let result = align_allocation(self.cursor, align, offset);
        debug_assert!(result + size <= self.limit);
        self.cursor = result + size;
        Ok(result)
    }

    /// Allocate space to copy an object into during a collection. Returns `None` if there is no
    /// space left. This never triggers a collection.
    pub(crate) fn alloc_copy(&mut self, size: usize, align: usize, offset: usize) -> Option<Address> {
        debug_assert_eq!(self.target, BumpTarget::Copy);
        self.alloc_fast(size, align, offset)
            .or_else(|| self.acquire_region(size, align, offset).ok())
    }
}

impl Allocator for BumpAllocator {
    fn get_tls(&self) -> VMThread {
        self.tls
    }

    fn get_mmtk(&self) -> &'static MMTK {
        self.mmtk
    }

    fn does_thread_local_allocation(&self) -> bool {
        true
    }

    fn alloc(&mut self, size: usize, align: usize, offset: usize) -> Address {
        match self.alloc_fast(size, align, offset) {
            Some(result) => result,
            None => {
                trace!("Thread local buffer used up, go to alloc slow path");
                self.alloc_slow(size, align, offset)
            }
        }
    }

    fn alloc_slow_once(
        &mut self,
        size: usize,
        align: usize,
        offset: usize,
    ) -> Result<Address, AllocationError> {
        debug_assert_ne!(self.target, BumpTarget::Copy, "Copy allocators never collect");
        self.acquire_region(size, align, offset)
    }

    /// A retired block of the default space becomes a full block, so it is evacuated in the next
    /// collection.
    fn retire(&mut self) {
        if self.limit.is_zero() {
            return;
        }
        if self.target == BumpTarget::Default {
            let pr = &self.mmtk.get_plan().pr;
            let index = pr.block_index(self.limit - BYTES_IN_BLOCK);
            debug_assert_eq!(pr.block_state(index), BlockState::Allocating);
            pr.set_block_state(index, BlockState::Full);
        }
        self.reset();
    }
}
