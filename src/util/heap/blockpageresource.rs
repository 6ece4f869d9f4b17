//! The block pool. The heap is a contiguous reservation of address space, divided into blocks
//! of [`BYTES_IN_BLOCK`] bytes. Every space takes its memory from this pool, one block or one
//! run of contiguous blocks at a time, and the state of each block records which space owns it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use atomic::Atomic;
use bytemuck::NoUninit;

use crate::util::alloc::AllocationError;
use crate::util::constants::*;
use crate::util::conversions::*;
use crate::util::memory;
use crate::util::metadata::HeapMetadata;
use crate::util::Address;

/// The state of a block.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, NoUninit)]
pub enum BlockState {
    /// Not owned by any space.
    Free,
    /// The current bump region of a mutator, or a block a mutator retired in this mutator phase.
    /// Not evacuated in the next collection.
    Allocating,
    /// Filled in an earlier mutator phase, or holding survivors. Evacuated in the next collection.
    Full,
    /// A from-space block during a collection.
    Evacuating,
    /// A to-space block that a GC worker copies objects into.
    CopyTarget,
    /// The first block of a large object.
    LosHead,
    /// A following block of a large object.
    LosTail,
    /// A block of the immortal space. Never released.
    Immortal,
}

/// The synchronized part of [`BlockPageResource`].
struct BlockPageResourceSync {
    /// No free block has a lower index than this.
    free_hint: usize,
    /// Chunks of the reservation that are mapped readable and writable.
    committed_chunks: Vec<bool>,
    /// One past the highest block index ever acquired.
    high_water: usize,
}

/// A page resource that hands out blocks of a contiguous reservation.
pub struct BlockPageResource {
    start: Address,
    total_blocks: usize,
    states: Vec<Atomic<BlockState>>,
    sync: Mutex<BlockPageResourceSync>,
    used_blocks: AtomicUsize,
    metadata: Arc<HeapMetadata>,
}

impl BlockPageResource {
    /// Create a block pool over `[start, start + bytes)`. The range must be chunk aligned, and
    /// reserved but not yet committed.
    pub fn new(start: Address, bytes: usize, metadata: Arc<HeapMetadata>) -> Self {
        debug_assert!(start.is_aligned_to(BYTES_IN_CHUNK));
        debug_assert!(raw_is_aligned(bytes, BYTES_IN_CHUNK));
        let total_blocks = bytes >> LOG_BYTES_IN_BLOCK;
        Self {
            start,
            total_blocks,
            states: (0..total_blocks)
                .map(|_| Atomic::new(BlockState::Free))
                .collect(),
            sync: Mutex::new(BlockPageResourceSync {
                free_hint: 0,
                committed_chunks: vec![false; bytes >> LOG_BYTES_IN_CHUNK],
                high_water: 0,
            }),
            used_blocks: AtomicUsize::new(0),
            metadata,
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.start + blocks_to_bytes(self.total_blocks)
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// The index of the block that contains `addr`. `addr` must be in the heap.
    pub fn block_index(&self, addr: Address) -> usize {
        debug_assert!(self.contains(addr), "{} is not in the heap", addr);
        (addr - self.start) >> LOG_BYTES_IN_BLOCK
    }

    pub fn block_start(&self, index: usize) -> Address {
        self.start + blocks_to_bytes(index)
    }

    pub fn block_state(&self, index: usize) -> BlockState {
        self.states[index].load(Ordering::SeqCst)
    }

    pub fn set_block_state(&self, index: usize, state: BlockState) {
        self.states[index].store(state, Ordering::SeqCst);
    }

    /// The state of the block that contains `addr`, or `None` if `addr` is not in the heap.
    pub fn state_of(&self, addr: Address) -> Option<BlockState> {
        if self.contains(addr) {
            Some(self.block_state(self.block_index(addr)))
        } else {
            None
        }
    }

    /// Blocks at or above this index have never been acquired.
    pub fn high_water(&self) -> usize {
        self.sync.lock().unwrap().high_water
    }

    /// Is `addr` in a chunk that is mapped readable and writable? Blocks are never unmapped, so
    /// once true this stays true.
    pub fn is_committed(&self, addr: Address) -> bool {
        if !self.contains(addr) {
            return false;
        }
        let chunk = (addr - self.start) >> LOG_BYTES_IN_CHUNK;
        self.sync.lock().unwrap().committed_chunks[chunk]
    }

    /// Number of blocks owned by any space.
    pub fn used_blocks(&self) -> usize {
        self.used_blocks.load(Ordering::SeqCst)
    }

    pub fn used_bytes(&self) -> usize {
        blocks_to_bytes(self.used_blocks())
    }

    /// Acquire `nblocks` contiguous free blocks and set them to `state`. If `state` is
    /// [`BlockState::LosHead`], the following blocks are set to [`BlockState::LosTail`].
    ///
    /// Fails with [`AllocationError::HeapOutOfMemory`] if the pool would hold more than
    /// `limit_blocks` used blocks, or no run of free blocks is long enough, and with
    /// [`AllocationError::MmapOutOfMemory`] if the memory cannot be committed.
    ///
    /// The memory of the returned blocks is zeroed, and their metadata is cleared.
    pub fn acquire(
        &self,
        nblocks: usize,
        state: BlockState,
        limit_blocks: usize,
    ) -> Result<Address, AllocationError> {
        debug_assert!(nblocks > 0);
        debug_assert!(state != BlockState::Free && state != BlockState::LosTail);
        let first = {
            let mut sync = self.sync.lock().unwrap();
            if self.used_blocks() + nblocks > limit_blocks {
                trace!(
                    "Refused {} blocks: {} used, limit {}",
                    nblocks,
                    self.used_blocks(),
                    limit_blocks
                );
                return Err(AllocationError::HeapOutOfMemory);
            }
            let Some(first) = self.find_free_run(sync.free_hint, nblocks) else {
                trace!("No run of {} free blocks", nblocks);
                return Err(AllocationError::HeapOutOfMemory);
            };
            self.commit_blocks(&mut sync, first, nblocks)?;

            // A block is looked up by its state, so its stale metadata goes before the state is
            // published.
            let start = self.block_start(first);
            self.metadata.clear_all(start, start + blocks_to_bytes(nblocks));

            let tail_state = if state == BlockState::LosHead {
                BlockState::LosTail
            } else {
                state
            };
            self.set_block_state(first, state);
            for index in first + 1..first + nblocks {
                self.set_block_state(index, tail_state);
            }
            self.used_blocks.fetch_add(nblocks, Ordering::SeqCst);
            if first == sync.free_hint {
                sync.free_hint = first + nblocks;
            }
            sync.high_water = sync.high_water.max(first + nblocks);
            first
        };

        // Only the owner reads the memory, so zero it without holding the lock.
        let start = self.block_start(first);
        memory::zero(start, blocks_to_bytes(nblocks));
        Ok(start)
    }

    /// Find `nblocks` contiguous free blocks, starting the search from `from`.
    fn find_free_run(&self, from: usize, nblocks: usize) -> Option<usize> {
        let mut run_start = from;
        let mut run_len = 0;
        for index in from..self.total_blocks {
            if self.block_state(index) == BlockState::Free {
                if run_len == 0 {
                    run_start = index;
                }
                run_len += 1;
                if run_len == nblocks {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
        }
        None
    }

    fn commit_blocks(
        &self,
        sync: &mut BlockPageResourceSync,
        first: usize,
        nblocks: usize,
    ) -> Result<(), AllocationError> {
        let first_chunk = blocks_to_bytes(first) >> LOG_BYTES_IN_CHUNK;
        let last_chunk = (blocks_to_bytes(first + nblocks) - 1) >> LOG_BYTES_IN_CHUNK;
        for chunk in first_chunk..=last_chunk {
            if sync.committed_chunks[chunk] {
                continue;
            }
            let chunk_start = self.start + (chunk << LOG_BYTES_IN_CHUNK);
            if let Err(e) = memory::commit(chunk_start, BYTES_IN_CHUNK) {
                warn!("Failed to commit chunk at {}: {}", chunk_start, e);
                return Err(AllocationError::MmapOutOfMemory);
            }
            sync.committed_chunks[chunk] = true;
        }
        Ok(())
    }

    /// Return a single block to the pool.
    pub fn release_block(&self, index: usize) {
        let mut sync = self.sync.lock().unwrap();
        debug_assert_ne!(self.block_state(index), BlockState::Free);
        self.set_block_state(index, BlockState::Free);
        self.used_blocks.fetch_sub(1, Ordering::SeqCst);
        sync.free_hint = sync.free_hint.min(index);
    }

    /// Return a large object run, starting at its head block, to the pool. Returns the number of
    /// blocks released.
    pub fn release_run(&self, start: Address) -> usize {
        let mut sync = self.sync.lock().unwrap();
        let head = self.block_index(start);
        debug_assert_eq!(self.block_state(head), BlockState::LosHead);
        self.set_block_state(head, BlockState::Free);
        let mut nblocks = 1;
        while head + nblocks < self.total_blocks
            && self.block_state(head + nblocks) == BlockState::LosTail
        {
            self.set_block_state(head + nblocks, BlockState::Free);
            nblocks += 1;
        }
        self.used_blocks.fetch_sub(nblocks, Ordering::SeqCst);
        sync.free_hint = sync.free_hint.min(head);
        nblocks
    }

    /// Count blocks in a given state.
    pub fn count_blocks(&self, state: BlockState) -> usize {
        let high_water = self.high_water();
        (0..high_water)
            .filter(|&index| self.block_state(index) == state)
            .count()
    }
}
