use std::sync::Arc;

use crate::plan::ObjectQueue;
use crate::policy::space::Space;
use crate::scheduler::GCWorker;
use crate::util::constants::MIN_ALIGNMENT;
use crate::util::heap::{BlockPageResource, BlockState};
use crate::util::metadata::HeapMetadata;
use crate::util::object_forwarding::ForwardingTable;
use crate::util::ObjectReference;

/// The default space. Mutators bump-allocate into its blocks. In each collection, the blocks
/// filled before the collection are evacuated: their live objects are copied into fresh blocks,
/// except objects that are pinned, and objects that cannot be copied for lack of space. Those
/// stay in place, and their blocks are kept.
///
/// The block a mutator is currently allocating into is never evacuated. Its live objects stay in
/// place, so a mutator cursor is still valid after a collection.
pub struct CopySpace {
    pr: Arc<BlockPageResource>,
    metadata: Arc<HeapMetadata>,
    forwarding: ForwardingTable,
}

impl CopySpace {
    pub fn new(pr: Arc<BlockPageResource>, metadata: Arc<HeapMetadata>) -> Self {
        Self {
            pr,
            metadata,
            forwarding: ForwardingTable::new(),
        }
    }

    pub fn forwarding(&self) -> &ForwardingTable {
        &self.forwarding
    }

    pub fn trace_object<Q: ObjectQueue>(
        &self,
        queue: &mut Q,
        object: ObjectReference,
        worker: &mut GCWorker,
    ) -> ObjectReference {
        let state = self.pr.block_state(self.pr.block_index(object.to_raw_address()));
        if state != BlockState::Evacuating || self.metadata.is_pinned_for_gc(object) {
            if self.metadata.test_and_mark(object) {
                queue.enqueue(object);
            }
            return object;
        }

        if self.metadata.test_and_mark(object) {
            // We won the race. Copy the object, or keep it in place if we cannot.
            let new_object = self.copy_object(object, worker).unwrap_or(object);
            self.forwarding.insert(object, new_object);
            queue.enqueue(new_object);
            new_object
        } else {
            self.forwarding.wait_for(object)
        }
    }

    fn copy_object(&self, object: ObjectReference, worker: &mut GCWorker) -> Option<ObjectReference> {
        let upcalls = worker.mmtk().get_upcalls();
        let bytes = upcalls.get_object_size(object);
        let start = upcalls.ref_to_object_start(object);
        let align = upcalls.get_object_align_when_copied(object).max(MIN_ALIGNMENT);
        let offset = upcalls.get_object_align_offset_when_copied(object);
        let ref_offset = object.to_raw_address() - start;

        let Some(new_start) = worker
            .get_copy_allocator_mut()
            .alloc_copy(bytes, align, offset)
        else {
            trace!("No space to copy {}. Keep it in place.", object);
            return None;
        };
        unsafe {
            std::ptr::copy_nonoverlapping(
                start.to_ptr::<u8>(),
                new_start.to_mut_ptr::<u8>(),
                bytes,
            );
        }
        let new_object = ObjectReference::from_raw_address(new_start + ref_offset);
        self.metadata.set_vo_bit(new_object);
        self.metadata.test_and_mark(new_object);
        trace!("Copied {} to {} ({} bytes)", object, new_object, bytes);
        Some(new_object)
    }

    /// Sweep an evacuated block. Returns true if any object survived in place.
    fn sweep_evacuated_block(&self, index: usize) -> bool {
        let start = self.pr.block_start(index);
        let end = self.pr.block_start(index + 1);
        let mut survivors = false;
        self.metadata.vo.for_each_set(start, end, |addr| {
            let object = ObjectReference::from_raw_address(addr);
            let stayed = self.metadata.is_marked(object)
                && self.forwarding.get(object).map_or(true, |to| to == object);
            if stayed {
                survivors = true;
            } else {
                self.metadata.vo.clear(addr);
                self.metadata.pin.clear(addr);
            }
        });
        survivors
    }

    /// Clear the valid-object bits of dead objects in a block that stays in place.
    fn sweep_in_place(&self, index: usize) {
        let start = self.pr.block_start(index);
        let end = self.pr.block_start(index + 1);
        self.metadata.vo.for_each_set(start, end, |addr| {
            let object = ObjectReference::from_raw_address(addr);
            if !self.metadata.is_marked(object) {
                self.metadata.vo.clear(addr);
                self.metadata.pin.clear(addr);
            }
        });
    }
}

impl Space for CopySpace {
    fn name(&self) -> &'static str {
        "CopySpace"
    }

    fn is_live(&self, object: ObjectReference) -> bool {
        self.metadata.is_marked(object)
    }

    fn is_movable(&self) -> bool {
        true
    }

    fn get_forwarded_object(&self, object: ObjectReference) -> Option<ObjectReference> {
        self.forwarding.get(object).filter(|&to| to != object)
    }

    /// Blocks filled before this collection become the from-space.
    fn prepare(&self) {
        let mut evacuating = 0;
        for index in 0..self.pr.high_water() {
            if self.pr.block_state(index) == BlockState::Full {
                self.pr.set_block_state(index, BlockState::Evacuating);
                evacuating += 1;
            }
        }
        debug!("CopySpace: {} blocks to evacuate", evacuating);
    }

    fn release(&self) {
        let mut freed = 0;
        let mut kept = 0;
        for index in 0..self.pr.high_water() {
            match self.pr.block_state(index) {
                BlockState::Evacuating => {
                    if self.sweep_evacuated_block(index) {
                        self.pr.set_block_state(index, BlockState::Full);
                        kept += 1;
                    } else {
                        self.pr.release_block(index);
                        freed += 1;
                    }
                }
                BlockState::Allocating => self.sweep_in_place(index),
                BlockState::CopyTarget => self.pr.set_block_state(index, BlockState::Full),
                _ => {}
            }
        }
        debug!(
            "CopySpace released {} blocks, kept {} blocks with objects in place, {} objects forwarded",
            freed,
            kept,
            self.forwarding.len()
        );
    }
}
