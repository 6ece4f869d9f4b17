use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::plan::ObjectQueue;
use crate::policy::space::Space;
use crate::util::alloc::{align_allocation, AllocationError};
use crate::util::conversions::{blocks_to_bytes, bytes_to_blocks_up};
use crate::util::heap::{BlockPageResource, BlockState};
use crate::util::metadata::HeapMetadata;
use crate::util::{Address, ObjectReference};

/// A space for objects too big to be evacuated. Each object gets its own run of blocks, and
/// objects never move.
pub struct LargeObjectSpace {
    pr: Arc<BlockPageResource>,
    metadata: Arc<HeapMetadata>,
    /// The first block of each run, and the number of blocks in the run.
    objects: Mutex<HashMap<Address, usize>>,
}

impl LargeObjectSpace {
    pub fn new(pr: Arc<BlockPageResource>, metadata: Arc<HeapMetadata>) -> Self {
        Self {
            pr,
            metadata,
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Take a run of blocks for a single object, and return the object address in the run.
    pub fn alloc_object(
        &self,
        size: usize,
        align: usize,
        offset: usize,
        limit_blocks: usize,
    ) -> Result<Address, AllocationError> {
        if size >= blocks_to_bytes(self.pr.total_blocks()) {
            return Err(AllocationError::HeapOutOfMemory);
        }
        let nblocks = bytes_to_blocks_up(size + align);
        let start = self.pr.acquire(nblocks, BlockState::LosHead, limit_blocks)?;
        self.objects.lock().unwrap().insert(start, nblocks);
        let result = align_allocation(start, align, offset);
        debug!(
            "Allocated large object of {} bytes at {} ({} blocks)",
            size, result, nblocks
        );
        Ok(result)
    }

    pub fn trace_object<Q: ObjectQueue>(&self, queue: &mut Q, object: ObjectReference) -> ObjectReference {
        if self.metadata.test_and_mark(object) {
            queue.enqueue(object);
        }
        object
    }

    /// Number of large objects currently allocated.
    pub fn num_objects(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

impl Space for LargeObjectSpace {
    fn name(&self) -> &'static str {
        "LargeObjectSpace"
    }

    fn is_live(&self, object: ObjectReference) -> bool {
        self.metadata.is_marked(object)
    }

    fn is_movable(&self) -> bool {
        false
    }

    fn prepare(&self) {}

    fn release(&self) {
        let mut objects = self.objects.lock().unwrap();
        let mut freed = 0;
        objects.retain(|&head, &mut nblocks| {
            let end = head + blocks_to_bytes(nblocks);
            if self.metadata.mark.any_set(head, end) {
                return true;
            }
            self.metadata.vo.clear_range(head, end);
            self.metadata.pin.clear_range(head, end);
            let released = self.pr.release_run(head);
            debug_assert_eq!(released, nblocks);
            freed += nblocks;
            false
        });
        debug!(
            "LargeObjectSpace released {} blocks, {} objects remain",
            freed,
            objects.len()
        );
    }
}
