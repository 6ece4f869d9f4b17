use std::sync::Arc;

use crate::plan::ObjectQueue;
use crate::policy::space::Space;
use crate::util::metadata::HeapMetadata;
use crate::util::ObjectReference;

/// A space whose objects are never reclaimed or moved. Its blocks are handed out by the immortal
/// bump allocator of each mutator. Objects are still traced, so that objects they reference
/// are kept alive.
pub struct ImmortalSpace {
    metadata: Arc<HeapMetadata>,
}

impl ImmortalSpace {
    pub fn new(metadata: Arc<HeapMetadata>) -> Self {
        Self { metadata }
    }

    pub fn trace_object<Q: ObjectQueue>(&self, queue: &mut Q, object: ObjectReference) -> ObjectReference {
        if self.metadata.test_and_mark(object) {
            queue.enqueue(object);
        }
        object
    }
}

impl Space for ImmortalSpace {
    fn name(&self) -> &'static str {
        "ImmortalSpace"
    }

    fn is_live(&self, _object: ObjectReference) -> bool {
        true
    }

    fn is_movable(&self) -> bool {
        false
    }

    fn prepare(&self) {}

    fn release(&self) {}
}
