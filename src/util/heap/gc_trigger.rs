use std::sync::atomic::{AtomicUsize, Ordering};

use crate::util::constants::LOG_BYTES_IN_BLOCK;
use crate::util::conversions::{blocks_to_bytes, bytes_to_blocks_up};
use crate::util::options::Options;

/// GCTrigger decides the current heap size. All the decisions about the heap limit are resolved
/// here: the allocators ask for the limit, and a collection is triggered when an allocation would
/// exceed it.
pub struct GCTrigger {
    /// The triggering policy.
    pub policy: Box<dyn GCTriggerPolicy>,
}

impl GCTrigger {
    pub fn new(options: &Options) -> Self {
        let (min, max) = options.heap_bounds();
        GCTrigger {
            policy: if min == max {
                Box::new(FixedHeapSizeTrigger {
                    total_blocks: max >> LOG_BYTES_IN_BLOCK,
                })
            } else {
                Box::new(DynamicHeapSizeTrigger::new(
                    min >> LOG_BYTES_IN_BLOCK,
                    max >> LOG_BYTES_IN_BLOCK,
                ))
            },
        }
    }

    /// The current heap size in blocks.
    pub fn heap_size_in_blocks(&self) -> usize {
        self.policy.get_heap_size_in_blocks()
    }

    /// The current heap size in bytes.
    pub fn heap_size_in_bytes(&self) -> usize {
        blocks_to_bytes(self.heap_size_in_blocks())
    }

    /// Record an allocation of `bytes` that could not be satisfied. The next resize will try to
    /// make room for it.
    pub fn on_pending_allocation(&self, bytes: usize) {
        self.policy.on_pending_allocation(bytes_to_blocks_up(bytes));
    }

    /// Inform the policy that a collection ended with `live_blocks` blocks in use.
    pub fn on_gc_end(&self, live_blocks: usize) {
        self.policy.on_gc_end(live_blocks);
    }
}

/// A policy that decides the (current) heap limit. Policies are informed about the end of each
/// collection and about allocations that failed, so they can adjust the limit.
pub trait GCTriggerPolicy: Sync + Send {
    /// Inform the policy that an allocation of `blocks` blocks failed.
    fn on_pending_allocation(&self, _blocks: usize) {}
    /// Inform the policy that a collection ends.
    fn on_gc_end(&self, _live_blocks: usize) {}
    /// Return the current heap size (in blocks)
    fn get_heap_size_in_blocks(&self) -> usize;
    /// Can the heap size grow?
    fn can_heap_size_grow(&self) -> bool;
}

/// A simple GC trigger that uses a fixed heap size.
pub struct FixedHeapSizeTrigger {
    total_blocks: usize,
}

impl GCTriggerPolicy for FixedHeapSizeTrigger {
    fn get_heap_size_in_blocks(&self) -> usize {
        self.total_blocks
    }

    fn can_heap_size_grow(&self) -> bool {
        false
    }
}

/// A trigger that sizes the heap to twice the live data after each collection (plus any pending
/// allocation), within the bounds given by the options.
pub struct DynamicHeapSizeTrigger {
    min_heap_blocks: usize,
    max_heap_blocks: usize,
    current_heap_blocks: AtomicUsize,
    pending_blocks: AtomicUsize,
}

impl DynamicHeapSizeTrigger {
    pub fn new(min_heap_blocks: usize, max_heap_blocks: usize) -> Self {
        debug_assert!(min_heap_blocks <= max_heap_blocks);
        Self {
            min_heap_blocks,
            max_heap_blocks,
            current_heap_blocks: AtomicUsize::new(min_heap_blocks),
            pending_blocks: AtomicUsize::new(0),
        }
    }
}

impl GCTriggerPolicy for DynamicHeapSizeTrigger {
    fn on_pending_allocation(&self, blocks: usize) {
        self.pending_blocks.fetch_max(blocks, Ordering::SeqCst);
    }

    fn on_gc_end(&self, live_blocks: usize) {
        let pending = self.pending_blocks.swap(0, Ordering::SeqCst);
        let target = (live_blocks * 2 + pending).clamp(self.min_heap_blocks, self.max_heap_blocks);
        let old = self.current_heap_blocks.swap(target, Ordering::SeqCst);
        if old != target {
            debug!(
                "Heap resized from {} to {} blocks ({} live, {} pending)",
                old, target, live_blocks, pending
            );
        }
    }

    fn get_heap_size_in_blocks(&self) -> usize {
        self.current_heap_blocks.load(Ordering::SeqCst)
    }

    fn can_heap_size_grow(&self) -> bool {
        self.get_heap_size_in_blocks() < self.max_heap_blocks
    }
}
