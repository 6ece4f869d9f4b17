//! The global state of the collector: its spaces, the heap they share, and the phases of a
//! collection that apply to every space.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytemuck::NoUninit;
use enum_map::Enum;

use crate::plan::ObjectQueue;
use crate::policy::copyspace::CopySpace;
use crate::policy::immortalspace::ImmortalSpace;
use crate::policy::largeobjectspace::LargeObjectSpace;
use crate::policy::space::Space;
use crate::scheduler::GCWorker;
use crate::util::constants::BYTES_IN_CHUNK;
use crate::util::conversions::{bytes_to_blocks_up, bytes_to_formatted_string, raw_align_up};
use crate::util::heap::{BlockPageResource, BlockState, GCTrigger, HeapLayout};
use crate::util::memory;
use crate::util::metadata::HeapMetadata;
use crate::util::options::Options;
use crate::util::{Address, ObjectReference};

/// The phases of the collector. Stored atomically in [`crate::MMTK`].
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, NoUninit)]
pub enum CollectionState {
    /// No collection is pending.
    Idle,
    /// A collection was requested. The controller has not started it yet.
    Requested,
    /// The host is stopping the mutators.
    StoppingMutators,
    /// All mutators are stopped. Roots are scanned and the heap is traced.
    Tracing,
    /// The collection is finished, and the mutators are being resumed.
    Resuming,
}

/// Allocation semantics that a host can request for an object.
///
/// The discriminants cross the boundary as plain integers.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Enum, PartialEq, Eq)]
pub enum AllocationSemantics {
    /// The default semantics. Objects may move.
    Default = 0,
    /// Objects that are never reclaimed or moved.
    Immortal = 1,
    /// Large objects. Never moved.
    Los = 2,
}

impl AllocationSemantics {
    /// Decode semantics from its integer encoding.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(AllocationSemantics::Default),
            1 => Some(AllocationSemantics::Immortal),
            2 => Some(AllocationSemantics::Los),
            _ => None,
        }
    }
}

/// The reference collector: an evacuating default space that respects pins, a large object
/// space and an immortal space, all taking blocks from one contiguous heap.
pub struct Plan {
    pub pr: Arc<BlockPageResource>,
    pub metadata: Arc<HeapMetadata>,
    pub copy_space: CopySpace,
    pub los: LargeObjectSpace,
    pub immortal: ImmortalSpace,
    pub gc_trigger: GCTrigger,
    /// Objects registered with `append_pinned_objects`, pinned for the next collection only.
    transient_pins: Mutex<Vec<ObjectReference>>,
    /// Bytes allocated with the counted malloc functions and not yet freed.
    malloc_bytes: AtomicUsize,
}

impl Plan {
    /// Reserve the heap and create the spaces. The heap reservation is sized for the maximum heap
    /// size. Memory is committed a chunk at a time, when blocks are first used.
    pub fn new(options: &Options) -> Self {
        let (_, max) = options.heap_bounds();
        let bytes = raw_align_up(max, BYTES_IN_CHUNK);
        let start = match memory::reserve_aligned(bytes, BYTES_IN_CHUNK) {
            Ok(start) => start,
            Err(e) => panic!("Failed to reserve {} bytes for the heap: {}", bytes, e),
        };
        let metadata = Arc::new(HeapMetadata::new(start, start + bytes));
        let pr = Arc::new(BlockPageResource::new(start, bytes, metadata.clone()));
        info!(
            "Reserved heap at [{}, {}) ({})",
            start,
            start + bytes,
            bytes_to_formatted_string(bytes)
        );
        Plan {
            copy_space: CopySpace::new(pr.clone(), metadata.clone()),
            los: LargeObjectSpace::new(pr.clone(), metadata.clone()),
            immortal: ImmortalSpace::new(metadata.clone()),
            gc_trigger: GCTrigger::new(options),
            transient_pins: Mutex::new(Vec::new()),
            malloc_bytes: AtomicUsize::new(0),
            pr,
            metadata,
        }
    }

    pub fn heap_layout(&self) -> HeapLayout {
        HeapLayout {
            heap_start: self.pr.start(),
            heap_end: self.pr.end(),
            vo_bit_base: self.metadata.vo.base_address(),
        }
    }

    pub fn increase_malloc_bytes_by(&self, bytes: usize) {
        self.malloc_bytes.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn decrease_malloc_bytes_by(&self, bytes: usize) {
        let old = self.malloc_bytes.fetch_sub(bytes, Ordering::SeqCst);
        debug_assert!(
            old >= bytes,
            "Freed {} counted bytes, but only {} are counted",
            bytes,
            old
        );
    }

    pub fn malloc_bytes(&self) -> usize {
        self.malloc_bytes.load(Ordering::SeqCst)
    }

    /// Counted malloc bytes, in blocks, rounded up.
    pub fn malloc_blocks(&self) -> usize {
        bytes_to_blocks_up(self.malloc_bytes())
    }

    /// Bytes in use: the blocks owned by the spaces, and the counted malloc bytes.
    pub fn used_bytes(&self) -> usize {
        self.pr.used_bytes() + self.malloc_bytes()
    }

    /// The space that owns the block of `addr`, or `None` if `addr` is not in a space.
    pub fn space_of(&self, addr: Address) -> Option<&dyn Space> {
        match self.pr.state_of(addr)? {
            BlockState::Allocating
            | BlockState::Full
            | BlockState::Evacuating
            | BlockState::CopyTarget => Some(&self.copy_space),
            BlockState::LosHead | BlockState::LosTail => Some(&self.los),
            BlockState::Immortal => Some(&self.immortal),
            BlockState::Free => None,
        }
    }

    /// Is `addr` in a block owned by some space?
    pub fn is_in_spaces(&self, addr: Address) -> bool {
        self.space_of(addr).is_some()
    }

    /// Is `addr` a valid object allocated by the collector?
    pub fn is_valid_object(&self, addr: Address) -> bool {
        self.metadata.is_valid_object(addr) && self.is_in_spaces(addr)
    }

    /// Trace an object: mark it, move it if its space decides to, and enqueue it for scanning if
    /// this is the first time it is reached. Returns the new address of the object.
    ///
    /// References outside the heap, and addresses that are not valid objects, are returned
    /// unchanged.
    pub fn trace_object<Q: ObjectQueue>(
        &self,
        queue: &mut Q,
        object: ObjectReference,
        worker: &mut GCWorker,
    ) -> ObjectReference {
        if object.is_null() {
            return object;
        }
        let addr = object.to_raw_address();
        let Some(state) = self.pr.state_of(addr) else {
            return object;
        };
        if !self.metadata.is_valid_object(addr) {
            trace!("{} is not a valid object. Leave it alone.", object);
            return object;
        }
        match state {
            BlockState::Allocating
            | BlockState::Full
            | BlockState::Evacuating
            | BlockState::CopyTarget => self.copy_space.trace_object(queue, object, worker),
            BlockState::LosHead | BlockState::LosTail => self.los.trace_object(queue, object),
            BlockState::Immortal => self.immortal.trace_object(queue, object),
            BlockState::Free => {
                warn!("{} has a valid object bit in a free block", object);
                object
            }
        }
    }

    /// Is the object reachable in the current collection? Objects outside the heap are always
    /// considered live.
    pub fn is_live(&self, object: ObjectReference) -> bool {
        let addr = object.to_raw_address();
        if !self.pr.contains(addr) {
            return true;
        }
        match self.space_of(addr) {
            Some(space) => space.is_live(object),
            None => false,
        }
    }

    /// The new address of the object if it was moved in the current collection.
    pub fn get_forwarded_object(&self, object: ObjectReference) -> Option<ObjectReference> {
        self.space_of(object.to_raw_address())
            .and_then(|space| space.get_forwarded_object(object))
    }

    /// Will the object never be moved, whatever happens to it?
    pub fn will_never_move(&self, object: ObjectReference) -> bool {
        match self.space_of(object.to_raw_address()) {
            Some(space) => !space.is_movable(),
            None => true,
        }
    }

    /// Pin objects for the next collection only. Addresses that are not valid objects are ignored.
    pub fn add_transient_pins(&self, objects: &[ObjectReference]) {
        let mut pins = self.transient_pins.lock().unwrap();
        pins.extend(
            objects
                .iter()
                .filter(|o| self.is_valid_object(o.to_raw_address())),
        );
    }

    /// The start and end of the part of the heap that has ever been used.
    fn used_range(&self) -> (Address, Address) {
        (self.pr.start(), self.pr.block_start(self.pr.high_water()))
    }

    /// Get ready for a collection. Called by the controller when the mutators are stopped.
    pub fn prepare(&self) {
        let (start, end) = self.used_range();
        self.metadata.mark.clear_range(start, end);
        self.copy_space.prepare();
        self.los.prepare();
        self.immortal.prepare();

        let pins = std::mem::take(&mut *self.transient_pins.lock().unwrap());
        let mut applied = 0;
        for object in pins {
            // The object may have died after it was registered.
            if self.metadata.is_valid_object(object.to_raw_address()) {
                self.metadata.pin_for_gc(object);
                applied += 1;
            }
        }
        if applied > 0 {
            debug!("Pinned {} objects for this collection", applied);
        }
    }

    /// Reclaim dead objects. Called after the transitive closure is complete.
    pub fn release(&self) {
        self.copy_space.release();
        self.los.release();
        self.immortal.release();
    }

    /// Finish the collection: drop the pins of this collection and the forwarding table, and
    /// let the trigger resize the heap.
    pub fn end_of_gc(&self) {
        let (start, end) = self.used_range();
        self.metadata.clear_gc_pins(start, end);
        self.copy_space.forwarding().clear();
        self.gc_trigger
            .on_gc_end(self.pr.used_blocks() + self.malloc_blocks());
        debug!(
            "End of GC: {} used ({} by malloc), heap size {}, {} large objects",
            bytes_to_formatted_string(self.used_bytes()),
            bytes_to_formatted_string(self.malloc_bytes()),
            bytes_to_formatted_string(self.gc_trigger.heap_size_in_bytes()),
            self.los.num_objects()
        );
    }
}
