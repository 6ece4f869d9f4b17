//! Per-object metadata kept on the side of the heap.
//!
//! Every bitmap has one bit per [`crate::util::constants::MIN_OBJECT_SIZE`] granule of the
//! reserved heap, indexed by object reference. The bitmaps are allocated once when the heap is
//! reserved and never move, so their base addresses can be published to the host.

pub mod side_bitmap;
pub mod pin_bit;
pub mod vo_bit;

use crate::util::Address;
use side_bitmap::SideBitmap;

pub struct HeapMetadata {
    /// Valid object bits. See [`vo_bit`].
    pub(crate) vo: SideBitmap,
    /// Mark bits. Valid from the start of a closure until the next collection prepares.
    pub(crate) mark: SideBitmap,
    /// Pins requested by the host through `pin_object`.
    pub(crate) pin: SideBitmap,
    /// Pins that only last for the current collection, e.g. conservative roots.
    pub(crate) gc_pin: SideBitmap,
}

impl HeapMetadata {
    pub fn new(heap_start: Address, heap_end: Address) -> Self {
        Self {
            vo: SideBitmap::new(heap_start, heap_end),
            mark: SideBitmap::new(heap_start, heap_end),
            pin: SideBitmap::new(heap_start, heap_end),
            gc_pin: SideBitmap::new(heap_start, heap_end),
        }
    }

    /// Set the mark bit of an object. Returns true if this call marked it.
    pub fn test_and_mark(&self, object: crate::util::ObjectReference) -> bool {
        self.mark.test_and_set(object.to_raw_address())
    }

    pub fn is_marked(&self, object: crate::util::ObjectReference) -> bool {
        self.mark.is_set(object.to_raw_address())
    }

    /// Clear every bit of every bitmap in `[start, end)`.
    pub fn clear_all(&self, start: Address, end: Address) {
        self.vo.clear_range(start, end);
        self.mark.clear_range(start, end);
        self.pin.clear_range(start, end);
        self.gc_pin.clear_range(start, end);
    }
}
