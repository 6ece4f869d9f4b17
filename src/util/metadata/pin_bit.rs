use super::HeapMetadata;
use crate::util::{Address, ObjectReference};

impl HeapMetadata {
    /// Pin the object. Returns true if the object was not pinned before.
    pub fn pin_object(&self, object: ObjectReference) -> bool {
        self.pin.test_and_set(object.to_raw_address())
    }

    /// Unpin the object. Returns true if the object was pinned.
    pub fn unpin_object(&self, object: ObjectReference) -> bool {
        self.pin.test_and_clear(object.to_raw_address())
    }

    /// Is the object pinned by the host?
    pub fn is_object_pinned(&self, object: ObjectReference) -> bool {
        self.pin.is_set(object.to_raw_address())
    }

    /// Pin the object for the current collection only.
    pub fn pin_for_gc(&self, object: ObjectReference) {
        self.gc_pin.set(object.to_raw_address());
    }

    /// Can the object be moved in the current collection?
    pub fn is_pinned_for_gc(&self, object: ObjectReference) -> bool {
        let addr = object.to_raw_address();
        self.pin.is_set(addr) || self.gc_pin.is_set(addr)
    }

    /// Drop all the pins of the current collection in `[start, end)`.
    pub fn clear_gc_pins(&self, start: Address, end: Address) {
        self.gc_pin.clear_range(start, end);
    }
}
