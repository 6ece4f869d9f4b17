//! Valid object bit (VO bit)
//!
//! The VO bit is set at the address of an object reference by `post_alloc`, and cleared when
//! the collector finds the object dead or evacuated. An address is a valid object exactly when
//! its VO bit is set, which is what `is_mmtk_object` answers.
//!
//! During a collection both the from-space copy and the to-space copy of an evacuated object have
//! their VO bits set: a slot may be visited before and after it is updated. The from-space bit is
//! cleared when the space releases the block.

use super::HeapMetadata;
use crate::util::constants::MIN_OBJECT_SIZE;
use crate::util::{Address, ObjectReference};

impl HeapMetadata {
    pub fn set_vo_bit(&self, object: ObjectReference) {
        self.vo.set(object.to_raw_address());
    }

    pub fn unset_vo_bit(&self, object: ObjectReference) {
        self.vo.clear(object.to_raw_address());
    }

    pub fn is_vo_bit_set(&self, object: ObjectReference) -> bool {
        self.vo.is_set(object.to_raw_address())
    }

    /// Is `addr` the address of a valid object in the heap?
    /// Any address is accepted, including addresses outside the heap and unaligned ones.
    pub fn is_valid_object(&self, addr: Address) -> bool {
        !addr.is_zero()
            && self.vo.covers(addr)
            && addr.is_aligned_to(MIN_OBJECT_SIZE)
            && self.vo.is_set(addr)
    }
}
