//! Slots are the locations the host reports as holding object references: fields of objects,
//! stack words, global variables, and so on.

use std::fmt::Debug;
use std::hash::Hash;

use atomic::Atomic;

use crate::util::{Address, ObjectReference};

/// A `Slot` points to a word-sized memory location that holds either null or an object reference.
/// The collector loads the reference, traces it, and stores the new address if the object moved.
///
/// `Slot` has pointer semantics: a copied `Slot` points to the same location.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    slot_addr: *mut Atomic<ObjectReference>,
}

unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Slot {
    /// Create a slot from the address of the location.
    pub fn from_address(address: Address) -> Self {
        Self {
            slot_addr: address.to_mut_ptr(),
        }
    }

    /// The address of the location.
    pub fn as_address(&self) -> Address {
        Address::from_mut_ptr(self.slot_addr)
    }

    /// Load the object reference held in the slot. Returns [`ObjectReference::NULL`] for null.
    pub fn load(&self) -> ObjectReference {
        unsafe { (*self.slot_addr).load(atomic::Ordering::Relaxed) }
    }

    /// Store an object reference into the slot.
    pub fn store(&self, object: ObjectReference) {
        unsafe { (*self.slot_addr).store(object, atomic::Ordering::Relaxed) }
    }
}

impl Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_address())
    }
}
