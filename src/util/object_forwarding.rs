//! Forwarding of evacuated objects.
//!
//! Objects are claimed for copying with their mark bit, so at most one GC worker copies each
//! object. The worker that copied an object publishes the new address here. Other workers that
//! reach the same object wait for the entry to appear.

use std::collections::HashMap;

use crate::util::ObjectReference;

const LOG_SHARDS: usize = 6;
const SHARDS: usize = 1 << LOG_SHARDS;

/// A sharded map from the old address of each object moved in the current collection to its new
/// address. An object that could not be copied is forwarded to itself.
pub struct ForwardingTable {
    shards: Vec<spin::Mutex<HashMap<ObjectReference, ObjectReference>>>,
}

impl Default for ForwardingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| spin::Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, object: ObjectReference) -> &spin::Mutex<HashMap<ObjectReference, ObjectReference>> {
        // Objects are at least word aligned, so skip the low bits.
        let index = (object.value() >> crate::util::constants::LOG_MIN_OBJECT_SIZE) & (SHARDS - 1);
        &self.shards[index]
    }

    /// Publish the new address of an object. Each object is forwarded at most once per collection.
    pub fn insert(&self, from: ObjectReference, to: ObjectReference) {
        let old = self.shard(from).lock().insert(from, to);
        debug_assert!(old.is_none(), "{} is forwarded twice", from);
    }

    /// The new address of an object, or `None` if it has not been forwarded (yet).
    pub fn get(&self, from: ObjectReference) -> Option<ObjectReference> {
        self.shard(from).lock().get(&from).copied()
    }

    /// Wait until the object is forwarded by another worker, and return its new address.
    pub fn wait_for(&self, from: ObjectReference) -> ObjectReference {
        let mut spins = 0usize;
        loop {
            if let Some(to) = self.get(from) {
                return to;
            }
            spins += 1;
            if spins < 128 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Number of objects forwarded in this collection.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every entry. Called at the end of each collection.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }
}
