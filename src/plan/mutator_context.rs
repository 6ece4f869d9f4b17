//! Mutator context for each application thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use atomic_refcell::AtomicRefCell;
use enum_map::EnumMap;

use crate::plan::AllocationSemantics;
use crate::util::alloc::allocators::{
    Allocators, DEFAULT_BUMP_ALLOCATOR, IMMORTAL_BUMP_ALLOCATOR,
};
use crate::util::alloc::{Allocator, AllocatorSelector};
use crate::util::constants::{MAX_ALIGNMENT, MAX_NON_LOS_DEFAULT_ALLOC_BYTES, MIN_ALIGNMENT};
use crate::util::opaque_pointer::*;
use crate::util::{Address, ObjectReference};
use crate::MMTK;

lazy_static! {
    /// Which allocator serves each allocation semantics.
    pub static ref ALLOCATOR_MAPPING: EnumMap<AllocationSemantics, AllocatorSelector> = enum_map::enum_map! {
        AllocationSemantics::Default => AllocatorSelector::BumpPointer(DEFAULT_BUMP_ALLOCATOR),
        AllocationSemantics::Immortal => AllocatorSelector::BumpPointer(IMMORTAL_BUMP_ALLOCATOR),
        AllocationSemantics::Los => AllocatorSelector::LargeObject(0),
    };
}

/// A token that names a bound mutator. It is a registry index plus the generation of the slot, so
/// a handle kept after [`crate::memory_manager::destroy_mutator`] is recognized as stale even if
/// the slot has been reused.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MutatorHandle {
    pub index: u32,
    pub generation: u32,
}

/// A mutator is the allocation context of one host thread.
///
/// The host only touches a mutator from its own thread, through
/// [`crate::memory_manager::with_mutator`] or the allocation functions. The collector never
/// touches the allocators of a mutator: the block a mutator is bump-allocating into stays valid
/// across collections.
#[repr(C)]
pub struct Mutator {
    pub allocators: Allocators,
    pub mutator_tls: VMMutatorThread,
    pub handle: MutatorHandle,
    mmtk: &'static MMTK,
}

impl Mutator {
    pub(crate) fn new(mutator_tls: VMMutatorThread, handle: MutatorHandle, mmtk: &'static MMTK) -> Self {
        Mutator {
            allocators: Allocators::new(mutator_tls, mmtk),
            mutator_tls,
            handle,
            mmtk,
        }
    }

    /// The allocator that actually serves a request. Default-space objects of
    /// `MAX_NON_LOS_DEFAULT_ALLOC_BYTES` or more go to the large object allocator. `alloc` and
    /// `post_alloc` must agree on this.
    pub fn resolve_selector(size: usize, selector: AllocatorSelector) -> AllocatorSelector {
        match selector {
            AllocatorSelector::BumpPointer(DEFAULT_BUMP_ALLOCATOR)
                if size >= MAX_NON_LOS_DEFAULT_ALLOC_BYTES =>
            {
                AllocatorSelector::LargeObject(0)
            }
            _ => selector,
        }
    }

    pub fn alloc(
        &mut self,
        size: usize,
        align: usize,
        offset: usize,
        selector: AllocatorSelector,
    ) -> Address {
        debug_assert!(
            align.is_power_of_two() && (MIN_ALIGNMENT..=MAX_ALIGNMENT).contains(&align),
            "Invalid alignment {}",
            align
        );
        let selector = Self::resolve_selector(size, selector);
        self.allocators
            .get_allocator_mut(selector)
            .alloc(size, align, offset)
    }

    /// Establish a freshly allocated object: from now on it is a valid object, it can be pinned,
    /// and the collector traces it.
    pub fn post_alloc(&mut self, object: ObjectReference, bytes: usize, selector: AllocatorSelector) {
        let selector = Self::resolve_selector(bytes, selector);
        debug_assert!(
            !matches!(selector, AllocatorSelector::None),
            "post_alloc for {} without an allocator",
            object
        );
        self.mmtk.get_plan().metadata.set_vo_bit(object);
    }

    /// Give the thread-local blocks back to the heap.
    pub fn flush(&mut self) {
        self.allocators.retire_all();
    }

    pub fn get_allocator_mut(&mut self, selector: AllocatorSelector) -> &mut dyn Allocator {
        self.allocators.get_allocator_mut(selector)
    }

    /// The bump cursor of the allocator, or zero for allocators without one.
    pub fn cursor_of(&self, selector: AllocatorSelector) -> Address {
        match selector {
            AllocatorSelector::BumpPointer(index) => self.allocators.bump_pointer[index as usize].cursor,
            _ => Address::ZERO,
        }
    }

    /// The bump limit of the allocator, or zero for allocators without one.
    pub fn limit_of(&self, selector: AllocatorSelector) -> Address {
        match selector {
            AllocatorSelector::BumpPointer(index) => self.allocators.bump_pointer[index as usize].limit,
            _ => Address::ZERO,
        }
    }

    pub fn get_tls(&self) -> VMMutatorThread {
        self.mutator_tls
    }
}

struct MutatorSlot {
    /// Bumped every time the slot is freed.
    generation: AtomicU32,
    mutator: AtomicRefCell<Option<Box<Mutator>>>,
}

struct MutatorRegistrySync {
    /// Free slot indices. Popped from the end.
    free: Vec<u32>,
    bound: HashMap<VMMutatorThread, MutatorHandle>,
    /// The thread bound to each slot.
    owners: Vec<Option<VMMutatorThread>>,
}

/// The table of bound mutators. A fixed number of slots is allocated up front, so a slot never
/// moves while its mutator is borrowed.
pub struct MutatorRegistry {
    slots: Vec<MutatorSlot>,
    sync: Mutex<MutatorRegistrySync>,
}

impl MutatorRegistry {
    pub fn new(capacity: usize) -> Self {
        MutatorRegistry {
            slots: (0..capacity)
                .map(|_| MutatorSlot {
                    generation: AtomicU32::new(0),
                    mutator: AtomicRefCell::new(None),
                })
                .collect(),
            sync: Mutex::new(MutatorRegistrySync {
                free: (0..capacity as u32).rev().collect(),
                bound: HashMap::new(),
                owners: vec![None; capacity],
            }),
        }
    }

    /// Register a mutator for `tls`. Panics if the thread is already bound, or if every slot
    /// is taken.
    pub fn bind(&self, tls: VMMutatorThread, mmtk: &'static MMTK) -> MutatorHandle {
        let mut sync = self.sync.lock().unwrap();
        if let Some(handle) = sync.bound.get(&tls) {
            panic!("Thread {:?} is already bound to mutator {:?}", tls, handle);
        }
        let Some(index) = sync.free.pop() else {
            panic!(
                "Cannot bind thread {:?}: all {} mutator slots are in use",
                tls,
                self.slots.len()
            );
        };
        let slot = &self.slots[index as usize];
        let handle = MutatorHandle {
            index,
            generation: slot.generation.load(Ordering::SeqCst),
        };
        *slot.mutator.borrow_mut() = Some(Box::new(Mutator::new(tls, handle, mmtk)));
        sync.bound.insert(tls, handle);
        sync.owners[index as usize] = Some(tls);
        debug!("Bound {:?} to {:?}", tls, handle);
        handle
    }

    /// Remove a mutator and return it. Panics if the handle is stale.
    pub fn unbind(&self, handle: MutatorHandle) -> Box<Mutator> {
        let mut sync = self.sync.lock().unwrap();
        if !self.is_valid_locked(&sync, handle) {
            panic!("Mutator handle {:?} is stale or was never bound", handle);
        }
        let slot = &self.slots[handle.index as usize];
        let Some(mutator) = slot.mutator.borrow_mut().take() else {
            panic!("Mutator handle {:?} has no mutator", handle);
        };
        slot.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(tls) = sync.owners[handle.index as usize].take() {
            sync.bound.remove(&tls);
        }
        sync.free.push(handle.index);
        debug!("Unbound {:?}", handle);
        mutator
    }

    fn is_valid_locked(&self, sync: &MutatorRegistrySync, handle: MutatorHandle) -> bool {
        (handle.index as usize) < self.slots.len()
            && sync.owners[handle.index as usize].is_some()
            && self.slots[handle.index as usize]
                .generation
                .load(Ordering::SeqCst)
                == handle.generation
    }

    /// Is the handle a currently bound mutator?
    pub fn is_valid(&self, handle: MutatorHandle) -> bool {
        let sync = self.sync.lock().unwrap();
        self.is_valid_locked(&sync, handle)
    }

    /// Borrow the mutator mutably. Panics if the handle is stale, or the mutator is already
    /// borrowed.
    pub fn with_mutator<R>(&self, handle: MutatorHandle, f: impl FnOnce(&mut Mutator) -> R) -> R {
        let slot = self
            .slots
            .get(handle.index as usize)
            .unwrap_or_else(|| panic!("Mutator handle {:?} is out of range", handle));
        let mut guard = slot.mutator.borrow_mut();
        match guard.as_mut() {
            Some(mutator) if mutator.handle == handle => f(mutator),
            _ => panic!("Mutator handle {:?} is stale or was never bound", handle),
        }
    }

    /// The handles of all bound mutators.
    pub fn handles(&self) -> Vec<MutatorHandle> {
        let sync = self.sync.lock().unwrap();
        let mut handles: Vec<MutatorHandle> = sync.bound.values().copied().collect();
        handles.sort_by_key(|h| h.index);
        handles
    }

    pub fn number_of_mutators(&self) -> usize {
        self.sync.lock().unwrap().bound.len()
    }

    /// Is the thread bound to a mutator?
    pub fn is_mutator(&self, tls: VMMutatorThread) -> bool {
        self.sync.lock().unwrap().bound.contains_key(&tls)
    }

    /// The thread bound to the mutator, or `None` if the handle is stale.
    pub fn tls_of(&self, handle: MutatorHandle) -> Option<VMMutatorThread> {
        let sync = self.sync.lock().unwrap();
        if self.is_valid_locked(&sync, handle) {
            sync.owners[handle.index as usize]
        } else {
            None
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
