//! A host for tests. Mutators are plain Rust threads, roots and weak references live off-heap,
//! and objects use a simple layout:
//!
//! ```text
//! | header | ref 0 | ref 1 | ... | payload |
//! ```
//!
//! The low 32 bits of the header hold the size of the object in bytes, and the high 32 bits hold
//! the number of reference fields.
//!
//! A reference object (soft, weak or phantom) keeps its referent in the first payload word, which
//! is not reported as a field.

// Not every test uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use crate::memory_manager;
use crate::plan::{AllocationSemantics, CollectionState, MutatorHandle};
use crate::util::alloc::AllocationError;
use crate::util::constants::BYTES_IN_WORD;
use crate::util::conversions::raw_align_up;
use crate::util::opaque_pointer::*;
use crate::util::{Address, ObjectReference};
use crate::vm::{GCThreadContext, ReferenceQuery, RootsClosure, Slot, SlotsClosure, Upcalls};
use crate::MMTK;

pub const HEADER_BYTES: usize = BYTES_IN_WORD;

/// The size of an object with `nrefs` fields and `payload_bytes` of payload.
pub fn object_bytes(nrefs: usize, payload_bytes: usize) -> usize {
    HEADER_BYTES + nrefs * BYTES_IN_WORD + raw_align_up(payload_bytes, BYTES_IN_WORD)
}

fn header(object: ObjectReference) -> usize {
    unsafe { object.to_raw_address().load::<usize>() }
}

pub fn object_size(object: ObjectReference) -> usize {
    header(object) & 0xffff_ffff
}

pub fn num_refs(object: ObjectReference) -> usize {
    header(object) >> 32
}

pub fn field_slot(object: ObjectReference, index: usize) -> Slot {
    debug_assert!(index < num_refs(object));
    Slot::from_address(object.to_raw_address() + HEADER_BYTES + index * BYTES_IN_WORD)
}

pub fn get_field(object: ObjectReference, index: usize) -> ObjectReference {
    field_slot(object, index).load()
}

pub fn set_field(object: ObjectReference, index: usize, value: ObjectReference) {
    field_slot(object, index).store(value)
}

/// The first byte after the reference fields.
pub fn payload_start(object: ObjectReference) -> Address {
    object.to_raw_address() + HEADER_BYTES + num_refs(object) * BYTES_IN_WORD
}

pub fn get_referent(reff: ObjectReference) -> ObjectReference {
    let value = unsafe { payload_start(reff).load::<usize>() };
    ObjectReference::from_raw_address(unsafe { Address::from_usize(value) })
}

pub fn set_referent(reff: ObjectReference, referent: ObjectReference) {
    unsafe { payload_start(reff).store::<usize>(referent.value()) }
}

/// Things the host observed, in the order they happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    StopAll,
    ResumeAll,
    Nullify,
    CallHandlers,
    ScheduleFinalization,
    EnqueueReferences,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ThreadStatus {
    Running,
    Parked,
    Native,
}

struct ThreadRecord {
    handle: MutatorHandle,
    status: ThreadStatus,
}

#[derive(Default)]
struct ThreadTable {
    threads: HashMap<VMMutatorThread, ThreadRecord>,
    /// Set from `stop_all_mutators` until `resume_mutators`.
    stopping: bool,
}

struct RootEntry {
    /// The mutator whose stack holds the root. `None` for a global root.
    owner: Option<VMMutatorThread>,
    cell: Box<AtomicUsize>,
}

impl RootEntry {
    fn slot(&self) -> Slot {
        Slot::from_address(Address::from_ref::<AtomicUsize>(&self.cell))
    }
}

#[derive(Default)]
struct MockHostState {
    mmtk: OnceLock<&'static MMTK>,
    table: Mutex<ThreadTable>,
    table_changed: Condvar,
    roots: Mutex<Vec<RootEntry>>,
    conservative_roots: Mutex<Vec<ObjectReference>>,
    weak_refs: Mutex<Vec<Box<AtomicUsize>>>,
    /// Weak references cleared in the current collection. Their handlers have not run yet.
    pending_handlers: Mutex<Vec<usize>>,
    handled_weak_refs: Mutex<Vec<usize>>,
    events: Mutex<Vec<HostEvent>>,
    out_of_memory: Mutex<Vec<AllocationError>>,
    root_rescans: AtomicUsize,
    scanned_mutators: Mutex<Vec<MutatorHandle>>,
    next_thread_id: AtomicUsize,
    /// The alignment and offset of every object when it is copied. `None` for the defaults.
    copy_alignment: Mutex<Option<(usize, usize)>>,
    /// Reference objects handed back with cleared referents.
    enqueued_references: Mutex<Vec<ObjectReference>>,
}

/// The test host. Clones share the same state: one clone is bound to the MMTk instance as its
/// upcalls, and the test keeps another.
#[derive(Clone, Default)]
pub struct MockHost {
    state: Arc<MockHostState>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, mmtk: &'static MMTK) {
        if self.state.mmtk.set(mmtk).is_err() {
            panic!("The mock host is already attached to an MMTk instance");
        }
    }

    pub fn mmtk(&self) -> &'static MMTK {
        self.state
            .mmtk
            .get()
            .expect("The mock host is not attached to an MMTk instance")
    }

    fn new_thread_pointer(&self) -> OpaquePointer {
        let id = self.state.next_thread_id.fetch_add(1, Ordering::SeqCst) + 1;
        OpaquePointer::from_address(unsafe { Address::from_usize(id << 4) })
    }

    pub fn new_thread(&self) -> VMThread {
        VMThread(self.new_thread_pointer())
    }

    pub fn new_mutator_tls(&self) -> VMMutatorThread {
        VMMutatorThread(self.new_thread())
    }

    fn table(&self) -> MutexGuard<'_, ThreadTable> {
        self.state.table.lock().unwrap()
    }

    fn set_status(&self, table: &mut ThreadTable, tls: VMMutatorThread, status: ThreadStatus) {
        if let Some(record) = table.threads.get_mut(&tls) {
            record.status = status;
            self.state.table_changed.notify_all();
        }
    }

    /// Bind a mutator for the current thread. The thread must reach a safepoint (allocation,
    /// `gc_poll` or `enter_native`) whenever another thread collects.
    pub fn bind_mutator(&self, tls: VMMutatorThread) -> MutatorHandle {
        let mut table = self.table();
        while table.stopping {
            table = self.state.table_changed.wait(table).unwrap();
        }
        let handle = memory_manager::bind_mutator(self.mmtk(), tls);
        table.threads.insert(
            tls,
            ThreadRecord {
                handle,
                status: ThreadStatus::Running,
            },
        );
        handle
    }

    pub fn destroy_mutator(&self, tls: VMMutatorThread, handle: MutatorHandle) {
        let mut table = self.table();
        while table.stopping {
            table = self.state.table_changed.wait(table).unwrap();
        }
        // The lock keeps a collection from starting while the mutator gives its blocks back.
        memory_manager::destroy_mutator(self.mmtk(), handle);
        table.threads.remove(&tls);
        self.state.table_changed.notify_all();
        drop(table);
        self.state.roots.lock().unwrap().iter_mut().for_each(|entry| {
            if entry.owner == Some(tls) {
                entry.cell.store(0, Ordering::SeqCst);
            }
        });
    }

    /// The thread no longer touches the heap. A collection does not wait for it.
    pub fn enter_native(&self, tls: VMMutatorThread) {
        let mut table = self.table();
        self.set_status(&mut table, tls, ThreadStatus::Native);
    }

    /// Return from native code. Waits for a collection in progress to finish.
    pub fn leave_native(&self, tls: VMMutatorThread) {
        let mut table = self.table();
        while table.stopping {
            table = self.state.table_changed.wait(table).unwrap();
        }
        self.set_status(&mut table, tls, ThreadStatus::Running);
    }

    /// Allocate and initialize an object. Returns null if the allocation failed.
    pub fn alloc_object(
        &self,
        handle: MutatorHandle,
        nrefs: usize,
        payload_bytes: usize,
        semantics: AllocationSemantics,
    ) -> ObjectReference {
        self.alloc_object_aligned(handle, nrefs, payload_bytes, BYTES_IN_WORD, 0, semantics)
    }

    /// Like `alloc_object`, with `(object + offset) % align == 0`.
    pub fn alloc_object_aligned(
        &self,
        handle: MutatorHandle,
        nrefs: usize,
        payload_bytes: usize,
        align: usize,
        offset: usize,
        semantics: AllocationSemantics,
    ) -> ObjectReference {
        let mmtk = self.mmtk();
        let size = object_bytes(nrefs, payload_bytes);
        let selector = memory_manager::get_allocator_mapping(mmtk, semantics);
        let addr = memory_manager::alloc(mmtk, handle, size, align, offset, selector);
        if addr.is_zero() {
            return ObjectReference::NULL;
        }
        unsafe { addr.store::<usize>(size | (nrefs << 32)) };
        let object = ObjectReference::from_raw_address(addr);
        memory_manager::post_alloc(mmtk, handle, object, size, selector);
        object
    }

    /// Allocate a reference object with the given referent. It has no reference fields, so the
    /// referent is only reached through reference processing.
    pub fn alloc_reference(
        &self,
        handle: MutatorHandle,
        referent: ObjectReference,
    ) -> ObjectReference {
        let reff = self.alloc_object(handle, 0, BYTES_IN_WORD, AllocationSemantics::Default);
        if !reff.is_null() {
            set_referent(reff, referent);
        }
        reff
    }

    /// The reference objects whose referents were cleared, in every collection so far.
    pub fn enqueued_references(&self) -> Vec<ObjectReference> {
        self.state.enqueued_references.lock().unwrap().clone()
    }

    /// Collect, and wait until the collection is over.
    pub fn collect(&self, tls: VMMutatorThread) {
        memory_manager::handle_user_collection_request(self.mmtk(), tls);
    }

    fn add_root_entry(&self, owner: Option<VMMutatorThread>, object: ObjectReference) -> usize {
        let mut roots = self.state.roots.lock().unwrap();
        roots.push(RootEntry {
            owner,
            cell: Box::new(AtomicUsize::new(object.value())),
        });
        roots.len() - 1
    }

    /// Add a global root. Returns its id.
    pub fn add_root(&self, object: ObjectReference) -> usize {
        self.add_root_entry(None, object)
    }

    /// Add a root on the stack of a mutator. Returns its id.
    pub fn add_stack_root(&self, tls: VMMutatorThread, object: ObjectReference) -> usize {
        self.add_root_entry(Some(tls), object)
    }

    pub fn get_root(&self, id: usize) -> ObjectReference {
        let value = self.state.roots.lock().unwrap()[id].cell.load(Ordering::SeqCst);
        ObjectReference::from_raw_address(unsafe { Address::from_usize(value) })
    }

    pub fn set_root(&self, id: usize, object: ObjectReference) {
        self.state.roots.lock().unwrap()[id]
            .cell
            .store(object.value(), Ordering::SeqCst);
    }

    /// Report `object` as a conservative root in every collection from now on.
    pub fn add_conservative_root(&self, object: ObjectReference) {
        self.state.conservative_roots.lock().unwrap().push(object);
    }

    pub fn clear_conservative_roots(&self) {
        self.state.conservative_roots.lock().unwrap().clear();
    }

    /// Add a weak reference. Returns its id.
    pub fn add_weak_ref(&self, object: ObjectReference) -> usize {
        let mut weak_refs = self.state.weak_refs.lock().unwrap();
        weak_refs.push(Box::new(AtomicUsize::new(object.value())));
        weak_refs.len() - 1
    }

    pub fn get_weak_ref(&self, id: usize) -> ObjectReference {
        let value = self.state.weak_refs.lock().unwrap()[id].load(Ordering::SeqCst);
        ObjectReference::from_raw_address(unsafe { Address::from_usize(value) })
    }

    /// The weak references whose handlers have run.
    pub fn handled_weak_refs(&self) -> Vec<usize> {
        self.state.handled_weak_refs.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.state.events.lock().unwrap().clone()
    }

    /// Wait until `event` has been observed `count` times. Some events happen after the mutators
    /// are resumed, so a mutator may return from a collection before it sees them. Panics after
    /// ten seconds.
    pub fn wait_for_event(&self, event: HostEvent, count: usize) {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while self.events().iter().filter(|e| **e == event).count() < count {
            assert!(
                std::time::Instant::now() < deadline,
                "Timed out waiting for {:?}",
                event
            );
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn clear_events(&self) {
        self.state.events.lock().unwrap().clear();
    }

    fn push_event(&self, event: HostEvent) {
        self.state.events.lock().unwrap().push(event);
    }

    pub fn out_of_memory_errors(&self) -> Vec<AllocationError> {
        self.state.out_of_memory.lock().unwrap().clone()
    }

    pub fn root_rescans(&self) -> usize {
        self.state.root_rescans.load(Ordering::SeqCst)
    }

    /// Copy every object with `(new_object + offset) % align == 0` from now on.
    pub fn set_copy_alignment(&self, align: usize, offset: usize) {
        *self.state.copy_alignment.lock().unwrap() = Some((align, offset));
    }

    /// The mutators whose roots were scanned, in every collection so far.
    pub fn scanned_mutators(&self) -> Vec<MutatorHandle> {
        self.state.scanned_mutators.lock().unwrap().clone()
    }
}

impl Upcalls for MockHost {
    fn stop_all_mutators(
        &self,
        _tls: VMWorkerThread,
        _scan_mutators_in_safepoint: bool,
        mutator_visitor: &mut dyn FnMut(MutatorHandle),
    ) {
        self.push_event(HostEvent::StopAll);
        let handles: Vec<MutatorHandle> = {
            let mut table = self.table();
            table.stopping = true;
            while table
                .threads
                .values()
                .any(|record| record.status == ThreadStatus::Running)
            {
                table = self.state.table_changed.wait(table).unwrap();
            }
            table.threads.values().map(|record| record.handle).collect()
        };
        for handle in handles {
            mutator_visitor(handle);
        }
    }

    fn resume_mutators(&self, _tls: VMWorkerThread) {
        self.push_event(HostEvent::ResumeAll);
        let mut table = self.table();
        table.stopping = false;
        self.state.table_changed.notify_all();
    }

    fn block_for_gc(&self, tls: VMMutatorThread) {
        let mmtk = self.mmtk();
        let mut table = self.table();
        self.set_status(&mut table, tls, ThreadStatus::Parked);
        loop {
            let over = !table.stopping
                && !mmtk.gc_requester.is_requested()
                && mmtk.collection_state() == CollectionState::Idle;
            if over {
                break;
            }
            // The collection state is not guarded by the table lock, so poll it.
            table = self
                .state
                .table_changed
                .wait_timeout(table, Duration::from_millis(1))
                .unwrap()
                .0;
        }
        self.set_status(&mut table, tls, ThreadStatus::Running);
    }

    fn spawn_gc_thread(&self, _tls: VMThread, ctx: GCThreadContext) {
        let name = match ctx {
            GCThreadContext::Controller(_) => "mock-gc-controller",
            GCThreadContext::Worker(_) => "mock-gc-worker",
        };
        let tls = VMWorkerThread(self.new_thread());
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || ctx.run(tls))
            .unwrap();
    }

    fn out_of_memory(&self, _tls: VMThread, err_kind: AllocationError) {
        self.state.out_of_memory.lock().unwrap().push(err_kind);
    }

    fn schedule_finalization(&self, _tls: VMWorkerThread) {
        self.push_event(HostEvent::ScheduleFinalization);
    }

    fn scan_roots_in_mutator_thread(
        &self,
        _tls: VMWorkerThread,
        mutator_tls: VMMutatorThread,
        mutator: MutatorHandle,
        roots: &mut RootsClosure,
    ) {
        self.state.scanned_mutators.lock().unwrap().push(mutator);
        for entry in self.state.roots.lock().unwrap().iter() {
            if entry.owner == Some(mutator_tls) {
                roots.report_slot(entry.slot());
            }
        }
    }

    fn scan_vm_specific_roots(&self, _tls: VMWorkerThread, roots: &mut RootsClosure) {
        for entry in self.state.roots.lock().unwrap().iter() {
            if entry.owner.is_none() {
                roots.report_slot(entry.slot());
            }
        }
        for node in self.state.conservative_roots.lock().unwrap().iter() {
            roots.report_node(*node);
        }
    }

    fn prepare_for_roots_re_scanning(&self) {
        self.state.root_rescans.fetch_add(1, Ordering::SeqCst);
    }

    fn scan_object(&self, _tls: VMWorkerThread, object: ObjectReference, slots: &mut SlotsClosure) {
        let nrefs = num_refs(object);
        slots.reserve(nrefs);
        for i in 0..nrefs {
            slots.push(field_slot(object, i));
        }
    }

    fn get_object_size(&self, object: ObjectReference) -> usize {
        object_size(object)
    }

    fn get_object_align_when_copied(&self, _object: ObjectReference) -> usize {
        self.state
            .copy_alignment
            .lock()
            .unwrap()
            .map_or(BYTES_IN_WORD, |(align, _)| align)
    }

    fn get_object_align_offset_when_copied(&self, _object: ObjectReference) -> usize {
        self.state
            .copy_alignment
            .lock()
            .unwrap()
            .map_or(0, |(_, offset)| offset)
    }

    fn weak_ref_stack_nullify(&self, _tls: VMWorkerThread, query: &dyn ReferenceQuery) {
        self.push_event(HostEvent::Nullify);
        let weak_refs = self.state.weak_refs.lock().unwrap();
        let mut pending = self.state.pending_handlers.lock().unwrap();
        for (id, cell) in weak_refs.iter().enumerate() {
            let value = cell.load(Ordering::SeqCst);
            if value == 0 {
                continue;
            }
            let object = ObjectReference::from_raw_address(unsafe { Address::from_usize(value) });
            let resolved = query.resolve_weak(object);
            if resolved.is_null() {
                pending.push(id);
            }
            cell.store(resolved.value(), Ordering::SeqCst);
        }
    }

    fn get_referent(&self, reff: ObjectReference) -> ObjectReference {
        get_referent(reff)
    }

    fn set_referent(&self, reff: ObjectReference, referent: ObjectReference) {
        set_referent(reff, referent)
    }

    fn enqueue_references(&self, _tls: VMWorkerThread, refs: &[ObjectReference]) {
        self.push_event(HostEvent::EnqueueReferences);
        self.state
            .enqueued_references
            .lock()
            .unwrap()
            .extend_from_slice(refs);
    }

    fn weak_ref_stack_call_handlers(&self, _tls: VMWorkerThread) {
        self.push_event(HostEvent::CallHandlers);
        let mut pending = self.state.pending_handlers.lock().unwrap();
        self.state
            .handled_weak_refs
            .lock()
            .unwrap()
            .extend(pending.drain(..));
    }
}
