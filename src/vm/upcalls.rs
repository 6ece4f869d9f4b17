use crate::plan::MutatorHandle;
use crate::scheduler::{GCController, GCWorker};
use crate::util::alloc::AllocationError;
use crate::util::constants::MIN_ALIGNMENT;
use crate::util::opaque_pointer::*;
use crate::util::{Address, ObjectReference};
use crate::vm::closure::{RootsClosure, SlotsClosure};
use crate::vm::reference_glue::ReferenceQuery;

/// The context a newly spawned GC thread runs.
pub enum GCThreadContext {
    /// The GC controller thread.
    Controller(Box<GCController>),
    /// A GC worker thread.
    Worker(Box<GCWorker>),
}

impl GCThreadContext {
    /// Run the GC thread. This does not return. The host calls this (or
    /// [`crate::memory_manager::start_control_collector`] and
    /// [`crate::memory_manager::start_worker`]) from the thread it created in
    /// [`Upcalls::spawn_gc_thread`].
    pub fn run(self, tls: VMWorkerThread) {
        match self {
            GCThreadContext::Controller(mut controller) => controller.run(tls),
            GCThreadContext::Worker(mut worker) => worker.run(tls),
        }
    }
}

/// The functions the host provides to the collector. A host implements this trait once, and
/// hands it to [`crate::memory_manager::bind_upcalls`] before the collector is used.
///
/// Upcalls are invoked from GC threads unless stated otherwise, and must not call back into the
/// collector in ways that would block on the current collection.
pub trait Upcalls: Send + Sync + 'static {
    /// Stop all the mutator threads for a collection. Returns when every mutator is stopped at a
    /// safepoint or is running native code that cannot touch the heap.
    ///
    /// For each stopped mutator, the host calls `mutator_visitor` with its handle. If
    /// `scan_mutators_in_safepoint` is true, the collector scans the mutator as soon as it is
    /// visited. Mutators that are never visited are scanned after this returns.
    fn stop_all_mutators(
        &self,
        tls: VMWorkerThread,
        scan_mutators_in_safepoint: bool,
        mutator_visitor: &mut dyn FnMut(MutatorHandle),
    );

    /// Resume the mutators stopped by [`Upcalls::stop_all_mutators`].
    fn resume_mutators(&self, tls: VMWorkerThread);

    /// Block the current mutator thread until the pending collection is finished. Called from a
    /// mutator thread, when it allocates while a collection is requested or cannot allocate
    /// without one, and from [`crate::memory_manager::handle_user_collection_request`].
    fn block_for_gc(&self, tls: VMMutatorThread);

    /// Create a GC thread that runs `ctx`. The new thread must call [`GCThreadContext::run`].
    fn spawn_gc_thread(&self, tls: VMThread, ctx: GCThreadContext);

    /// The collector could not satisfy an allocation. The default implementation panics. If the
    /// host returns, the allocation returns a zero address.
    fn out_of_memory(&self, _tls: VMThread, err_kind: AllocationError) {
        panic!("Out of memory with {:?}!", err_kind);
    }

    /// Objects became ready for finalization in the last collection. The host should start
    /// fetching them with [`crate::memory_manager::get_finalized_object`].
    fn schedule_finalization(&self, _tls: VMWorkerThread) {}

    /// Called once by each GC thread when it starts, before it runs any work.
    fn init_gc_worker_thread(&self, _tls: VMWorkerThread, _ordinal: usize) {}

    /// Report the roots of a mutator: its stack slots and registers.
    fn scan_roots_in_mutator_thread(
        &self,
        tls: VMWorkerThread,
        mutator_tls: VMMutatorThread,
        mutator: MutatorHandle,
        roots: &mut RootsClosure,
    );

    /// Report the roots that do not belong to any mutator: globals, handle tables, and so on.
    fn scan_vm_specific_roots(&self, tls: VMWorkerThread, roots: &mut RootsClosure);

    /// The roots are about to be scanned again in the same collection. The host should forget any
    /// state that makes it report a root only once.
    fn prepare_for_roots_re_scanning(&self) {}

    /// Should the object be scanned with [`Upcalls::scan_array`]?
    fn is_array(&self, _object: ObjectReference) -> bool {
        false
    }

    /// Report every reference field of an object.
    fn scan_object(&self, tls: VMWorkerThread, object: ObjectReference, slots: &mut SlotsClosure);

    /// Report every element of an array. Defaults to [`Upcalls::scan_object`].
    fn scan_array(&self, tls: VMWorkerThread, object: ObjectReference, slots: &mut SlotsClosure) {
        self.scan_object(tls, object, slots)
    }

    /// The size of the object in bytes, from the start returned by
    /// [`Upcalls::ref_to_object_start`]. Used when the object is copied.
    fn get_object_size(&self, object: ObjectReference) -> usize;

    /// The lowest address of the object's storage. Defaults to the object reference itself.
    fn ref_to_object_start(&self, object: ObjectReference) -> Address {
        object.to_raw_address()
    }

    /// The alignment the object needs when it is copied.
    fn get_object_align_when_copied(&self, _object: ObjectReference) -> usize {
        MIN_ALIGNMENT
    }

    /// The offset that goes with [`Upcalls::get_object_align_when_copied`]: the copy starts at
    /// an address `a` with `(a + offset) % align == 0`, like the `offset` of
    /// [`crate::memory_manager::alloc`].
    fn get_object_align_offset_when_copied(&self, _object: ObjectReference) -> usize {
        0
    }

    /// Clear or update the host's weak references: stack-allocated weak handles, weak tables and
    /// so on. Called once per collection after the transitive closure, while the world is still
    /// stopped.
    fn weak_ref_stack_nullify(&self, _tls: VMWorkerThread, _query: &dyn ReferenceQuery) {}

    /// Run the handlers of weak references cleared by [`Upcalls::weak_ref_stack_nullify`]. Called
    /// after the mutators are resumed.
    fn weak_ref_stack_call_handlers(&self, _tls: VMWorkerThread) {}

    /// The referent of a reference object registered with
    /// [`crate::memory_manager::add_weak_candidate`] or its soft and phantom counterparts. A host
    /// that registers reference objects must implement this.
    fn get_referent(&self, reff: ObjectReference) -> ObjectReference {
        panic!("{} is registered as a reference, but the host cannot read referents", reff);
    }

    /// Store the referent of a reference object. Called with the new address when the referent
    /// moves, and with [`ObjectReference::NULL`] when it is cleared.
    fn set_referent(&self, reff: ObjectReference, _referent: ObjectReference) {
        panic!("{} is registered as a reference, but the host cannot write referents", reff);
    }

    /// Hand over reference objects whose referents were cleared in the last collection. Called
    /// once per collection with at least one such reference, before the mutators are resumed.
    fn enqueue_references(&self, _tls: VMWorkerThread, refs: &[ObjectReference]) {
        panic!("{} references are cleared, but the host does not take them", refs.len());
    }
}
