//! Host-to-collector interface: safe Rust APIs.
//!
//! This module provides a safe Rust API for the collector. A host binding is expected to wrap it
//! and, if necessary, expose it to native code. The binding then manages the unsafety of the
//! foreign interface.
//!
//! Mutators are referred to by [`MutatorHandle`], which the binding can store in its thread local
//! storage. A handle is a plain token, not a pointer, so a stale handle is detected instead of
//! being dereferenced.

use crate::mmtk::MMTKBuilder;
use crate::mmtk::MMTK;
use crate::plan::{AllocationSemantics, Mutator, MutatorHandle, ALLOCATOR_MAPPING};
use crate::scheduler::{GCController, GCWorker};
use crate::util::alloc::{AllocationError, AllocatorInfo, AllocatorSelector};
use crate::util::constants::{BYTES_IN_PAGE, LOG_MIN_OBJECT_SIZE, MAX_NON_LOS_DEFAULT_ALLOC_BYTES};
use crate::util::conversions::bytes_to_formatted_string;
use crate::util::opaque_pointer::*;
use crate::util::options::PinLifetime;
use crate::util::{Address, ObjectReference};
use crate::vm::Upcalls;

/// Initialize an MMTk instance. A host should call this method after setting up an
/// [`MMTKBuilder`], and before using any other method in this module except [`process`] and
/// [`process_bulk`].
///
/// We expect a binding to initialize MMTk in the following steps:
///
/// 1. Create an [`MMTKBuilder`] instance.
/// 2. Set command line options for the builder by [`process`] or [`process_bulk`].
/// 3. Initialize MMTk by calling this function, and pass the builder. Usually a binding leaks
///    the returned box to get a `&'static MMTK`, and keeps it as a singleton.
/// 4. Bind the upcalls by [`bind_upcalls`].
/// 5. Call [`initialize_collection`] once the thread system of the host is ready. MMTk will not
///    trigger garbage collection before that.
///
/// Note that this method will attempt to initialize a logger. If the host would like to use its own
/// logger, it should initialize the logger before calling this method.
///
/// Arguments:
/// * `builder`: The reference to a MMTk builder.
pub fn mmtk_init(builder: &MMTKBuilder) -> Box<MMTK> {
    crate::util::logger::init_once();
    AllocatorSelector::verify_encoding();
    AllocationError::verify_encoding();
    info!(
        "Initializing MMTk binding {}",
        *crate::build_info::MMTK_BINDING_FULL_VERSION
    );
    let mmtk = builder.build();
    let (min, max) = mmtk.get_options().heap_bounds();
    info!(
        "Initialized MMTk with a heap of {} to {}, {} GC threads",
        bytes_to_formatted_string(min),
        bytes_to_formatted_string(max),
        mmtk.get_options().threads
    );
    Box::new(mmtk)
}

/// Bind the host's upcalls to an MMTk instance. This must be done exactly once, before the first
/// allocation. Panics if upcalls are already bound.
pub fn bind_upcalls(mmtk: &MMTK, upcalls: Box<dyn Upcalls>) {
    mmtk.bind_upcalls(upcalls);
}

/// Process an MMTk option. Return true if the option was processed successfully.
///
/// Arguments:
/// * `builder`: A reference to an MMTk builder.
/// * `name`: The name of the option.
/// * `value`: The value of the option (as a string).
pub fn process(builder: &mut MMTKBuilder, name: &str, value: &str) -> bool {
    builder.set_option(name, value)
}

/// Process multiple MMTk options. Return true if all the options were processed successfully.
/// If any option fails, none of them takes effect.
///
/// Arguments:
/// * `builder`: A reference to an MMTk builder.
/// * `options`: A string of key-value pairs separated by white spaces, e.g. "threads=1 sanity=true"
pub fn process_bulk(builder: &mut MMTKBuilder, options: &str) -> bool {
    builder.set_options_bulk_by_str(options)
}

/// Initialize the scheduler and GC workers that are required for doing garbage collections.
/// This is a mandatory call for a host during its boot process once its thread system
/// is ready. Collection is enabled afterwards.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `tls`: The thread that will be used as the parent of the GC threads.
pub fn initialize_collection(mmtk: &'static MMTK, tls: VMThread) {
    assert!(
        mmtk.set_initialized(),
        "MMTk collection has been initialized (was initialize_collection() already called before?)"
    );
    mmtk.scheduler.spawn_gc_threads(mmtk, tls);
    mmtk.set_collection_enabled(true);
    info!("Collection initialized with {} workers", mmtk.scheduler.num_workers());
}

/// Allow MMTk to trigger garbage collection. Collection is enabled by [`initialize_collection`],
/// so this is only needed after [`disable_collection`].
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
pub fn enable_collection(mmtk: &'static MMTK) {
    assert!(
        mmtk.is_initialized(),
        "enable_collection() is called before initialize_collection()"
    );
    mmtk.set_collection_enabled(true);
}

/// Disallow MMTk to trigger garbage collection. When collection is disabled, allocation may grow
/// the heap up to its reservation, and allocation beyond that is reported as out of memory.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
pub fn disable_collection(mmtk: &'static MMTK) {
    mmtk.set_collection_enabled(false);
}

/// Is collection enabled?
pub fn is_collection_enabled(mmtk: &MMTK) -> bool {
    mmtk.is_collection_enabled()
}

/// Request MMTk to create a mutator for the given thread. For performance reasons, a host should
/// store the returned handle in a thread local storage that can be accessed efficiently.
/// Panics if the thread already has a mutator, or if `max_mutators` mutators are bound.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `tls`: The thread that will be associated with the mutator.
pub fn bind_mutator(mmtk: &'static MMTK, tls: VMMutatorThread) -> MutatorHandle {
    mmtk.mutators.bind(tls, mmtk)
}

/// Reclaim a mutator that is no longer needed. Its blocks are flushed first. Panics if the handle
/// is stale.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `handle`: The mutator to be destroyed.
pub fn destroy_mutator(mmtk: &'static MMTK, handle: MutatorHandle) {
    mmtk.mutators.with_mutator(handle, |mutator| mutator.flush());
    let mutator = mmtk.mutators.unbind(handle);
    drop(mutator);
}

/// Flush the mutator's local states: its thread-local blocks are given back, so they count as
/// full for the next collection.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `handle`: The mutator.
pub fn flush_mutator(mmtk: &'static MMTK, handle: MutatorHandle) {
    mmtk.mutators.with_mutator(handle, |mutator| mutator.flush());
}

/// Borrow a mutator. Only the thread that owns the mutator may call this. Panics if the handle
/// is stale, or the mutator is already borrowed.
pub fn with_mutator<R>(mmtk: &'static MMTK, handle: MutatorHandle, f: impl FnOnce(&mut Mutator) -> R) -> R {
    mmtk.mutators.with_mutator(handle, f)
}

/// Allocate memory for an object. For performance reasons, a host should implement the
/// allocation fast-path on its side rather than just calling this function.
///
/// The memory is zeroed. If the heap is exhausted even after a collection, the host's
/// `out_of_memory` upcall is called, and a zero address is returned if the upcall returns.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `handle`: The mutator to perform this allocation request.
/// * `size`: The number of bytes required for the object.
/// * `align`: Required alignment for the object.
/// * `offset`: Offset associated with the alignment.
/// * `selector`: The allocator to allocate with. See [`get_allocator_mapping`].
pub fn alloc(
    mmtk: &'static MMTK,
    handle: MutatorHandle,
    size: usize,
    align: usize,
    offset: usize,
    selector: AllocatorSelector,
) -> Address {
    mmtk.mutators
        .with_mutator(handle, |mutator| mutator.alloc(size, align, offset, selector))
}

/// Perform post-allocation actions: the object becomes a valid object for tracing, pinning and
/// queries. This must be called exactly once after each successful allocation, with the selector
/// and size used for the allocation.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `handle`: The mutator to perform post-alloc actions.
/// * `object`: The newly allocated object.
/// * `bytes`: The size of the space allocated for the object (in bytes).
/// * `selector`: The allocator used for the allocation.
pub fn post_alloc(
    mmtk: &'static MMTK,
    handle: MutatorHandle,
    object: ObjectReference,
    bytes: usize,
    selector: AllocatorSelector,
) {
    mmtk.mutators
        .with_mutator(handle, |mutator| mutator.post_alloc(object, bytes, selector))
}

/// Return an AllocatorSelector for the given allocation semantics. This method is provided
/// so that a host compiler may decide which allocator to use for an allocation.
pub fn get_allocator_mapping(_mmtk: &MMTK, semantics: AllocationSemantics) -> AllocatorSelector {
    ALLOCATOR_MAPPING[semantics]
}

/// Return the fast-path layout of an allocator, so that a host compiler can inline allocation:
/// the offsets of the cursor and the limit of a bump allocator from the start of a [`Mutator`].
pub fn get_allocator_info(_mmtk: &MMTK, selector: AllocatorSelector) -> AllocatorInfo {
    AllocatorInfo::new(selector)
}

/// The size at which default-space objects are redirected to the large object allocator. Objects
/// of this size or larger never go to the default space.
pub fn get_max_non_los_default_alloc_bytes(_mmtk: &MMTK) -> usize {
    MAX_NON_LOS_DEFAULT_ALLOC_BYTES
}

/// Run the main loop for the GC controller thread. This method does not return.
///
/// Arguments:
/// * `tls`: The thread that will be used as the GC controller.
/// * `gc_controller`: The execution context of the GC controller thread.
///   It is the `GCController` passed to `Upcalls::spawn_gc_thread`.
pub fn start_control_collector(
    _mmtk: &'static MMTK,
    tls: VMWorkerThread,
    gc_controller: &mut GCController,
) {
    gc_controller.run(tls);
}

/// Run the main loop of a GC worker. This method does not return.
///
/// Arguments:
/// * `tls`: The thread that will be used as the GC worker.
/// * `worker`: The execution context of the GC worker thread.
///   It is the `GCWorker` passed to `Upcalls::spawn_gc_thread`.
pub fn start_worker(_mmtk: &'static MMTK, tls: VMWorkerThread, worker: &mut GCWorker) {
    worker.run(tls);
}

/// Trigger a garbage collection as requested by the user, and wait for it. Ignored if collection
/// is not enabled, or the `ignore_system_gc` option is set.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `tls`: The thread that triggers this collection request.
pub fn handle_user_collection_request(mmtk: &'static MMTK, tls: VMMutatorThread) {
    if !mmtk.is_collection_enabled() {
        debug!("Collection is not enabled. Ignore the user collection request.");
        return;
    }
    if mmtk.get_options().ignore_system_gc {
        info!("User triggered collection ignored");
        return;
    }
    info!("User triggered collection");
    mmtk.request_gc();
    mmtk.get_upcalls().block_for_gc(tls);
}

/// A yield point for the host. If a collection is pending, the mutator parks until it is over.
/// The thread-local blocks of the mutator are kept.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `handle`: The mutator of the current thread.
pub fn gc_poll(mmtk: &'static MMTK, handle: MutatorHandle) {
    if mmtk.should_block_mutator() {
        let tls = mmtk.mutators.with_mutator(handle, |mutator| mutator.get_tls());
        trace!("gc_poll: {:?} blocks for a pending collection", handle);
        mmtk.get_upcalls().block_for_gc(tls);
    }
}

/// Mark the start of a measured section of the host, such as a benchmark iteration. A
/// collection is done first, even if `ignore_system_gc` is set, so the section starts with a
/// clean heap. Collections in the section are counted and reported by [`harness_end`].
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `tls`: The thread that starts the section.
pub fn harness_begin(mmtk: &'static MMTK, tls: VMMutatorThread) {
    if mmtk.is_collection_enabled() {
        info!("Harness begin: collect before the measured section");
        mmtk.request_gc();
        mmtk.get_upcalls().block_for_gc(tls);
    }
    if !mmtk.harness_begin() {
        warn!("harness_begin() is called inside a measured section");
    }
}

/// Mark the end of the measured section started by [`harness_begin`].
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
pub fn harness_end(mmtk: &'static MMTK) {
    match mmtk.harness_end() {
        Some(collections) => info!(
            "Harness end: {} collections, {} used of {}",
            collections,
            bytes_to_formatted_string(used_bytes(mmtk)),
            bytes_to_formatted_string(total_bytes(mmtk))
        ),
        None => warn!("harness_end() is called without harness_begin()"),
    }
}

/// Register a finalizable object. When MMTk finds the object unreachable, it keeps the object
/// alive and makes it available through [`get_finalized_object`].
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `object`: The object that has a finalizer.
pub fn add_finalizer(mmtk: &'static MMTK, object: ObjectReference) {
    if mmtk.get_options().no_finalizer {
        warn!("add_finalizer() is called when no_finalizer = true. {} is ignored.", object);
        return;
    }
    mmtk.finalizable_processor.lock().unwrap().add(object);
}

/// Get an object that is ready for finalization. Each registered object is returned once at
/// most. Returns `None` if no object is ready.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
pub fn get_finalized_object(mmtk: &'static MMTK) -> Option<ObjectReference> {
    if mmtk.get_options().no_finalizer {
        warn!("get_finalized_object() is called when no_finalizer = true");
    }
    mmtk.finalizable_processor.lock().unwrap().get_ready_object()
}

/// Pop all the finalizers that were registered, whether their objects are alive or ready for
/// finalization. This is usually used by a host at shutdown, to run all the finalizers.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
pub fn get_all_finalizers(mmtk: &'static MMTK) -> Vec<ObjectReference> {
    mmtk.finalizable_processor.lock().unwrap().get_all_finalizers()
}

/// Pop the finalizers registered for the given object.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `object`: The object whose finalizers are removed.
pub fn get_finalizers_for(mmtk: &'static MMTK, object: ObjectReference) -> Vec<ObjectReference> {
    mmtk.finalizable_processor
        .lock()
        .unwrap()
        .get_finalizers_for(object)
}

/// Register a weak reference object. When its referent is found unreachable, the referent is
/// cleared with [`Upcalls::set_referent`], and the reference is handed back with
/// [`Upcalls::enqueue_references`]. The reference object itself is not kept alive.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `reff`: The reference object. Its referent is read with [`Upcalls::get_referent`].
pub fn add_weak_candidate(mmtk: &MMTK, reff: ObjectReference) {
    mmtk.reference_processors.add_weak_candidate(reff);
}

/// Register a soft reference object. Like [`add_weak_candidate`], except that the referent of a
/// reachable soft reference is kept alive, unless the collection is an emergency collection run
/// because the heap is about to be exhausted.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `reff`: The reference object.
pub fn add_soft_candidate(mmtk: &MMTK, reff: ObjectReference) {
    mmtk.reference_processors.add_soft_candidate(reff);
}

/// Register a phantom reference object. Like [`add_weak_candidate`], except that its referent is
/// only cleared after finalization, once it cannot be resurrected any more.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `reff`: The reference object.
pub fn add_phantom_candidate(mmtk: &MMTK, reff: ObjectReference) {
    mmtk.reference_processors.add_phantom_candidate(reff);
}

/// Pin an object. MMTk will not move a pinned object. Returns false if the address is not an
/// object allocated by MMTk, and true otherwise, including when the object was already pinned.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `object`: The object to be pinned.
pub fn pin_object(mmtk: &MMTK, object: ObjectReference) -> bool {
    let plan = mmtk.get_plan();
    if !plan.is_valid_object(object.to_raw_address()) {
        debug!("Refused to pin {}: not an object", object);
        return false;
    }
    plan.metadata.pin_object(object);
    true
}

/// Unpin an object. Returns true if the object was pinned and is unpinned now. Pins are only
/// reversible with the `Explicit` pin lifetime. With the `Permanent` lifetime this returns false,
/// and the object stays pinned.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `object`: The object to be unpinned.
pub fn unpin_object(mmtk: &MMTK, object: ObjectReference) -> bool {
    if mmtk.get_options().pin_lifetime != PinLifetime::Explicit {
        debug!("Refused to unpin {}: pins are permanent", object);
        return false;
    }
    let plan = mmtk.get_plan();
    plan.is_valid_object(object.to_raw_address()) && plan.metadata.unpin_object(object)
}

/// Is the object pinned?
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `object`: The object to be checked.
pub fn is_pinned(mmtk: &MMTK, object: ObjectReference) -> bool {
    let plan = mmtk.get_plan();
    plan.is_valid_object(object.to_raw_address()) && plan.metadata.is_object_pinned(object)
}

/// Will the object never move? This is true for objects in the large object space and the immortal
/// space, and for addresses outside the heap. It is false for the default space, even if the object
/// is pinned now.
pub fn will_never_move(mmtk: &MMTK, object: ObjectReference) -> bool {
    mmtk.get_plan().will_never_move(object)
}

/// Pin the given objects for the next collection only. Addresses that are not objects are
/// ignored.
///
/// Arguments:
/// * `mmtk`: A reference to an MMTk instance.
/// * `objects`: The objects to be pinned.
pub fn append_pinned_objects(mmtk: &MMTK, objects: &[ObjectReference]) {
    mmtk.get_plan().add_transient_pins(objects);
}

/// Is the address an object allocated by MMTk? This is the valid-object query: it is true from
/// [`post_alloc`] until the object is reclaimed.
pub fn is_mmtk_object(mmtk: &MMTK, addr: Address) -> bool {
    mmtk.get_plan().is_valid_object(addr)
}

/// Is the address in a part of the heap that MMTk currently uses? The address does not need to
/// be an object.
pub fn is_in_mmtk_spaces(mmtk: &MMTK, object: ObjectReference) -> bool {
    !object.is_null() && mmtk.get_plan().is_in_spaces(object.to_raw_address())
}

/// Is the object live? Outside a collection, every object that is still a valid object is live.
/// Objects outside the heap are always considered live.
pub fn is_live_object(mmtk: &MMTK, object: ObjectReference) -> bool {
    let plan = mmtk.get_plan();
    let addr = object.to_raw_address();
    if !plan.pr.contains(addr) {
        return true;
    }
    plan.is_valid_object(addr)
}

/// Is the object reached by the collection in progress? This is only meaningful after the
/// transitive closure, for example in [`Upcalls::weak_ref_stack_nullify`]. Outside a collection it
/// tells whether the object was reached by the last collection. Addresses that are not in a space
/// are never reachable.
pub fn is_reachable(mmtk: &MMTK, object: ObjectReference) -> bool {
    let plan = mmtk.get_plan();
    !object.is_null() && plan.is_in_spaces(object.to_raw_address()) && plan.is_live(object)
}

/// Is the address mapped by MMTk? True for every address in a chunk of the heap that has been
/// used, whether or not it is in an object.
pub fn is_mapped_address(mmtk: &MMTK, address: Address) -> bool {
    mmtk.get_plan().pr.is_committed(address)
}

/// Is the address aligned to `align` bytes? `align` must be a power of two.
pub fn is_aligned_to(address: Address, align: usize) -> bool {
    address.is_aligned_to(align)
}

/// The base-2 logarithm of the number of bytes each valid-object bit covers. A host that reads
/// the valid-object bits at [`crate::util::heap::HeapLayout::vo_bit_base`] needs this.
pub fn get_vo_bit_log_region_size() -> usize {
    LOG_MIN_OBJECT_SIZE as usize
}

/// Return the starting address of the heap.
pub fn starting_heap_address(mmtk: &MMTK) -> Address {
    mmtk.heap_layout().heap_start
}

/// Return the ending address of the heap.
pub fn last_heap_address(mmtk: &MMTK) -> Address {
    mmtk.heap_layout().heap_end
}

/// Return the amount of free memory in bytes: the current heap size minus the used bytes.
pub fn free_bytes(mmtk: &MMTK) -> usize {
    total_bytes(mmtk).saturating_sub(used_bytes(mmtk))
}

/// Return the current size of the heap in bytes. It is between the minimum and the maximum heap
/// size.
pub fn total_bytes(mmtk: &MMTK) -> usize {
    mmtk.get_plan().gc_trigger.heap_size_in_bytes()
}

/// Return the amount of memory in bytes in use: the memory held by all the spaces, and the bytes
/// allocated with [`counted_malloc`] and the other counted functions.
pub fn used_bytes(mmtk: &MMTK) -> usize {
    mmtk.get_plan().used_bytes()
}

/// The page size of the heap.
pub fn bytes_in_page() -> usize {
    BYTES_IN_PAGE
}

/// Allocate memory outside the heap with the library malloc. The memory is not counted.
pub fn malloc(size: usize) -> Address {
    crate::util::malloc::malloc(size)
}

/// Allocate memory outside the heap, and count it as used by the heap. It must be released with
/// [`free_with_size`] or [`realloc_with_old_size`], with the same size.
pub fn counted_malloc(mmtk: &MMTK, size: usize) -> Address {
    crate::util::malloc::counted_malloc(mmtk, size)
}

/// Allocate zeroed memory outside the heap for `num` elements of `size` bytes. Not counted.
pub fn calloc(num: usize, size: usize) -> Address {
    crate::util::malloc::calloc(num, size)
}

/// Like [`calloc`], and counted as used by the heap.
pub fn counted_calloc(mmtk: &MMTK, num: usize, size: usize) -> Address {
    crate::util::malloc::counted_calloc(mmtk, num, size)
}

/// Resize memory returned by [`malloc`] or [`calloc`].
pub fn realloc(addr: Address, size: usize) -> Address {
    crate::util::malloc::realloc(addr, size)
}

/// Resize counted memory of `old_size` bytes.
pub fn realloc_with_old_size(mmtk: &MMTK, addr: Address, size: usize, old_size: usize) -> Address {
    crate::util::malloc::realloc_with_old_size(mmtk, addr, size, old_size)
}

/// Free memory returned by [`malloc`], [`calloc`] or [`realloc`].
pub fn free(addr: Address) {
    crate::util::malloc::free(addr)
}

/// Free counted memory of `old_size` bytes.
pub fn free_with_size(mmtk: &MMTK, addr: Address, old_size: usize) {
    crate::util::malloc::free_with_size(mmtk, addr, old_size)
}
