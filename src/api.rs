//! The process-wide boundary. A host that runs a single heap uses these functions instead of
//! passing an [`MMTK`] reference around.
//!
//! The lifecycle is:
//!
//! 1. Options are set with [`process`] and [`process_bulk`]. They go to a process-wide builder.
//! 2. [`init`] or [`init_from_options`] consumes the builder and creates the instance. This
//!    happens once. The heap layout is fixed from then on, and [`heap_layout`] returns it.
//! 3. [`bind_upcalls`], then [`crate::memory_manager::initialize_collection`] with
//!    [`instance`].
//!
//! The instance is never torn down: it lives until the process exits.

use std::sync::{Mutex, OnceLock};

use crate::memory_manager;
use crate::mmtk::{MMTKBuilder, MMTK};
use crate::util::heap::HeapLayout;
use crate::util::opaque_pointer::VMMutatorThread;
use crate::util::{Address, ObjectReference};
use crate::vm::Upcalls;

lazy_static! {
    /// Options set before the instance is created.
    static ref BUILDER: Mutex<Option<MMTKBuilder>> = Mutex::new(Some(MMTKBuilder::new()));
}

static SINGLETON: OnceLock<&'static MMTK> = OnceLock::new();

fn with_builder<R>(f: impl FnOnce(&mut MMTKBuilder) -> R) -> R {
    let mut builder = BUILDER.lock().unwrap();
    match builder.as_mut() {
        Some(builder) => f(builder),
        None => panic!("MMTk is already initialized. Options can no longer be changed."),
    }
}

/// Set an option for the instance to be created. Returns false if the option is unknown or the
/// value is invalid. Panics if the instance already exists.
pub fn process(name: &str, value: &str) -> bool {
    with_builder(|builder| memory_manager::process(builder, name, value))
}

/// Set options from a whitespace-separated list of `key=value` pairs. Either all the options are
/// set, or none of them. Panics if the instance already exists.
pub fn process_bulk(options: &str) -> bool {
    with_builder(|builder| memory_manager::process_bulk(builder, options))
}

/// Create the instance with the options set so far, and the given heap bounds in bytes. Panics if
/// the instance already exists, or the heap bounds are invalid.
pub fn init(min_heap_size: usize, max_heap_size: usize) -> &'static MMTK {
    let builder = take_builder(|builder| {
        if !builder.set_heap_size(min_heap_size, max_heap_size) {
            panic!(
                "Invalid heap size: min {} bytes, max {} bytes",
                min_heap_size, max_heap_size
            );
        }
    });
    install(builder)
}

/// Create the instance with the options set so far. Panics if the instance already exists.
pub fn init_from_options() -> &'static MMTK {
    let builder = take_builder(|_| {});
    install(builder)
}

fn take_builder(configure: impl FnOnce(&mut MMTKBuilder)) -> MMTKBuilder {
    let mut guard = BUILDER.lock().unwrap();
    let Some(mut builder) = guard.take() else {
        panic!("MMTk is already initialized");
    };
    configure(&mut builder);
    builder
}

fn install(builder: MMTKBuilder) -> &'static MMTK {
    let mmtk: &'static MMTK = Box::leak(memory_manager::mmtk_init(&builder));
    if SINGLETON.set(mmtk).is_err() {
        panic!("MMTk is already initialized");
    }
    mmtk
}

/// Bind the host's upcalls to the instance. Panics if they are already bound.
pub fn bind_upcalls(upcalls: Box<dyn Upcalls>) {
    memory_manager::bind_upcalls(instance(), upcalls);
}

/// The instance. Panics if it has not been created.
pub fn instance() -> &'static MMTK {
    match SINGLETON.get() {
        Some(mmtk) => mmtk,
        None => panic!("MMTk is not initialized. Call init() first."),
    }
}

/// Has the instance been created?
pub fn is_initialized() -> bool {
    SINGLETON.get().is_some()
}

/// The heap layout of the instance. Panics if it has not been created.
pub fn heap_layout() -> &'static HeapLayout {
    instance().heap_layout()
}

/// Is the address an object allocated by MMTk?
pub fn is_mmtk_object(addr: Address) -> bool {
    memory_manager::is_mmtk_object(instance(), addr)
}

/// Is the object in a part of the heap that MMTk currently uses?
pub fn is_in_mmtk_spaces(object: ObjectReference) -> bool {
    memory_manager::is_in_mmtk_spaces(instance(), object)
}

/// Is the object live? Objects outside the heap are always live.
pub fn is_live_object(object: ObjectReference) -> bool {
    memory_manager::is_live_object(instance(), object)
}

/// Was the object reached by the current or the last collection?
pub fn is_reachable(object: ObjectReference) -> bool {
    memory_manager::is_reachable(instance(), object)
}

/// Is the address in a mapped chunk of the heap?
pub fn is_mapped_address(address: Address) -> bool {
    memory_manager::is_mapped_address(instance(), address)
}

/// Is the address aligned to `align` bytes?
pub fn is_aligned_to(address: Address, align: usize) -> bool {
    memory_manager::is_aligned_to(address, align)
}

/// Will the object never move?
pub fn will_never_move(object: ObjectReference) -> bool {
    memory_manager::will_never_move(instance(), object)
}

/// The first address of the heap.
pub fn starting_heap_address() -> Address {
    memory_manager::starting_heap_address(instance())
}

/// The address just past the heap.
pub fn last_heap_address() -> Address {
    memory_manager::last_heap_address(instance())
}

/// The current heap size minus the used bytes.
pub fn free_bytes() -> usize {
    memory_manager::free_bytes(instance())
}

/// The current heap size in bytes.
pub fn total_bytes() -> usize {
    memory_manager::total_bytes(instance())
}

/// The bytes in use, counted malloc bytes included.
pub fn used_bytes() -> usize {
    memory_manager::used_bytes(instance())
}

/// The page size of the heap.
pub fn bytes_in_page() -> usize {
    memory_manager::bytes_in_page()
}

/// The base-2 logarithm of the bytes each valid-object bit covers.
pub fn get_vo_bit_log_region_size() -> usize {
    memory_manager::get_vo_bit_log_region_size()
}

/// Pin an object. Returns false if it is not an object allocated by MMTk.
pub fn pin_object(object: ObjectReference) -> bool {
    memory_manager::pin_object(instance(), object)
}

/// Unpin an object. Returns false if it was not pinned, or pins are permanent.
pub fn unpin_object(object: ObjectReference) -> bool {
    memory_manager::unpin_object(instance(), object)
}

/// Is the object pinned?
pub fn is_pinned(object: ObjectReference) -> bool {
    memory_manager::is_pinned(instance(), object)
}

/// Pin objects for the next collection only.
pub fn append_pinned_objects(objects: &[ObjectReference]) {
    memory_manager::append_pinned_objects(instance(), objects)
}

/// Register a finalizable object.
pub fn add_finalizer(object: ObjectReference) {
    memory_manager::add_finalizer(instance(), object)
}

/// Take an object that is ready for finalization, if there is one.
pub fn get_finalized_object() -> Option<ObjectReference> {
    memory_manager::get_finalized_object(instance())
}

/// Register a weak reference object.
pub fn add_weak_candidate(reff: ObjectReference) {
    memory_manager::add_weak_candidate(instance(), reff)
}

/// Register a soft reference object.
pub fn add_soft_candidate(reff: ObjectReference) {
    memory_manager::add_soft_candidate(instance(), reff)
}

/// Register a phantom reference object.
pub fn add_phantom_candidate(reff: ObjectReference) {
    memory_manager::add_phantom_candidate(instance(), reff)
}

/// Start a measured section, after a collection.
pub fn harness_begin(tls: VMMutatorThread) {
    memory_manager::harness_begin(instance(), tls)
}

/// End the measured section.
pub fn harness_end() {
    memory_manager::harness_end(instance())
}

/// Allocate memory outside the heap. Not counted.
pub fn malloc(size: usize) -> Address {
    memory_manager::malloc(size)
}

/// Allocate memory outside the heap, counted as used by the heap.
pub fn counted_malloc(size: usize) -> Address {
    memory_manager::counted_malloc(instance(), size)
}

/// Allocate zeroed memory outside the heap. Not counted.
pub fn calloc(num: usize, size: usize) -> Address {
    memory_manager::calloc(num, size)
}

/// Allocate zeroed memory outside the heap, counted as used by the heap.
pub fn counted_calloc(num: usize, size: usize) -> Address {
    memory_manager::counted_calloc(instance(), num, size)
}

/// Resize memory from [`malloc`] or [`calloc`].
pub fn realloc(addr: Address, size: usize) -> Address {
    memory_manager::realloc(addr, size)
}

/// Resize counted memory of `old_size` bytes.
pub fn realloc_with_old_size(addr: Address, size: usize, old_size: usize) -> Address {
    memory_manager::realloc_with_old_size(instance(), addr, size, old_size)
}

/// Free memory from [`malloc`], [`calloc`] or [`realloc`].
pub fn free(addr: Address) {
    memory_manager::free(addr)
}

/// Free counted memory of `old_size` bytes.
pub fn free_with_size(addr: Address, old_size: usize) {
    memory_manager::free_with_size(instance(), addr, old_size)
}
