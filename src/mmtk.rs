//! MMTk instance.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use atomic::Atomic;

use crate::plan::gc_requester::GCRequester;
use crate::plan::{CollectionState, MutatorRegistry, Plan};
use crate::scheduler::{is_gc_thread, GCWorkScheduler};
use crate::util::finalizable_processor::FinalizableProcessor;
use crate::util::heap::HeapLayout;
use crate::util::options::Options;
use crate::util::reference_processor::ReferenceProcessors;
use crate::vm::Upcalls;

/// MMTk builder. This is used to set options and other settings before actually creating an MMTk instance.
pub struct MMTKBuilder {
    /// The options for this instance.
    pub options: Options,
}

impl MMTKBuilder {
    /// Create an MMTK builder with default options
    pub fn new() -> Self {
        MMTKBuilder {
            options: Options::default(),
        }
    }

    /// Set an option.
    pub fn set_option(&mut self, name: &str, val: &str) -> bool {
        self.options.set_from_command_line(name, val)
    }

    /// Set multiple options by a string. The string is a whitespace-separated list of
    /// `key=value` pairs. Either all of them are set, or none.
    pub fn set_options_bulk_by_str(&mut self, options: &str) -> bool {
        self.options.set_bulk_from_command_line(options)
    }

    /// Set the heap bounds in bytes. A fixed heap is used if `min == max`.
    pub fn set_heap_size(&mut self, min: usize, max: usize) -> bool {
        let mut staged = self.options.clone();
        if staged.set_from_command_line("min_heap_size", &min.to_string())
            && staged.set_from_command_line("max_heap_size", &max.to_string())
        {
            self.options = staged;
            true
        } else {
            false
        }
    }

    /// Build an MMTk instance from the builder.
    pub fn build(&self) -> MMTK {
        MMTK::new(Arc::new(self.options.clone()))
    }
}

impl Default for MMTKBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An MMTk instance. MMTk allows multiple instances to run independently, and each instance gives users a separate heap.
/// *Note that multi-instances is not fully supported yet*
pub struct MMTK {
    pub(crate) options: Arc<Options>,
    pub(crate) plan: Plan,
    pub(crate) state: Atomic<CollectionState>,
    pub(crate) gc_requester: Arc<GCRequester>,
    pub(crate) scheduler: Arc<GCWorkScheduler>,
    pub(crate) mutators: MutatorRegistry,
    pub(crate) finalizable_processor: Mutex<FinalizableProcessor>,
    pub(crate) reference_processors: ReferenceProcessors,
    upcalls: OnceLock<Box<dyn Upcalls>>,
    /// Has `initialize_collection` been called?
    initialized: AtomicBool,
    /// Is collection enabled? Collection is disabled until `initialize_collection`.
    collection_enabled: AtomicBool,
    /// The number of finished collections.
    pub(crate) gc_count: AtomicUsize,
    /// Is the next collection an emergency collection? Soft referents are not retained in an
    /// emergency collection. Cleared when the collection ends.
    emergency_collection: AtomicBool,
    /// Between `harness_begin` and `harness_end`: the `gc_count` when the harness began.
    harness_start: Mutex<Option<usize>>,
    layout: HeapLayout,
}

impl MMTK {
    pub fn new(options: Arc<Options>) -> Self {
        let plan = Plan::new(&options);
        let layout = plan.heap_layout();
        let scheduler = GCWorkScheduler::new(options.threads);
        MMTK {
            mutators: MutatorRegistry::new(options.max_mutators),
            plan,
            state: Atomic::new(CollectionState::Idle),
            gc_requester: Arc::new(GCRequester::new()),
            scheduler,
            finalizable_processor: Mutex::new(FinalizableProcessor::new()),
            reference_processors: ReferenceProcessors::new(),
            upcalls: OnceLock::new(),
            initialized: AtomicBool::new(false),
            collection_enabled: AtomicBool::new(false),
            gc_count: AtomicUsize::new(0),
            emergency_collection: AtomicBool::new(false),
            harness_start: Mutex::new(None),
            layout,
            options,
        }
    }

    /// Bind the host's upcalls. Panics if upcalls are already bound.
    pub(crate) fn bind_upcalls(&self, upcalls: Box<dyn Upcalls>) {
        if self.upcalls.set(upcalls).is_err() {
            panic!("Upcalls are already bound to this MMTk instance");
        }
    }

    pub fn has_upcalls(&self) -> bool {
        self.upcalls.get().is_some()
    }

    /// The host's upcalls. Panics if the host has not bound them yet.
    pub fn get_upcalls(&self) -> &dyn Upcalls {
        match self.upcalls.get() {
            Some(upcalls) => upcalls.as_ref(),
            None => panic!("Upcalls are not bound. Call bind_upcalls() first."),
        }
    }

    pub fn get_plan(&self) -> &Plan {
        &self.plan
    }

    pub fn get_options(&self) -> &Options {
        &self.options
    }

    pub fn heap_layout(&self) -> &HeapLayout {
        &self.layout
    }

    pub fn collection_state(&self) -> CollectionState {
        self.state.load(Ordering::SeqCst)
    }

    /// The number of collections finished so far.
    pub fn gc_count(&self) -> usize {
        self.gc_count.load(Ordering::SeqCst)
    }

    pub(crate) fn set_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub(crate) fn set_collection_enabled(&self, enabled: bool) {
        self.collection_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_collection_enabled(&self) -> bool {
        self.collection_enabled.load(Ordering::SeqCst)
    }

    pub fn is_emergency_collection(&self) -> bool {
        self.emergency_collection.load(Ordering::SeqCst)
    }

    pub(crate) fn set_emergency_collection(&self, emergency: bool) {
        self.emergency_collection.store(emergency, Ordering::SeqCst);
    }

    /// Mark the start of a measured section. Returns false if a section is already open.
    pub(crate) fn harness_begin(&self) -> bool {
        let mut start = self.harness_start.lock().unwrap();
        if start.is_some() {
            return false;
        }
        *start = Some(self.gc_count());
        true
    }

    /// Close the measured section. Returns the number of collections in it, or `None` if no
    /// section is open.
    pub(crate) fn harness_end(&self) -> Option<usize> {
        self.harness_start
            .lock()
            .unwrap()
            .take()
            .map(|start| self.gc_count() - start)
    }

    pub fn is_in_harness(&self) -> bool {
        self.harness_start.lock().unwrap().is_some()
    }

    /// Should a mutator that polls now park? Never true on GC threads.
    pub fn should_block_mutator(&self) -> bool {
        self.gc_requester.is_requested() && self.is_collection_enabled() && !is_gc_thread()
    }

    /// Ask the controller for a collection. Requests made while one is pending are coalesced.
    pub fn request_gc(&self) {
        if self.gc_requester.request() {
            let _ = self.state.compare_exchange(
                CollectionState::Idle,
                CollectionState::Requested,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    /// The number of blocks mutators may hold in total before a collection is needed. A part of
    /// the heap is held back for copying when collection is possible, and counted malloc bytes
    /// take their share of the heap.
    pub(crate) fn mutator_limit_blocks(&self) -> usize {
        if !self.is_collection_enabled() {
            // Without collection there is nothing to copy, and nothing to hold back for.
            return self.plan.pr.total_blocks();
        }
        let heap_blocks = self.plan.gc_trigger.heap_size_in_blocks();
        (heap_blocks - heap_blocks / 16).saturating_sub(self.plan.malloc_blocks())
    }

    /// The number of blocks in use that a collection may reach while copying.
    pub(crate) fn gc_limit_blocks(&self) -> usize {
        self.plan.gc_trigger.heap_size_in_blocks()
    }
}
