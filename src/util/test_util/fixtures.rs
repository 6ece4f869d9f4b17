// Not every test uses every fixture.
#![allow(dead_code)]

use crate::memory_manager;
use crate::plan::MutatorHandle;
use crate::util::test_util::mock_vm::MockHost;
use crate::util::VMMutatorThread;
use crate::MMTKBuilder;
use crate::MMTK;

/// An MMTk instance with the mock host bound, and collection initialized.
///
/// The instance is leaked: GC threads never exit, so it has to live until the process exits.
/// Each fixture owns its heap, so tests with their own fixture can run in parallel.
pub struct MMTKFixture {
    pub mmtk: &'static MMTK,
    pub host: MockHost,
}

impl MMTKFixture {
    /// Create an instance with two GC workers and the given heap size.
    pub fn create_with_heapsize(heap_size: usize) -> Self {
        Self::create_with_options(&format!("threads=2 heap_size={}", heap_size))
    }

    /// Create an instance from a whitespace-separated list of `key=value` options.
    pub fn create_with_options(options: &str) -> Self {
        Self::create_with_builder(options, true)
    }

    /// Create an instance without calling `initialize_collection`. No GC thread is spawned.
    pub fn create_uninitialized(options: &str) -> Self {
        Self::create_with_builder(options, false)
    }

    fn create_with_builder(options: &str, initialize_collection: bool) -> Self {
        let mut builder = MMTKBuilder::new();
        assert!(
            builder.set_options_bulk_by_str(options),
            "Invalid options: {}",
            options
        );
        let mmtk: &'static MMTK = Box::leak(memory_manager::mmtk_init(&builder));
        let host = MockHost::new();
        host.attach(mmtk);
        memory_manager::bind_upcalls(mmtk, Box::new(host.clone()));
        if initialize_collection {
            memory_manager::initialize_collection(mmtk, host.new_thread());
        }
        MMTKFixture { mmtk, host }
    }
}

/// An MMTk instance, and one mutator bound for the current thread.
pub struct MutatorFixture {
    pub mmtk: &'static MMTK,
    pub host: MockHost,
    pub tls: VMMutatorThread,
    pub handle: MutatorHandle,
}

impl MutatorFixture {
    pub fn create_with_heapsize(heap_size: usize) -> Self {
        Self::from_mmtk(MMTKFixture::create_with_heapsize(heap_size))
    }

    pub fn create_with_options(options: &str) -> Self {
        Self::from_mmtk(MMTKFixture::create_with_options(options))
    }

    pub fn from_mmtk(fixture: MMTKFixture) -> Self {
        let tls = fixture.host.new_mutator_tls();
        let handle = fixture.host.bind_mutator(tls);
        MutatorFixture {
            mmtk: fixture.mmtk,
            host: fixture.host,
            tls,
            handle,
        }
    }

    /// Collect, and wait until the collection is over.
    pub fn collect(&self) {
        self.host.collect(self.tls);
    }
}
