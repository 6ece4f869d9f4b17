// Mock tests run the collector with `MockHost`, a host that keeps its roots off-heap and runs its
// mutators on Rust threads. Use the fixtures in `crate::util::test_util::fixtures` to create an
// instance per test.
//
// Mock tests should have the prefix 'mock_test_' in their file name.

// Common includes for mock tests.
pub(crate) mod mock_test_prelude {
    pub use crate::memory_manager;
    pub use crate::plan::AllocationSemantics;
    pub use crate::util::test_util::fixtures::*;
    pub use crate::util::test_util::mock_vm::*;
    pub use crate::util::{Address, ObjectReference};
    pub use crate::vm::*;
    pub use crate::MMTK;
}

mod mock_test_allocate_with_disable_collection;
mod mock_test_allocator_info;
mod mock_test_api_singleton;
mod mock_test_destroy_mutator;
mod mock_test_dynamic_heap;
mod mock_test_finalization;
mod mock_test_handle_heap_oom;
mod mock_test_is_in_mmtk_spaces;
mod mock_test_malloc_counted;
mod mock_test_process_options;
mod mock_test_sanity;
mod mock_test_stop_resume_cursor;
mod mock_test_will_never_move;
