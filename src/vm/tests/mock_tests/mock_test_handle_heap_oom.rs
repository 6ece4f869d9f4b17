use super::mock_test_prelude::*;
use crate::util::alloc::AllocationError;

const MB: usize = 1 << 20;

#[test]
pub fn test_handle_heap_oom() {
    let fixture = MutatorFixture::create_with_heapsize(64 * MB);
    let mmtk = fixture.mmtk;

    // Keep allocating large objects and keep them alive, until the heap is exhausted.
    let mut allocated = 0;
    loop {
        let object = fixture
            .host
            .alloc_object(fixture.handle, 0, MB, AllocationSemantics::Los);
        if object.is_null() {
            break;
        }
        fixture.host.add_root(object);
        allocated += 1;
        assert!(allocated < 64, "Allocated more than the heap size");
    }

    // A collection was tried before giving up, and the host was told why.
    assert!(mmtk.gc_count() >= 1);
    assert_eq!(
        fixture.host.out_of_memory_errors(),
        vec![AllocationError::HeapOutOfMemory]
    );
    assert!(allocated > 32);
    assert!(memory_manager::used_bytes(mmtk) <= memory_manager::total_bytes(mmtk));
}

#[test]
pub fn unrealistically_large_object() {
    let fixture = MutatorFixture::create_with_heapsize(64 * MB);
    let selector = memory_manager::get_allocator_mapping(fixture.mmtk, AllocationSemantics::Los);
    let addr = memory_manager::alloc(fixture.mmtk, fixture.handle, usize::MAX / 2, 8, 0, selector);
    assert!(addr.is_zero());
    assert_eq!(
        fixture.host.out_of_memory_errors(),
        vec![AllocationError::HeapOutOfMemory]
    );
}
