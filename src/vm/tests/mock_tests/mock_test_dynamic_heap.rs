use super::mock_test_prelude::*;

const MIN_HEAP: usize = 4 << 20;
const MAX_HEAP: usize = 32 << 20;

#[test]
pub fn heap_grows_with_live_data() {
    let fixture = MutatorFixture::create_with_options(&format!(
        "threads=2 min_heap_size={} max_heap_size={}",
        MIN_HEAP, MAX_HEAP
    ));
    let mmtk = fixture.mmtk;
    assert_eq!(memory_manager::total_bytes(mmtk), MIN_HEAP);
    let reserved =
        memory_manager::last_heap_address(mmtk) - memory_manager::starting_heap_address(mmtk);
    assert!(reserved >= MAX_HEAP);

    // Keep 6MB alive. That does not fit in the initial heap.
    let roots: Vec<usize> = (0..1536)
        .map(|_| {
            let object = fixture
                .host
                .alloc_object(fixture.handle, 0, 4096, AllocationSemantics::Default);
            assert!(!object.is_null());
            fixture.host.add_root(object)
        })
        .collect();

    assert!(mmtk.gc_count() > 0);
    assert!(fixture.host.out_of_memory_errors().is_empty());
    let total = memory_manager::total_bytes(mmtk);
    assert!(total > MIN_HEAP, "The heap did not grow: {} bytes", total);
    assert!(total <= MAX_HEAP);
    for &id in roots.iter() {
        let object = fixture.host.get_root(id);
        assert!(memory_manager::is_mmtk_object(mmtk, object.to_raw_address()));
        assert_eq!(object_size(object), object_bytes(0, 4096));
    }

    // Once the data is dead, the heap shrinks back.
    for &id in roots.iter() {
        fixture.host.set_root(id, ObjectReference::NULL);
    }
    fixture.collect();
    assert_eq!(memory_manager::total_bytes(mmtk), MIN_HEAP);
}
