use super::mock_test_prelude::*;

// A 4MB heap is 128 blocks. With collection enabled, a part of it is held back for copying.
const HEAP_SIZE: usize = 4 << 20;
// 32 objects fit in a block, so these take 125 blocks.
const PAYLOAD: usize = 1000;
const OBJECTS: usize = 4000;

#[test]
pub fn allocate_with_disable_collection() {
    let fixture = MutatorFixture::create_with_heapsize(HEAP_SIZE);
    let mmtk = fixture.mmtk;
    assert!(memory_manager::is_collection_enabled(mmtk));

    memory_manager::disable_collection(mmtk);
    assert!(!memory_manager::is_collection_enabled(mmtk));

    // A user request is ignored while collection is disabled.
    fixture.collect();
    assert_eq!(mmtk.gc_count(), 0);

    // Allocate more than the heap allows while collection is enabled.
    for _ in 0..OBJECTS {
        let object = fixture
            .host
            .alloc_object(fixture.handle, 0, PAYLOAD, AllocationSemantics::Default);
        assert!(!object.is_null());
    }
    assert_eq!(mmtk.gc_count(), 0);
    assert!(fixture.host.out_of_memory_errors().is_empty());

    memory_manager::enable_collection(mmtk);
    fixture.collect();
    assert_eq!(mmtk.gc_count(), 1);
    // Nothing is rooted.
    assert!(memory_manager::used_bytes(mmtk) < HEAP_SIZE / 8);
}

#[test]
pub fn allocate_without_initialize_collection() {
    let fixture = MutatorFixture::from_mmtk(MMTKFixture::create_uninitialized(&format!(
        "heap_size={}",
        HEAP_SIZE
    )));
    let mmtk = fixture.mmtk;
    assert!(!mmtk.is_initialized());
    assert!(!memory_manager::is_collection_enabled(mmtk));

    let object = fixture
        .host
        .alloc_object(fixture.handle, 0, PAYLOAD, AllocationSemantics::Default);
    assert!(!object.is_null());
    fixture.collect();
    assert_eq!(mmtk.gc_count(), 0);
}

#[test]
#[should_panic(expected = "enable_collection() is called before initialize_collection()")]
pub fn enable_collection_before_initialize_collection() {
    let fixture = MMTKFixture::create_uninitialized(&format!("heap_size={}", HEAP_SIZE));
    memory_manager::enable_collection(fixture.mmtk);
}
