use super::mock_test_prelude::*;
use crate::util::constants::BYTES_IN_WORD;

#[test]
pub fn object_queries() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    let object = fixture
        .host
        .alloc_object(fixture.handle, 2, 16, AllocationSemantics::Default);
    let addr = object.to_raw_address();

    assert!(memory_manager::is_in_mmtk_spaces(mmtk, object));
    assert!(memory_manager::is_mmtk_object(mmtk, addr));
    assert!(memory_manager::is_live_object(mmtk, object));
    assert!(memory_manager::starting_heap_address(mmtk) <= addr);
    assert!(addr < memory_manager::last_heap_address(mmtk));

    // An interior address is in the space, but it is not an object.
    assert!(!memory_manager::is_mmtk_object(mmtk, addr + BYTES_IN_WORD));
    assert!(memory_manager::is_in_mmtk_spaces(
        mmtk,
        ObjectReference::from_raw_address(addr + BYTES_IN_WORD)
    ));

    // Addresses outside the heap.
    let local = 0usize;
    let outside = Address::from_ref(&local);
    assert!(!memory_manager::is_mmtk_object(mmtk, outside));
    assert!(!memory_manager::is_mmtk_object(mmtk, Address::ZERO));
    assert!(!memory_manager::is_in_mmtk_spaces(mmtk, ObjectReference::NULL));
    assert!(!memory_manager::is_in_mmtk_spaces(
        mmtk,
        ObjectReference::from_raw_address(outside)
    ));
    // Objects outside the heap are not managed, so they are never dead.
    assert!(memory_manager::is_live_object(
        mmtk,
        ObjectReference::from_raw_address(outside)
    ));

    // The last block of the heap has never been used.
    let last_word = memory_manager::last_heap_address(mmtk) - BYTES_IN_WORD;
    assert!(!memory_manager::is_in_mmtk_spaces(
        mmtk,
        ObjectReference::from_raw_address(last_word)
    ));
    assert!(!memory_manager::is_live_object(
        mmtk,
        ObjectReference::from_raw_address(last_word)
    ));
}

#[test]
pub fn heap_accounting() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    assert_eq!(memory_manager::total_bytes(mmtk), 8 << 20);
    assert_eq!(memory_manager::used_bytes(mmtk), 0);
    assert_eq!(memory_manager::free_bytes(mmtk), 8 << 20);
    assert_eq!(memory_manager::bytes_in_page(), 4096);

    fixture
        .host
        .alloc_object(fixture.handle, 0, 16, AllocationSemantics::Default);
    let used = memory_manager::used_bytes(mmtk);
    assert!(used > 0);
    assert_eq!(memory_manager::free_bytes(mmtk), (8 << 20) - used);

    let layout = mmtk.heap_layout();
    assert_eq!(layout.heap_start, memory_manager::starting_heap_address(mmtk));
    assert_eq!(layout.heap_end, memory_manager::last_heap_address(mmtk));
}
