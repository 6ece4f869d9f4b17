use super::mock_test_prelude::*;

#[test]
pub fn will_never_move_by_space() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    let host = &fixture.host;

    let default = host.alloc_object(fixture.handle, 0, 16, AllocationSemantics::Default);
    let immortal = host.alloc_object(fixture.handle, 0, 16, AllocationSemantics::Immortal);
    let large = host.alloc_object(fixture.handle, 0, 64 << 10, AllocationSemantics::Los);

    assert!(!memory_manager::will_never_move(mmtk, default));
    assert!(memory_manager::will_never_move(mmtk, immortal));
    assert!(memory_manager::will_never_move(mmtk, large));
    // Pinning does not change the answer.
    assert!(memory_manager::pin_object(mmtk, default));
    assert!(!memory_manager::will_never_move(mmtk, default));

    // Unreachable immortal objects are kept, and large objects are reclaimed.
    memory_manager::flush_mutator(mmtk, fixture.handle);
    fixture.collect();
    assert!(memory_manager::is_mmtk_object(mmtk, immortal.to_raw_address()));
    assert!(!memory_manager::is_mmtk_object(mmtk, large.to_raw_address()));
}
