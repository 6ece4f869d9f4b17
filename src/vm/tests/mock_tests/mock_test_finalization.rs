use super::mock_test_prelude::*;

#[test]
pub fn finalizer_runs_once() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    let host = &fixture.host;

    let object = host.alloc_object(fixture.handle, 1, 32, AllocationSemantics::Default);
    let child = host.alloc_object(fixture.handle, 0, 8, AllocationSemantics::Default);
    set_field(object, 0, child);
    unsafe { payload_start(object).store::<u64>(0xdead_beef) };
    unsafe { payload_start(child).store::<u64>(42) };
    memory_manager::add_finalizer(mmtk, object);
    // Move the objects out of the block the mutator allocates into.
    memory_manager::flush_mutator(mmtk, fixture.handle);

    fixture.collect();
    host.wait_for_event(HostEvent::ScheduleFinalization, 1);

    let finalized = memory_manager::get_finalized_object(mmtk).expect("The object should be ready");
    assert!(memory_manager::is_mmtk_object(mmtk, finalized.to_raw_address()));
    assert_eq!(unsafe { payload_start(finalized).load::<u64>() }, 0xdead_beef);
    // The objects the finalizable object refers to are kept as well.
    let child = get_field(finalized, 0);
    assert!(memory_manager::is_mmtk_object(mmtk, child.to_raw_address()));
    assert_eq!(unsafe { payload_start(child).load::<u64>() }, 42);
    assert_eq!(memory_manager::get_finalized_object(mmtk), None);

    // Finalization is not repeated.
    fixture.collect();
    assert_eq!(memory_manager::get_finalized_object(mmtk), None);
    assert!(memory_manager::get_all_finalizers(mmtk).is_empty());
}

#[test]
pub fn live_candidates_are_kept() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    let host = &fixture.host;

    let a = host.alloc_object(fixture.handle, 0, 8, AllocationSemantics::Default);
    let b = host.alloc_object(fixture.handle, 0, 8, AllocationSemantics::Default);
    let a_root = host.add_root(a);
    let b_root = host.add_root(b);
    memory_manager::add_finalizer(mmtk, a);
    memory_manager::add_finalizer(mmtk, b);
    memory_manager::add_finalizer(mmtk, b);
    memory_manager::flush_mutator(mmtk, fixture.handle);

    fixture.collect();
    assert_eq!(memory_manager::get_finalized_object(mmtk), None);

    // The candidates follow the objects when they move.
    let a = host.get_root(a_root);
    let b = host.get_root(b_root);
    assert_eq!(memory_manager::get_finalizers_for(mmtk, b), vec![b, b]);
    assert!(memory_manager::get_finalizers_for(mmtk, b).is_empty());
    assert_eq!(memory_manager::get_all_finalizers(mmtk), vec![a]);
    assert!(memory_manager::get_all_finalizers(mmtk).is_empty());

    // Objects that are no longer registered are not finalized.
    host.set_root(a_root, ObjectReference::NULL);
    host.set_root(b_root, ObjectReference::NULL);
    fixture.collect();
    assert_eq!(memory_manager::get_finalized_object(mmtk), None);
}

#[test]
pub fn no_finalizer_ignores_registration() {
    let fixture = MutatorFixture::create_with_options("threads=2 heap_size=8388608 no_finalizer=true");
    let mmtk = fixture.mmtk;
    let object = fixture
        .host
        .alloc_object(fixture.handle, 0, 8, AllocationSemantics::Default);
    memory_manager::add_finalizer(mmtk, object);
    assert!(memory_manager::get_all_finalizers(mmtk).is_empty());
    fixture.collect();
    assert_eq!(memory_manager::get_finalized_object(mmtk), None);
}
