use super::mock_test_prelude::*;

#[test]
pub fn collection_keeps_mutator_cursor() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    let selector = memory_manager::get_allocator_mapping(mmtk, AllocationSemantics::Default);

    let object = fixture
        .host
        .alloc_object(fixture.handle, 0, 16, AllocationSemantics::Default);
    let root = fixture.host.add_stack_root(fixture.tls, object);
    let garbage = fixture
        .host
        .alloc_object(fixture.handle, 0, 16, AllocationSemantics::Default);
    let (cursor, limit) = memory_manager::with_mutator(mmtk, fixture.handle, |mutator| {
        (mutator.cursor_of(selector), mutator.limit_of(selector))
    });
    assert!(!cursor.is_zero());

    fixture.collect();
    assert_eq!(mmtk.gc_count(), 1);
    let events = fixture.host.events();
    assert_eq!(events.first(), Some(&HostEvent::StopAll));
    assert!(events.contains(&HostEvent::ResumeAll));

    let (cursor_after, limit_after) = memory_manager::with_mutator(mmtk, fixture.handle, |mutator| {
        (mutator.cursor_of(selector), mutator.limit_of(selector))
    });
    assert_eq!(cursor_after, cursor);
    assert_eq!(limit_after, limit);

    // Objects in the block the mutator allocates into stay in place.
    assert_eq!(fixture.host.get_root(root), object);
    assert!(memory_manager::is_mmtk_object(mmtk, object.to_raw_address()));
    assert!(!memory_manager::is_mmtk_object(mmtk, garbage.to_raw_address()));

    // Allocation continues from the cursor.
    let next = fixture
        .host
        .alloc_object(fixture.handle, 0, 16, AllocationSemantics::Default);
    assert_eq!(next.to_raw_address(), cursor);
}

#[test]
pub fn gc_poll_parks_for_pending_collection() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    // Nothing is pending.
    memory_manager::gc_poll(mmtk, fixture.handle);
    assert_eq!(mmtk.gc_count(), 0);

    let other_tls = fixture.host.new_mutator_tls();
    let other = fixture.host.bind_mutator(other_tls);
    let host = fixture.host.clone();
    let requester = std::thread::spawn(move || {
        host.collect(other_tls);
        host.destroy_mutator(other_tls, other);
    });
    // The collection waits until this mutator reaches a safepoint.
    while mmtk.gc_count() == 0 {
        memory_manager::gc_poll(mmtk, fixture.handle);
        std::thread::yield_now();
    }
    requester.join().unwrap();
    assert_eq!(mmtk.gc_count(), 1);
}
