use std::panic::{self, AssertUnwindSafe};

use super::mock_test_prelude::*;

#[test]
pub fn destroyed_handle_is_stale() {
    let fixture = MMTKFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    let tls = fixture.host.new_mutator_tls();
    let handle = fixture.host.bind_mutator(tls);
    let object = fixture
        .host
        .alloc_object(handle, 0, 16, AllocationSemantics::Default);
    assert!(!object.is_null());
    assert_eq!(mmtk.mutators.number_of_mutators(), 1);

    fixture.host.destroy_mutator(tls, handle);
    assert_eq!(mmtk.mutators.number_of_mutators(), 0);
    assert!(!mmtk.mutators.is_valid(handle));
    assert!(panic::catch_unwind(AssertUnwindSafe(|| {
        memory_manager::flush_mutator(mmtk, handle)
    }))
    .is_err());

    // The slot is reused, but the old handle stays stale.
    let tls2 = fixture.host.new_mutator_tls();
    let handle2 = fixture.host.bind_mutator(tls2);
    assert_eq!(handle2.index, handle.index);
    assert_ne!(handle2, handle);
    assert!(mmtk.mutators.is_valid(handle2));
    assert!(!mmtk.mutators.is_valid(handle));
    assert!(panic::catch_unwind(AssertUnwindSafe(|| {
        memory_manager::with_mutator(mmtk, handle, |mutator| mutator.get_tls())
    }))
    .is_err());
    assert_eq!(
        memory_manager::with_mutator(mmtk, handle2, |mutator| mutator.get_tls()),
        tls2
    );

    // Stale mutators are not scanned.
    fixture.host.collect(tls2);
    assert_eq!(fixture.host.scanned_mutators(), vec![handle2]);
}

#[test]
pub fn destroy_mutator_returns_its_block() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;
    let object = fixture
        .host
        .alloc_object(fixture.handle, 0, 16, AllocationSemantics::Default);
    assert!(!object.is_null());
    let selector = memory_manager::get_allocator_mapping(mmtk, AllocationSemantics::Default);
    let cursor = memory_manager::with_mutator(mmtk, fixture.handle, |m| m.cursor_of(selector));
    assert!(!cursor.is_zero());

    fixture.host.destroy_mutator(fixture.tls, fixture.handle);

    // The block is no longer owned by the mutator, so the next collection reclaims it.
    let tls = fixture.host.new_mutator_tls();
    fixture.host.bind_mutator(tls);
    fixture.host.collect(tls);
    assert!(!memory_manager::is_mmtk_object(mmtk, object.to_raw_address()));
}
