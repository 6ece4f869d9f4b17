use super::mock_test_prelude::*;
use crate::util::alloc::AllocatorInfo;

#[test]
pub fn bump_pointer_fields_are_at_the_reported_offsets() {
    let fixture = MutatorFixture::create_with_heapsize(8 << 20);
    let mmtk = fixture.mmtk;

    for semantics in [AllocationSemantics::Default, AllocationSemantics::Immortal] {
        let selector = memory_manager::get_allocator_mapping(mmtk, semantics);
        let AllocatorInfo::BumpPointer {
            limit_offset,
            cursor_offset,
        } = memory_manager::get_allocator_info(mmtk, selector)
        else {
            panic!("{:?} has no bump pointer", selector);
        };
        // Give the allocator a block, so the fields are not zero.
        let object = fixture.host.alloc_object(fixture.handle, 0, 16, semantics);
        assert!(!object.is_null());

        memory_manager::with_mutator(mmtk, fixture.handle, |mutator| {
            let base = Address::from_ref(&*mutator);
            let cursor = unsafe { (base + cursor_offset).load::<Address>() };
            let limit = unsafe { (base + limit_offset).load::<Address>() };
            let allocator = &mutator.allocators.bump_pointer[selector.index() as usize];
            assert_eq!(cursor, allocator.cursor);
            assert_eq!(limit, allocator.limit);
            assert!(cursor > object.to_raw_address());
            assert!(cursor <= limit);
        });
    }

    let los = memory_manager::get_allocator_mapping(mmtk, AllocationSemantics::Los);
    assert_eq!(
        memory_manager::get_allocator_info(mmtk, los),
        AllocatorInfo::Unimplemented
    );
}
