use super::mock_test_prelude::*;
use crate::util::alloc::AllocationError;

const MB: usize = 1 << 20;

#[test]
pub fn counted_malloc_is_part_of_used_bytes() {
    let fixture = MMTKFixture::create_with_heapsize(8 * MB);
    let mmtk = fixture.mmtk;
    let used = memory_manager::used_bytes(mmtk);

    let a = memory_manager::counted_malloc(mmtk, MB);
    assert!(!a.is_zero());
    assert_eq!(memory_manager::used_bytes(mmtk), used + MB);
    let b = memory_manager::counted_calloc(mmtk, 4, 1024);
    assert!(!b.is_zero());
    assert_eq!(unsafe { b.load::<usize>() }, 0);
    assert_eq!(memory_manager::used_bytes(mmtk), used + MB + 4096);

    let a = memory_manager::realloc_with_old_size(mmtk, a, 2 * MB, MB);
    assert!(!a.is_zero());
    assert_eq!(memory_manager::used_bytes(mmtk), used + 2 * MB + 4096);
    assert_eq!(
        memory_manager::free_bytes(mmtk),
        memory_manager::total_bytes(mmtk) - memory_manager::used_bytes(mmtk)
    );

    memory_manager::free_with_size(mmtk, a, 2 * MB);
    memory_manager::free_with_size(mmtk, b, 4096);
    assert_eq!(memory_manager::used_bytes(mmtk), used);

    // Plain malloc is not counted.
    let c = memory_manager::malloc(MB);
    assert_eq!(memory_manager::used_bytes(mmtk), used);
    memory_manager::free(c);
}

#[test]
pub fn counted_malloc_takes_heap_space() {
    let fixture = MutatorFixture::create_with_heapsize(8 * MB);
    let mmtk = fixture.mmtk;
    let host = &fixture.host;

    // Counted memory fills nearly the whole heap. Objects do not fit, even after a collection.
    let native = memory_manager::counted_malloc(mmtk, 15 * MB / 2);
    assert!(!native.is_zero());
    let object = host.alloc_object(fixture.handle, 0, 64, AllocationSemantics::Default);
    assert!(object.is_null());
    assert!(mmtk.gc_count() >= 1);
    assert_eq!(host.out_of_memory_errors(), vec![AllocationError::HeapOutOfMemory]);

    // Freeing it makes room again.
    memory_manager::free_with_size(mmtk, native, 15 * MB / 2);
    let object = host.alloc_object(fixture.handle, 0, 64, AllocationSemantics::Default);
    assert!(!object.is_null());
}

#[test]
pub fn failed_realloc_keeps_the_old_count() {
    let fixture = MMTKFixture::create_with_heapsize(8 * MB);
    let mmtk = fixture.mmtk;
    let used = memory_manager::used_bytes(mmtk);

    let a = memory_manager::counted_malloc(mmtk, 1024);
    unsafe { a.store::<usize>(0x5a5a) };
    let b = memory_manager::realloc_with_old_size(mmtk, a, usize::MAX / 2, 1024);
    assert!(b.is_zero());
    // The old allocation is untouched, and still counted.
    assert_eq!(memory_manager::used_bytes(mmtk), used + 1024);
    assert_eq!(unsafe { a.load::<usize>() }, 0x5a5a);

    memory_manager::free_with_size(mmtk, a, 1024);
    assert_eq!(memory_manager::used_bytes(mmtk), used);
}
