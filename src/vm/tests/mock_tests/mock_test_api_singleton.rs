// This is the only test that creates the process-wide instance.

use std::panic;

use super::mock_test_prelude::*;
use crate::api;
use crate::util::constants::LOG_MIN_OBJECT_SIZE;

#[test]
pub fn api_singleton_lifecycle() {
    assert!(!api::is_initialized());
    assert!(api::process("threads", "2"));
    assert!(!api::process("no_such_option", "1"));
    // Either all the options are set, or none.
    assert!(!api::process_bulk("no_finalizer=true threads=zero"));
    assert!(api::process_bulk("no_finalizer=false ignore_system_gc=false"));

    let mmtk = api::init(8 << 20, 8 << 20);
    assert!(api::is_initialized());
    assert!(std::ptr::eq(mmtk, api::instance()));
    assert_eq!(mmtk.get_options().threads, 2);
    assert_eq!(api::heap_layout().heap_start, api::starting_heap_address());
    assert_eq!(api::heap_layout().heap_end, api::last_heap_address());
    assert_eq!(api::total_bytes(), 8 << 20);
    assert_eq!(api::bytes_in_page(), 4096);

    let host = MockHost::new();
    host.attach(mmtk);
    api::bind_upcalls(Box::new(host.clone()));
    memory_manager::initialize_collection(mmtk, host.new_thread());

    let tls = host.new_mutator_tls();
    let handle = host.bind_mutator(tls);
    let object = host.alloc_object(handle, 0, 16, AllocationSemantics::Default);
    assert!(api::is_mmtk_object(object.to_raw_address()));
    assert!(api::is_in_mmtk_spaces(object));
    assert!(api::is_live_object(object));
    assert!(!api::will_never_move(object));
    assert!(api::used_bytes() > 0);
    assert_eq!(api::free_bytes(), api::total_bytes() - api::used_bytes());
    assert!(api::is_reachable(object));
    assert!(api::is_mapped_address(object.to_raw_address()));
    assert!(!api::is_mapped_address(Address::ZERO));
    assert!(api::is_aligned_to(object.to_raw_address(), 8));
    assert_eq!(api::get_vo_bit_log_region_size(), LOG_MIN_OBJECT_SIZE as usize);

    let used = api::used_bytes();
    let buf = api::counted_calloc(4, 64);
    assert_eq!(api::used_bytes(), used + 256);
    let buf = api::realloc_with_old_size(buf, 512, 256);
    assert_eq!(api::used_bytes(), used + 512);
    api::free_with_size(buf, 512);
    assert_eq!(api::used_bytes(), used);
    let plain = api::malloc(64);
    assert!(!plain.is_zero());
    api::free(plain);
    assert_eq!(api::used_bytes(), used);

    assert!(api::pin_object(object));
    assert!(api::is_pinned(object));
    // Pins are permanent by default.
    assert!(!api::unpin_object(object));

    api::add_finalizer(object);
    assert_eq!(api::get_finalized_object(), None);

    // The instance is created once, and options are fixed from then on.
    assert!(panic::catch_unwind(|| api::init(8 << 20, 8 << 20)).is_err());
    assert!(panic::catch_unwind(api::init_from_options).is_err());
    assert!(panic::catch_unwind(|| api::process("threads", "4")).is_err());

    host.destroy_mutator(tls, handle);
}
