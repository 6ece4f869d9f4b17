use super::mock_test_prelude::*;
use crate::util::options::PinLifetime;
use crate::MMTKBuilder;

#[test]
pub fn failed_bulk_options_leave_the_builder_unchanged() {
    let mut builder = MMTKBuilder::new();
    assert!(memory_manager::process(&mut builder, "threads", "3"));

    // The valid pairs before the bad one are rolled back too.
    assert!(!memory_manager::process_bulk(
        &mut builder,
        "threads=5 sanity=true pin_lifetime=Explicit no_such_option=1"
    ));
    assert!(!memory_manager::process_bulk(&mut builder, "threads=5 sanity=maybe"));
    assert_eq!(builder.options.threads, 3);
    assert!(!builder.options.sanity);
    assert_eq!(builder.options.pin_lifetime, PinLifetime::Permanent);

    assert!(memory_manager::process_bulk(&mut builder, "threads=4 sanity=true heap_size=4194304"));
    let mmtk = memory_manager::mmtk_init(&builder);
    assert_eq!(mmtk.get_options().threads, 4);
    assert!(mmtk.get_options().sanity);
}
