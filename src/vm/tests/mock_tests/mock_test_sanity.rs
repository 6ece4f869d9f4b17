use super::mock_test_prelude::*;
use crate::util::test_util::panic_after;

const NODES: usize = 200;

// A failed heap verification panics on the controller thread, and the mutator would wait forever.
// `panic_after` turns that into a test failure.
#[test]
pub fn sanity_check_after_moving() {
    panic_after(60_000, || {
        let fixture = MutatorFixture::create_with_options("threads=2 heap_size=8388608 sanity=true");
        let mmtk = fixture.mmtk;
        let host = &fixture.host;

        // A binary tree in heap order: node i refers to 2i+1 and 2i+2.
        let nodes: Vec<ObjectReference> = (0..NODES)
            .map(|_| host.alloc_object(fixture.handle, 2, 8, AllocationSemantics::Default))
            .collect();
        for (i, node) in nodes.iter().enumerate() {
            unsafe { payload_start(*node).store::<usize>(i) };
            for (field, child) in [2 * i + 1, 2 * i + 2].into_iter().enumerate() {
                if child < NODES {
                    set_field(*node, field, nodes[child]);
                }
            }
        }
        let root = host.add_root(nodes[0]);
        let pinned = nodes[NODES / 2];
        assert!(memory_manager::pin_object(mmtk, pinned));
        memory_manager::flush_mutator(mmtk, fixture.handle);

        fixture.collect();
        fixture.collect();
        assert_eq!(mmtk.gc_count(), 2);
        assert_eq!(host.root_rescans(), 2);

        // Walk the tree from the root.
        let mut seen = vec![false; NODES];
        let mut stack = vec![host.get_root(root)];
        while let Some(node) = stack.pop() {
            assert!(memory_manager::is_mmtk_object(mmtk, node.to_raw_address()));
            let i = unsafe { payload_start(node).load::<usize>() };
            assert!(!seen[i]);
            seen[i] = true;
            if i == NODES / 2 {
                assert_eq!(node, pinned);
            }
            for field in 0..2 {
                let child = get_field(node, field);
                if !child.is_null() {
                    stack.push(child);
                }
            }
        }
        assert!(seen.into_iter().all(|s| s));
    });
}
