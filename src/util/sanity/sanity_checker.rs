use std::collections::HashSet;

use crate::util::{ObjectReference, VMWorkerThread};
use crate::vm::closure::{BufferClosure, RootsClosure, DEFAULT_BUFFER_CAPACITY};
use crate::vm::Slot;
use crate::MMTK;

/// Verifies the heap after the transitive closure. The roots are scanned again, and every object
/// reachable from them must be a valid object that is live in this collection, and every
/// reference must hold the new address of an object that was moved.
///
/// The check runs on the controller thread, while the world is stopped.
pub struct SanityChecker {
    mmtk: &'static MMTK,
    /// Visited objects
    refs: HashSet<ObjectReference>,
    /// Objects reached but not scanned yet
    stack: Vec<ObjectReference>,
}

impl SanityChecker {
    pub fn new(mmtk: &'static MMTK) -> Self {
        Self {
            mmtk,
            refs: HashSet::new(),
            stack: vec![],
        }
    }

    /// Run the check. Panics on the first broken reference.
    pub fn check(mut self, tls: VMWorkerThread) {
        let upcalls = self.mmtk.get_upcalls();
        upcalls.prepare_for_roots_re_scanning();

        let mut root_slots: Vec<Slot> = vec![];
        let mut root_nodes: Vec<ObjectReference> = vec![];
        {
            let mut roots = RootsClosure::new(
                BufferClosure::new(DEFAULT_BUFFER_CAPACITY, |slots: Vec<Slot>| {
                    root_slots.extend(slots)
                }),
                BufferClosure::new(DEFAULT_BUFFER_CAPACITY, |nodes: Vec<ObjectReference>| {
                    root_nodes.extend(nodes)
                }),
            );
            for handle in self.mmtk.mutators.handles() {
                if let Some(mutator_tls) = self.mmtk.mutators.tls_of(handle) {
                    upcalls.scan_roots_in_mutator_thread(tls, mutator_tls, handle, &mut roots);
                }
            }
            upcalls.scan_vm_specific_roots(tls, &mut roots);
            roots.finish();
        }

        for slot in root_slots {
            self.visit_slot(slot);
        }
        let plan = self.mmtk.get_plan();
        for node in root_nodes {
            // Conservative roots may be any word. Only valid objects are kept alive by them.
            if plan.is_valid_object(node.to_raw_address()) {
                self.visit(node, None);
            }
        }
        let ready: Vec<ObjectReference> = self
            .mmtk
            .finalizable_processor
            .lock()
            .unwrap()
            .ready_objects()
            .copied()
            .collect();
        for object in ready {
            self.visit(object, None);
        }

        while let Some(object) = self.stack.pop() {
            let mut fields: Vec<Slot> = vec![];
            {
                let mut closure = BufferClosure::new(DEFAULT_BUFFER_CAPACITY, |slots: Vec<Slot>| {
                    fields.extend(slots)
                });
                if upcalls.is_array(object) {
                    upcalls.scan_array(tls, object, &mut closure);
                } else {
                    upcalls.scan_object(tls, object, &mut closure);
                }
                closure.finish();
            }
            for slot in fields {
                self.visit_slot(slot);
            }
        }
        info!("Sanity check passed: {} objects reachable", self.refs.len());
    }

    fn visit_slot(&mut self, slot: Slot) {
        let object = slot.load();
        if !object.is_null() {
            self.visit(object, Some(slot));
        }
    }

    fn visit(&mut self, object: ObjectReference, slot: Option<Slot>) {
        let plan = self.mmtk.get_plan();
        if !plan.pr.contains(object.to_raw_address()) {
            // Not in the heap. The host owns it.
            return;
        }
        if !plan.is_valid_object(object.to_raw_address()) {
            panic!("{} (in slot {:?}) is not a valid object", object, slot);
        }
        if let Some(new_object) = plan.get_forwarded_object(object) {
            panic!(
                "{} (in slot {:?}) is stale: the object was moved to {}",
                object, slot, new_object
            );
        }
        if !plan.is_live(object) {
            panic!("{} (in slot {:?}) is reachable but not live", object, slot);
        }
        if self.refs.insert(object) {
            self.stack.push(object);
        }
    }
}
