//! The work packets of a collection.

use crate::plan::{MutatorHandle, VectorObjectQueue};
use crate::scheduler::{GCWork, GCWorker, WorkBucketStage};
use crate::util::opaque_pointer::*;
use crate::util::ObjectReference;
use crate::vm::closure::{BufferClosure, RootsClosure, SlotsClosure, DEFAULT_BUFFER_CAPACITY};
use crate::vm::Slot;
use crate::MMTK;

/// Create the closure the host reports roots into. Precise roots become [`ProcessSlots`]
/// packets. Conservative roots are pinned for this collection, and become [`ProcessRootNodes`]
/// packets.
///
/// Root scanning runs in the `Prepare` stage, so every conservative root is pinned before the
/// `Closure` stage starts tracing.
fn create_roots_closure(mmtk: &'static MMTK) -> RootsClosure<'static> {
    let closure_bucket = &mmtk.scheduler.work_buckets[WorkBucketStage::Closure];
    let slots = BufferClosure::new(DEFAULT_BUFFER_CAPACITY, move |slots: Vec<Slot>| {
        closure_bucket.add(ProcessSlots::new(slots, true));
    });
    let nodes = BufferClosure::new(DEFAULT_BUFFER_CAPACITY, move |nodes: Vec<ObjectReference>| {
        let plan = mmtk.get_plan();
        let nodes: Vec<ObjectReference> = nodes
            .into_iter()
            .filter(|node| plan.is_valid_object(node.to_raw_address()))
            .collect();
        for node in nodes.iter() {
            plan.metadata.pin_for_gc(*node);
        }
        if !nodes.is_empty() {
            closure_bucket.add(ProcessRootNodes::new(nodes));
        }
    });
    RootsClosure::new(slots, nodes)
}

/// Scan the roots of one stopped mutator.
pub struct ScanMutatorRoots {
    pub handle: MutatorHandle,
    pub tls: VMMutatorThread,
}

impl ScanMutatorRoots {
    pub fn new(handle: MutatorHandle, tls: VMMutatorThread) -> Self {
        Self { handle, tls }
    }
}

impl GCWork for ScanMutatorRoots {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        trace!("ScanMutatorRoots for mutator {:?}", self.handle);
        let mut roots = create_roots_closure(mmtk);
        mmtk.get_upcalls()
            .scan_roots_in_mutator_thread(worker.tls, self.tls, self.handle, &mut roots);
        roots.finish();
    }
}

/// Scan the roots that do not belong to a mutator.
#[derive(Default)]
pub struct ScanVMSpecificRoots;

impl GCWork for ScanVMSpecificRoots {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        trace!("ScanVMSpecificRoots");
        let mut roots = create_roots_closure(mmtk);
        mmtk.get_upcalls().scan_vm_specific_roots(worker.tls, &mut roots);
        roots.finish();
    }
}

/// Trace the objects a batch of slots refer to, and update the slots if the objects moved.
pub struct ProcessSlots {
    slots: Vec<Slot>,
    roots: bool,
}

impl ProcessSlots {
    pub fn new(slots: Vec<Slot>, roots: bool) -> Self {
        Self { slots, roots }
    }
}

impl GCWork for ProcessSlots {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        trace!(
            "ProcessSlots: {} slots (roots: {})",
            self.slots.len(),
            self.roots
        );
        let plan = mmtk.get_plan();
        let mut queue = VectorObjectQueue::new();
        for slot in self.slots.iter() {
            let object = slot.load();
            if object.is_null() {
                continue;
            }
            let new_object = plan.trace_object(&mut queue, object, worker);
            if new_object != object {
                slot.store(new_object);
            }
            if queue.is_full() {
                // Scanning the objects right away saves a round trip through the bucket.
                ScanObjects::new(queue.take()).do_work_with_stat(worker, mmtk);
            }
        }
        if !queue.is_empty() {
            ScanObjects::new(queue.take()).do_work_with_stat(worker, mmtk);
        }
    }
}

/// Trace conservative roots. The objects are pinned, so they stay where they are.
pub struct ProcessRootNodes {
    nodes: Vec<ObjectReference>,
}

impl ProcessRootNodes {
    pub fn new(nodes: Vec<ObjectReference>) -> Self {
        Self { nodes }
    }
}

impl GCWork for ProcessRootNodes {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        trace!("ProcessRootNodes: {} nodes", self.nodes.len());
        let plan = mmtk.get_plan();
        let mut queue = VectorObjectQueue::new();
        for node in self.nodes.iter() {
            let traced = plan.trace_object(&mut queue, *node, worker);
            debug_assert_eq!(traced, *node, "A conservative root was moved");
        }
        if !queue.is_empty() {
            ScanObjects::new(queue.take()).do_work_with_stat(worker, mmtk);
        }
    }
}

/// Ask the host for the reference fields of newly reached objects. Each batch of fields becomes
/// a [`ProcessSlots`] packet.
pub struct ScanObjects {
    objects: Vec<ObjectReference>,
}

impl ScanObjects {
    pub fn new(objects: Vec<ObjectReference>) -> Self {
        Self { objects }
    }
}

impl GCWork for ScanObjects {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        trace!("ScanObjects: {} objects", self.objects.len());
        let closure_bucket = &mmtk.scheduler.work_buckets[WorkBucketStage::Closure];
        let upcalls = mmtk.get_upcalls();
        let tls = worker.tls;
        let mut closure: SlotsClosure = BufferClosure::new(DEFAULT_BUFFER_CAPACITY, |slots| {
            closure_bucket.add(ProcessSlots::new(slots, false));
        });
        for object in self.objects.iter() {
            if upcalls.is_array(*object) {
                upcalls.scan_array(tls, *object, &mut closure);
            } else {
                upcalls.scan_object(tls, *object, &mut closure);
            }
        }
        closure.finish();
        trace!("ScanObjects End");
    }
}

/// Reclaim the memory of dead objects.
#[derive(Default)]
pub struct Release;

impl GCWork for Release {
    fn do_work(&mut self, _worker: &mut GCWorker, mmtk: &'static MMTK) {
        trace!("Release");
        mmtk.get_plan().release();
    }
}
