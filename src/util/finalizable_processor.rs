use std::collections::VecDeque;

use crate::plan::{ObjectQueue, Plan, VectorObjectQueue};
use crate::scheduler::gc_work::ScanObjects;
use crate::scheduler::{GCWork, GCWorker};
use crate::util::ObjectReference;
use crate::MMTK;

/// A special processor for finalizable objects.
///
/// Candidates are objects registered by the host. They are not roots: when a collection finds a
/// candidate unreachable, the candidate is resurrected (it and everything it references survive
/// the collection) and moved to the ready queue, from which the host takes it exactly once.
#[derive(Default)]
pub struct FinalizableProcessor {
    /// Candidate objects that have finalizers with them
    candidates: Vec<ObjectReference>,
    /// Objects whose finalizers can be run. The host has not fetched them yet.
    ready_for_finalize: VecDeque<ObjectReference>,
}

impl FinalizableProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: ObjectReference) {
        self.candidates.push(object);
    }

    /// Trace the objects that are waiting for the host to finalize them. They are roots until the
    /// host takes them.
    pub fn trace_ready<Q: ObjectQueue>(&mut self, plan: &Plan, queue: &mut Q, worker: &mut GCWorker) {
        for object in self.ready_for_finalize.iter_mut() {
            *object = plan.trace_object(queue, *object, worker);
        }
    }

    /// Called after the transitive closure. Live candidates are updated to their new addresses.
    /// Dead candidates are traced and become ready for finalization.
    ///
    /// Liveness of every candidate is decided before any candidate is resurrected, so a candidate
    /// that is only reachable from other dead candidates is finalized too.
    pub fn scan<Q: ObjectQueue>(&mut self, plan: &Plan, queue: &mut Q, worker: &mut GCWorker) {
        let candidates = std::mem::take(&mut self.candidates);
        let (live, dead): (Vec<ObjectReference>, Vec<ObjectReference>) =
            candidates.into_iter().partition(|object| plan.is_live(*object));

        self.candidates = live
            .into_iter()
            .map(|object| {
                let forwarded = plan.get_forwarded_object(object).unwrap_or(object);
                trace!("{} is live, keep {} as a candidate", object, forwarded);
                forwarded
            })
            .collect();

        for object in dead {
            let retained = plan.trace_object(queue, object, worker);
            trace!("{} is not live, push {} to ready_for_finalize", object, retained);
            self.ready_for_finalize.push_back(retained);
        }
    }

    /// Take the oldest object that is ready for finalization.
    pub fn get_ready_object(&mut self) -> Option<ObjectReference> {
        self.ready_for_finalize.pop_front()
    }

    /// The objects waiting for the host to finalize them, oldest first.
    pub fn ready_objects(&self) -> impl Iterator<Item = &ObjectReference> {
        self.ready_for_finalize.iter()
    }

    pub fn has_ready_objects(&self) -> bool {
        !self.ready_for_finalize.is_empty()
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn num_ready(&self) -> usize {
        self.ready_for_finalize.len()
    }

    /// Remove all the registrations, whether the objects are alive or ready.
    pub fn get_all_finalizers(&mut self) -> Vec<ObjectReference> {
        let mut ret = std::mem::take(&mut self.candidates);
        ret.extend(self.ready_for_finalize.drain(..));
        ret
    }

    /// Remove the registrations of one object. An object may be registered more than once.
    pub fn get_finalizers_for(&mut self, object: ObjectReference) -> Vec<ObjectReference> {
        let mut ret = vec![];
        self.candidates.retain(|o| {
            if *o == object {
                ret.push(*o);
                false
            } else {
                true
            }
        });
        self.ready_for_finalize.retain(|o| {
            if *o == object {
                ret.push(*o);
                false
            } else {
                true
            }
        });
        ret
    }
}

/// Trace the objects in the ready queue, as roots of the closure.
#[derive(Default)]
pub struct TraceReadyForFinalize;

impl GCWork for TraceReadyForFinalize {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        let mut queue = VectorObjectQueue::new();
        mmtk.finalizable_processor
            .lock()
            .unwrap()
            .trace_ready(mmtk.get_plan(), &mut queue, worker);
        if !queue.is_empty() {
            ScanObjects::new(queue.take()).do_work_with_stat(worker, mmtk);
        }
    }
}

/// Resurrect dead finalizable objects after the closure over the roots.
#[derive(Default)]
pub struct Finalization;

impl GCWork for Finalization {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        let mut queue = VectorObjectQueue::new();
        {
            let mut finalizable_processor = mmtk.finalizable_processor.lock().unwrap();
            debug!(
                "Finalization, {} objects in candidates, {} objects ready to finalize",
                finalizable_processor.num_candidates(),
                finalizable_processor.num_ready()
            );
            finalizable_processor.scan(mmtk.get_plan(), &mut queue, worker);
            debug!(
                "Finished finalization, {} objects in candidates, {} objects ready to finalize",
                finalizable_processor.num_candidates(),
                finalizable_processor.num_ready()
            );
        }
        if !queue.is_empty() {
            ScanObjects::new(queue.take()).do_work_with_stat(worker, mmtk);
        }
    }
}
