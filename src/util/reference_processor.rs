//! Soft, weak and phantom references registered by the host, and the liveness queries the host
//! uses for its own weak references.
//!
//! A reference object is an ordinary heap object whose referent is not reported as a field by
//! [`crate::vm::Upcalls::scan_object`]. The collector reads and writes the referent through
//! [`crate::vm::Upcalls::get_referent`] and [`crate::vm::Upcalls::set_referent`]. After the
//! closure, a reference whose referent is dead has its referent cleared, and is handed back to the
//! host through [`crate::vm::Upcalls::enqueue_references`].
//!
//! Soft referents are retained unless the collection is an emergency collection. Phantom
//! references are processed after finalization, so a phantom referent that a finalizer resurrects
//! is not cleared.

use std::sync::Mutex;

use crate::plan::{ObjectQueue, Plan, VectorObjectQueue};
use crate::scheduler::gc_work::ScanObjects;
use crate::scheduler::{GCWork, GCWorker};
use crate::util::ObjectReference;
use crate::vm::ReferenceQuery;
use crate::MMTK;

impl ReferenceQuery for Plan {
    fn is_live(&self, object: ObjectReference) -> bool {
        if object.is_null() {
            return false;
        }
        Plan::is_live(self, object)
    }

    fn get_forwarded_object(&self, object: ObjectReference) -> Option<ObjectReference> {
        if object.is_null() {
            return None;
        }
        Plan::get_forwarded_object(self, object)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Semantics {
    Soft,
    Weak,
    Phantom,
}

/// The three reference processors of an MMTk instance.
pub struct ReferenceProcessors {
    pub soft: ReferenceProcessor,
    pub weak: ReferenceProcessor,
    pub phantom: ReferenceProcessor,
}

impl Default for ReferenceProcessors {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceProcessors {
    pub fn new() -> Self {
        ReferenceProcessors {
            soft: ReferenceProcessor::new(Semantics::Soft),
            weak: ReferenceProcessor::new(Semantics::Weak),
            phantom: ReferenceProcessor::new(Semantics::Phantom),
        }
    }

    pub fn add_soft_candidate(&self, reff: ObjectReference) {
        self.soft.add_candidate(reff);
    }

    pub fn add_weak_candidate(&self, reff: ObjectReference) {
        self.weak.add_candidate(reff);
    }

    pub fn add_phantom_candidate(&self, reff: ObjectReference) {
        self.phantom.add_candidate(reff);
    }

    /// Take the references cleared in this collection, from all three processors.
    pub fn take_enqueued(&self) -> Vec<ObjectReference> {
        let mut refs = self.soft.take_enqueued();
        refs.extend(self.weak.take_enqueued());
        refs.extend(self.phantom.take_enqueued());
        refs
    }
}

struct ReferenceProcessorSync {
    /// Registered references. Updated to their new addresses in each collection.
    references: Vec<ObjectReference>,
    /// References cleared in this collection, not yet handed to the host.
    enqueued: Vec<ObjectReference>,
}

pub struct ReferenceProcessor {
    semantics: Semantics,
    sync: Mutex<ReferenceProcessorSync>,
}

impl ReferenceProcessor {
    pub fn new(semantics: Semantics) -> Self {
        ReferenceProcessor {
            semantics,
            sync: Mutex::new(ReferenceProcessorSync {
                references: vec![],
                enqueued: vec![],
            }),
        }
    }

    pub fn add_candidate(&self, reff: ObjectReference) {
        debug_assert!(!reff.is_null());
        self.sync.lock().unwrap().references.push(reff);
    }

    /// Are there registered references? An emergency collection only helps if some soft
    /// referents can be cleared.
    pub fn has_candidates(&self) -> bool {
        !self.sync.lock().unwrap().references.is_empty()
    }

    fn take_enqueued(&self) -> Vec<ObjectReference> {
        std::mem::take(&mut self.sync.lock().unwrap().enqueued)
    }

    /// Trace the referents of the references that are reachable. Only for soft references.
    ///
    /// A reference that is not reachable yet may become reachable later in the closure. Its
    /// referent is then cleared, even though it is soft.
    pub fn retain<Q: ObjectQueue>(&self, mmtk: &MMTK, queue: &mut Q, worker: &mut GCWorker) {
        debug_assert_eq!(self.semantics, Semantics::Soft);
        let plan = mmtk.get_plan();
        let upcalls = mmtk.get_upcalls();
        let sync = self.sync.lock().unwrap();
        for reff in sync.references.iter() {
            if !plan.is_live(*reff) {
                continue;
            }
            let reff = plan.get_forwarded_object(*reff).unwrap_or(*reff);
            let referent = upcalls.get_referent(reff);
            if referent.is_null() {
                continue;
            }
            let new_referent = plan.trace_object(queue, referent, worker);
            if new_referent != referent {
                upcalls.set_referent(reff, new_referent);
            }
            trace!("{:?} reference {} retains {}", self.semantics, reff, new_referent);
        }
    }

    /// Called once the referents that should survive are traced. Dead references are dropped.
    /// A live reference is kept if its referent is live, and its referent is updated if it moved.
    /// If its referent is dead, the referent is cleared and the reference is enqueued.
    pub fn scan(&self, mmtk: &MMTK) {
        let plan = mmtk.get_plan();
        let upcalls = mmtk.get_upcalls();
        let mut sync = self.sync.lock().unwrap();
        let ReferenceProcessorSync {
            references,
            enqueued,
        } = &mut *sync;
        let before = references.len();
        let enqueued_before = enqueued.len();

        references.retain_mut(|reff| {
            if !plan.is_live(*reff) {
                trace!("{:?} reference {} is dead. Drop it.", self.semantics, reff);
                return false;
            }
            *reff = plan.get_forwarded_object(*reff).unwrap_or(*reff);
            let referent = upcalls.get_referent(*reff);
            if referent.is_null() {
                // Cleared by the host. Nothing to track.
                return false;
            }
            if plan.is_live(referent) {
                if let Some(new_referent) = plan.get_forwarded_object(referent) {
                    upcalls.set_referent(*reff, new_referent);
                }
                true
            } else {
                trace!("{:?} reference {}: {} is dead", self.semantics, reff, referent);
                upcalls.set_referent(*reff, ObjectReference::NULL);
                enqueued.push(*reff);
                false
            }
        });

        debug!(
            "{:?} references: {} -> {}, {} enqueued",
            self.semantics,
            before,
            references.len(),
            enqueued.len() - enqueued_before
        );
    }
}

/// Retain soft referents. Skipped in an emergency collection.
#[derive(Default)]
pub struct SoftRefProcessing;

impl GCWork for SoftRefProcessing {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        let mut queue = VectorObjectQueue::new();
        mmtk.reference_processors.soft.retain(mmtk, &mut queue, worker);
        if !queue.is_empty() {
            ScanObjects::new(queue.take()).do_work_with_stat(worker, mmtk);
        }
    }
}

/// Clear or forward soft and weak references.
#[derive(Default)]
pub struct WeakRefProcessing;

impl GCWork for WeakRefProcessing {
    fn do_work(&mut self, _worker: &mut GCWorker, mmtk: &'static MMTK) {
        mmtk.reference_processors.soft.scan(mmtk);
        mmtk.reference_processors.weak.scan(mmtk);
    }
}

/// Clear or forward phantom references.
#[derive(Default)]
pub struct PhantomRefProcessing;

impl GCWork for PhantomRefProcessing {
    fn do_work(&mut self, _worker: &mut GCWorker, mmtk: &'static MMTK) {
        mmtk.reference_processors.phantom.scan(mmtk);
    }
}

/// Hand the references cleared in this collection to the host.
#[derive(Default)]
pub struct RefEnqueue;

impl GCWork for RefEnqueue {
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        let refs = mmtk.reference_processors.take_enqueued();
        if !refs.is_empty() {
            debug!("Enqueue {} references", refs.len());
            mmtk.get_upcalls().enqueue_references(worker.tls, &refs);
        }
    }
}
