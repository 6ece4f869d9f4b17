//! The GC controller thread.
//!
//! MMTk has many GC threads.  There are many GC worker threads and one GC controller thread.
//! The GC controller thread responds to GC requests and coordinates the workers to perform GC.

pub(crate) mod channel;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::plan::CollectionState;
use crate::scheduler::gc_work::{Release, ScanMutatorRoots, ScanVMSpecificRoots};
use crate::util::conversions::bytes_to_formatted_string;
use crate::util::finalizable_processor::{Finalization, TraceReadyForFinalize};
use crate::util::reference_processor::{
    PhantomRefProcessing, RefEnqueue, SoftRefProcessing, WeakRefProcessing,
};
use crate::util::sanity::sanity_checker::SanityChecker;
use crate::util::VMWorkerThread;
use crate::vm::ReferenceQuery;
use crate::MMTK;

use self::channel::Receiver;

use super::{GCWorkScheduler, WorkBucketStage};

/// The thread local struct for the GC controller, the counterpart of `GCWorker`.
pub struct GCController {
    /// The reference to the MMTk instance.
    mmtk: &'static MMTK,
    /// The reference to the scheduler.
    scheduler: Arc<GCWorkScheduler>,
    /// The receiving end of the channel to get notifications from workers.
    receiver: Receiver,
}

impl GCController {
    pub(crate) fn new(
        mmtk: &'static MMTK,
        scheduler: Arc<GCWorkScheduler>,
        receiver: Receiver,
    ) -> Self {
        Self {
            mmtk,
            scheduler,
            receiver,
        }
    }

    /// Entry point of the controller thread. It never returns.
    pub fn run(&mut self, tls: VMWorkerThread) {
        super::worker::mark_current_thread_as_gc_thread(None);
        loop {
            debug!("[STWController: Waiting for request...]");
            self.wait_for_request();
            debug!("[STWController: Request received.]");

            self.do_gc_until_completion(tls);
            debug!("[STWController: Worker threads complete!]");
        }
    }

    /// Wait for a request, then mark the collection as requested. A request made while the last
    /// collection was running does not change the state, so the state is set here.
    fn wait_for_request(&self) {
        self.mmtk.gc_requester.wait_for_request();
        self.set_state(CollectionState::Requested);
    }

    fn set_state(&self, state: CollectionState) {
        trace!("Collection state: {:?}", state);
        self.mmtk
            .state
            .store(state, std::sync::atomic::Ordering::SeqCst);
    }

    /// Coordinate workers to perform GC in response to a GC request.
    pub fn do_gc_until_completion(&mut self, tls: VMWorkerThread) {
        let mmtk = self.mmtk;
        let plan = mmtk.get_plan();
        let upcalls = mmtk.get_upcalls();
        let start_time = Instant::now();
        let used_before = plan.used_bytes();

        // Stop the world. Mutators visited in the safepoint are scanned right away.
        self.set_state(CollectionState::StoppingMutators);
        let prepare_bucket = &self.scheduler.work_buckets[WorkBucketStage::Prepare];
        prepare_bucket.activate();
        let scan_in_safepoint = mmtk.options.scan_mutators_in_safepoint;
        let mut scanned = HashSet::new();
        upcalls.stop_all_mutators(tls, scan_in_safepoint, &mut |handle| {
            trace!("Mutator {:?} is stopped", handle);
            if scan_in_safepoint {
                if let Some(mutator_tls) = mmtk.mutators.tls_of(handle) {
                    prepare_bucket.add(ScanMutatorRoots::new(handle, mutator_tls));
                    scanned.insert(handle);
                }
            }
        });
        mmtk.gc_requester.clear_request();
        self.set_state(CollectionState::Tracing);

        for handle in mmtk.mutators.handles() {
            if scanned.contains(&handle) {
                continue;
            }
            if let Some(mutator_tls) = mmtk.mutators.tls_of(handle) {
                prepare_bucket.add(ScanMutatorRoots::new(handle, mutator_tls));
            }
        }
        prepare_bucket.add(ScanVMSpecificRoots);
        plan.prepare();
        self.scheduler.wait_for_completion(&self.receiver);

        // Trace from the roots.
        self.scheduler.work_buckets[WorkBucketStage::Closure].add(TraceReadyForFinalize);
        self.scheduler
            .open_and_drain(WorkBucketStage::Closure, &self.receiver);

        let emergency = mmtk.is_emergency_collection();
        if emergency {
            info!("Emergency collection: soft references are cleared");
        } else {
            self.scheduler.work_buckets[WorkBucketStage::SoftRefClosure].add(SoftRefProcessing);
            self.scheduler
                .open_and_drain(WorkBucketStage::SoftRefClosure, &self.receiver);
        }
        self.scheduler.work_buckets[WorkBucketStage::WeakRefClosure].add(WeakRefProcessing);
        self.scheduler
            .open_and_drain(WorkBucketStage::WeakRefClosure, &self.receiver);

        if !mmtk.options.no_finalizer {
            self.scheduler.work_buckets[WorkBucketStage::FinalRefClosure].add(Finalization);
            self.scheduler
                .open_and_drain(WorkBucketStage::FinalRefClosure, &self.receiver);
        }

        self.scheduler.work_buckets[WorkBucketStage::PhantomRefClosure].add(PhantomRefProcessing);
        self.scheduler
            .open_and_drain(WorkBucketStage::PhantomRefClosure, &self.receiver);

        if mmtk.options.sanity {
            SanityChecker::new(mmtk).check(tls);
        }

        upcalls.weak_ref_stack_nullify(tls, plan as &dyn ReferenceQuery);

        self.scheduler.work_buckets[WorkBucketStage::Release].add(RefEnqueue);
        self.scheduler.work_buckets[WorkBucketStage::Release].add(Release);
        self.scheduler
            .open_and_drain(WorkBucketStage::Release, &self.receiver);

        self.scheduler.deactivate_all();
        self.scheduler.debug_assert_all_buckets_deactivated();

        // Resume the world.
        self.set_state(CollectionState::Resuming);
        plan.end_of_gc();
        let gc_count = mmtk
            .gc_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        mmtk.set_emergency_collection(false);
        upcalls.resume_mutators(tls);
        self.set_state(CollectionState::Idle);

        info!(
            "End of {}GC #{} ({} ms): {} -> {}, heap size {}",
            if emergency { "emergency " } else { "" },
            gc_count,
            start_time.elapsed().as_millis(),
            bytes_to_formatted_string(used_before),
            bytes_to_formatted_string(plan.used_bytes()),
            bytes_to_formatted_string(plan.gc_trigger.heap_size_in_bytes())
        );

        if mmtk.finalizable_processor.lock().unwrap().has_ready_objects() {
            upcalls.schedule_finalization(tls);
        }
        upcalls.weak_ref_stack_call_handlers(tls);
    }
}
