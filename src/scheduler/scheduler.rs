use super::controller::channel::{make_channel, Receiver};
use super::work_bucket::*;
use super::worker_monitor::WorkerMonitor;
use super::*;
use crate::mmtk::MMTK;
use crate::util::opaque_pointer::*;
use crate::vm::GCThreadContext;
use crossbeam::deque::{Steal, Worker};
use enum_map::EnumMap;
use std::sync::Arc;

pub struct GCWorkScheduler {
    /// Work buckets
    pub work_buckets: EnumMap<WorkBucketStage, WorkBucket>,
    /// For synchronized communication between workers.
    pub(crate) worker_monitor: Arc<WorkerMonitor>,
    num_workers: usize,
}

impl GCWorkScheduler {
    pub fn new(num_workers: usize) -> Arc<Self> {
        let worker_monitor: Arc<WorkerMonitor> = Arc::new(WorkerMonitor::new(num_workers));

        // Create work buckets for workers. No bucket is open until a collection opens it.
        let work_buckets = EnumMap::from_fn(|_| WorkBucket::new(worker_monitor.clone()));

        Arc::new(Self {
            work_buckets,
            worker_monitor,
            num_workers,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Create the controller and the workers, and ask the host to spawn a thread for each of them.
    pub(crate) fn spawn_gc_threads(self: &Arc<Self>, mmtk: &'static MMTK, tls: VMThread) {
        let (sender, receiver) = make_channel();
        let upcalls = mmtk.get_upcalls();

        let controller = Box::new(GCController::new(mmtk, self.clone(), receiver));
        upcalls.spawn_gc_thread(tls, GCThreadContext::Controller(controller));

        for ordinal in 0..self.num_workers {
            let worker = Box::new(GCWorker::new(mmtk, ordinal, self.clone(), sender.clone()));
            upcalls.spawn_gc_thread(tls, GCThreadContext::Worker(worker));
        }
        debug!("Spawned the controller and {} workers", self.num_workers);
    }

    /// Take a packet from the activated buckets, in stage order.
    pub(crate) fn poll_buckets(&self, local: &Worker<Box<dyn GCWork>>) -> Option<Box<dyn GCWork>> {
        for bucket in self.work_buckets.values() {
            loop {
                match bucket.poll(local) {
                    Steal::Success(work) => return Some(work),
                    Steal::Retry => continue,
                    Steal::Empty => break,
                }
            }
        }
        None
    }

    /// Does any activated bucket hold packets?
    pub(crate) fn has_pending_work(&self) -> bool {
        self.work_buckets
            .values()
            .any(|bucket| bucket.is_activated() && !bucket.is_empty())
    }

    /// Open a bucket. Returns when every activated bucket is drained and every worker is parked.
    pub(crate) fn open_and_drain(&self, stage: WorkBucketStage, receiver: &Receiver) {
        debug!("Open stage {:?}", stage);
        self.work_buckets[stage].activate();
        self.wait_for_completion(receiver);
    }

    /// Wait until every activated bucket is drained and every worker is parked.
    pub(crate) fn wait_for_completion(&self, receiver: &Receiver) {
        loop {
            receiver.wait_for_all_parked();
            // A worker may have been woken up since it sent the event, so check again.
            if self
                .worker_monitor
                .with_all_parked(|all_parked| all_parked && !self.has_pending_work())
            {
                break;
            }
        }
    }

    pub fn deactivate_all(&self) {
        for bucket in self.work_buckets.values() {
            bucket.deactivate();
        }
    }

    pub fn debug_assert_all_buckets_deactivated(&self) {
        if cfg!(debug_assertions) {
            self.work_buckets.iter().for_each(|(id, bkt)| {
                assert!(!bkt.is_activated(), "Work bucket {:?} is still open", id);
            });
        }
    }
}
