use super::worker_monitor::WorkerMonitor;
use super::*;
use crossbeam::deque::{Injector, Steal, Worker};
use enum_map::Enum;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The packets of one stage of a collection. Packets can be added at any time, but workers only
/// take packets from open buckets.
pub struct WorkBucket {
    open: AtomicBool,
    packets: Injector<Box<dyn GCWork>>,
    monitor: Arc<WorkerMonitor>,
}

impl WorkBucket {
    pub(crate) fn new(monitor: Arc<WorkerMonitor>) -> Self {
        Self {
            open: AtomicBool::new(false),
            packets: Injector::new(),
            monitor,
        }
    }

    pub fn is_activated(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Open the bucket, and wake up the workers to drain it.
    pub fn activate(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.monitor.notify_work_available(true);
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Close the bucket. It must be drained.
    pub fn deactivate(&self) {
        debug_assert!(self.is_empty(), "Bucket not drained before close");
        self.open.store(false, Ordering::SeqCst);
    }

    /// Add a packet. A parked worker is woken up if the bucket is open.
    pub fn add<W: GCWork>(&self, work: W) {
        self.packets.push(Box::new(work));
        if self.is_activated() {
            self.monitor.notify_work_available(false);
        }
    }

    /// Take a batch of packets into `local`, and return one of them. Closed buckets give nothing.
    pub fn poll(&self, local: &Worker<Box<dyn GCWork>>) -> Steal<Box<dyn GCWork>> {
        if !self.is_activated() || self.is_empty() {
            return Steal::Empty;
        }
        self.packets.steal_batch_and_pop(local)
    }
}

/// The stages of a collection, in the order they are opened. Once open, a bucket stays open
/// until the end of the collection, so a later stage can still add packets to an earlier one.
#[derive(Debug, Enum, Copy, Clone, Eq, PartialEq)]
pub enum WorkBucketStage {
    /// Root scanning. Opened while the mutators are being stopped, so a mutator can be scanned as
    /// soon as it stops.
    Prepare,
    /// Compute the transitive closure from the roots.
    Closure,
    /// Retain the referents of soft references, unless this is an emergency collection.
    SoftRefClosure,
    /// Clear or forward soft and weak references.
    WeakRefClosure,
    /// Resurrect finalizable objects, and expand the transitive closure from them.
    FinalRefClosure,
    /// Clear or forward phantom references.
    PhantomRefClosure,
    /// Reclaim the memory of dead objects, and hand cleared references to the host.
    Release,
}
