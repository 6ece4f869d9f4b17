use super::controller::channel::Sender;
use super::*;
use crate::mmtk::MMTK;
use crate::util::alloc::{BumpAllocator, BumpTarget};
use crate::util::opaque_pointer::*;
use crossbeam::deque::Worker;
use std::cell::Cell;
use std::sync::Arc;

thread_local! {
    /// Current worker's ordinal
    static WORKER_ORDINAL: Cell<Option<usize>> = const { Cell::new(None) };
    /// Is the current thread a GC thread (a worker or the controller)?
    static IS_GC_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Get current worker ordinal. Return `None` if the current thread is not a worker.
pub fn current_worker_ordinal() -> Option<usize> {
    WORKER_ORDINAL.with(|x| x.get())
}

/// Is the current thread a GC thread?
pub fn is_gc_thread() -> bool {
    IS_GC_THREAD.with(|x| x.get())
}

/// Mark the current thread as a GC thread. Mutator-side checks (such as polling for a pending
/// collection) are skipped on GC threads.
pub(crate) fn mark_current_thread_as_gc_thread(ordinal: Option<usize>) {
    WORKER_ORDINAL.with(|x| x.set(ordinal));
    IS_GC_THREAD.with(|x| x.set(true));
}

/// A GC worker.  This part is privately owned by a worker thread.
pub struct GCWorker {
    /// The VM-specific thread-local state of the GC thread.
    pub tls: VMWorkerThread,
    /// The ordinal of the worker, numbered from 0 to the number of workers minus one.
    pub ordinal: usize,
    /// The reference to the scheduler.
    scheduler: Arc<GCWorkScheduler>,
    /// The reference to the MMTk instance.
    mmtk: &'static MMTK,
    /// The allocator for the to-space blocks this worker copies objects into.
    copy: BumpAllocator,
    /// The collection in which the copy allocator was last used.
    copy_epoch: usize,
    /// Packets stolen from a bucket in a batch, to be executed by this worker.
    local_work: Worker<Box<dyn GCWork>>,
    /// Tells the controller when all the workers are parked.
    sender: Sender,
}

impl GCWorker {
    pub(crate) fn new(
        mmtk: &'static MMTK,
        ordinal: usize,
        scheduler: Arc<GCWorkScheduler>,
        sender: Sender,
    ) -> Self {
        Self {
            tls: VMWorkerThread(VMThread::UNINITIALIZED),
            ordinal,
            scheduler,
            mmtk,
            copy: BumpAllocator::new(VMThread::UNINITIALIZED, BumpTarget::Copy, mmtk),
            copy_epoch: mmtk.gc_count(),
            local_work: Worker::new_fifo(),
            sender,
        }
    }

    pub fn mmtk(&self) -> &'static MMTK {
        self.mmtk
    }

    pub fn scheduler(&self) -> &GCWorkScheduler {
        &self.scheduler
    }

    /// The allocator for copying objects. A block this allocator used in an earlier collection
    /// belongs to the default space now, so the allocator starts over in each collection.
    pub fn get_copy_allocator_mut(&mut self) -> &mut BumpAllocator {
        let epoch = self.mmtk.gc_count();
        if self.copy_epoch != epoch {
            self.copy.reset();
            self.copy_epoch = epoch;
        }
        &mut self.copy
    }

    /// Add a work packet to a bucket.
    pub fn add_work(&mut self, bucket: WorkBucketStage, work: impl GCWork) {
        self.scheduler.work_buckets[bucket].add(work);
    }

    /// Poll a ready-to-execute work packet in the following order:
    ///
    /// 1. Packets this worker stole in a batch earlier.
    /// 2. Activated buckets, in stage order.
    ///
    /// If no packet is available, the worker parks. The last parked worker checks the buckets
    /// once more and, if they are all empty, tells the controller.
    fn poll(&self) -> Box<dyn GCWork> {
        loop {
            if let Some(work) = self.local_work.pop() {
                return work;
            }
            if let Some(work) = self.scheduler.poll_buckets(&self.local_work) {
                return work;
            }
            self.scheduler.worker_monitor.park_and_wait(self.ordinal, || {
                if self.scheduler.has_pending_work() {
                    return true;
                }
                self.sender.notify_all_workers_parked();
                false
            });
        }
    }

    /// Entry point of a worker thread. It never returns.
    pub fn run(&mut self, tls: VMWorkerThread) {
        mark_current_thread_as_gc_thread(Some(self.ordinal));
        self.tls = tls;
        self.copy.tls = tls.0;
        self.mmtk.get_upcalls().init_gc_worker_thread(tls, self.ordinal);
        debug!("Worker {} started", self.ordinal);
        let mmtk = self.mmtk;
        loop {
            let mut work = self.poll();
            work.do_work_with_stat(self, mmtk);
        }
    }
}
