//! Parking for idle GC workers.
//!
//! A worker that finds no packet parks here. The last worker to park checks the buckets once
//! more while holding the lock. Whoever pushes a packet notifies while holding the same lock, so
//! the last worker either sees the packet or gets the notification.

use std::sync::{Condvar, Mutex};

/// How many of the workers are parked.
struct ParkedWorkers {
    total: usize,
    parked: usize,
}

impl ParkedWorkers {
    fn all_parked(&self) -> bool {
        self.parked == self.total
    }
}

pub(crate) struct WorkerMonitor {
    parked: Mutex<ParkedWorkers>,
    /// Notified when packets are pushed to an open bucket, or a bucket is opened.
    work_available: Condvar,
}

impl WorkerMonitor {
    pub fn new(total: usize) -> Self {
        Self {
            parked: Mutex::new(ParkedWorkers { total, parked: 0 }),
            work_available: Condvar::new(),
        }
    }

    /// Wake up one parked worker, or all of them.
    pub fn notify_work_available(&self, all: bool) {
        let _parked = self.parked.lock().unwrap();
        if all {
            self.work_available.notify_all();
        } else {
            self.work_available.notify_one();
        }
    }

    /// Run `f` with a flag that tells if every worker is parked. No worker parks or unparks
    /// while `f` runs.
    pub fn with_all_parked<R>(&self, f: impl FnOnce(bool) -> R) -> R {
        let parked = self.parked.lock().unwrap();
        f(parked.all_parked())
    }

    /// Park the calling worker until work is announced.
    ///
    /// The last worker to park calls `on_last_parked` first. If it returns true, every worker is
    /// woken up to look for packets, and the caller returns right away.
    pub fn park_and_wait(&self, ordinal: usize, on_last_parked: impl FnOnce() -> bool) {
        let mut parked = self.parked.lock().unwrap();
        parked.parked += 1;
        debug_assert!(parked.parked <= parked.total);
        trace!(
            "Worker {} parked ({}/{})",
            ordinal,
            parked.parked,
            parked.total
        );

        let wake_all = parked.all_parked() && {
            trace!("Worker {} is the last to park", ordinal);
            on_last_parked()
        };
        if wake_all {
            self.work_available.notify_all();
        } else {
            // A spurious wake-up only makes the worker look for packets, and park again.
            parked = self.work_available.wait(parked).unwrap();
        }

        parked.parked -= 1;
        trace!(
            "Worker {} unparked ({}/{})",
            ordinal,
            parked.parked,
            parked.total
        );
    }
}
