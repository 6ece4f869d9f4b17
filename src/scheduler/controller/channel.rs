//! How workers tell the controller that they have all parked.

use std::sync::{Arc, Condvar, Mutex};

struct Channel {
    /// Set by the last parked worker, cleared when the controller sees it.
    all_parked: Mutex<bool>,
    cond: Condvar,
}

/// The worker end. Every worker holds a clone.
#[derive(Clone)]
pub struct Sender {
    chan: Arc<Channel>,
}

impl Sender {
    /// Called by the last worker to park, when the open buckets are empty.
    pub fn notify_all_workers_parked(&self) {
        *self.chan.all_parked.lock().unwrap() = true;
        trace!("Notified all workers parked");
        self.chan.cond.notify_one();
    }
}

/// The controller end.
pub struct Receiver {
    chan: Arc<Channel>,
}

impl Receiver {
    /// Wait for a notification and consume it. A notification sent before the call is not lost.
    pub fn wait_for_all_parked(&self) {
        let mut all_parked = self.chan.all_parked.lock().unwrap();
        while !*all_parked {
            all_parked = self.chan.cond.wait(all_parked).unwrap();
        }
        *all_parked = false;
        trace!("Observed all workers parked");
    }
}

pub(crate) fn make_channel() -> (Sender, Receiver) {
    let chan = Arc::new(Channel {
        all_parked: Mutex::new(false),
        cond: Condvar::new(),
    });
    (Sender { chan: chan.clone() }, Receiver { chan })
}
