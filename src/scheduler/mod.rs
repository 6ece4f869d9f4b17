//! A general scheduler implementation. MMTk uses it to schedule GC-related work.

mod controller;
pub use controller::GCController;

#[allow(clippy::module_inception)]
mod scheduler;
pub(crate) use scheduler::GCWorkScheduler;

mod work;
pub use work::GCWork;

mod work_bucket;
pub use work_bucket::WorkBucketStage;

mod worker;
mod worker_monitor;
pub use worker::{current_worker_ordinal, is_gc_thread, GCWorker};

pub(crate) mod gc_work;
