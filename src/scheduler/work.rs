use super::worker::*;
use crate::mmtk::MMTK;
use std::any::type_name;

/// A unit of work the GC workers execute.
pub trait GCWork: 'static + Send {
    /// Define the work for this packet. However, this is not supposed to be called directly.
    /// Usually `do_work_with_stat()` should be used.
    fn do_work(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK);

    /// Do work and collect statistics. This internally calls `do_work()`. In most cases,
    /// this should be called rather than `do_work()` so that MMTk can correctly log events.
    fn do_work_with_stat(&mut self, worker: &mut GCWorker, mmtk: &'static MMTK) {
        trace!(
            "Worker {} start work packet: {}",
            worker.ordinal,
            type_name::<Self>()
        );
        self.do_work(worker, mmtk);
        trace!(
            "Worker {} end work packet: {}",
            worker.ordinal,
            type_name::<Self>()
        );
    }
}
