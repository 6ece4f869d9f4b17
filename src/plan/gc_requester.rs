use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

struct RequestSync {
    /// Number of requests that started a collection. For logs.
    request_count: usize,
}

/// This data structure lets mutators trigger GC. The GC controller waits on it.
pub struct GCRequester {
    request_sync: Mutex<RequestSync>,
    request_condvar: Condvar,
    request_flag: AtomicBool,
}

impl Default for GCRequester {
    fn default() -> Self {
        Self::new()
    }
}

impl GCRequester {
    pub fn new() -> Self {
        GCRequester {
            request_sync: Mutex::new(RequestSync { request_count: 0 }),
            request_condvar: Condvar::new(),
            request_flag: AtomicBool::new(false),
        }
    }

    /// Request a GC. Called by mutators when an allocation fails, and when handling user GC
    /// requests. Returns true if this call raised the flag.
    pub fn request(&self) -> bool {
        if self.request_flag.load(Ordering::Relaxed) {
            return false;
        }

        let mut guard = self.request_sync.lock().unwrap();
        // Note: This is the double-checked locking algorithm.
        if !self.request_flag.load(Ordering::Relaxed) {
            self.request_flag.store(true, Ordering::Relaxed);
            guard.request_count += 1;
            debug!("GC requested (#{})", guard.request_count);
            self.request_condvar.notify_all();
            return true;
        }
        false
    }

    /// Is a GC requested, and not yet started tracing?
    pub fn is_requested(&self) -> bool {
        self.request_flag.load(Ordering::Relaxed)
    }

    /// Clear the "GC requested" flag so that mutators can trigger the next GC.
    /// Called by the controller when all mutators have come to a stop.
    pub fn clear_request(&self) {
        let _guard = self.request_sync.lock().unwrap();
        self.request_flag.store(false, Ordering::Relaxed);
    }

    /// Wait until a GC is requested. Called by the controller.
    pub fn wait_for_request(&self) {
        let mut guard = self.request_sync.lock().unwrap();
        while !self.request_flag.load(Ordering::Relaxed) {
            guard = self.request_condvar.wait(guard).unwrap();
        }
    }
}
