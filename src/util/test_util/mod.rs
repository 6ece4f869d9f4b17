use std::panic;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

pub mod fixtures;
pub mod mock_vm;

/// Held by tests that change process-wide state, such as environment variables. Tests that only
/// touch their own MMTk instance do not need it.
static PROCESS_STATE_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` while no other test that calls this runs.
pub fn serial_test<F>(f: F)
where
    F: FnOnce(),
{
    // A failed test poisons the lock. The state it guards is restored by `with_cleanup`.
    let _guard = PROCESS_STATE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f();
}

/// Run `test`, then `cleanup`, even if `test` panics. The panic is resumed afterwards.
pub fn with_cleanup<T, C>(test: T, cleanup: C)
where
    T: FnOnce() + panic::UnwindSafe,
    C: FnOnce(),
{
    let res = panic::catch_unwind(test);
    cleanup();
    if let Err(e) = res {
        panic::resume_unwind(e);
    }
}

/// Run `f` on a new thread and panic if it does not finish within `millis` milliseconds.
pub fn panic_after<T, F>(millis: u64, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T,
    F: Send + 'static,
{
    let (done_tx, done_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let val = f();
        done_tx.send(()).expect("Unable to send completion signal");
        val
    });

    match done_rx.recv_timeout(Duration::from_millis(millis)) {
        Ok(_) => handle.join().expect("Thread panicked"),
        Err(e) => panic!("Thread took too long: {}", e),
    }
}
