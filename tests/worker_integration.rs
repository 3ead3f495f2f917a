//! End-to-end delegate/defer/re-insert round trip, driven by a real worker
//! thread rather than a single in-process `run_once` call.
//!
//! The `Sleeper` here is the kind of thing a scheduler integration would
//! supply in a real kernel (`sleepq_wait`/`sleepq_signal`); this crate only
//! specifies the trait, so the test provides the simplest real
//! implementation: a `Condvar`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use rescore::irq::{event_run_handlers, FilterResult, InterruptEvent, IrqNumber, Sleeper};

struct CondvarSleeper {
    lock: Mutex<bool>,
    cv: Condvar,
}

impl CondvarSleeper {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lock: Mutex::new(false),
            cv: Condvar::new(),
        })
    }
}

impl Sleeper for CondvarSleeper {
    fn wait(&self) {
        let mut woken = self.lock.lock().unwrap();
        while !*woken {
            woken = self.cv.wait(woken).unwrap();
        }
        *woken = false;
    }

    fn signal(&self) {
        *self.lock.lock().unwrap() = true;
        self.cv.notify_one();
    }
}

#[test]
fn delegated_handler_round_trips_through_a_real_worker_thread() {
    rescore::irq::worker_init(CondvarSleeper::new());

    let ie = InterruptEvent::new(IrqNumber(42), "net0", None);
    let serviced = Arc::new(AtomicUsize::new(0));
    let serviced_clone = serviced.clone();

    ie.add_handler(
        0,
        Some(Box::new(|_| FilterResult::Delegate)),
        Some(Box::new(move |_| {
            serviced_clone.fetch_add(1, Ordering::SeqCst);
        })),
        0,
    );

    let worker = thread::spawn(rescore::irq::run_once);

    // Simulate the hardware trampoline calling dispatch from another
    // thread, the way a real interrupt context would race the worker.
    event_run_handlers(&ie);

    worker.join().expect("worker thread panicked");

    assert_eq!(serviced.load(Ordering::SeqCst), 1);
    assert_eq!(
        ie.handler_count(),
        1,
        "handler must be back on its event after the worker services it"
    );
}
