//! Interrupt worker: the bottom half that runs delegated service bodies.
//!
//! Grounded on the single global `delegated` queue plus `intr_thread` /
//! `init_ithreads` in `examples/original_source/sys/kern/interrupt.c`. The
//! queue is a process-wide singleton, as in the original (a plain static
//! `TAILQ_HEAD_INITIALIZER`, not one list per event — dispatch always
//! enqueues onto this one list regardless of which event delegated).
//!
//! Waking the worker is a collaborator concern (`sleepq_wait` /
//! `sleepq_signal` in the original); this crate asks only for a
//! [`Sleeper`], leaving the actual scheduler integration to the caller.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use spin::Mutex;

use crate::sync::cpu::with_interrupts_disabled;
use crate::sync::once_lock::GlobalState;

use super::handler::Handler;

/// Blocks the calling thread until woken, and wakes a blocked waiter.
///
/// Stands in for the scheduler's sleep queue (`sleepq_wait`/`sleepq_signal`
/// in the original): spawning and parking kernel threads is out of scope
/// for this crate.
pub trait Sleeper: Send + Sync {
    /// Block until the next [`Sleeper::signal`].
    fn wait(&self);
    /// Wake one waiter blocked in [`Sleeper::wait`].
    fn signal(&self);
}

static DEFERRED_QUEUE: Mutex<VecDeque<Handler>> = Mutex::new(VecDeque::new());
static SLEEPER: GlobalState<Arc<dyn Sleeper>> = GlobalState::new();

/// Install the scheduler collaborator used to park/wake the worker. Must be
/// called once before [`run_once`] or [`run_forever`]; a second call is
/// silently ignored, matching [`crate::log_service::log_init`]'s contract.
pub fn init(sleeper: Arc<dyn Sleeper>) {
    let _ = SLEEPER.init(sleeper);
}

pub(crate) fn enqueue(h: Handler) {
    DEFERRED_QUEUE.lock().push_back(h);
}

fn dequeue() -> Option<Handler> {
    DEFERRED_QUEUE.lock().pop_front()
}

/// `true` if nothing is currently waiting for service. Diagnostic only:
/// the queue can gain an entry the instant after this returns.
pub fn is_empty() -> bool {
    DEFERRED_QUEUE.lock().is_empty()
}

pub(crate) fn signal() {
    SLEEPER.with(|s| s.signal());
}

/// Run one handler's worker-side lifecycle: wait for the deferred queue to
/// be non-empty, pop one handler (with interrupts disabled while touching
/// the queue, mirroring `WITH_INTR_DISABLED` around `intr_thread`'s
/// dequeue), run its service body with interrupts enabled, then re-attach
/// it to its owning event.
///
/// Exposed as a single step rather than an infinite loop so the caller
/// supplies (and owns) the thread that drives it; see [`run_forever`] for
/// the trivial wrapper.
pub fn run_once() {
    let sleeper = SLEEPER.with(|s| s.clone()).expect("irq::worker::init must run before run_once");
    let h = loop {
        let popped = with_interrupts_disabled(dequeue);
        match popped {
            Some(h) => break h,
            None => sleeper.wait(),
        }
    };
    service_and_reinsert(h);
}

/// Drive the worker forever. Never returns; matches `intr_thread`'s `while
/// (true)` loop. Callers spawn this on whatever thread their scheduler
/// collaborator gives them for interrupt service.
pub fn run_forever() -> ! {
    loop {
        run_once();
    }
}

fn service_and_reinsert(mut h: Handler) {
    if let Some(service) = h.service.as_mut() {
        service(h.argument);
    }
    let ie = h
        .event
        .clone()
        .expect("delegated handler lost its event back-reference");
    ie.reinsert_handler(h);
}
