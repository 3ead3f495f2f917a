//! Two-stage interrupt dispatch engine.
//!
//! Each hardware interrupt line is represented by an [`InterruptEvent`],
//! owning a priority-ordered list of [`Handler`]s. Dispatch
//! ([`event_run_handlers`]) runs every handler's filter top-half with
//! interrupts disabled; any handler whose filter returns
//! [`FilterResult::Delegate`] is moved to a single process-wide deferred
//! queue and serviced later, with interrupts enabled, by the
//! [`worker`](mod@worker).
//!
//! Grounded on `sys/kern/interrupt.c` from the retrieved mimiker source
//! tree: `intr_event_t`/`intr_handler_t` become [`InterruptEvent`]/
//! [`Handler`], `intr_event_run_handlers` becomes [`event_run_handlers`],
//! and `intr_thread` becomes [`worker::run_forever`]. Masking a source at
//! its controller and waking the worker thread are both out of scope here
//! (see [`InterruptController`], [`Sleeper`]) and left to collaborators.

mod controller;
mod dispatch;
mod event;
mod handler;
mod registry;
mod worker;

pub use controller::InterruptController;
pub use dispatch::event_run_handlers;
pub use event::InterruptEvent;
pub use handler::{FilterFn, FilterResult, Handler, HandlerId, ServiceFn};
pub use registry::{count as registered_count, for_each as for_each_event};
pub use worker::{init as worker_init, is_empty as deferred_queue_is_empty, run_forever, run_once, Sleeper};

/// Architecture-independent interrupt line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrqNumber(pub u32);

impl From<u32> for IrqNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

impl core::fmt::Display for IrqNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "irq{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicUsize, Ordering};

    use spin::Mutex;

    use super::*;

    /// Reference `InterruptController` that just counts calls, for tests
    /// that only care about the 0/1 handler-count transition.
    struct CountingController {
        enabled: AtomicUsize,
        disabled: AtomicUsize,
    }

    impl CountingController {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                enabled: AtomicUsize::new(0),
                disabled: AtomicUsize::new(0),
            })
        }
    }

    impl InterruptController for CountingController {
        fn enable(&self, _ie: &InterruptEvent) {
            self.enabled.fetch_add(1, Ordering::SeqCst);
        }
        fn disable(&self, _ie: &InterruptEvent) {
            self.disabled.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// `Sleeper` good enough for single-threaded unit tests: `wait` is
    /// never reached because the queue is always primed before dispatch.
    struct PanicSleeper;
    impl Sleeper for PanicSleeper {
        fn wait(&self) {
            panic!("test sleeper asked to block; deferred queue should be primed already");
        }
        fn signal(&self) {}
    }

    #[test]
    fn masking_toggles_on_population_boundary() {
        let ctrl = CountingController::new();
        let ie = InterruptEvent::new(IrqNumber(1), "test0", Some(ctrl.clone() as Arc<dyn InterruptController>));

        let id_a = ie.add_handler(0, Some(Box::new(|_| FilterResult::Filtered)), None, 0);
        assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 1);
        let id_b = ie.add_handler(0, Some(Box::new(|_| FilterResult::Filtered)), None, 0);
        assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 1, "second handler must not re-enable");

        ie.remove_handler(id_a);
        assert_eq!(ctrl.disabled.load(Ordering::SeqCst), 0, "still one handler left");
        ie.remove_handler(id_b);
        assert_eq!(ctrl.disabled.load(Ordering::SeqCst), 1, "last handler leaving must disable");
    }

    #[test]
    fn dispatch_orders_by_priority_with_fifo_ties() {
        let ie = InterruptEvent::new(IrqNumber(2), "test1", None);
        let order: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));

        for prio in [5u16, 5, 1, 9] {
            let order = order.clone();
            ie.add_handler(
                prio,
                Some(Box::new(move |_| {
                    order.lock().push(prio);
                    FilterResult::Filtered
                })),
                None,
                0,
            );
        }

        event_run_handlers(&ie);
        assert_eq!(*order.lock(), alloc::vec![9, 5, 5, 1]);
    }

    #[test]
    fn delegate_runs_service_on_worker_and_reattaches() {
        worker_init(Arc::new(PanicSleeper));
        let ie = InterruptEvent::new(IrqNumber(3), "test2", None);
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
        assert_eq!(ie.handler_count(), 1);

        event_run_handlers(&ie);
        assert_eq!(ie.handler_count(), 0, "delegated handler must leave the list");
        assert!(!deferred_queue_is_empty());

        run_once();
        assert_eq!(serviced.load(Ordering::SeqCst), 1);
        assert_eq!(ie.handler_count(), 1, "worker must reattach after servicing");
    }

    #[test]
    fn filterless_handler_always_delegates() {
        worker_init(Arc::new(PanicSleeper));
        let ie = InterruptEvent::new(IrqNumber(4), "test3", None);
        ie.add_handler(0, None, Some(Box::new(|_| {})), 0);

        event_run_handlers(&ie);
        assert_eq!(ie.handler_count(), 0);
        run_once();
        assert_eq!(ie.handler_count(), 1);
    }

    #[test]
    #[should_panic(expected = "delegating handler with no service body present")]
    fn delegate_without_service_panics() {
        let ie = InterruptEvent::new(IrqNumber(5), "test4", None);
        ie.add_handler(0, Some(Box::new(|_| FilterResult::Delegate)), None, 0);
        event_run_handlers(&ie);
    }

    #[test]
    fn no_handlers_home_is_not_spurious() {
        // A single handler whose filter declines every time (`None`): the
        // handler stays attached, `disable` is never called since nothing
        // was delegated, and the dispatch logs a spurious-interrupt entry.
        crate::log_service::log_init();
        crate::log_service::log_clear();

        let ctrl = CountingController::new();
        let ie = InterruptEvent::new(
            IrqNumber(6),
            "test5",
            Some(ctrl.clone() as Arc<dyn InterruptController>),
        );
        ie.add_handler(0, Some(Box::new(|_| FilterResult::None)), None, 0);

        event_run_handlers(&ie);

        assert_eq!(ie.handler_count(), 1, "declining handler stays attached");
        assert_eq!(ctrl.disabled.load(Ordering::SeqCst), 0, "nothing delegated, disable must not fire");

        let mut saw_spurious = false;
        crate::log_service::log_drain(|e| {
            if e.message().contains("spurious") && e.message().contains("test5") {
                saw_spurious = true;
            }
        });
        assert!(saw_spurious, "dispatch must log a spurious-interrupt entry");
    }

    #[test]
    fn registry_tracks_registered_events() {
        let before = registered_count();
        let ie = InterruptEvent::new(IrqNumber(100), "test6", None);
        ie.register();
        assert_eq!(registered_count(), before + 1);
        let mut seen = false;
        for_each_event(|e| {
            if e.irq() == IrqNumber(100) {
                seen = true;
            }
        });
        assert!(seen);
    }
}
