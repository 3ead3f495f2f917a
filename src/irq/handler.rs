//! Interrupt handler: one client's filter/service pair attached to an
//! [`InterruptEvent`](super::event::InterruptEvent).

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

use super::event::InterruptEvent;

/// Outcome of a filter running at dispatch time.
///
/// Mirrors `FILTER_HANDLED` / `FILTER_STRAY` / the delegate path of the
/// original `intr_filter_t` contract (`sys/kern/interrupt.c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// The filter fully serviced the interrupt; nothing more to do.
    Filtered,
    /// The filter cannot run to completion here; defer to the worker.
    Delegate,
    /// This handler's device was not the source of the interrupt.
    None,
}

/// Top-half filter, run with interrupts disabled. Must not block.
pub type FilterFn = Box<dyn Fn(usize) -> FilterResult + Send + Sync>;

/// Bottom-half service body, run on the interrupt worker with interrupts
/// enabled. May block.
pub type ServiceFn = Box<dyn FnMut(usize) + Send>;

/// Opaque, process-wide-unique identifier for a handler attached to an
/// event. Used to address a specific attachment for removal, since the
/// handler itself moves between the event's list and the deferred queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

impl HandlerId {
    fn fresh() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A single filter/service pair attached to an interrupt event.
///
/// Owned exactly once at any moment: either by its event's handler list,
/// or by the deferred queue while its service body runs.
pub struct Handler {
    id: HandlerId,
    priority: u16,
    pub(crate) filter: Option<FilterFn>,
    pub(crate) service: Option<ServiceFn>,
    pub(crate) argument: usize,
    /// Back-reference to the owning event, cloned (not a second owner of
    /// the event's handler list) so the worker can find its way home after
    /// the service body runs.
    pub(crate) event: Option<Arc<InterruptEvent>>,
}

impl Handler {
    /// Build a detached handler. At least one of `filter`/`service` must be
    /// present; a handler that can neither filter nor service an interrupt
    /// has no reason to attach to an event.
    pub fn new(
        priority: u16,
        filter: Option<FilterFn>,
        service: Option<ServiceFn>,
        argument: usize,
    ) -> Self {
        assert!(
            filter.is_some() || service.is_some(),
            "handler needs a filter, a service, or both"
        );
        Self {
            id: HandlerId::fresh(),
            priority,
            filter,
            service,
            argument,
            event: None,
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }
}
