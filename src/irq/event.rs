//! Interrupt event: the per-IRQ-line collection of attached handlers.
//!
//! Grounded on `intr_event_t` and `intr_event_init` / `intr_event_register`
//! / `intr_event_add_handler` / `intr_event_remove_handler` in
//! `examples/original_source/sys/kern/interrupt.c`.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::config::MAX_HANDLERS_PER_EVENT_WARN;
use crate::log_service::{klog, LogLevel};
use crate::sync::cpu::current_context;
use crate::sync::recursive_spin::RecursiveSpin;

use super::controller::InterruptController;
use super::handler::{FilterFn, Handler, HandlerId, ServiceFn};
use super::IrqNumber;

/// Insert `h` into `handlers` in priority order: before the first handler
/// with strictly lower priority, or at the end if none is lower. Handlers
/// of equal priority keep insertion (FIFO) order, since each insertion
/// stops at the first *strictly* lower element.
fn insert_by_priority(handlers: &mut Vec<Handler>, h: Handler) {
    let pos = handlers.iter().position(|it| it.priority() < h.priority());
    match pos {
        Some(i) => handlers.insert(i, h),
        None => handlers.push(h),
    }
}

struct EventInner {
    handlers: Vec<Handler>,
    count: usize,
}

/// A single IRQ line's handler list, masking policy, and identity.
///
/// Reached only through `Arc`: handlers hold a clone of that `Arc` as a
/// non-owning back-reference (see `SPEC_FULL.md` §9), so the event must
/// outlive every handler attached to it, which `Arc` guarantees without a
/// lifetime parameter threaded through the whole subsystem.
pub struct InterruptEvent {
    irq: IrqNumber,
    name: &'static str,
    controller: Option<Arc<dyn InterruptController>>,
    inner: RecursiveSpin<EventInner>,
}

impl InterruptEvent {
    /// Create a new, handler-less event for `irq`. `controller` is the
    /// collaborator used to mask/unmask the source; `None` for events that
    /// are never independently maskable (e.g. always-on software IRQs in
    /// tests).
    pub fn new(
        irq: IrqNumber,
        name: &'static str,
        controller: Option<Arc<dyn InterruptController>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            irq,
            name,
            controller,
            inner: RecursiveSpin::new(EventInner {
                handlers: Vec::new(),
                count: 0,
            }),
        })
    }

    pub fn irq(&self) -> IrqNumber {
        self.irq
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of handlers currently attached (the deferred one, if any, is
    /// not counted until it returns).
    pub fn handler_count(&self) -> usize {
        self.inner.lock(current_context()).count
    }

    /// Publish this event in the global registry, so diagnostics code can
    /// enumerate every live IRQ line.
    pub fn register(self: &Arc<Self>) {
        super::registry::register(self.clone());
    }

    /// Attach a new handler, in priority order. Calls the controller's
    /// `enable` exactly when this is the first handler on the event.
    pub fn add_handler(
        self: &Arc<Self>,
        priority: u16,
        filter: Option<FilterFn>,
        service: Option<ServiceFn>,
        argument: usize,
    ) -> HandlerId {
        let mut h = Handler::new(priority, filter, service, argument);
        h.event = Some(self.clone());
        let id = h.id();

        let ctx = current_context();
        let mut inner = self.inner.lock(ctx);
        insert_by_priority(&mut inner.handlers, h);
        inner.count += 1;
        if inner.handlers.len() > MAX_HANDLERS_PER_EVENT_WARN {
            klog(
                LogLevel::Warn,
                "irq",
                "unusually many handlers attached to one interrupt event",
            );
        }
        if inner.count == 1 {
            if let Some(ctrl) = &self.controller {
                ctrl.enable(self);
            }
        }
        id
    }

    /// Detach `id` from this event. Calls the controller's `disable`
    /// before unlinking, exactly when this is the last handler leaving.
    ///
    /// Panics if `id` does not name a handler currently attached to this
    /// event (a programmer error: the id is only valid while attached).
    pub fn remove_handler(&self, id: HandlerId) {
        let ctx = current_context();
        let mut inner = self.inner.lock(ctx);
        if inner.count == 1 {
            if let Some(ctrl) = &self.controller {
                ctrl.disable(self);
            }
        }
        let pos = inner
            .handlers
            .iter()
            .position(|h| h.id() == id)
            .expect("remove_handler: handler not attached to this event");
        let mut h = inner.handlers.remove(pos);
        inner.count -= 1;
        h.event = None;
    }

    /// Re-attach a handler the worker has finished servicing. Always calls
    /// the controller's `enable`, regardless of the resulting count: the
    /// event was masked while this handler was delegated, and unmasking it
    /// is this call's entire job (mirrors `intr_thread`'s unconditional
    /// `ie_enable` after `insert_handler`).
    pub(crate) fn reinsert_handler(self: &Arc<Self>, h: Handler) {
        let ctx = current_context();
        let mut inner = self.inner.lock(ctx);
        insert_by_priority(&mut inner.handlers, h);
        inner.count += 1;
        if let Some(ctrl) = &self.controller {
            ctrl.enable(self);
        }
    }

    /// Run every attached filter in priority order, delegating any that
    /// return `Delegate` to the worker. See [`super::dispatch::event_run_handlers`].
    pub(crate) fn run_handlers(self: &Arc<Self>) {
        super::dispatch::run(self);
    }
}

// `EventInner` access for the dispatch loop: exposed narrowly rather than
// making the field `pub(crate)`, so the locking discipline stays in one
// place (`current_context()` + the recursive spin) instead of being
// re-derived at each call site.
pub(crate) struct EventHandlersGuard<'a> {
    pub(crate) handlers: &'a mut Vec<Handler>,
    pub(crate) count: &'a mut usize,
}

impl InterruptEvent {
    pub(crate) fn with_handlers<R>(&self, f: impl FnOnce(EventHandlersGuard<'_>) -> R) -> R {
        let ctx = current_context();
        let mut inner = self.inner.lock(ctx);
        let inner = &mut *inner;
        f(EventHandlersGuard {
            handlers: &mut inner.handlers,
            count: &mut inner.count,
        })
    }

    pub(crate) fn controller(&self) -> Option<&Arc<dyn InterruptController>> {
        self.controller.as_ref()
    }
}
