//! Two-stage interrupt dispatch: run every filter, delegate the rest.
//!
//! Grounded on `intr_event_run_handlers` in
//! `examples/original_source/sys/kern/interrupt.c`. Runs with interrupts
//! disabled for the whole walk: on real hardware that alone serializes
//! against `add_handler`/`remove_handler` (which run with interrupts
//! enabled, from ordinary thread context); in this host-backed crate the
//! event's own recursive spinlock gives the same exclusion even when
//! "interrupts disabled" is simulated by the global big-kernel-lock
//! nesting counter rather than a real CPU flag (see `sync::cpu`).

use alloc::format;
use alloc::sync::Arc;

use crate::log_service::{klog, LogLevel};
use crate::sync::cpu::with_interrupts_disabled;

use super::event::InterruptEvent;
use super::handler::FilterResult;

/// Run `ie`'s attached filters top-half, delegating any `Delegate` results
/// to the worker's deferred queue.
///
/// Public entry point named to match `intr_event_run_handlers`; the actual
/// per-event state lives behind [`InterruptEvent::with_handlers`].
pub fn event_run_handlers(ie: &Arc<InterruptEvent>) {
    ie.run_handlers();
}

pub(crate) fn run(ie: &Arc<InterruptEvent>) {
    // The whole call runs with interrupts disabled, matching
    // `intr_event_run_handlers`'s framing: the filter walk, moving
    // delegated handlers onto the worker's queue, waking the worker, and
    // the spurious-interrupt log are all part of the same critical
    // section, not just the walk. `Sleeper::signal` and `klog` only ever
    // take their own short-lived spinlocks here, never `Sleeper::wait`, so
    // nothing inside this section can block.
    with_interrupts_disabled(|| {
        let mut handled = false;
        let mut delegated = alloc::vec::Vec::new();

        ie.with_handlers(|guard| {
            let mut i = 0;
            while i < guard.handlers.len() {
                let result = match &guard.handlers[i].filter {
                    Some(f) => f(guard.handlers[i].argument),
                    None => FilterResult::Delegate,
                };
                match result {
                    FilterResult::Filtered => {
                        handled = true;
                        i += 1;
                    }
                    FilterResult::None => {
                        i += 1;
                    }
                    FilterResult::Delegate => {
                        let h = guard.handlers.remove(i);
                        assert!(
                            h.service.is_some(),
                            "delegating handler with no service body present"
                        );
                        *guard.count -= 1;
                        delegated.push(h);
                        // `i` stays put: the next handler shifted into this slot.
                    }
                }
            }
            if !delegated.is_empty() {
                if let Some(ctrl) = ie.controller() {
                    ctrl.disable(ie);
                }
            }
        });

        let has_delegated = !delegated.is_empty();
        for h in delegated {
            super::worker::enqueue(h);
        }
        if has_delegated {
            super::worker::signal();
        } else if !handled {
            klog(
                LogLevel::Warn,
                "irq",
                &format!("spurious interrupt on '{}'", ie.name()),
            );
        }
    });
}
