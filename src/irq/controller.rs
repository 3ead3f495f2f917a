//! Collaborator trait for masking an interrupt source at its controller.
//!
//! Out of scope for this crate: the PIC/APIC/GIC/PLIC programming that
//! actually masks a line at the hardware controller. An `InterruptEvent` is
//! handed an implementation of this trait at construction and calls it
//! exactly at the 0-handler/1-handler population boundary (plus,
//! unconditionally, every time the worker re-attaches a delegated handler).

use super::event::InterruptEvent;

/// Masks and unmasks the hardware source behind an [`InterruptEvent`].
pub trait InterruptController: Send + Sync {
    /// Unmask the interrupt source. Called when the event's handler count
    /// transitions from 0 to 1, and unconditionally after the worker
    /// re-attaches a delegated handler.
    fn enable(&self, ie: &InterruptEvent);

    /// Mask the interrupt source. Called when the event's handler count
    /// transitions from 1 to 0, and before a handler is delegated to the
    /// worker.
    fn disable(&self, ie: &InterruptEvent);
}
