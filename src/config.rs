//! Crate-wide tunables.
//!
//! Grounded on the scattered `const` tunables the teacher kernel keeps next
//! to the subsystem they govern (e.g. `MAX_IRQ` in its `irq` module); this
//! crate collects the handful the spec leaves unspecified in one place.

/// Upper bound of the address space the resource manager allocates over.
pub const ADDR_MAX: u64 = u64::MAX;

/// Soft cap on handlers attached to a single interrupt event before a
/// diagnostic warning is logged. Never enforced as a hard limit — the spec
/// does not bound handler-list length, only warns that long lists are
/// unusual for a single IRQ line.
pub const MAX_HANDLERS_PER_EVENT_WARN: usize = 32;
