//! Process-wide registry of live interrupt events, for diagnostics.
//!
//! Grounded on the original's `all_ievents_list` / `all_ievents_mtx`
//! (`examples/original_source/sys/kern/interrupt.c`): a plain
//! `TAILQ_HEAD_INITIALIZER` static there, so a const-initialized
//! `spin::Mutex` here needs no separate boot-time `init()` the way
//! [`crate::log_service`]'s timer-dependent singleton does.

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use super::event::InterruptEvent;

static REGISTRY: Mutex<Vec<Arc<InterruptEvent>>> = Mutex::new(Vec::new());

pub(crate) fn register(ie: Arc<InterruptEvent>) {
    REGISTRY.lock().push(ie);
}

/// Call `f` once for every registered event, oldest-registered first.
pub fn for_each<F: FnMut(&Arc<InterruptEvent>)>(mut f: F) {
    for ie in REGISTRY.lock().iter() {
        f(ie);
    }
}

/// Number of events currently registered.
pub fn count() -> usize {
    REGISTRY.lock().len()
}
