//! Synchronization Primitives
//!
//! Safe synchronization and global state management.

pub mod once_lock;
pub mod recursive_spin;

#[cfg(not(target_os = "none"))]
pub mod cpu;

pub use once_lock::{GlobalState, LazyLock, OnceLock};
pub use recursive_spin::{RecursiveSpin, RecursiveSpinGuard};
