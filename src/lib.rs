//! Kernel resource manager and two-stage interrupt dispatch engine.
//!
//! This crate provides the two hardest pieces of a kernel's hardware-
//! resource-management subsystem:
//!
//! - [`rman`]: a generic allocator of linear address ranges (MMIO windows,
//!   port-I/O ranges, DMA channels, IRQ numbers), with alignment-aware
//!   placement, reservation, release and automatic coalescing.
//! - [`irq`]: a two-stage interrupt-dispatch engine distinguishing fast
//!   in-context filters from deferred service handlers run on a worker
//!   context, with masking policy driven by handler population.
//!
//! USB enumeration, architecture-specific virtual memory, the scheduler, and
//! the byte allocator are deliberately out of scope; where this crate needs
//! them it depends on small collaborator traits (see
//! [`irq::InterruptController`], [`irq::Sleeper`]) rather than
//! re-implementing them.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// This crate never boots bare metal on its own (see SPEC_FULL.md's scope
// notes); the host allocator backs `alloc` whenever it is actually built,
// matching how the teacher kernel falls back to `std::alloc::System` outside
// of `target_os = "none"`.
#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

pub mod config;
pub mod error;
pub mod irq;
pub mod log_service;
pub mod rman;
pub mod sync;

pub use error::{KernelError, KernelResult};
