//! Crate-wide error types for the resource manager and interrupt engine.
//!
//! Struct-variant errors instead of string literals, so callers can match
//! on structured fields rather than parsing messages.

use core::fmt;

/// Main crate error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "errors must be handled, not silently discarded"]
pub enum KernelError {
    /// A resource-manager-surfaced condition (see [`crate::rman`]).
    ResourceError(ResourceError),
    /// An interrupt-subsystem-surfaced condition (see [`crate::irq`]).
    IrqError(IrqError),

    /// Generic errors shared across subsystems.
    InvalidArgument {
        name: &'static str,
        value: &'static str,
    },
    OperationNotSupported {
        operation: &'static str,
    },
    ResourceExhausted {
        resource: &'static str,
    },
    AlreadyExists {
        resource: &'static str,
        id: u64,
    },
    NotFound {
        resource: &'static str,
        id: u64,
    },
    /// Subsystem not initialized (called before its `init()`).
    NotInitialized {
        subsystem: &'static str,
    },
    /// Legacy string error for gradual migration from `&'static str` patterns.
    LegacyError {
        message: &'static str,
    },
}

/// Resource-manager-specific errors.
///
/// The base RM contract (`spec.md` §7) has exactly one recoverable failure
/// mode, surfaced as `Option::None` from `reserve` rather than through this
/// type; this enum exists for the one allocation-failure path the split
/// algorithm can hit (the underlying allocator running out of memory while
/// carving a reservation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// Allocation of an internal bookkeeping entry failed during `reserve`'s
    /// split path; the manager is left unchanged.
    AllocationFailed,
}

/// Interrupt-subsystem-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqError {
    AlreadyExists { irq: u32 },
    NotFound { irq: u32 },
    NotInitialized,
    /// A handler attempted to delegate with no service body present.
    DelegateWithoutService,
}

/// Result type alias for crate operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceError(e) => write!(f, "resource manager error: {e}"),
            Self::IrqError(e) => write!(f, "interrupt error: {e}"),
            Self::InvalidArgument { name, value } => {
                write!(f, "invalid argument '{name}': {value}")
            }
            Self::OperationNotSupported { operation } => {
                write!(f, "operation not supported: {operation}")
            }
            Self::ResourceExhausted { resource } => write!(f, "resource exhausted: {resource}"),
            Self::AlreadyExists { resource, id } => {
                write!(f, "{resource} with id {id} already exists")
            }
            Self::NotFound { resource, id } => write!(f, "{resource} with id {id} not found"),
            Self::NotInitialized { subsystem } => {
                write!(f, "subsystem not initialized: {subsystem}")
            }
            Self::LegacyError { message } => write!(f, "{message}"),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed => write!(f, "allocation failed during reserve"),
        }
    }
}

impl fmt::Display for IrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists { irq } => write!(f, "IRQ {irq} already registered"),
            Self::NotFound { irq } => write!(f, "IRQ {irq} not found"),
            Self::NotInitialized => write!(f, "interrupt registry not initialized"),
            Self::DelegateWithoutService => {
                write!(f, "handler delegated with no service body present")
            }
        }
    }
}

impl From<ResourceError> for KernelError {
    fn from(err: ResourceError) -> Self {
        Self::ResourceError(err)
    }
}

impl From<IrqError> for KernelError {
    fn from(err: IrqError) -> Self {
        Self::IrqError(err)
    }
}

/// Conversion from legacy `&'static str` errors to `KernelError`.
impl From<&'static str> for KernelError {
    fn from(msg: &'static str) -> Self {
        Self::LegacyError { message: msg }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn display_formats_are_human_readable() {
        let e: KernelError = IrqError::NotFound { irq: 7 }.into();
        assert_eq!(e.to_string(), "interrupt error: IRQ 7 not found");
    }
}
