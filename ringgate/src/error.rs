//! Error taxonomy for ring coordination and the result cell.

use thiserror::Error;

/// The crate's single error type.
///
/// Mirrors a `thiserror`-derived enum over plain data variants: each carries
/// exactly what a caller needs to diagnose it, and `is_recoverable`/
/// `is_terminal` let callers classify a failure without matching on every
/// variant themselves.
#[derive(Debug, Error)]
pub enum RingGateError {
    #[error("illegal argument: {message}")]
    IllegalArgument { message: &'static str },

    #[error("illegal state: {message}")]
    IllegalState { message: &'static str },

    /// Returned by `try_next` when the ring has no room. A unit variant so
    /// it can be used as a zero-allocation sentinel on the capacity-check
    /// hot path.
    #[error("insufficient capacity")]
    InsufficientCapacity,

    #[error("sequence barrier alerted")]
    Alert,

    #[error("wait timed out")]
    Timeout,

    #[error("operation interrupted")]
    Interruption,

    #[error("computation failed: {cause}")]
    Execution { cause: String },

    #[error("computation was cancelled")]
    Cancelled,
}

impl RingGateError {
    /// True for failures a caller can reasonably retry (the wait was merely
    /// slow or the ring was briefly full).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientCapacity | Self::Timeout)
    }

    /// True for failures that mean the surrounding pipeline or result cell
    /// will not make further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Execution { .. } | Self::Alert)
    }
}

pub type Result<T> = std::result::Result<T, RingGateError>;
