//! Process management error types
//!
//! Only recoverable conditions live here. Structural corruption of the
//! state lists is never reported as an error value: it panics.

use core::fmt;

/// Recoverable process-management failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcError {
    /// No `Unused` PCB is left in the table.
    OutOfProcesses,
    /// Kernel stack or address-space allocation failed.
    ResourceExhausted,
    /// `wait` found no children (or the caller has been killed).
    NoChildren,
    /// No live process has the requested pid.
    NotFound,
    /// Priority outside `[0, max_priority]`.
    InvalidPriority,
    /// Argument outside its accepted range.
    InvalidArgument,
    /// The caller was killed while blocked.
    Killed,
}

impl fmt::Display for ProcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcError::OutOfProcesses => write!(f, "out of processes"),
            ProcError::ResourceExhausted => write!(f, "resource exhausted"),
            ProcError::NoChildren => write!(f, "no children"),
            ProcError::NotFound => write!(f, "no such process"),
            ProcError::InvalidPriority => write!(f, "invalid priority"),
            ProcError::InvalidArgument => write!(f, "invalid argument"),
            ProcError::Killed => write!(f, "killed"),
        }
    }
}

/// Result type for process operations
pub type Result<T> = core::result::Result<T, ProcError>;
