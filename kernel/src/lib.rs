//! MLFQ Kernel Library
//!
//! Process management core of a small teaching kernel: a fixed table of
//! process control blocks, per-state lists threaded through it, and a
//! multi-level feedback queue scheduler with budget demotion and periodic
//! promotion.
//!
//! # Layout
//!
//! - [`process`]: the table, its lists and the lifecycle operations
//! - [`scheduler`]: per-CPU dispatch and the MLFQ policy
//! - [`platform`]: what the core needs from the rest of the kernel
//!
//! The crate is `no_std`; unit tests build against `std` and drive the
//! table through a mock platform.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod platform;
pub mod process;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use config::TableConfig;
pub use error::{ProcError, Result};
pub use platform::{AddressSpace, CpuId, FileHandle, KernelStack, Platform};
pub use process::{Channel, ListDump, Pid, ProcState, ProcTable, ProcessSummary};
pub use scheduler::{Handoff, Priority};
