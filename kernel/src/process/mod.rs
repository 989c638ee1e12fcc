//! Process Management
//!
//! This module provides the process table, the per-state lists threaded
//! through it, and the lifecycle operations built on them.

pub mod check;
pub mod credentials;
pub mod info;
pub mod kill;
pub mod lifecycle;
pub mod list;
pub mod pcb;
pub mod sleep;
pub mod table;

pub use check::{Corruption, ListId};
pub use info::{ListDump, ProcessSummary};
pub use list::{ListError, StateList};
pub use pcb::{Channel, Pcb, Pid, ProcState, SlotIndex};
pub use table::ProcTable;
