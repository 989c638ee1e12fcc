//! Process Control Block
//!
//! One [`Pcb`] per arena slot. Slots are created once, when the table is
//! built, and recycled through the `Unused` list; they are never allocated
//! or freed individually.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::config::PROC_NAME_LEN;
use crate::platform::{AddressSpace, FileHandle, KernelStack};

/// Index of a PCB in the arena.
pub type SlotIndex = usize;

/// Scheduling priority. Higher values are scheduled first.
pub type Priority = u32;

/// Process ID type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl Pid {
    /// Held by slots that do not describe a process.
    pub const NONE: Pid = Pid(0);

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Free slot, on the free list
    Unused,
    /// Being built by `allocate`/`fork`
    Embryo,
    /// Blocked on a channel
    Sleeping,
    /// Waiting in a ready queue
    Runnable,
    /// On a CPU
    Running,
    /// Exited, waiting to be reaped by its parent
    Zombie,
}

impl ProcState {
    /// Every state, in list order.
    pub const ALL: [ProcState; 6] = [
        ProcState::Unused,
        ProcState::Embryo,
        ProcState::Sleeping,
        ProcState::Runnable,
        ProcState::Running,
        ProcState::Zombie,
    ];

    /// Fixed-width label used by `ps` style listings.
    pub fn label(self) -> &'static str {
        match self {
            ProcState::Unused => "unused",
            ProcState::Embryo => "embryo",
            ProcState::Sleeping => "sleep ",
            ProcState::Runnable => "runble",
            ProcState::Running => "run   ",
            ProcState::Zombie => "zombie",
        }
    }
}

/// What a sleeping process is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// A process: parents sleep on themselves in `wait`.
    Proc(Pid),
    /// The tick counter.
    Ticks,
    /// Any other kernel object, by address.
    Addr(usize),
}

/// Process control block.
#[derive(Debug)]
pub struct Pcb {
    /// Process ID (`Pid::NONE` when unused)
    pub pid: Pid,
    /// Lifecycle state; always matches the list holding this slot
    pub state: ProcState,
    /// Ready level
    pub priority: Priority,
    /// Ticks left at this level before demotion
    pub budget: i64,
    /// Parent slot (lookup only)
    pub parent: Option<SlotIndex>,
    /// Tick at which the process was allocated
    pub start_ticks: u64,
    /// Total ticks spent running
    pub cpu_ticks_total: u64,
    /// Tick at which the process was last dispatched
    pub cpu_ticks_in: u64,
    /// Sleep channel, only while `Sleeping`
    pub channel: Option<Channel>,
    /// Kill requested
    pub killed: bool,
    /// User ID
    pub uid: u32,
    /// Group ID
    pub gid: u32,
    /// Process name
    pub name: String,
    /// Address-space size in bytes
    pub size: u64,
    /// Saved system-call return value
    pub syscall_ret: i64,
    /// Kernel stack
    pub kstack: Option<KernelStack>,
    /// User address space
    pub address_space: Option<AddressSpace>,
    /// Open files
    pub files: Vec<FileHandle>,
    /// Working directory
    pub cwd: Option<FileHandle>,
    /// Next slot on the list currently holding this PCB
    pub(crate) link: Option<SlotIndex>,
}

impl Pcb {
    /// Create an unused slot.
    pub const fn new() -> Self {
        Self {
            pid: Pid::NONE,
            state: ProcState::Unused,
            priority: 0,
            budget: 0,
            parent: None,
            start_ticks: 0,
            cpu_ticks_total: 0,
            cpu_ticks_in: 0,
            channel: None,
            killed: false,
            uid: 0,
            gid: 0,
            name: String::new(),
            size: 0,
            syscall_ret: 0,
            kstack: None,
            address_space: None,
            files: Vec::new(),
            cwd: None,
            link: None,
        }
    }

    /// Set the process name, truncated to `PROC_NAME_LEN` bytes.
    pub fn set_name(&mut self, name: &str) {
        let mut end = name.len().min(PROC_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        self.name.clear();
        self.name.push_str(&name[..end]);
    }

    /// Forget who this slot was.
    ///
    /// Owned resources must already have been taken out.
    pub(crate) fn clear_identity(&mut self) {
        self.pid = Pid::NONE;
        self.parent = None;
        self.name.clear();
        self.killed = false;
        self.channel = None;
        self.size = 0;
        self.syscall_ret = 0;
    }

    /// Whether the slot describes a process.
    pub fn is_live(&self) -> bool {
        self.state != ProcState::Unused
    }
}

impl Default for Pcb {
    fn default() -> Self {
        Self::new()
    }
}
