//! Consistency checker
//!
//! Walks every state list and every arena slot and confirms that each PCB
//! sits on exactly one list, the one its state (and, for runnable PCBs,
//! its priority) names.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use super::list::StateList;
use super::pcb::{ProcState, SlotIndex};
use super::table::{ProcTable, TableInner};
use crate::platform::{CpuId, Platform};
use crate::scheduler::Priority;

/// Which list a slot was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListId {
    State(ProcState),
    Ready(Priority),
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListId::State(state) => write!(f, "{:?}", state),
            ListId::Ready(level) => write!(f, "ready[{}]", level),
        }
    }
}

/// Broken table invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// A link points outside the arena.
    BadIndex { list: ListId, slot: SlotIndex },
    /// A slot was reached twice (two lists, or a cycle).
    Duplicate { slot: SlotIndex, first: ListId, second: ListId },
    /// A slot is on no list.
    Missing { slot: SlotIndex },
    /// A slot's state or priority does not match its list.
    WrongList { slot: SlotIndex, state: ProcState, list: ListId },
    /// Priority above the top level.
    BadPriority { slot: SlotIndex, priority: Priority },
    /// Recorded length differs from the walk.
    LengthMismatch { list: ListId, recorded: usize, walked: usize },
    /// The tail index is not the last node.
    BadTail { list: ListId },
    /// The last node links onward.
    Unterminated { list: ListId },
    /// List lengths do not add up to the capacity.
    CountMismatch { total: usize, capacity: usize },
    /// One slot is marked as running on two CPUs.
    SharedSlot { slot: SlotIndex, first: CpuId, second: CpuId },
    /// A `Running` slot that no CPU is running.
    Unscheduled { slot: SlotIndex },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::BadIndex { list, slot } => {
                write!(f, "{} links to slot {} outside the arena", list, slot)
            }
            Corruption::Duplicate { slot, first, second } => {
                write!(f, "slot {} on {} and again on {}", slot, first, second)
            }
            Corruption::Missing { slot } => write!(f, "slot {} is on no list", slot),
            Corruption::WrongList { slot, state, list } => {
                write!(f, "slot {} in state {:?} found on {}", slot, state, list)
            }
            Corruption::BadPriority { slot, priority } => {
                write!(f, "slot {} has priority {}", slot, priority)
            }
            Corruption::LengthMismatch { list, recorded, walked } => {
                write!(f, "{} records {} entries, walk found {}", list, recorded, walked)
            }
            Corruption::BadTail { list } => write!(f, "{} tail is not its last node", list),
            Corruption::Unterminated { list } => write!(f, "{} does not end at its tail", list),
            Corruption::CountMismatch { total, capacity } => {
                write!(f, "{} slots on lists, capacity {}", total, capacity)
            }
            Corruption::SharedSlot { slot, first, second } => {
                write!(f, "slot {} marked running on cpu {} and cpu {}", slot, first, second)
            }
            Corruption::Unscheduled { slot } => {
                write!(f, "slot {} is running on no cpu", slot)
            }
        }
    }
}

impl TableInner {
    fn all_lists(&self) -> Vec<(ListId, &StateList)> {
        let mut lists = Vec::with_capacity(5 + self.ready.len());
        for state in ProcState::ALL {
            if let Some(list) = self.lists.get(state) {
                lists.push((ListId::State(state), list));
            }
        }
        for (level, list) in self.ready.iter().enumerate() {
            lists.push((ListId::Ready(level as Priority), list));
        }
        lists
    }

    /// Check every list invariant.
    pub(crate) fn verify(&self) -> Result<(), Corruption> {
        let capacity = self.procs.len();
        let max = self.max_priority();
        let mut seen: Vec<Option<ListId>> = vec![None; capacity];
        let mut total = 0;

        for (id, list) in self.all_lists() {
            let mut walked = 0;
            let mut last = None;
            for slot in list.iter(&self.procs) {
                if slot >= capacity {
                    return Err(Corruption::BadIndex { list: id, slot });
                }
                if let Some(first) = seen[slot] {
                    return Err(Corruption::Duplicate { slot, first, second: id });
                }
                seen[slot] = Some(id);

                let pcb = &self.procs[slot];
                let home = match id {
                    ListId::State(state) => pcb.state == state,
                    ListId::Ready(level) => {
                        pcb.state == ProcState::Runnable && pcb.priority == level
                    }
                };
                if !home {
                    return Err(Corruption::WrongList { slot, state: pcb.state, list: id });
                }
                walked += 1;
                last = Some(slot);
            }
            if walked != list.len() {
                return Err(Corruption::LengthMismatch {
                    list: id,
                    recorded: list.len(),
                    walked,
                });
            }
            if list.back() != last {
                return Err(Corruption::BadTail { list: id });
            }
            if last.is_some_and(|slot| self.procs[slot].link.is_some()) {
                return Err(Corruption::Unterminated { list: id });
            }
            total += walked;
        }

        for (slot, pcb) in self.procs.iter().enumerate() {
            if seen[slot].is_none() {
                return Err(Corruption::Missing { slot });
            }
            if pcb.priority > max {
                return Err(Corruption::BadPriority { slot, priority: pcb.priority });
            }
        }

        if total != capacity {
            return Err(Corruption::CountMismatch { total, capacity });
        }

        for (cpu, marker) in self.running_on.iter().enumerate() {
            let Some(slot) = *marker else { continue };
            if slot >= capacity {
                return Err(Corruption::BadIndex { list: ListId::State(ProcState::Running), slot });
            }
            if let Some(first) = self.running_on[..cpu].iter().position(|m| *m == Some(slot)) {
                return Err(Corruption::SharedSlot { slot, first, second: cpu });
            }
        }
        for slot in self.lists.running.iter(&self.procs) {
            if !self.on_cpu(slot) {
                return Err(Corruption::Unscheduled { slot });
            }
        }
        Ok(())
    }

    /// Panic, naming the caller, if any invariant is broken.
    #[track_caller]
    pub(crate) fn check_procs(&self) {
        if let Err(e) = self.verify() {
            panic!("[PROC] process array and lists inconsistent: {}", e);
        }
    }
}

impl<P: Platform> ProcTable<P> {
    /// Check every list invariant.
    pub fn verify(&self) -> Result<(), Corruption> {
        self.lock().verify()
    }

    /// Panic, naming the caller, if any invariant is broken.
    #[track_caller]
    pub fn check_procs(&self) {
        self.lock().check_procs();
    }
}
