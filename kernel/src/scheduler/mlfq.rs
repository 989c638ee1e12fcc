//! Multi-level feedback queue policy.
//!
//! Two rules move a process between levels:
//!
//! - **Demotion**: every time a process leaves the CPU by yielding or
//!   sleeping, the ticks it just ran are taken off its budget. A budget
//!   at or below zero costs one level and is refilled.
//! - **Promotion**: every `ticks_to_promote` ticks the dispatcher raises
//!   every process below the top level by one and refills its budget, so
//!   nothing starves at level 0.

use crate::error::{ProcError, Result};
use crate::platform::Platform;
use crate::process::pcb::{Pid, ProcState, SlotIndex};
use crate::process::table::{ProcTable, TableInner};

pub use crate::process::pcb::Priority;

impl TableInner {
    /// Apply the demotion rule to `idx` at time `now`.
    ///
    /// The PCB must be off the ready lists.
    pub(crate) fn charge_budget(&mut self, idx: SlotIndex, now: u64) {
        let default_budget = self.config.default_budget;
        let pcb = &mut self.procs[idx];
        let used = now.saturating_sub(pcb.cpu_ticks_in);
        pcb.budget = pcb.budget.saturating_sub(used as i64);
        if pcb.budget <= 0 {
            if pcb.priority > 0 {
                pcb.priority -= 1;
                log::debug!("[SCHED] pid {} demoted to {}", pcb.pid, pcb.priority);
            }
            pcb.budget = default_budget;
        }
    }

    /// Promote if the sweep is due at `now`.
    pub(crate) fn promote_if_due(&mut self, now: u64) {
        if now >= self.promote_at && self.max_priority() > 0 {
            self.promote();
            self.promote_at = now + self.config.ticks_to_promote;
        }
    }

    /// Raise every process below the top level by one.
    pub(crate) fn promote(&mut self) {
        let max = self.max_priority();
        let budget = self.config.default_budget;

        // Top-down so nothing moves twice.
        for level in (0..max as usize).rev() {
            while let Some(idx) = self.ready[level].pop_front(&mut self.procs) {
                let pcb = &mut self.procs[idx];
                pcb.priority += 1;
                pcb.budget = budget;
                self.ready[level + 1].push_back(&mut self.procs, idx);
            }
        }

        for state in [ProcState::Running, ProcState::Sleeping] {
            for idx in self.slots_in(state) {
                let pcb = &mut self.procs[idx];
                if pcb.priority < max {
                    pcb.priority += 1;
                    pcb.budget = budget;
                }
            }
        }
        log::debug!("[SCHED] promotion sweep");
    }
}

impl<P: Platform> ProcTable<P> {
    /// Priority of `pid`, if it names a live process.
    pub fn get_priority(&self, pid: Pid) -> Option<Priority> {
        let inner = self.lock();
        let idx = inner.find(
            pid,
            &[
                ProcState::Running,
                ProcState::Runnable,
                ProcState::Sleeping,
                ProcState::Embryo,
                ProcState::Zombie,
            ],
        )?;
        Some(inner.procs[idx].priority)
    }

    /// Set the priority of `pid` and refill its budget.
    pub fn set_priority(&self, pid: Pid, priority: Priority) -> Result<()> {
        let mut inner = self.lock();
        if priority > inner.max_priority() {
            return Err(ProcError::InvalidPriority);
        }
        let idx = inner
            .find(
                pid,
                &[ProcState::Running, ProcState::Runnable, ProcState::Sleeping],
            )
            .ok_or(ProcError::NotFound)?;

        let budget = inner.config.default_budget;
        if inner.procs[idx].state == ProcState::Runnable && inner.procs[idx].priority != priority {
            inner.detach(idx, ProcState::Runnable);
            inner.procs[idx].priority = priority;
            inner.procs[idx].budget = budget;
            inner.attach(idx);
        } else {
            inner.procs[idx].priority = priority;
            inner.procs[idx].budget = budget;
        }
        log::debug!("[SCHED] pid {} priority set to {}", pid, priority);
        inner.after_mutation();
        Ok(())
    }
}
