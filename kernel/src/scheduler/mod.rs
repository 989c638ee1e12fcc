//! Kernel scheduler module.
//!
//! Each CPU runs a dispatcher loop. A pass picks the head of the highest
//! non-empty ready list, hands it to the platform to run, takes it back
//! once the process gives up the processor, and runs the promotion sweep
//! when it is due.
//!
//! The table lock is never held across the context switch. Dispatch
//! extracts what it needs under the lock, drops it, and hands the
//! platform a [`Handoff`] naming the process to run.

pub mod mlfq;

use spin::MutexGuard;

use crate::platform::{CpuId, Platform};
use crate::process::pcb::{Pid, ProcState, SlotIndex};
use crate::process::sleep::wakeup_locked;
use crate::process::table::{ProcTable, TableInner};
use crate::process::Channel;

pub use mlfq::Priority;

/// Permission to run one process on one CPU.
///
/// Produced by [`ProcTable::dispatch`], carried through
/// [`Platform::resume`] and consumed by [`ProcTable::reclaim`]. It cannot
/// be built or copied outside this crate, so a CPU always gives back the
/// process it was handed.
#[derive(Debug, PartialEq, Eq)]
pub struct Handoff {
    slot: SlotIndex,
    pid: Pid,
}

impl Handoff {
    pub(crate) fn new(slot: SlotIndex, pid: Pid) -> Self {
        Self { slot, pid }
    }

    /// Process being run.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Arena slot of the process being run.
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }
}

impl<P: Platform> ProcTable<P> {
    // ==================== Dispatcher side ====================

    /// Pick the next process for `cpu` and mark it running.
    ///
    /// Returns `None` when every ready list is empty.
    pub fn dispatch(&self, cpu: CpuId) -> Option<Handoff> {
        let now = self.platform.ticks();
        let mut inner = self.lock();
        if let Some(busy) = inner.try_current(cpu) {
            panic!(
                "[SCHED] cpu {} dispatching while pid {} is still on it",
                cpu, inner.procs[busy].pid
            );
        }
        if cpu >= inner.running_on.len() {
            panic!("[SCHED] cpu {} out of range", cpu);
        }

        // A slot still on another CPU's marker is switching away there
        // and cannot run until that CPU reclaims it.
        let idx = inner
            .ready
            .iter()
            .rev()
            .find_map(|list| list.iter(&inner.procs).find(|&idx| !inner.on_cpu(idx)))?;

        inner.detach(idx, ProcState::Runnable);
        let pcb = &mut inner.procs[idx];
        pcb.state = ProcState::Running;
        pcb.cpu_ticks_in = now;
        let pid = pcb.pid;
        log::trace!("[SCHED] cpu {} -> pid {} (prio {})", cpu, pid, pcb.priority);
        inner.attach(idx);
        inner.running_on[cpu] = Some(idx);
        inner.after_mutation();

        Some(Handoff::new(idx, pid))
    }

    /// Take `cpu` back from the process named by `handoff`.
    ///
    /// The process must already have left `Running` (yield, sleep or
    /// exit). Runs the promotion sweep if it is due.
    pub fn reclaim(&self, cpu: CpuId, handoff: Handoff) {
        let now = self.platform.ticks();
        let mut inner = self.lock();
        if inner.try_current(cpu) != Some(handoff.slot) {
            panic!(
                "[SCHED] cpu {}: handoff for pid {} does not match the running slot",
                cpu, handoff.pid
            );
        }
        inner.running_on[cpu] = None;

        // An exiting process could not be reaped while it was still on
        // this CPU; let its parent look again.
        let pcb = &inner.procs[handoff.slot];
        if pcb.state == ProcState::Zombie {
            if let Some(parent) = pcb.parent {
                let chan = Channel::Proc(inner.procs[parent].pid);
                wakeup_locked(&mut inner, chan);
            }
        }

        inner.promote_if_due(now);
        inner.after_mutation();
    }

    /// One dispatcher pass on `cpu`. Returns `false` if nothing was
    /// runnable.
    pub fn scheduler_pass(&self, cpu: CpuId) -> bool {
        self.platform.enable_interrupts(cpu);
        match self.dispatch(cpu) {
            Some(handoff) => {
                let handoff = self.platform.resume(cpu, handoff);
                self.reclaim(cpu, handoff);
                true
            }
            None => {
                let now = self.platform.ticks();
                let mut inner = self.lock();
                inner.promote_if_due(now);
                inner.after_mutation();
                false
            }
        }
    }

    /// Per-CPU dispatcher loop. Never returns.
    pub fn scheduler(&self, cpu: CpuId) -> ! {
        log::info!("[SCHED] cpu {} entering scheduler", cpu);
        loop {
            if !self.scheduler_pass(cpu) {
                self.platform.wait_for_interrupt(cpu);
            }
        }
    }

    // ==================== Process side ====================

    /// Give up the processor for one round.
    ///
    /// `cpu` is updated to the CPU the process resumes on.
    pub fn yield_now(&self, cpu: &mut CpuId) {
        let now = self.platform.ticks();
        let mut inner = self.lock();
        let idx = inner.current(*cpu);
        inner.detach(idx, ProcState::Running);
        inner.charge_budget(idx, now);
        inner.procs[idx].state = ProcState::Runnable;
        inner.attach(idx);
        self.sched(cpu, inner, now);
    }

    /// Switch from the current process back to the dispatcher.
    ///
    /// The caller has already moved the process out of `Running`. The
    /// guard is released before the switch, and `cpu` is updated to the
    /// CPU the process resumes on.
    pub(crate) fn sched(&self, cpu: &mut CpuId, mut inner: MutexGuard<'_, TableInner>, now: u64) {
        let idx = inner.current(*cpu);
        let pcb = &mut inner.procs[idx];
        if pcb.state == ProcState::Running {
            panic!("[SCHED] sched: pid {} is still running", pcb.pid);
        }
        pcb.cpu_ticks_total += now.saturating_sub(pcb.cpu_ticks_in);
        inner.after_mutation();
        drop(inner);

        *cpu = self.platform.switch_to_scheduler(*cpu);
    }
}
