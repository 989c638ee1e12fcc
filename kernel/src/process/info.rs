//! Process inspection
//!
//! Snapshots for `ps`-style tools and the console dumps: the full
//! process listing and the per-list views bound to control keys.

use alloc::string::String;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;

use super::pcb::{Pcb, Pid, ProcState};
use super::table::{ProcTable, TableInner};
use crate::config::{SNAPSHOT_LIMIT, TIMER_FREQUENCY};
use crate::platform::Platform;
use crate::scheduler::Priority;

/// Read-only view of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub pid: Pid,
    /// Parent pid, or the pid itself for a process without a parent
    pub ppid: Pid,
    pub uid: u32,
    pub gid: u32,
    pub priority: Priority,
    pub budget: i64,
    pub state: ProcState,
    /// Ticks since the process was created
    pub elapsed_ticks: u64,
    /// Ticks spent on a CPU
    pub cpu_ticks: u64,
    pub size: u64,
    pub name: String,
}

impl ProcessSummary {
    fn from_pcb(inner: &TableInner, pcb: &Pcb, now: u64) -> Self {
        Self {
            pid: pcb.pid,
            ppid: pcb.parent.map_or(pcb.pid, |parent| inner.procs[parent].pid),
            uid: pcb.uid,
            gid: pcb.gid,
            priority: pcb.priority,
            budget: pcb.budget,
            state: pcb.state,
            elapsed_ticks: now.saturating_sub(pcb.start_ticks),
            cpu_ticks: pcb.cpu_ticks_total,
            size: pcb.size,
            name: pcb.name.clone(),
        }
    }
}

bitflags! {
    /// Lists printed by [`ProcTable::dump_lists`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ListDump: u8 {
        /// Ready lists with budgets
        const READY = 1 << 0;
        /// Free-list size
        const FREE = 1 << 1;
        /// Sleeping pids
        const SLEEPING = 1 << 2;
        /// Zombies with their parent pids
        const ZOMBIE = 1 << 3;
    }
}

/// Ticks as seconds with three decimals.
struct Seconds(u64);

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = TIMER_FREQUENCY as u64;
        write!(f, "{}.{:03}", self.0 / hz, (self.0 % hz) * 1000 / hz)
    }
}

/// Write `items` joined by `->`.
fn write_chain<W, I, T>(out: &mut W, items: I) -> fmt::Result
where
    W: fmt::Write,
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.write_str("->")?;
        }
        write!(out, "{}", item)?;
    }
    Ok(())
}

/// `(a,b)` pair for the chained list dumps.
struct Pair<A, B>(A, B);

impl<A: fmt::Display, B: fmt::Display> fmt::Display for Pair<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

impl<P: Platform> ProcTable<P> {
    /// Up to `limit` (at most 64) processes, in slot order. Unused and
    /// embryo slots are skipped.
    pub fn snapshot(&self, limit: usize) -> Vec<ProcessSummary> {
        let now = self.platform.ticks();
        let inner = self.lock();
        inner
            .procs
            .iter()
            .filter(|pcb| !matches!(pcb.state, ProcState::Unused | ProcState::Embryo))
            .take(limit.min(SNAPSHOT_LIMIT))
            .map(|pcb| ProcessSummary::from_pcb(&inner, pcb, now))
            .collect()
    }

    /// Summary of a live process (including embryos and zombies).
    pub fn lookup(&self, pid: Pid) -> Option<ProcessSummary> {
        let now = self.platform.ticks();
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
        Some(ProcessSummary::from_pcb(&inner, &inner.procs[idx], now))
    }

    /// Print every live process.
    ///
    /// Never blocks: if the table lock is held, prints a notice instead.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let now = self.platform.ticks();
        let Some(inner) = self.inner.try_lock() else {
            return writeln!(out, "process table busy");
        };

        writeln!(
            out,
            "\nPID\tName         UID\tGID\tPPID\tPrio\tElapsed\tCPU\tState\tSize"
        )?;
        for pcb in inner.procs.iter().filter(|pcb| pcb.is_live()) {
            let s = ProcessSummary::from_pcb(&inner, pcb, now);
            writeln!(
                out,
                "{}\t{:<12} {}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                s.pid,
                s.name,
                s.uid,
                s.gid,
                s.ppid,
                s.priority,
                Seconds(s.elapsed_ticks),
                Seconds(s.cpu_ticks),
                s.state.label(),
                s.size
            )?;
        }
        Ok(())
    }

    /// Print the lists selected by `which`.
    pub fn dump_lists<W: fmt::Write>(&self, out: &mut W, which: ListDump) -> fmt::Result {
        let inner = self.lock();
        let pid_of = |idx: usize| inner.procs[idx].pid;

        if which.contains(ListDump::READY) {
            writeln!(out, "Ready List Processes:")?;
            for level in (0..inner.ready.len()).rev() {
                write!(out, "{}: ", level)?;
                write_chain(
                    out,
                    inner.ready[level]
                        .iter(&inner.procs)
                        .map(|idx| Pair(pid_of(idx), inner.procs[idx].budget)),
                )?;
                writeln!(out)?;
            }
        }
        if which.contains(ListDump::FREE) {
            writeln!(out, "Free List Size: {} processes", inner.lists.unused.len())?;
        }
        if which.contains(ListDump::SLEEPING) {
            writeln!(out, "Sleeping List Processes:")?;
            write_chain(out, inner.lists.sleeping.iter(&inner.procs).map(pid_of))?;
            writeln!(out)?;
        }
        if which.contains(ListDump::ZOMBIE) {
            writeln!(out, "Zombie List Processes:")?;
            write_chain(
                out,
                inner.lists.zombie.iter(&inner.procs).map(|idx| {
                    let pcb = &inner.procs[idx];
                    Pair(pcb.pid, pcb.parent.map_or(pcb.pid, pid_of))
                }),
            )?;
            writeln!(out)?;
        }
        Ok(())
    }
}
