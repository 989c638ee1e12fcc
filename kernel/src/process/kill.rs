//! Kill
//!
//! Killing is cooperative. `kill` only raises the flag and makes sure a
//! sleeping target gets scheduled to notice it; the target exits at its
//! next checkpoint.

use super::pcb::{Pid, ProcState};
use super::sleep::make_runnable;
use super::table::ProcTable;
use crate::error::{ProcError, Result};
use crate::platform::{CpuId, Platform};

impl<P: Platform> ProcTable<P> {
    /// Mark `pid` as killed.
    pub fn kill(&self, pid: Pid) -> Result<()> {
        let mut inner = self.lock();
        let idx = inner
            .find(
                pid,
                &[
                    ProcState::Running,
                    ProcState::Runnable,
                    ProcState::Sleeping,
                    ProcState::Embryo,
                    ProcState::Zombie,
                ],
            )
            .ok_or(ProcError::NotFound)?;

        inner.procs[idx].killed = true;
        if inner.procs[idx].state == ProcState::Sleeping {
            make_runnable(&mut inner, idx);
        }
        inner.after_mutation();
        log::debug!("[PROC] pid {} killed", pid);
        Ok(())
    }

    /// Whether the process on `cpu` has been killed.
    pub fn is_killed(&self, cpu: CpuId) -> bool {
        let inner = self.lock();
        let idx = inner.current(cpu);
        inner.procs[idx].killed
    }
}
