//! Process identity and credentials.

use super::pcb::Pid;
use super::table::ProcTable;
use crate::config::MAX_ID;
use crate::error::{ProcError, Result};
use crate::platform::{CpuId, Platform};

impl<P: Platform> ProcTable<P> {
    /// Pid of the process on `cpu`, if any.
    pub fn current_pid(&self, cpu: CpuId) -> Option<Pid> {
        let inner = self.lock();
        inner.try_current(cpu).map(|idx| inner.procs[idx].pid)
    }

    /// Parent pid of the process on `cpu`. A process without a parent
    /// reports its own pid.
    pub fn current_ppid(&self, cpu: CpuId) -> Option<Pid> {
        let inner = self.lock();
        let idx = inner.try_current(cpu)?;
        let pcb = &inner.procs[idx];
        Some(pcb.parent.map_or(pcb.pid, |parent| inner.procs[parent].pid))
    }

    pub fn uid(&self, cpu: CpuId) -> u32 {
        let inner = self.lock();
        inner.procs[inner.current(cpu)].uid
    }

    pub fn gid(&self, cpu: CpuId) -> u32 {
        let inner = self.lock();
        inner.procs[inner.current(cpu)].gid
    }

    /// Set the uid of the process on `cpu`. Accepts `0..=MAX_ID`.
    pub fn set_uid(&self, cpu: CpuId, uid: u32) -> Result<()> {
        if uid > MAX_ID {
            return Err(ProcError::InvalidArgument);
        }
        let mut inner = self.lock();
        let idx = inner.current(cpu);
        inner.procs[idx].uid = uid;
        Ok(())
    }

    /// Set the gid of the process on `cpu`. Accepts `0..=MAX_ID`.
    pub fn set_gid(&self, cpu: CpuId, gid: u32) -> Result<()> {
        if gid > MAX_ID {
            return Err(ProcError::InvalidArgument);
        }
        let mut inner = self.lock();
        let idx = inner.current(cpu);
        inner.procs[idx].gid = gid;
        Ok(())
    }
}
