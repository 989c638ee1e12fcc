//! Process lifecycle
//!
//! ```text
//! Unused -> Embryo -> Runnable <-> Running -> Zombie -> Unused
//!                        ^            |
//!                        +- Sleeping <+
//! ```
//!
//! Slow platform work (stack and address-space allocation, file
//! duplication and closing) happens with the table unlocked, on PCBs only
//! the caller can reach: its own, or an `Embryo` it is building.

use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

use super::pcb::{Channel, Pid, ProcState, SlotIndex};
use super::sleep::wakeup_locked;
use super::table::{ProcTable, TableInner};
use crate::config::{DEFAULT_GID, DEFAULT_UID, PAGE_SIZE};
use crate::error::{ProcError, Result};
use crate::platform::{AddressSpace, CpuId, FileHandle, KernelStack, Platform};

/// States in which a child still counts as alive for `wait`.
const LIVE_STATES: [ProcState; 4] = [
    ProcState::Running,
    ProcState::Runnable,
    ProcState::Sleeping,
    ProcState::Embryo,
];

/// Resources taken off a reaped child, released after the lock is dropped.
#[derive(Debug)]
pub(crate) struct Reaped {
    pub pid: Pid,
    kstack: Option<KernelStack>,
    address_space: Option<AddressSpace>,
}

/// Outcome of one pass over the caller's children.
#[derive(Debug)]
pub(crate) enum ChildScan {
    /// A zombie child was reaped.
    Reaped(Reaped),
    /// Children exist but none can be reaped yet.
    Pending,
}

/// What `fork` copies from the parent.
struct ForkSource {
    slot: SlotIndex,
    address_space: Option<AddressSpace>,
    size: u64,
    uid: u32,
    gid: u32,
    name: String,
    files: Vec<FileHandle>,
    cwd: Option<FileHandle>,
}

impl TableInner {
    /// One pass of `wait` for the process on `cpu`.
    ///
    /// Reaps the first zombie child, or reports whether any child is
    /// still alive. No children at all, or a killed caller, is
    /// `NoChildren`.
    pub(crate) fn scan_children(&mut self, cpu: CpuId) -> Result<ChildScan> {
        let me = self.current(cpu);
        let mut have_kids = false;

        for idx in self.slots_in(ProcState::Zombie) {
            if self.procs[idx].parent != Some(me) {
                continue;
            }
            // Still switching away on some CPU.
            if self.on_cpu(idx) {
                have_kids = true;
                continue;
            }
            return Ok(ChildScan::Reaped(self.reap(idx)));
        }

        if !have_kids {
            have_kids = LIVE_STATES.iter().any(|&state| {
                self.slots_in(state)
                    .into_iter()
                    .any(|idx| self.procs[idx].parent == Some(me))
            });
        }

        if !have_kids || self.procs[me].killed {
            return Err(ProcError::NoChildren);
        }
        Ok(ChildScan::Pending)
    }

    /// `Zombie -> Unused`, handing back what still needs freeing.
    fn reap(&mut self, idx: SlotIndex) -> Reaped {
        let pcb = &mut self.procs[idx];
        let reaped = Reaped {
            pid: pcb.pid,
            kstack: pcb.kstack.take(),
            address_space: pcb.address_space.take(),
        };
        pcb.clear_identity();
        self.transition(idx, ProcState::Zombie, ProcState::Unused);
        log::debug!("[PROC] reaped pid {}", reaped.pid);
        reaped
    }

    /// Give every child of `idx` to the root process.
    fn reparent_children(&mut self, idx: SlotIndex) {
        let init = self.init_slot;
        let init_pid = init.map(|slot| self.procs[slot].pid);

        for state in [
            ProcState::Running,
            ProcState::Runnable,
            ProcState::Sleeping,
            ProcState::Embryo,
            ProcState::Zombie,
        ] {
            for child in self.slots_in(state) {
                if self.procs[child].parent != Some(idx) {
                    continue;
                }
                self.procs[child].parent = init;
                if state == ProcState::Zombie {
                    if let Some(pid) = init_pid {
                        wakeup_locked(self, Channel::Proc(pid));
                    }
                }
            }
        }
    }
}

impl<P: Platform> ProcTable<P> {
    /// Claim a free slot and give it a fresh pid and a kernel stack.
    ///
    /// The slot comes back as an `Embryo` owned by the caller.
    pub(crate) fn allocate(&self) -> Result<SlotIndex> {
        let now = self.platform.ticks();
        let idx = {
            let mut inner = self.lock();
            let Some(idx) = inner.lists.unused.front() else {
                log::warn!("[PROC] process table full");
                return Err(ProcError::OutOfProcesses);
            };
            inner.detach(idx, ProcState::Unused);
            let pid = inner.alloc_pid();
            let priority = inner.max_priority();
            let budget = inner.config.default_budget;

            let pcb = &mut inner.procs[idx];
            pcb.pid = pid;
            pcb.state = ProcState::Embryo;
            pcb.priority = priority;
            pcb.budget = budget;
            pcb.start_ticks = now;
            pcb.cpu_ticks_total = 0;
            pcb.cpu_ticks_in = 0;
            pcb.parent = None;
            pcb.killed = false;
            pcb.channel = None;
            inner.attach(idx);
            inner.after_mutation();
            idx
        };

        match self.platform.alloc_kstack() {
            Some(stack) => {
                self.lock().procs[idx].kstack = Some(stack);
                Ok(idx)
            }
            None => {
                let mut inner = self.lock();
                log::warn!("[PROC] no kernel stack for pid {}", inner.procs[idx].pid);
                inner.procs[idx].clear_identity();
                inner.transition(idx, ProcState::Embryo, ProcState::Unused);
                inner.after_mutation();
                Err(ProcError::ResourceExhausted)
            }
        }
    }

    /// Undo a half-built `Embryo`.
    fn abandon_embryo(&self, idx: SlotIndex) {
        let kstack = {
            let mut inner = self.lock();
            let pcb = &mut inner.procs[idx];
            let kstack = pcb.kstack.take();
            pcb.clear_identity();
            inner.transition(idx, ProcState::Embryo, ProcState::Unused);
            inner.after_mutation();
            kstack
        };
        if let Some(stack) = kstack {
            self.platform.free_kstack(stack);
        }
    }

    /// Create the root process from `image`.
    ///
    /// Panics if called twice or if the image cannot be mapped.
    pub fn init_root(&self, name: &str, image: &[u8]) -> Result<Pid> {
        if self.lock().init_slot.is_some() {
            panic!("[PROC] init_root: root process already exists");
        }
        let idx = self.allocate()?;
        let Some(space) = self.platform.setup_address_space(image) else {
            panic!("[PROC] init_root: out of memory for {}", name);
        };

        let mut inner = self.lock();
        if inner.init_slot.is_some() {
            panic!("[PROC] init_root: root process already exists");
        }
        let pcb = &mut inner.procs[idx];
        pcb.address_space = Some(space);
        pcb.size = PAGE_SIZE;
        pcb.uid = DEFAULT_UID;
        pcb.gid = DEFAULT_GID;
        pcb.set_name(name);
        let pid = pcb.pid;

        inner.init_slot = Some(idx);
        inner.transition(idx, ProcState::Embryo, ProcState::Runnable);
        inner.after_mutation();
        log::info!("[PROC] root process '{}' is pid {}", name, pid);
        Ok(pid)
    }

    /// Duplicate the process running on `cpu`. Returns the child's pid.
    pub fn fork(&self, cpu: CpuId) -> Result<Pid> {
        let src = {
            let inner = self.lock();
            let slot = inner.current(cpu);
            let pcb = &inner.procs[slot];
            ForkSource {
                slot,
                address_space: pcb.address_space,
                size: pcb.size,
                uid: pcb.uid,
                gid: pcb.gid,
                name: pcb.name.clone(),
                files: pcb.files.clone(),
                cwd: pcb.cwd,
            }
        };

        let child = self.allocate()?;
        let space = src
            .address_space
            .and_then(|from| self.platform.copy_address_space(from, src.size));
        let Some(space) = space else {
            log::warn!("[PROC] fork: address space copy failed");
            self.abandon_embryo(child);
            return Err(ProcError::ResourceExhausted);
        };
        let files: Vec<FileHandle> = src
            .files
            .iter()
            .map(|&file| self.platform.dup_file(file))
            .collect();
        let cwd = src.cwd.map(|dir| self.platform.dup_file(dir));

        let mut inner = self.lock();
        let pcb = &mut inner.procs[child];
        pcb.address_space = Some(space);
        pcb.size = src.size;
        pcb.uid = src.uid;
        pcb.gid = src.gid;
        pcb.name = src.name;
        pcb.files = files;
        pcb.cwd = cwd;
        pcb.parent = Some(src.slot);
        pcb.syscall_ret = 0;
        let pid = pcb.pid;

        inner.transition(child, ProcState::Embryo, ProcState::Runnable);
        inner.after_mutation();
        log::debug!("[PROC] fork: pid {} -> child {}", inner.procs[src.slot].pid, pid);
        Ok(pid)
    }

    /// Terminate the process running on `cpu`. Never returns.
    pub fn exit(&self, cpu: CpuId) -> ! {
        self.begin_exit(cpu);
        panic!("[PROC] zombie exit");
    }

    /// Everything `exit` does up to and including the final switch.
    pub(crate) fn begin_exit(&self, mut cpu: CpuId) {
        let (files, cwd) = {
            let mut inner = self.lock();
            let idx = inner.current(cpu);
            if inner.init_slot == Some(idx) {
                panic!("[PROC] root process exiting");
            }
            let pcb = &mut inner.procs[idx];
            (mem::take(&mut pcb.files), pcb.cwd.take())
        };
        for file in files {
            self.platform.close_file(file);
        }
        if let Some(dir) = cwd {
            self.platform.close_file(dir);
        }

        let now = self.platform.ticks();
        let mut inner = self.lock();
        let idx = inner.current(cpu);

        if let Some(parent) = inner.procs[idx].parent {
            let chan = Channel::Proc(inner.procs[parent].pid);
            wakeup_locked(&mut inner, chan);
        }
        inner.reparent_children(idx);

        inner.transition(idx, ProcState::Running, ProcState::Zombie);
        inner.procs[idx].size = 0;
        log::debug!("[PROC] pid {} exited", inner.procs[idx].pid);
        self.sched(&mut cpu, inner, now);
    }

    /// Wait for a child of the process on `cpu` to exit and reap it.
    ///
    /// Fails with `NoChildren` if there is nothing to wait for or the
    /// caller has been killed. `cpu` is updated to the CPU the process
    /// resumes on.
    pub fn wait(&self, cpu: &mut CpuId) -> Result<Pid> {
        let mut inner = self.lock();
        loop {
            match inner.scan_children(*cpu)? {
                ChildScan::Reaped(reaped) => {
                    inner.after_mutation();
                    drop(inner);
                    return Ok(self.release(reaped));
                }
                ChildScan::Pending => {
                    let me = inner.procs[inner.current(*cpu)].pid;
                    inner = self.sleep_on_table(cpu, Channel::Proc(me), inner);
                }
            }
        }
    }

    /// Reap a zombie child of the process on `cpu` without blocking.
    ///
    /// `Ok(None)` means children exist but none has exited yet.
    pub fn try_wait(&self, cpu: CpuId) -> Result<Option<Pid>> {
        let mut inner = self.lock();
        match inner.scan_children(cpu)? {
            ChildScan::Reaped(reaped) => {
                inner.after_mutation();
                drop(inner);
                Ok(Some(self.release(reaped)))
            }
            ChildScan::Pending => Ok(None),
        }
    }

    /// Free what a reaped child still owned.
    fn release(&self, reaped: Reaped) -> Pid {
        if let Some(stack) = reaped.kstack {
            self.platform.free_kstack(stack);
        }
        if let Some(space) = reaped.address_space {
            self.platform.free_address_space(space);
        }
        reaped.pid
    }
}
