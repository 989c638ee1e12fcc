//! Process Table
//!
//! The table owns the PCB arena and every state list. All of it sits
//! behind one [`spin::Mutex`]; no PCB field is read or written without
//! holding it.
//!
//! State changes go through the transition building block on
//! [`TableInner`]: `detach` the PCB from the list matching its current
//! state, mutate it, then `attach` it to the list matching its new state.

use alloc::vec::Vec;
use spin::{Mutex, MutexGuard};

use super::list::StateList;
use super::pcb::{Pcb, Pid, ProcState, SlotIndex};
use crate::config::{ConfigError, TableConfig};
use crate::platform::{CpuId, Platform};

// ═══════════════════════════════════════════════════════════════════════
// State lists
// ═══════════════════════════════════════════════════════════════════════

/// One list per non-runnable state. Runnable PCBs live on the ready lists.
#[derive(Debug, Default)]
pub(crate) struct StateLists {
    pub unused: StateList,
    pub embryo: StateList,
    pub sleeping: StateList,
    pub running: StateList,
    pub zombie: StateList,
}

impl StateLists {
    pub fn get(&self, state: ProcState) -> Option<&StateList> {
        match state {
            ProcState::Unused => Some(&self.unused),
            ProcState::Embryo => Some(&self.embryo),
            ProcState::Sleeping => Some(&self.sleeping),
            ProcState::Running => Some(&self.running),
            ProcState::Zombie => Some(&self.zombie),
            ProcState::Runnable => None,
        }
    }

    pub fn get_mut(&mut self, state: ProcState) -> Option<&mut StateList> {
        match state {
            ProcState::Unused => Some(&mut self.unused),
            ProcState::Embryo => Some(&mut self.embryo),
            ProcState::Sleeping => Some(&mut self.sleeping),
            ProcState::Running => Some(&mut self.running),
            ProcState::Zombie => Some(&mut self.zombie),
            ProcState::Runnable => None,
        }
    }
}

/// Pick the list a PCB in `state` at `priority` belongs on.
fn home_list<'a>(
    lists: &'a mut StateLists,
    ready: &'a mut [StateList],
    state: ProcState,
    priority: u32,
) -> &'a mut StateList {
    match lists.get_mut(state) {
        Some(list) => list,
        None => match ready.get_mut(priority as usize) {
            Some(list) => list,
            None => panic!("[PROC] priority {} has no ready list", priority),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Table state
// ═══════════════════════════════════════════════════════════════════════

/// Everything guarded by the table lock.
#[derive(Debug)]
pub(crate) struct TableInner {
    pub(crate) config: TableConfig,
    /// The PCB arena
    pub(crate) procs: Vec<Pcb>,
    pub(crate) lists: StateLists,
    /// Ready lists, indexed by priority
    pub(crate) ready: Vec<StateList>,
    /// Slot each CPU is currently running
    pub(crate) running_on: Vec<Option<SlotIndex>>,
    pub(crate) next_pid: u32,
    /// Tick at which the next promotion sweep is due
    pub(crate) promote_at: u64,
    /// Slot of the root process
    pub(crate) init_slot: Option<SlotIndex>,
}

impl TableInner {
    fn new(config: TableConfig, now: u64) -> Self {
        let mut inner = Self {
            config,
            procs: (0..config.capacity).map(|_| Pcb::new()).collect(),
            lists: StateLists::default(),
            ready: (0..=config.max_priority).map(|_| StateList::new()).collect(),
            running_on: (0..config.cpus).map(|_| None).collect(),
            next_pid: 1,
            promote_at: now + config.ticks_to_promote,
            init_slot: None,
        };
        for idx in 0..config.capacity {
            inner.lists.unused.push_back(&mut inner.procs, idx);
        }
        inner
    }

    // ==================== Transitions ====================

    /// Take `idx` off the list matching its recorded state.
    ///
    /// Panics if the PCB is not on that list or its state is not
    /// `expected`.
    #[track_caller]
    pub(crate) fn detach(&mut self, idx: SlotIndex, expected: ProcState) {
        let state = self.procs[idx].state;
        let priority = self.procs[idx].priority;
        let list = home_list(&mut self.lists, &mut self.ready, state, priority);
        if let Err(e) = list.remove(&mut self.procs, idx) {
            panic!(
                "[PROC] pid {} missing from {:?} list: {}",
                self.procs[idx].pid, state, e
            );
        }
        assert_state(&self.procs[idx], expected);
    }

    /// Put `idx` on the list matching its current state and priority.
    pub(crate) fn attach(&mut self, idx: SlotIndex) {
        let state = self.procs[idx].state;
        let priority = self.procs[idx].priority;
        let list = home_list(&mut self.lists, &mut self.ready, state, priority);
        list.push_back(&mut self.procs, idx);
    }

    /// Plain `from -> to` transition.
    #[track_caller]
    pub(crate) fn transition(&mut self, idx: SlotIndex, from: ProcState, to: ProcState) {
        self.detach(idx, from);
        self.procs[idx].state = to;
        self.attach(idx);
    }

    /// Run the consistency checker if the table was built with checks on.
    #[track_caller]
    pub(crate) fn after_mutation(&self) {
        if self.config.debug_checks {
            self.check_procs();
        }
    }

    // ==================== Lookup ====================

    /// Slot running on `cpu`.
    #[track_caller]
    pub(crate) fn current(&self, cpu: CpuId) -> SlotIndex {
        match self.running_on.get(cpu).copied().flatten() {
            Some(idx) => idx,
            None => panic!("[PROC] cpu {} has no current process", cpu),
        }
    }

    /// Slot running on `cpu`, if any.
    pub(crate) fn try_current(&self, cpu: CpuId) -> Option<SlotIndex> {
        self.running_on.get(cpu).copied().flatten()
    }

    /// Whether `idx` is still on a CPU's running marker.
    pub(crate) fn on_cpu(&self, idx: SlotIndex) -> bool {
        self.running_on.iter().any(|slot| *slot == Some(idx))
    }

    /// Find a PCB by pid among the lists for `states`.
    pub(crate) fn find(&self, pid: Pid, states: &[ProcState]) -> Option<SlotIndex> {
        if pid == Pid::NONE {
            return None;
        }
        states.iter().find_map(|&state| {
            self.slots_in(state)
                .into_iter()
                .find(|&idx| self.procs[idx].pid == pid)
        })
    }

    /// Slots currently in `state`, in list order. Runnable slots are
    /// returned highest priority first.
    pub(crate) fn slots_in(&self, state: ProcState) -> Vec<SlotIndex> {
        match self.lists.get(state) {
            Some(list) => list.iter(&self.procs).collect(),
            None => self
                .ready
                .iter()
                .rev()
                .flat_map(|list| list.iter(&self.procs))
                .collect(),
        }
    }

    /// Number of PCBs in `state`.
    pub(crate) fn count(&self, state: ProcState) -> usize {
        match self.lists.get(state) {
            Some(list) => list.len(),
            None => self.ready.iter().map(StateList::len).sum(),
        }
    }

    pub(crate) fn max_priority(&self) -> u32 {
        self.config.max_priority
    }

    pub(crate) fn alloc_pid(&mut self) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        pid
    }
}

/// Panic unless `pcb` is in `expected`.
#[track_caller]
pub(crate) fn assert_state(pcb: &Pcb, expected: ProcState) {
    if pcb.state != expected {
        panic!(
            "[PROC] pid {}: state is {:?}, expected {:?}",
            pcb.pid, pcb.state, expected
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Process table
// ═══════════════════════════════════════════════════════════════════════

/// The process table.
///
/// Shared by every CPU. Operations that run on behalf of a process take
/// the `cpu` it is running on and act on that CPU's current process.
pub struct ProcTable<P: Platform> {
    pub(crate) inner: Mutex<TableInner>,
    pub(crate) platform: P,
}

impl<P: Platform> ProcTable<P> {
    /// Build a table with every slot on the free list.
    pub fn new(config: TableConfig, platform: P) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = platform.ticks();
        log::info!(
            "[PROC] Process table: {} slots, priorities 0..={}, budget {}",
            config.capacity,
            config.max_priority,
            config.default_budget
        );
        Ok(Self {
            inner: Mutex::new(TableInner::new(config, now)),
            platform,
        })
    }

    /// The platform this table runs on.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Runtime parameters.
    pub fn config(&self) -> TableConfig {
        self.inner.lock().config
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock()
    }

    /// Number of free slots.
    pub fn free_count(&self) -> usize {
        self.lock().lists.unused.len()
    }

    /// Number of PCBs in `state` (all ready levels for `Runnable`).
    pub fn list_len(&self, state: ProcState) -> usize {
        self.lock().count(state)
    }

    /// Number of PCBs on the ready list for `priority`.
    pub fn ready_len(&self, priority: u32) -> usize {
        self.lock()
            .ready
            .get(priority as usize)
            .map_or(0, StateList::len)
    }

    /// Pids on the ready list for `priority`, in dispatch order.
    pub fn ready_pids(&self, priority: u32) -> Vec<Pid> {
        let inner = self.lock();
        match inner.ready.get(priority as usize) {
            Some(list) => list.iter(&inner.procs).map(|idx| inner.procs[idx].pid).collect(),
            None => Vec::new(),
        }
    }
}
