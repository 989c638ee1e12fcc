//! Sleep and wakeup
//!
//! A process blocks on a [`Channel`] while holding some condition lock.
//! The table lock is taken before the condition lock is released, so a
//! wakeup issued under the condition lock cannot slip in between the
//! caller's last check and its move to `Sleeping`.

use alloc::vec::Vec;
use spin::{Mutex, MutexGuard};

use super::pcb::{Channel, ProcState, SlotIndex};
use super::table::{ProcTable, TableInner};
use crate::error::{ProcError, Result};
use crate::platform::{CpuId, Platform};

/// Move every process sleeping on `chan` to its ready list.
///
/// Requires the table lock. Returns the number of processes woken.
pub(crate) fn wakeup_locked(inner: &mut TableInner, chan: Channel) -> usize {
    let sleepers: Vec<SlotIndex> = inner
        .slots_in(ProcState::Sleeping)
        .into_iter()
        .filter(|&idx| inner.procs[idx].channel == Some(chan))
        .collect();
    for &idx in &sleepers {
        make_runnable(inner, idx);
    }
    sleepers.len()
}

/// `Sleeping -> Runnable`, forgetting the channel.
pub(crate) fn make_runnable(inner: &mut TableInner, idx: SlotIndex) {
    inner.detach(idx, ProcState::Sleeping);
    inner.procs[idx].channel = None;
    inner.procs[idx].state = ProcState::Runnable;
    inner.attach(idx);
}

impl<P: Platform> ProcTable<P> {
    /// Block the process on `cpu` until `chan` is woken.
    ///
    /// `guard` is the caller's hold on `lock`; it is released once the
    /// table lock is held and re-acquired after the process runs again.
    /// `cpu` is updated to the CPU the process resumes on.
    pub fn sleep<'a, T>(
        &self,
        cpu: &mut CpuId,
        chan: Channel,
        lock: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        let inner = self.lock();
        drop(guard);
        self.park(cpu, chan, inner);
        lock.lock()
    }

    /// Sleep with the table lock itself as the condition lock.
    pub(crate) fn sleep_on_table<'a>(
        &'a self,
        cpu: &mut CpuId,
        chan: Channel,
        inner: MutexGuard<'a, TableInner>,
    ) -> MutexGuard<'a, TableInner> {
        self.park(cpu, chan, inner);
        self.lock()
    }

    /// `Running -> Sleeping` on `chan`, then switch away.
    fn park(&self, cpu: &mut CpuId, chan: Channel, mut inner: MutexGuard<'_, TableInner>) {
        let now = self.platform.ticks();
        let idx = inner.current(*cpu);
        inner.detach(idx, ProcState::Running);
        inner.charge_budget(idx, now);
        inner.procs[idx].channel = Some(chan);
        inner.procs[idx].state = ProcState::Sleeping;
        inner.attach(idx);
        log::trace!("[PROC] pid {} sleeping on {:?}", inner.procs[idx].pid, chan);
        self.sched(cpu, inner, now);
    }

    /// Wake every process sleeping on `chan`.
    pub fn wakeup(&self, chan: Channel) -> usize {
        let mut inner = self.lock();
        let woken = wakeup_locked(&mut inner, chan);
        inner.after_mutation();
        woken
    }

    /// Ticks since boot.
    pub fn uptime(&self) -> u64 {
        self.platform.ticks()
    }

    /// Timer interrupt hook: wake everything sleeping on the tick counter.
    ///
    /// The platform advances its counter before calling this.
    pub fn timer_tick(&self) {
        self.wakeup(Channel::Ticks);
    }

    /// Sleep the process on `cpu` for at least `n` ticks.
    ///
    /// Fails with `Killed` if the process is killed before the time is up.
    /// `cpu` is updated to the CPU the process resumes on.
    pub fn sleep_ticks(&self, cpu: &mut CpuId, n: u64) -> Result<()> {
        let start = self.platform.ticks();
        let mut inner = self.lock();
        loop {
            if self.platform.ticks().saturating_sub(start) >= n {
                return Ok(());
            }
            let idx = inner.current(*cpu);
            if inner.procs[idx].killed {
                return Err(ProcError::Killed);
            }
            inner = self.sleep_on_table(cpu, Channel::Ticks, inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use crate::process::Pid;
    use crate::tests::mock::{mock_table, run_root};

    #[test]
    fn test_wakeup_matches_channel_only() {
        let table = mock_table(4, 2, 100);
        let _root = run_root(&table, 0);

        drop(table.sleep_on_table(&mut 0, Channel::Addr(0x1000), table.lock()));
        assert_eq!(table.list_len(ProcState::Sleeping), 1);

        assert_eq!(table.wakeup(Channel::Addr(0x2000)), 0);
        assert_eq!(table.wakeup(Channel::Ticks), 0);
        assert_eq!(table.list_len(ProcState::Sleeping), 1);

        assert_eq!(table.wakeup(Channel::Addr(0x1000)), 1);
        assert_eq!(table.list_len(ProcState::Sleeping), 0);
        assert_eq!(table.list_len(ProcState::Runnable), 1);

        let inner = table.lock();
        let idx = inner.slots_in(ProcState::Runnable)[0];
        assert_eq!(inner.procs[idx].channel, None);
    }

    #[test]
    fn test_sleep_releases_condition_lock() {
        let table = mock_table(4, 2, 100);
        let _root = run_root(&table, 0);
        let cond = Mutex::new(5u32);

        let guard = cond.lock();
        let mut cpu = 0;
        let guard = table.sleep(&mut cpu, Channel::Addr(&cond as *const _ as usize), &cond, guard);
        assert_eq!(*guard, 5);
        assert_eq!(table.list_len(ProcState::Sleeping), 1);
    }

    #[test]
    fn test_sleep_ticks_zero_returns_immediately() {
        let table = mock_table(4, 2, 100);
        let _root = run_root(&table, 0);
        assert_eq!(table.sleep_ticks(&mut 0, 0), Ok(()));
        assert_eq!(table.list_len(ProcState::Running), 1);
    }

    #[test]
    fn test_sleep_ticks_killed() {
        let table = mock_table(4, 2, 100);
        let root = run_root(&table, 0);
        table.kill(root.pid()).unwrap();
        assert_eq!(table.sleep_ticks(&mut 0, 10), Err(ProcError::Killed));
    }

    #[test]
    fn test_sleep_ticks_resumes_on_another_cpu() {
        let table = Arc::new(mock_table(4, 2, 100));
        let root = run_root(&table, 0);
        let parked = Arc::new(Mutex::new(Some(root)));
        {
            // Time passes, CPU 0 takes the sleeper back and CPU 3 runs it.
            let t = table.clone();
            let parked = parked.clone();
            table.platform().on_switch(move |cpu| {
                let handoff = parked.lock().take().unwrap();
                t.reclaim(cpu, handoff);
                t.platform().advance(10);
                t.timer_tick();
                let handoff = t.dispatch(3).unwrap();
                *parked.lock() = Some(handoff);
                3
            });
        }

        let mut cpu = 0;
        assert_eq!(table.sleep_ticks(&mut cpu, 10), Ok(()));
        assert_eq!(cpu, 3);
        assert_eq!(table.current_pid(0), None);
        assert_eq!(table.current_pid(3), Some(Pid(1)));
    }

    #[test]
    fn test_sleep_reports_new_cpu() {
        let table = Arc::new(mock_table(4, 2, 100));
        let root = run_root(&table, 1);
        let parked = Arc::new(Mutex::new(Some(root)));
        let cond = Arc::new(Mutex::new(0u32));
        {
            let t = table.clone();
            let parked = parked.clone();
            let cond2 = cond.clone();
            table.platform().on_switch(move |cpu| {
                // The condition lock is free while the caller sleeps.
                *cond2.lock() = 7;
                let handoff = parked.lock().take().unwrap();
                t.reclaim(cpu, handoff);
                t.wakeup(Channel::Addr(0x80));
                *parked.lock() = t.dispatch(2);
                2
            });
        }

        let mut cpu = 1;
        let lock: &Mutex<u32> = &cond;
        let guard = table.sleep(&mut cpu, Channel::Addr(0x80), lock, lock.lock());
        assert_eq!(*guard, 7);
        assert_eq!(cpu, 2);
        assert_eq!(table.current_pid(2), Some(Pid(1)));
    }
}
