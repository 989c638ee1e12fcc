//! Scheduler Tests
//!
//! Dispatch order, budget demotion, promotion and priority management.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use super::mock::{mock_table, run_root, MockPlatform};
use crate::config::TableConfig;
use crate::error::ProcError;
use crate::process::{Channel, ListDump, Pid, ProcState, ProcTable};
use crate::scheduler::Handoff;

// ========================================
// Dispatch
// ========================================

#[test]
fn test_fifo_within_level() {
    let t = mock_table(8, 5, 100);
    let _root = run_root(&t, 0);
    let c1 = t.fork(0).unwrap();
    let c2 = t.fork(0).unwrap();
    let c3 = t.fork(0).unwrap();
    assert_eq!(t.ready_pids(5), [c1, c2, c3]);

    let h = t.dispatch(1).unwrap();
    assert_eq!(h.pid(), c1);
    t.yield_now(&mut 1);
    t.reclaim(1, h);
    assert_eq!(t.ready_pids(5), [c2, c3, c1]);

    assert_eq!(t.dispatch(1).map(|h| h.pid()), Some(c2));
}

#[test]
fn test_highest_priority_first() {
    let t = mock_table(8, 2, 100);
    let root = run_root(&t, 0);
    let low = t.fork(0).unwrap();
    let high = t.fork(0).unwrap();
    t.set_priority(low, 0).unwrap();

    t.yield_now(&mut 0);
    t.reclaim(0, root);
    assert_eq!(t.ready_pids(2), [high, Pid(1)]);
    assert_eq!(t.ready_pids(0), [low]);

    assert_eq!(t.dispatch(0).map(|h| h.pid()), Some(high));
    assert_eq!(t.dispatch(1).map(|h| h.pid()), Some(Pid(1)));
    assert_eq!(t.dispatch(2).map(|h| h.pid()), Some(low));
    assert!(t.dispatch(3).is_none());
}

#[test]
fn test_dispatch_marks_running() {
    let t = mock_table(4, 2, 100);
    t.platform().set_ticks(17);
    let root = run_root(&t, 0);

    let inner = t.lock();
    let pcb = &inner.procs[root.slot()];
    assert_eq!(pcb.state, ProcState::Running);
    assert_eq!(pcb.cpu_ticks_in, 17);
    assert_eq!(inner.running_on[0], Some(root.slot()));
}

#[test]
fn test_dispatch_skips_slot_still_switching() {
    let t = mock_table(8, 2, 100);
    let _root = run_root(&t, 0);
    let c1 = t.fork(0).unwrap();
    let h1 = t.dispatch(1).unwrap();
    assert_eq!(h1.pid(), c1);

    // c1 is back on the ready list but cpu 1 has not taken it back yet.
    t.yield_now(&mut 1);
    let c2 = t.fork(0).unwrap();
    assert_eq!(t.ready_pids(2), [c1, c2]);

    let h2 = t.dispatch(2).unwrap();
    assert_eq!(h2.pid(), c2);
    assert_eq!(t.ready_pids(2), [c1]);
    assert!(t.dispatch(3).is_none());

    t.reclaim(1, h1);
    assert_eq!(t.dispatch(3).map(|h| h.pid()), Some(c1));
    assert_eq!(t.verify(), Ok(()));
}

#[test]
fn test_other_cpu_dispatches_during_switch() {
    let t = Arc::new(mock_table(4, 2, 100));
    let root = run_root(&t, 0);
    let child = t.fork(0).unwrap();
    t.set_priority(child, 0).unwrap();

    let picked: Arc<Mutex<Vec<Option<Pid>>>> = Arc::new(Mutex::new(Vec::new()));
    let held: Arc<Mutex<Option<Handoff>>> = Arc::new(Mutex::new(None));
    {
        let t2 = t.clone();
        let picked = picked.clone();
        let held = held.clone();
        // CPU 1 runs a dispatcher pass while CPU 0 is mid-switch.
        t.platform().on_switch(move |cpu| {
            let h = t2.dispatch(1);
            picked.lock().push(h.as_ref().map(Handoff::pid));
            *held.lock() = h;
            cpu
        });
    }

    let mut cpu = 0;
    t.yield_now(&mut cpu);
    // The root outranks the child but is still on CPU 0.
    assert_eq!(*picked.lock(), [Some(child)]);
    assert_eq!(t.ready_pids(2), [root.pid()]);
    assert_eq!(t.verify(), Ok(()));

    t.reclaim(0, root);
    assert_eq!(t.dispatch(2).map(|h| h.pid()), Some(Pid(1)));
    assert_eq!(t.verify(), Ok(()));
}

#[test]
#[should_panic(expected = "still on it")]
fn test_dispatch_busy_cpu_panics() {
    let t = mock_table(4, 2, 100);
    let _root = run_root(&t, 0);
    t.fork(0).unwrap();
    t.dispatch(0);
}

#[test]
#[should_panic(expected = "does not match")]
fn test_mismatched_handoff_panics() {
    let t = mock_table(4, 2, 100);
    let _root = run_root(&t, 0);
    t.fork(0).unwrap();
    let other = t.dispatch(1).unwrap();
    t.reclaim(0, other);
}

#[test]
#[should_panic(expected = "still running")]
fn test_sched_while_running_panics() {
    let t = mock_table(4, 2, 100);
    let _root = run_root(&t, 0);
    let inner = t.lock();
    t.sched(&mut 0, inner, 0);
}

#[test]
fn test_scheduler_pass() {
    let t = Arc::new(mock_table(4, 2, 100));
    t.init_root("init", &[]).unwrap();
    {
        // The resumed process immediately yields.
        let t2 = t.clone();
        t.platform().on_resume(move |mut cpu, _| t2.yield_now(&mut cpu));
    }

    assert!(t.scheduler_pass(0));
    assert_eq!(t.platform().resumes(), 1);
    assert_eq!(t.platform().switches(), 1);
    assert_eq!(t.current_pid(0), None);
    assert_eq!(t.list_len(ProcState::Runnable), 1);
}

#[test]
fn test_idle_pass() {
    let t = mock_table(4, 2, 100);
    assert!(!t.scheduler_pass(0));
    assert_eq!(t.platform().resumes(), 0);
}

// ========================================
// Budget and demotion
// ========================================

#[test]
fn test_budget_exhaustion_demotes_on_yield() {
    let t = mock_table(4, 2, 100);
    let root = run_root(&t, 0);
    t.lock().procs[root.slot()].budget = 1;

    t.platform().advance(5);
    t.yield_now(&mut 0);

    let info = t.lookup(root.pid()).unwrap();
    assert_eq!(info.priority, 1);
    assert_eq!(info.budget, 100);
    assert_eq!(info.cpu_ticks, 5);
    assert_eq!(t.ready_pids(1), [root.pid()]);
    t.reclaim(0, root);
}

#[test]
fn test_sleep_charges_budget() {
    let t = mock_table(4, 2, 100);
    let root = run_root(&t, 0);

    t.platform().advance(30);
    drop(t.sleep_on_table(&mut 0, Channel::Ticks, t.lock()));

    let info = t.lookup(root.pid()).unwrap();
    assert_eq!(info.priority, 2);
    assert_eq!(info.budget, 70);
    assert_eq!(info.state, ProcState::Sleeping);
}

#[test]
fn test_exhausted_at_floor_stays_at_floor() {
    let t = mock_table(4, 2, 100);
    let root = run_root(&t, 0);
    t.set_priority(root.pid(), 0).unwrap();

    t.platform().advance(500);
    t.yield_now(&mut 0);

    let info = t.lookup(root.pid()).unwrap();
    assert_eq!(info.priority, 0);
    assert_eq!(info.budget, 100);
}

// ========================================
// Promotion
// ========================================

#[test]
fn test_promotion_sweep() {
    let t = mock_table(8, 2, 100);
    let root = run_root(&t, 0);
    let c1 = t.fork(0).unwrap();
    let c2 = t.fork(0).unwrap();
    t.set_priority(c1, 0).unwrap();
    t.set_priority(c2, 1).unwrap();
    t.set_priority(root.pid(), 1).unwrap();
    drop(t.sleep_on_table(&mut 0, Channel::Addr(1), t.lock()));
    t.reclaim(0, root);

    // c2 runs for a whole interval: demoted, then promoted right back.
    let h = t.dispatch(1).unwrap();
    assert_eq!(h.pid(), c2);
    t.platform().set_ticks(1000);
    t.yield_now(&mut 1);
    assert_eq!(t.ready_pids(0), [c1, c2]);
    t.reclaim(1, h);

    assert!(t.ready_pids(0).is_empty());
    assert_eq!(t.ready_pids(1), [c1, c2]);
    assert_eq!(t.get_priority(Pid(1)), Some(2));
    assert_eq!(t.lock().promote_at, 2000);
}

#[test]
fn test_promotion_bumps_running_in_place() {
    let t = mock_table(4, 2, 100);
    let root = run_root(&t, 0);
    t.set_priority(root.pid(), 0).unwrap();
    t.lock().procs[root.slot()].budget = 3;

    t.lock().promote();
    let info = t.lookup(root.pid()).unwrap();
    assert_eq!(info.state, ProcState::Running);
    assert_eq!(info.priority, 1);
    assert_eq!(info.budget, 100);
}

#[test]
fn test_promotion_leaves_top_level_alone() {
    let t = mock_table(4, 2, 100);
    let root = run_root(&t, 0);
    t.lock().procs[root.slot()].budget = 3;

    t.lock().promote();
    let info = t.lookup(root.pid()).unwrap();
    assert_eq!(info.priority, 2);
    assert_eq!(info.budget, 3);
}

#[test]
fn test_starvation_bound() {
    let t = mock_table(4, 3, 100);
    let _root = run_root(&t, 0);
    let child = t.fork(0).unwrap();
    t.set_priority(child, 0).unwrap();

    for expected in 1..=3 {
        t.lock().promote();
        assert_eq!(t.get_priority(child), Some(expected));
    }
    t.lock().promote();
    assert_eq!(t.get_priority(child), Some(3));
    assert_eq!(t.ready_pids(3), [child]);
}

#[test]
fn test_idle_pass_promotes_when_due() {
    let t = mock_table(4, 2, 100);
    t.platform().set_ticks(1500);
    assert!(!t.scheduler_pass(0));
    assert_eq!(t.lock().promote_at, 2500);
}

#[test]
fn test_single_level_never_promotes() {
    let config = TableConfig::default()
        .with_capacity(4)
        .with_max_priority(0)
        .with_cpus(1);
    let t = ProcTable::new(config, MockPlatform::new()).unwrap();
    let due = t.lock().promote_at;
    t.platform().set_ticks(due + 1);
    assert!(!t.scheduler_pass(0));
    assert_eq!(t.lock().promote_at, due);
}

// ========================================
// Priority management
// ========================================

#[test]
fn test_set_priority_range() {
    let t = mock_table(4, 2, 100);
    let root = run_root(&t, 0);
    assert_eq!(t.set_priority(root.pid(), 3), Err(ProcError::InvalidPriority));
    assert_eq!(t.set_priority(Pid(42), 1), Err(ProcError::NotFound));
    assert_eq!(t.set_priority(root.pid(), 0), Ok(()));
    assert_eq!(t.get_priority(root.pid()), Some(0));
    assert_eq!(t.get_priority(Pid(42)), None);
}

#[test]
fn test_set_priority_moves_runnable() {
    let t = mock_table(4, 2, 100);
    let _root = run_root(&t, 0);
    let child = t.fork(0).unwrap();
    t.lock().procs[1].budget = 5;

    t.set_priority(child, 1).unwrap();
    assert!(t.ready_pids(2).is_empty());
    assert_eq!(t.ready_pids(1), [child]);
    assert_eq!(t.lookup(child).unwrap().budget, 100);
}

#[test]
fn test_set_priority_skips_embryo_and_zombie() {
    let t = mock_table(4, 2, 100);
    let _root = run_root(&t, 0);
    let slot = t.allocate().unwrap();
    let embryo = t.lock().procs[slot].pid;
    assert_eq!(t.set_priority(embryo, 1), Err(ProcError::NotFound));
    assert_eq!(t.get_priority(embryo), Some(2));

    let zombie = t.fork(0).unwrap();
    let h = t.dispatch(1).unwrap();
    t.begin_exit(1);
    t.reclaim(1, h);
    assert_eq!(t.set_priority(zombie, 1), Err(ProcError::NotFound));
    assert_eq!(t.get_priority(zombie), Some(2));
}

// ========================================
// Dumps
// ========================================

#[test]
fn test_dump_lists() {
    let t = mock_table(4, 1, 100);
    let root = run_root(&t, 0);
    let child = t.fork(0).unwrap();
    t.set_priority(child, 0).unwrap();

    let mut out = String::new();
    t.dump_lists(&mut out, ListDump::READY | ListDump::FREE).unwrap();
    assert_eq!(
        out,
        "Ready List Processes:\n1: \n0: (2,100)\nFree List Size: 2 processes\n"
    );

    drop(t.sleep_on_table(&mut 0, Channel::Ticks, t.lock()));
    t.reclaim(0, root);
    let mut out = String::new();
    t.dump_lists(&mut out, ListDump::SLEEPING | ListDump::ZOMBIE).unwrap();
    assert_eq!(out, "Sleeping List Processes:\n1\nZombie List Processes:\n\n");
}

#[test]
fn test_dump_never_blocks() {
    let t = mock_table(4, 2, 100);
    let _root = run_root(&t, 0);

    let mut out = String::new();
    t.dump(&mut out).unwrap();
    assert!(out.starts_with("\nPID\tName"));
    assert!(out.contains("init"));
    assert!(out.contains("run   "));

    let _held = t.lock();
    let mut out = String::new();
    t.dump(&mut out).unwrap();
    assert_eq!(out, "process table busy\n");
}

#[test]
fn test_snapshot_limits() {
    let t = mock_table(8, 2, 100);
    let _root = run_root(&t, 0);
    for _ in 0..4 {
        t.fork(0).unwrap();
    }
    let _embryo = t.allocate().unwrap();

    assert_eq!(t.snapshot(0).len(), 0);
    assert_eq!(t.snapshot(3).len(), 3);
    let all = t.snapshot(1000);
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].pid, Pid(1));
    assert_eq!(all[0].ppid, Pid(1));
    assert_eq!(all[1].ppid, Pid(1));
    assert!(all.iter().all(|p| p.state != ProcState::Embryo));
}
