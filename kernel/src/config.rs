//! Kernel configuration constants.
//!
//! This module contains compile-time configuration for the process table
//! and the scheduler, plus the runtime [`TableConfig`] built from them.
//! Values here affect table capacity, the number of ready levels and the
//! aging cadence.

use core::fmt;

/// Number of PCB slots in the process table.
pub const NPROC: usize = 64;

/// Highest ready-queue priority. Priorities run from `0` (scheduled last)
/// to `MAX_PRIORITY` (scheduled first).
pub const MAX_PRIORITY: u32 = 6;

/// CPU-tick allowance at a priority level before demotion.
pub const DEFAULT_BUDGET: i64 = 300;

/// Ticks between two promotion (aging) sweeps.
pub const TICKS_TO_PROMOTE: u64 = 3000;

/// Maximum number of CPUs supported.
pub const MAX_CPUS: usize = 8;

/// Credentials given to the root process.
pub const DEFAULT_UID: u32 = 0;
pub const DEFAULT_GID: u32 = 0;

/// Largest accepted uid/gid.
pub const MAX_ID: u32 = 32767;

/// Hard cap on the number of entries a single snapshot may return.
pub const SNAPSHOT_LIMIT: usize = 64;

/// Page size (4 KB). The root process starts with one page of memory.
pub const PAGE_SIZE: u64 = 4096;

/// Maximum process name length in bytes.
pub const PROC_NAME_LEN: usize = 16;

/// Timer interrupt frequency in Hz. One tick is one millisecond.
pub const TIMER_FREQUENCY: u32 = 1000;

/// Run the consistency checker after every table mutation.
pub const DEBUG_CHECKS: bool = cfg!(any(debug_assertions, feature = "debug-checks"));

/// Runtime parameters of a process table.
///
/// `Default` uses the compile-time constants above; tests shrink the
/// capacity or the budget to reach edge cases quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// Number of PCB slots.
    pub capacity: usize,
    /// Highest priority level.
    pub max_priority: u32,
    /// Budget restored on demotion, promotion and `set_priority`.
    pub default_budget: i64,
    /// Promotion interval in ticks.
    pub ticks_to_promote: u64,
    /// Number of CPUs running a dispatcher.
    pub cpus: usize,
    /// Verify the list invariants after every mutation.
    pub debug_checks: bool,
}

impl TableConfig {
    /// Set the arena capacity.
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the highest priority level.
    pub const fn with_max_priority(mut self, max_priority: u32) -> Self {
        self.max_priority = max_priority;
        self
    }

    /// Set the per-level budget.
    pub const fn with_budget(mut self, budget: i64) -> Self {
        self.default_budget = budget;
        self
    }

    /// Set the promotion interval.
    pub const fn with_promote_interval(mut self, ticks: u64) -> Self {
        self.ticks_to_promote = ticks;
        self
    }

    /// Set the number of CPUs.
    pub const fn with_cpus(mut self, cpus: usize) -> Self {
        self.cpus = cpus;
        self
    }

    /// Check that the configuration describes a usable table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.cpus == 0 || self.cpus > MAX_CPUS {
            return Err(ConfigError::CpuCount(self.cpus));
        }
        if self.default_budget <= 0 {
            return Err(ConfigError::NonPositiveBudget(self.default_budget));
        }
        if self.ticks_to_promote == 0 {
            return Err(ConfigError::ZeroPromoteInterval);
        }
        Ok(())
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            capacity: NPROC,
            max_priority: MAX_PRIORITY,
            default_budget: DEFAULT_BUDGET,
            ticks_to_promote: TICKS_TO_PROMOTE,
            cpus: MAX_CPUS,
            debug_checks: DEBUG_CHECKS,
        }
    }
}

/// Rejected table configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The arena must hold at least one PCB.
    ZeroCapacity,
    /// CPU count outside `1..=MAX_CPUS`.
    CpuCount(usize),
    /// Budgets must be positive.
    NonPositiveBudget(i64),
    /// Promotion interval must be at least one tick.
    ZeroPromoteInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroCapacity => write!(f, "process table capacity is zero"),
            ConfigError::CpuCount(n) => write!(f, "cpu count {} outside 1..={}", n, MAX_CPUS),
            ConfigError::NonPositiveBudget(b) => write!(f, "budget {} is not positive", b),
            ConfigError::ZeroPromoteInterval => write!(f, "promotion interval is zero"),
        }
    }
}
