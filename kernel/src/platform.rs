//! Platform services consumed by the process table.
//!
//! The process core never touches page tables, registers or the file
//! system itself. Everything it needs from the rest of the kernel goes
//! through [`Platform`]:
//!
//! - the monotonic tick counter
//! - kernel stacks and address spaces (create / copy / free)
//! - open-file duplication and closing
//! - the context-switch handoff between a CPU's dispatcher and a process
//!
//! Resources are passed around as opaque handles. The table only stores
//! them and hands each one back exactly once.

use crate::scheduler::Handoff;

/// Index of a processing unit.
pub type CpuId = usize;

/// Kernel stack of a process (base address).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStack(pub u64);

/// Address space of a process (page table root).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace(pub u64);

/// Reference to an open file or inode held by a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(pub u64);

/// Machine services used by the process table.
///
/// Allocation failures are ordinary recoverable conditions: return `None`
/// and the table rolls the half-built process back.
pub trait Platform: Send + Sync {
    // ==================== Time ====================

    /// Monotonic tick counter.
    fn ticks(&self) -> u64;

    // ==================== Memory ====================

    /// Allocate a kernel stack.
    fn alloc_kstack(&self) -> Option<KernelStack>;

    /// Release a kernel stack.
    fn free_kstack(&self, stack: KernelStack);

    /// Build the root process's address space from its initial image.
    fn setup_address_space(&self, image: &[u8]) -> Option<AddressSpace>;

    /// Duplicate the first `size` bytes of an address space.
    fn copy_address_space(&self, from: AddressSpace, size: u64) -> Option<AddressSpace>;

    /// Tear down an address space.
    fn free_address_space(&self, space: AddressSpace);

    // ==================== Files ====================

    /// Take another reference on an open file.
    fn dup_file(&self, file: FileHandle) -> FileHandle;

    /// Drop a reference on an open file.
    fn close_file(&self, file: FileHandle);

    // ==================== Context switch ====================

    /// Dispatcher side: run the process named by `handoff` on `cpu`.
    ///
    /// Blocks until the process gives the processor back (yield, sleep,
    /// exit) and returns the capability to the dispatcher. The process
    /// must not start running before its previous `switch_to_scheduler`
    /// has finished saving its context.
    fn resume(&self, cpu: CpuId, handoff: Handoff) -> Handoff;

    /// Process side: save the running process's context and return to
    /// the dispatcher of `cpu`.
    ///
    /// Returns when the process is next resumed, with the CPU it was
    /// resumed on. That need not be `cpu`.
    fn switch_to_scheduler(&self, cpu: CpuId) -> CpuId;

    /// Enable interrupts on `cpu`.
    fn enable_interrupts(&self, _cpu: CpuId) {}

    /// Halt `cpu` until the next interrupt.
    fn wait_for_interrupt(&self, cpu: CpuId);
}
