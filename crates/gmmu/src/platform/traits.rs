// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Collaborator interfaces consumed by the IOMMU core.
//!
//! The core never talks to hardware, the allocator or the scheduler
//! directly. Every such interaction goes through one of these traits so the
//! same logic runs against the real driver stack and against
//! [`MockPlatform`](super::MockPlatform) on the host.
//!
//! All methods take `&self`: the fault handler runs concurrently with other
//! callers and implementations serialize internally where needed.

use gmmu_abi::{FaultDirection, Gpuaddr, Paddr, PagetableId, Pid};

use crate::config::MAX_CLOCKS;
use crate::error::PlatformError;
use crate::memdesc::{AllocationEntry, FreedEntry, Prot, SgEntry};

/// Opaque handle of one context device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceHandle(pub u32);

/// Opaque handle of one hardware translation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainHandle(pub u32);

/// Opaque handle of one clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockHandle(pub u32);

/// Clocks gating one unit, in enable order.
pub type ClockSet = [Option<ClockHandle>; MAX_CLOCKS];

/// Domain attributes requested at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainLayout {
    /// Client tag.
    pub client: &'static str,
    /// Content-protection domain.
    pub secure: bool,
    /// Page-table walks are cacheable.
    pub cacheable: bool,
}

/// Client tag of ordinary domains.
pub const CLIENT_NORMAL: &str = "gmmu";

/// Client tag of the secure domain.
pub const CLIENT_SECURE: &str = "gmmu_secure";

/// A single failed clock enable attempt.
///
/// Retryable; the clock component decides when retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockFailure;

/// Register window access.
pub trait RegisterIo {
    /// Map a unit's register window, returning the base used for accesses.
    fn map_window(&self, phys: Paddr, size: u64) -> Result<u64, PlatformError>;

    /// Unmap a window returned by [`map_window`](Self::map_window).
    fn unmap_window(&self, base: u64, size: u64);

    /// Read a 32-bit register.
    fn read32(&self, addr: u64) -> u32;

    /// Write a 32-bit register.
    fn write32(&self, addr: u64, value: u32);

    /// Read a 64-bit register.
    fn read64(&self, addr: u64) -> u64;

    /// Write a 64-bit register.
    fn write64(&self, addr: u64, value: u64);

    /// Full memory barrier between dependent register writes.
    fn barrier(&self);
}

/// Hardware translation domains.
pub trait DomainOps {
    /// Create a new domain.
    fn create_domain(&self, layout: DomainLayout) -> Result<DomainHandle, PlatformError>;

    /// Release a domain.
    fn destroy_domain(&self, domain: DomainHandle);

    /// Route the domain's translation faults to the core's fault handler.
    fn register_fault_handler(&self, domain: DomainHandle) -> Result<(), PlatformError>;

    /// Stop routing the domain's faults.
    fn unregister_fault_handler(&self, domain: DomainHandle);

    /// Bind a domain to a context device.
    fn attach(&self, domain: DomainHandle, device: DeviceHandle) -> Result<(), PlatformError>;

    /// Unbind a domain from a context device.
    fn detach(&self, domain: DomainHandle, device: DeviceHandle);

    /// Map a scatter list contiguously at `iova`.
    ///
    /// No entry may exceed 64 KB.
    fn map_range(
        &self,
        domain: DomainHandle,
        iova: Gpuaddr,
        sg: &[SgEntry],
        prot: Prot,
    ) -> Result<(), PlatformError>;

    /// Map one physically contiguous range.
    fn map(
        &self,
        domain: DomainHandle,
        iova: Gpuaddr,
        paddr: Paddr,
        size: u64,
        prot: Prot,
    ) -> Result<(), PlatformError>;

    /// Unmap a range.
    fn unmap_range(
        &self,
        domain: DomainHandle,
        iova: Gpuaddr,
        size: u64,
    ) -> Result<(), PlatformError>;

    /// Physical root of the domain's translation table.
    fn root_address(&self, domain: DomainHandle) -> u64;

    /// Resolve a context device by name.
    fn context_device(&self, name: &str) -> Option<DeviceHandle>;

    /// Clocks gating the unit that owns `device`.
    fn unit_clocks(&self, device: DeviceHandle) -> ClockSet;
}

/// Clock control.
pub trait ClockOps {
    /// Prepare and enable a clock once.
    fn prepare_enable(&self, clock: ClockHandle) -> Result<(), ClockFailure>;

    /// Disable and unprepare a clock.
    fn disable_unprepare(&self, clock: ClockHandle);
}

/// The GPU device the units belong to.
pub trait GpuDevice {
    /// Spin until the GPU is idle, bounded.
    fn spin_idle(&self) -> Result<(), PlatformError>;

    /// Full device idle (drains the dispatcher).
    fn idle(&self) -> Result<(), PlatformError>;

    /// Take an active reference, keeping the device powered.
    fn active_count_get(&self) -> Result<(), PlatformError>;

    /// Drop an active reference.
    fn active_count_put(&self);

    /// Report a page fault to the scheduler's recovery path.
    fn report_page_fault(&self);

    /// Move the device into the "aware" power state.
    fn set_power_aware(&self);

    /// Id of the context currently scheduled on the GPU.
    fn current_context_id(&self) -> u32;

    /// Flag a scheduled context as having hit a page fault.
    fn mark_context_faulted(&self, context_id: u32);

    /// Checks if the caller runs where blocking is disallowed.
    fn in_atomic_context(&self) -> bool;

    /// GPU address and size of the current ring buffer.
    fn ringbuffer(&self) -> (Gpuaddr, u64);

    /// Monotonic time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Busy-wait hint.
    fn cpu_relax(&self);
}

/// Read-only view of the allocator's per-process state.
pub trait ProcessDirectory {
    /// Pagetable whose root matches `root`.
    fn pagetable_id_from_root(&self, root: u64) -> PagetableId;

    /// Visit every live process with its allocations sorted by address.
    ///
    /// Each process's index lock is held only for its own callback.
    fn for_each_process(&self, visit: &mut dyn FnMut(Pid, &[AllocationEntry]));

    /// Recently freed allocation of `pid` covering `addr`.
    fn recently_freed(&self, pid: Pid, addr: Gpuaddr) -> Option<FreedEntry>;
}

/// Trace event sink.
pub trait TraceSink {
    /// Record a page fault.
    fn trace_pagefault(&self, addr: Gpuaddr, pagetable: PagetableId, direction: FaultDirection);
}

/// Memory collaborators: pages, secure pool, global mappings.
pub trait MemoryOps {
    /// Allocate one zeroed page.
    fn alloc_page(&self) -> Result<Paddr, PlatformError>;

    /// Free a page from [`alloc_page`](Self::alloc_page).
    fn free_page(&self, paddr: Paddr);

    /// Allocate physically contiguous secure memory.
    fn alloc_secure(&self, size: u64) -> Result<Paddr, PlatformError>;

    /// Free secure memory.
    fn free_secure(&self, paddr: Paddr, size: u64);

    /// Map physical memory into every pagetable's global region.
    fn map_global(&self, paddr: Paddr, size: u64) -> Result<Gpuaddr, PlatformError>;

    /// Remove a global mapping.
    fn unmap_global(&self, gpuaddr: Gpuaddr, size: u64);
}

/// Host half of the cross-core lock, provided by the platform.
pub trait RemoteLock {
    /// Physical backing of the shared lock variables, if supported.
    fn lock_region(&self) -> Option<Paddr>;

    /// Acquire the lock against the GPU.
    fn acquire(&self);

    /// Release the lock.
    fn release(&self);
}

/// Everything the core consumes from its environment.
pub trait Platform:
    RegisterIo + DomainOps + ClockOps + GpuDevice + ProcessDirectory + TraceSink + MemoryOps + RemoteLock
{
}

impl<T> Platform for T where
    T: RegisterIo
        + DomainOps
        + ClockOps
        + GpuDevice
        + ProcessDirectory
        + TraceSink
        + MemoryOps
        + RemoteLock
{
}
