// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock platform for host testing.
//!
//! [`MockPlatform`] implements every collaborator trait over in-memory
//! state: a sparse register file, domains with their mappings, clocks with
//! failure injection, a simulated millisecond clock that advances on
//! `cpu_relax`, a process directory and an event journal recording every
//! hardware-visible call in order.

use std::collections::BTreeMap;
use std::string::String;
use std::sync::Arc;
use std::vec::Vec;

use gmmu_abi::layout::{GLOBAL_MEM_BASE, PAGE_SIZE, SZ_1M};
use gmmu_abi::{FaultDirection, Gpuaddr, Paddr, PagetableId, Pid};
use spin::Mutex;

use super::traits::{
    ClockFailure, ClockHandle, ClockOps, ClockSet, DeviceHandle, DomainHandle, DomainLayout,
    DomainOps, GpuDevice, MemoryOps, ProcessDirectory, RegisterIo, RemoteLock, TraceSink,
};
use crate::error::PlatformError;
use crate::memdesc::{AllocationEntry, FreedEntry, Prot, SgEntry};

/// Base handed out for the first mapped register window.
const WINDOW_BASE: u64 = 0x1_0000_0000;

/// Spacing between mapped register windows.
const WINDOW_STRIDE: u64 = 0x10_0000;

/// Base of simulated domain roots.
const ROOT_BASE: u64 = 0x4000_0000;

/// First physical page handed out by `alloc_page`.
const PAGE_POOL_BASE: u64 = 0x9000_0000;

/// First physical address handed out by `alloc_secure`.
const SECURE_POOL_BASE: u64 = 0xA000_0000;

/// Low TTBR0 bits set on every simulated root (outside the address mask).
const ROOT_ATTR_BITS: u64 = 0x1B;

/// One hardware-visible call, in journal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    /// 32-bit register read.
    Read32(u64),
    /// 32-bit register write.
    Write32(u64, u32),
    /// 64-bit register read.
    Read64(u64),
    /// 64-bit register write.
    Write64(u64, u64),
    /// Memory barrier.
    Barrier,
    /// Clock enable attempt.
    ClockEnable(ClockHandle),
    /// Clock disable.
    ClockDisable(ClockHandle),
    /// Host side of the cross-core lock taken.
    LockAcquire,
    /// Host side of the cross-core lock dropped.
    LockRelease,
    /// Bounded spin for GPU idle.
    SpinIdle,
    /// Full device idle.
    Idle,
    /// Domain bound to a device.
    Attach(DomainHandle, DeviceHandle),
    /// Domain unbound from a device.
    Detach(DomainHandle, DeviceHandle),
    /// Range mapped.
    Map(DomainHandle, Gpuaddr, u64),
    /// Range unmapped.
    Unmap(DomainHandle, Gpuaddr, u64),
}

impl MockEvent {
    /// Checks if the event touched a register.
    #[must_use]
    pub const fn is_register_access(&self) -> bool {
        matches!(
            self,
            Self::Read32(_) | Self::Write32(..) | Self::Read64(_) | Self::Write64(..)
        )
    }
}

/// One mapped range of a mock domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockMapping {
    /// Physical backing.
    pub paddr: Paddr,
    /// Size in bytes.
    pub size: u64,
    /// Protection.
    pub prot: Prot,
}

/// State of one mock domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDomain {
    /// Attributes requested at creation.
    pub layout: DomainLayout,
    /// Raw root address, including attribute bits.
    pub root: u64,
    /// Fault handler registered.
    pub fault_handler: bool,
    /// Mappings keyed by GPU address.
    pub mappings: BTreeMap<u64, MockMapping>,
}

#[derive(Debug, Default)]
struct Injected {
    create_domain: Option<PlatformError>,
    secure_domain: Option<PlatformError>,
    attach: Option<PlatformError>,
    map_range: Option<PlatformError>,
    map: Option<PlatformError>,
    unmap_range: Option<PlatformError>,
    map_window: Option<PlatformError>,
    map_global: Option<PlatformError>,
    alloc_page: Option<PlatformError>,
    alloc_secure: Option<PlatformError>,
    spin_idle: Option<PlatformError>,
    idle: Option<PlatformError>,
    active: Option<PlatformError>,
    /// Remaining failing attempts per clock.
    clocks: BTreeMap<ClockHandle, usize>,
}

#[derive(Debug, Default)]
struct State {
    regs: BTreeMap<u64, u64>,
    pinned: BTreeMap<u64, u64>,
    journal: Vec<MockEvent>,
    windows: BTreeMap<u64, u64>,
    next_window: u64,
    contexts: BTreeMap<String, DeviceHandle>,
    domains: BTreeMap<DomainHandle, MockDomain>,
    next_domain: u32,
    attached: BTreeMap<DeviceHandle, DomainHandle>,
    unit_clocks: ClockSet,
    clock_enabled: BTreeMap<ClockHandle, i32>,
    now_ms: u64,
    relax_step_ms: u64,
    active: i32,
    page_faults: usize,
    power_aware: usize,
    current_context: u32,
    faulted_contexts: Vec<u32>,
    atomic: bool,
    ringbuffer: (Gpuaddr, u64),
    named_roots: BTreeMap<u64, PagetableId>,
    processes: Vec<(Pid, Vec<AllocationEntry>)>,
    freed: Vec<FreedEntry>,
    traces: Vec<(Gpuaddr, PagetableId, FaultDirection)>,
    pages: Vec<Paddr>,
    next_page: u64,
    secure: BTreeMap<Paddr, u64>,
    next_secure: u64,
    globals: BTreeMap<Gpuaddr, (Paddr, u64)>,
    next_global: u64,
    lock_region: Option<Paddr>,
    lock_depth: i32,
    inject: Injected,
}

/// In-memory platform implementing every collaborator trait.
///
/// All configuration methods take `&self`, so a platform can be reconfigured
/// after it was moved into an [`MmuContext`](crate::MmuContext) and reached
/// through [`platform()`](crate::MmuContext::platform). Clones share state,
/// which keeps a platform observable after a failed bring-up consumed it.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<State>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create a platform with four clocks per unit and an 8 page ring buffer.
    #[must_use]
    pub fn new() -> Self {
        let state = State {
            next_window: WINDOW_BASE,
            unit_clocks: [
                Some(ClockHandle(1)),
                Some(ClockHandle(2)),
                Some(ClockHandle(3)),
                Some(ClockHandle(4)),
            ],
            relax_step_ms: 1,
            ringbuffer: (Gpuaddr::new(GLOBAL_MEM_BASE + 0x10_0000), 8 * PAGE_SIZE),
            next_page: PAGE_POOL_BASE,
            next_secure: SECURE_POOL_BASE,
            next_global: GLOBAL_MEM_BASE,
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Register a context device under `name`.
    pub fn add_context(&self, name: &str, handle: DeviceHandle) {
        self.state.lock().contexts.insert(String::from(name), handle);
    }

    /// Set the clocks reported for every unit.
    pub fn set_unit_clocks(&self, clocks: ClockSet) {
        self.state.lock().unit_clocks = clocks;
    }

    /// Make the next `attempts` enables of `clock` fail.
    pub fn fail_clock(&self, clock: ClockHandle, attempts: usize) {
        self.state.lock().inject.clocks.insert(clock, attempts);
    }

    /// Provide a cross-core lock region.
    pub fn set_lock_region(&self, region: Option<Paddr>) {
        self.state.lock().lock_region = region;
    }

    /// Set the ring buffer reported to the TLB lock-down.
    pub fn set_ringbuffer(&self, gpuaddr: Gpuaddr, size: u64) {
        self.state.lock().ringbuffer = (gpuaddr, size);
    }

    /// Preload a register value.
    pub fn set_register(&self, addr: u64, value: u64) {
        self.state.lock().regs.insert(addr, value);
    }

    /// Force a register to always read `value`; writes are ignored.
    pub fn pin_register(&self, addr: u64, value: u64) {
        self.state.lock().pinned.insert(addr, value);
    }

    /// Name the pagetable whose masked root is `root`.
    pub fn name_root(&self, root: u64, pt: PagetableId) {
        self.state
            .lock()
            .named_roots
            .insert(root & gmmu_abi::regs::TTBR0_ADDR_MASK, pt);
    }

    /// Add a process with its allocations (sorted by address).
    pub fn add_process(&self, pid: Pid, mut entries: Vec<AllocationEntry>) {
        entries.sort_by_key(|e| e.gpuaddr);
        self.state.lock().processes.push((pid, entries));
    }

    /// Remember a freed allocation.
    pub fn add_freed(&self, entry: FreedEntry) {
        self.state.lock().freed.push(entry);
    }

    /// Report the scheduled context id.
    pub fn set_current_context(&self, id: u32) {
        self.state.lock().current_context = id;
    }

    /// Pretend callers run where blocking is disallowed.
    pub fn set_atomic(&self, atomic: bool) {
        self.state.lock().atomic = atomic;
    }

    /// Milliseconds `cpu_relax` advances the clock by.
    pub fn set_relax_step(&self, ms: u64) {
        self.state.lock().relax_step_ms = ms;
    }

    /// Fail domain creation.
    pub fn fail_create_domain(&self, err: Option<PlatformError>) {
        self.state.lock().inject.create_domain = err;
    }

    /// Fail creation of secure domains only.
    pub fn fail_secure_domain(&self, err: Option<PlatformError>) {
        self.state.lock().inject.secure_domain = err;
    }

    /// Fail attach.
    pub fn fail_attach(&self, err: Option<PlatformError>) {
        self.state.lock().inject.attach = err;
    }

    /// Fail scatter list maps.
    pub fn fail_map_range(&self, err: Option<PlatformError>) {
        self.state.lock().inject.map_range = err;
    }

    /// Fail single range maps (guards).
    pub fn fail_map(&self, err: Option<PlatformError>) {
        self.state.lock().inject.map = err;
    }

    /// Fail unmaps.
    pub fn fail_unmap_range(&self, err: Option<PlatformError>) {
        self.state.lock().inject.unmap_range = err;
    }

    /// Fail register window maps.
    pub fn fail_map_window(&self, err: Option<PlatformError>) {
        self.state.lock().inject.map_window = err;
    }

    /// Fail global maps.
    pub fn fail_map_global(&self, err: Option<PlatformError>) {
        self.state.lock().inject.map_global = err;
    }

    /// Fail page allocation.
    pub fn fail_alloc_page(&self, err: Option<PlatformError>) {
        self.state.lock().inject.alloc_page = err;
    }

    /// Fail secure allocation.
    pub fn fail_alloc_secure(&self, err: Option<PlatformError>) {
        self.state.lock().inject.alloc_secure = err;
    }

    /// Fail the bounded idle spin.
    pub fn fail_spin_idle(&self, err: Option<PlatformError>) {
        self.state.lock().inject.spin_idle = err;
    }

    /// Fail the full device idle.
    pub fn fail_idle(&self, err: Option<PlatformError>) {
        self.state.lock().inject.idle = err;
    }

    /// Fail active reference acquisition.
    pub fn fail_active(&self, err: Option<PlatformError>) {
        self.state.lock().inject.active = err;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Events recorded so far.
    #[must_use]
    pub fn journal(&self) -> Vec<MockEvent> {
        self.state.lock().journal.clone()
    }

    /// Drop recorded events.
    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    /// Number of register reads and writes recorded.
    #[must_use]
    pub fn register_accesses(&self) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|e| e.is_register_access())
            .count()
    }

    /// Current value of a register.
    #[must_use]
    pub fn register(&self, addr: u64) -> u64 {
        let s = self.state.lock();
        s.pinned
            .get(&addr)
            .or_else(|| s.regs.get(&addr))
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of a domain.
    #[must_use]
    pub fn domain(&self, domain: DomainHandle) -> Option<MockDomain> {
        self.state.lock().domains.get(&domain).cloned()
    }

    /// Number of live domains.
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.state.lock().domains.len()
    }

    /// Mapping covering `addr` in `domain`.
    #[must_use]
    pub fn mapping_at(&self, domain: DomainHandle, addr: Gpuaddr) -> Option<MockMapping> {
        let s = self.state.lock();
        let dom = s.domains.get(&domain)?;
        dom.mappings
            .range(..=addr.as_u64())
            .next_back()
            .filter(|(iova, m)| addr.as_u64() < *iova + m.size)
            .map(|(_, m)| *m)
    }

    /// Domain bound to a device.
    #[must_use]
    pub fn attached_domain(&self, device: DeviceHandle) -> Option<DomainHandle> {
        self.state.lock().attached.get(&device).copied()
    }

    /// Enable count of a clock.
    #[must_use]
    pub fn clock_enabled(&self, clock: ClockHandle) -> i32 {
        self.state
            .lock()
            .clock_enabled
            .get(&clock)
            .copied()
            .unwrap_or(0)
    }

    /// Outstanding active references.
    #[must_use]
    pub fn active_refs(&self) -> i32 {
        self.state.lock().active
    }

    /// Page faults reported to recovery.
    #[must_use]
    pub fn page_faults_reported(&self) -> usize {
        self.state.lock().page_faults
    }

    /// Transitions into the aware power state.
    #[must_use]
    pub fn power_aware_count(&self) -> usize {
        self.state.lock().power_aware
    }

    /// Contexts marked as faulted.
    #[must_use]
    pub fn faulted_contexts(&self) -> Vec<u32> {
        self.state.lock().faulted_contexts.clone()
    }

    /// Trace records emitted.
    #[must_use]
    pub fn traces(&self) -> Vec<(Gpuaddr, PagetableId, FaultDirection)> {
        self.state.lock().traces.clone()
    }

    /// Pages currently allocated.
    #[must_use]
    pub fn live_pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Secure regions currently allocated.
    #[must_use]
    pub fn live_secure(&self) -> usize {
        self.state.lock().secure.len()
    }

    /// Global mappings currently present.
    #[must_use]
    pub fn live_globals(&self) -> usize {
        self.state.lock().globals.len()
    }

    /// Register windows currently mapped.
    #[must_use]
    pub fn live_windows(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Depth of the host side of the cross-core lock.
    #[must_use]
    pub fn lock_depth(&self) -> i32 {
        self.state.lock().lock_depth
    }

    /// Simulated time.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.state.lock().now_ms
    }

    fn record(&self, event: MockEvent) {
        self.state.lock().journal.push(event);
    }
}

impl RegisterIo for MockPlatform {
    fn map_window(&self, _phys: Paddr, size: u64) -> Result<u64, PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.map_window {
            return Err(e);
        }
        let base = s.next_window;
        s.next_window += WINDOW_STRIDE.max(size);
        s.windows.insert(base, size);
        Ok(base)
    }

    fn unmap_window(&self, base: u64, _size: u64) {
        self.state.lock().windows.remove(&base);
    }

    fn read32(&self, addr: u64) -> u32 {
        self.record(MockEvent::Read32(addr));
        self.register(addr) as u32
    }

    fn write32(&self, addr: u64, value: u32) {
        let mut s = self.state.lock();
        s.journal.push(MockEvent::Write32(addr, value));
        s.regs.insert(addr, u64::from(value));
    }

    fn read64(&self, addr: u64) -> u64 {
        self.record(MockEvent::Read64(addr));
        self.register(addr)
    }

    fn write64(&self, addr: u64, value: u64) {
        let mut s = self.state.lock();
        s.journal.push(MockEvent::Write64(addr, value));
        s.regs.insert(addr, value);
    }

    fn barrier(&self) {
        self.record(MockEvent::Barrier);
    }
}

impl DomainOps for MockPlatform {
    fn create_domain(&self, layout: DomainLayout) -> Result<DomainHandle, PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.create_domain {
            return Err(e);
        }
        if let Some(e) = s.inject.secure_domain.filter(|_| layout.secure) {
            return Err(e);
        }
        s.next_domain += 1;
        let handle = DomainHandle(s.next_domain);
        let root = ROOT_BASE + u64::from(handle.0) * 0x4000 + ROOT_ATTR_BITS;
        s.domains.insert(
            handle,
            MockDomain {
                layout,
                root,
                fault_handler: false,
                mappings: BTreeMap::new(),
            },
        );
        Ok(handle)
    }

    fn destroy_domain(&self, domain: DomainHandle) {
        let mut s = self.state.lock();
        s.domains.remove(&domain);
        s.attached.retain(|_, d| *d != domain);
    }

    fn register_fault_handler(&self, domain: DomainHandle) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        let dom = s
            .domains
            .get_mut(&domain)
            .ok_or(PlatformError::new(-22, "no such domain"))?;
        dom.fault_handler = true;
        Ok(())
    }

    fn unregister_fault_handler(&self, domain: DomainHandle) {
        if let Some(dom) = self.state.lock().domains.get_mut(&domain) {
            dom.fault_handler = false;
        }
    }

    fn attach(&self, domain: DomainHandle, device: DeviceHandle) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.attach {
            return Err(e);
        }
        if !s.domains.contains_key(&domain) {
            return Err(PlatformError::new(-22, "no such domain"));
        }
        s.attached.insert(device, domain);
        s.journal.push(MockEvent::Attach(domain, device));
        Ok(())
    }

    fn detach(&self, domain: DomainHandle, device: DeviceHandle) {
        let mut s = self.state.lock();
        s.attached.remove(&device);
        s.journal.push(MockEvent::Detach(domain, device));
    }

    fn map_range(
        &self,
        domain: DomainHandle,
        iova: Gpuaddr,
        sg: &[SgEntry],
        prot: Prot,
    ) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.map_range {
            return Err(e);
        }
        if sg.iter().any(|e| e.len >= SZ_1M) {
            return Err(PlatformError::new(-22, "scatter entry too large"));
        }
        let total: u64 = sg.iter().map(|e| e.len).sum();
        let dom = s
            .domains
            .get_mut(&domain)
            .ok_or(PlatformError::new(-22, "no such domain"))?;
        let mut addr = iova.as_u64();
        for entry in sg {
            dom.mappings.insert(
                addr,
                MockMapping {
                    paddr: entry.paddr,
                    size: entry.len,
                    prot,
                },
            );
            addr += entry.len;
        }
        s.journal.push(MockEvent::Map(domain, iova, total));
        Ok(())
    }

    fn map(
        &self,
        domain: DomainHandle,
        iova: Gpuaddr,
        paddr: Paddr,
        size: u64,
        prot: Prot,
    ) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.map {
            return Err(e);
        }
        let dom = s
            .domains
            .get_mut(&domain)
            .ok_or(PlatformError::new(-22, "no such domain"))?;
        dom.mappings
            .insert(iova.as_u64(), MockMapping { paddr, size, prot });
        s.journal.push(MockEvent::Map(domain, iova, size));
        Ok(())
    }

    fn unmap_range(
        &self,
        domain: DomainHandle,
        iova: Gpuaddr,
        size: u64,
    ) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.unmap_range {
            return Err(e);
        }
        let dom = s
            .domains
            .get_mut(&domain)
            .ok_or(PlatformError::new(-22, "no such domain"))?;
        let start = iova.as_u64();
        dom.mappings.retain(|addr, _| *addr < start || *addr >= start + size);
        s.journal.push(MockEvent::Unmap(domain, iova, size));
        Ok(())
    }

    fn root_address(&self, domain: DomainHandle) -> u64 {
        self.state
            .lock()
            .domains
            .get(&domain)
            .map_or(0, |d| d.root)
    }

    fn context_device(&self, name: &str) -> Option<DeviceHandle> {
        self.state.lock().contexts.get(name).copied()
    }

    fn unit_clocks(&self, _device: DeviceHandle) -> ClockSet {
        self.state.lock().unit_clocks
    }
}

impl ClockOps for MockPlatform {
    fn prepare_enable(&self, clock: ClockHandle) -> Result<(), ClockFailure> {
        let mut s = self.state.lock();
        s.journal.push(MockEvent::ClockEnable(clock));
        if let Some(remaining) = s.inject.clocks.get_mut(&clock) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClockFailure);
            }
        }
        *s.clock_enabled.entry(clock).or_insert(0) += 1;
        Ok(())
    }

    fn disable_unprepare(&self, clock: ClockHandle) {
        let mut s = self.state.lock();
        s.journal.push(MockEvent::ClockDisable(clock));
        *s.clock_enabled.entry(clock).or_insert(0) -= 1;
    }
}

impl GpuDevice for MockPlatform {
    fn spin_idle(&self) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        s.journal.push(MockEvent::SpinIdle);
        s.inject.spin_idle.map_or(Ok(()), Err)
    }

    fn idle(&self) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        s.journal.push(MockEvent::Idle);
        s.inject.idle.map_or(Ok(()), Err)
    }

    fn active_count_get(&self) -> Result<(), PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.active {
            return Err(e);
        }
        s.active += 1;
        Ok(())
    }

    fn active_count_put(&self) {
        self.state.lock().active -= 1;
    }

    fn report_page_fault(&self) {
        self.state.lock().page_faults += 1;
    }

    fn set_power_aware(&self) {
        self.state.lock().power_aware += 1;
    }

    fn current_context_id(&self) -> u32 {
        self.state.lock().current_context
    }

    fn mark_context_faulted(&self, context_id: u32) {
        self.state.lock().faulted_contexts.push(context_id);
    }

    fn in_atomic_context(&self) -> bool {
        self.state.lock().atomic
    }

    fn ringbuffer(&self) -> (Gpuaddr, u64) {
        self.state.lock().ringbuffer
    }

    fn now_ms(&self) -> u64 {
        self.state.lock().now_ms
    }

    fn cpu_relax(&self) {
        let mut s = self.state.lock();
        let step = s.relax_step_ms;
        s.now_ms += step;
    }
}

impl ProcessDirectory for MockPlatform {
    fn pagetable_id_from_root(&self, root: u64) -> PagetableId {
        self.state
            .lock()
            .named_roots
            .get(&(root & gmmu_abi::regs::TTBR0_ADDR_MASK))
            .copied()
            .unwrap_or(PagetableId::GLOBAL)
    }

    fn for_each_process(&self, visit: &mut dyn FnMut(Pid, &[AllocationEntry])) {
        let processes = self.state.lock().processes.clone();
        for (pid, entries) in &processes {
            visit(*pid, entries);
        }
    }

    fn recently_freed(&self, pid: Pid, addr: Gpuaddr) -> Option<FreedEntry> {
        self.state
            .lock()
            .freed
            .iter()
            .find(|f| f.pid == pid && addr >= f.gpuaddr && addr < f.gpuaddr.add(f.size))
            .copied()
    }
}

impl TraceSink for MockPlatform {
    fn trace_pagefault(&self, addr: Gpuaddr, pagetable: PagetableId, direction: FaultDirection) {
        self.state.lock().traces.push((addr, pagetable, direction));
    }
}

impl MemoryOps for MockPlatform {
    fn alloc_page(&self) -> Result<Paddr, PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.alloc_page {
            return Err(e);
        }
        let page = Paddr::new(s.next_page);
        s.next_page += PAGE_SIZE;
        s.pages.push(page);
        Ok(page)
    }

    fn free_page(&self, paddr: Paddr) {
        self.state.lock().pages.retain(|p| *p != paddr);
    }

    fn alloc_secure(&self, size: u64) -> Result<Paddr, PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.alloc_secure {
            return Err(e);
        }
        let paddr = Paddr::new(s.next_secure);
        s.next_secure += size;
        s.secure.insert(paddr, size);
        Ok(paddr)
    }

    fn free_secure(&self, paddr: Paddr, _size: u64) {
        self.state.lock().secure.remove(&paddr);
    }

    fn map_global(&self, paddr: Paddr, size: u64) -> Result<Gpuaddr, PlatformError> {
        let mut s = self.state.lock();
        if let Some(e) = s.inject.map_global {
            return Err(e);
        }
        let gpuaddr = Gpuaddr::new(s.next_global);
        s.next_global += gmmu_abi::layout::page_align(size);
        s.globals.insert(gpuaddr, (paddr, size));
        Ok(gpuaddr)
    }

    fn unmap_global(&self, gpuaddr: Gpuaddr, _size: u64) {
        self.state.lock().globals.remove(&gpuaddr);
    }
}

impl RemoteLock for MockPlatform {
    fn lock_region(&self) -> Option<Paddr> {
        self.state.lock().lock_region
    }

    fn acquire(&self) {
        let mut s = self.state.lock();
        s.lock_depth += 1;
        s.journal.push(MockEvent::LockAcquire);
    }

    fn release(&self) {
        let mut s = self.state.lock();
        s.lock_depth -= 1;
        s.journal.push(MockEvent::LockRelease);
    }
}
