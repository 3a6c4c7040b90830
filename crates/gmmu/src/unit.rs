// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Translation units and their context devices.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::{ContextId, Gpuaddr, Paddr, Register, RegisterTable};
use spin::Once;

use crate::error::MmuError;
use crate::platform::{ClockSet, DeviceHandle, RegisterIo};

/// One context bank bound to a physical context device.
#[derive(Debug)]
pub struct IommuDevice {
    ctx: ContextId,
    handle: DeviceHandle,
    attached: AtomicBool,
    default_ttbr0: AtomicU64,
    fault: AtomicBool,
}

impl IommuDevice {
    /// Creates a detached device.
    #[must_use]
    pub const fn new(ctx: ContextId, handle: DeviceHandle) -> Self {
        Self {
            ctx,
            handle,
            attached: AtomicBool::new(false),
            default_ttbr0: AtomicU64::new(0),
            fault: AtomicBool::new(false),
        }
    }

    /// Logical context id.
    #[inline]
    #[must_use]
    pub const fn ctx(&self) -> ContextId {
        self.ctx
    }

    /// Platform handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Checks if a domain is bound.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    /// TTBR0 captured at start-up (0 if none).
    #[inline]
    #[must_use]
    pub fn default_ttbr0(&self) -> u64 {
        self.default_ttbr0.load(Ordering::Acquire)
    }

    pub(crate) fn set_default_ttbr0(&self, value: u64) {
        self.default_ttbr0.store(value, Ordering::Release);
    }

    /// Checks the sticky fault bit.
    #[inline]
    #[must_use]
    pub fn has_fault(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    pub(crate) fn set_fault(&self, fault: bool) {
        self.fault.store(fault, Ordering::Release);
    }
}

/// A unit's mapped register window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWindow {
    /// Physical start.
    pub phys: Paddr,
    /// Size in bytes.
    pub size: u64,
    /// Base used for register accesses.
    pub base: u64,
    /// GPU address when mapped into the global region.
    pub gpuaddr: Option<Gpuaddr>,
}

/// One hardware translation unit.
#[derive(Debug)]
pub struct IommuUnit {
    index: usize,
    window: RegisterWindow,
    devices: Vec<IommuDevice>,
    clocks: Once<ClockSet>,
    clk_enable_count: AtomicI32,
    ahb_base: u64,
    halt_capable: bool,
}

impl IommuUnit {
    pub(crate) fn new(
        index: usize,
        window: RegisterWindow,
        devices: Vec<IommuDevice>,
        ahb_base: u64,
        halt_capable: bool,
    ) -> Self {
        Self {
            index,
            window,
            devices,
            clocks: Once::new(),
            clk_enable_count: AtomicI32::new(0),
            ahb_base,
            halt_capable,
        }
    }

    /// Position in the topology.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Register window.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> &RegisterWindow {
        &self.window
    }

    /// Context devices in id order.
    #[inline]
    #[must_use]
    pub fn devices(&self) -> &[IommuDevice] {
        &self.devices
    }

    /// Device bound to a logical context.
    #[must_use]
    pub fn device(&self, ctx: ContextId) -> Option<&IommuDevice> {
        self.devices.iter().find(|d| d.ctx == ctx)
    }

    /// Device with a platform handle.
    #[must_use]
    pub fn device_by_handle(&self, handle: DeviceHandle) -> Option<&IommuDevice> {
        self.devices.iter().find(|d| d.handle == handle)
    }

    /// AHB base of the register block.
    #[inline]
    #[must_use]
    pub const fn ahb_base(&self) -> u64 {
        self.ahb_base
    }

    /// Hardware can stall on faults.
    #[inline]
    #[must_use]
    pub const fn halt_capable(&self) -> bool {
        self.halt_capable
    }

    /// Clocks captured at first attach.
    #[must_use]
    pub fn clocks(&self) -> Option<&ClockSet> {
        self.clocks.get()
    }

    pub(crate) fn capture_clocks(&self, clocks: impl FnOnce() -> ClockSet) {
        self.clocks.call_once(clocks);
    }

    /// Current clock enable count.
    #[inline]
    #[must_use]
    pub fn clk_enable_count(&self) -> i32 {
        self.clk_enable_count.load(Ordering::Acquire)
    }

    pub(crate) fn clk_count(&self) -> &AtomicI32 {
        &self.clk_enable_count
    }

    /// Address of a register for a context.
    pub fn reg_addr(
        &self,
        table: &RegisterTable,
        ctx: ContextId,
        reg: Register,
    ) -> Result<u64, MmuError> {
        table
            .address(self.window.base, ctx, reg)
            .ok_or(MmuError::UnsupportedRegister(reg))
    }

    pub(crate) fn read32<R: RegisterIo + ?Sized>(
        &self,
        io: &R,
        table: &RegisterTable,
        ctx: ContextId,
        reg: Register,
    ) -> Result<u32, MmuError> {
        Ok(io.read32(self.reg_addr(table, ctx, reg)?))
    }

    pub(crate) fn write32<R: RegisterIo + ?Sized>(
        &self,
        io: &R,
        table: &RegisterTable,
        ctx: ContextId,
        reg: Register,
        value: u32,
    ) -> Result<(), MmuError> {
        io.write32(self.reg_addr(table, ctx, reg)?, value);
        Ok(())
    }

    pub(crate) fn read64<R: RegisterIo + ?Sized>(
        &self,
        io: &R,
        table: &RegisterTable,
        ctx: ContextId,
        reg: Register,
    ) -> Result<u64, MmuError> {
        Ok(io.read64(self.reg_addr(table, ctx, reg)?))
    }

    pub(crate) fn write64<R: RegisterIo + ?Sized>(
        &self,
        io: &R,
        table: &RegisterTable,
        ctx: ContextId,
        reg: Register,
        value: u64,
    ) -> Result<(), MmuError> {
        io.write64(self.reg_addr(table, ctx, reg)?, value);
        Ok(())
    }
}
