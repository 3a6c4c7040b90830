// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Read-only queries and command stream helpers.

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::regs::TTBR0_ADDR_MASK;
use gmmu_abi::{ContextId, Gpuaddr, Register};

use super::MmuContext;
use crate::error::MmuError;
use crate::platform::Platform;

/// Register range the command-stream validator must protect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedRegisters {
    /// First protected register, in dwords.
    pub base: u32,
    /// Number of protected registers.
    pub range: u32,
}

impl<P: Platform> MmuContext<P> {
    /// Number of translation units.
    #[inline]
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Checks if a unit can stall on faults.
    #[must_use]
    pub fn hw_halt_supported(&self, unit: usize) -> bool {
        self.units.get(unit).is_some_and(|u| u.halt_capable())
    }

    /// TTBR0 captured for a context at start (0 if none).
    #[must_use]
    pub fn default_ttbr0(&self, unit: usize, ctx: ContextId) -> u64 {
        self.units
            .get(unit)
            .and_then(|u| u.device(ctx))
            .map_or(0, |d| d.default_ttbr0())
    }

    /// GPU address of a register in the globally mapped window.
    ///
    /// `None` unless the window is mapped into the GPU address space.
    /// [`Register::GlobalBase`] yields the window address itself.
    #[must_use]
    pub fn register_gpuaddr(&self, unit: usize, ctx: ContextId, reg: Register) -> Option<Gpuaddr> {
        let unit = self.units.get(unit)?;
        let window = unit.window().gpuaddr?;
        if reg == Register::GlobalBase {
            return Some(window);
        }
        self.table.offset(ctx, reg).map(|off| window.add(off))
    }

    /// AHB address of a register.
    #[must_use]
    pub fn register_ahbaddr(&self, unit: usize, ctx: ContextId, reg: Register) -> Option<u64> {
        let unit = self.units.get(unit)?;
        self.table.ahb_address(unit.ahb_base(), ctx, reg)
    }

    /// Register range the command-stream validator must protect.
    #[must_use]
    pub fn protected_registers(&self) -> Option<ProtectedRegisters> {
        let ahb = self.units.first().map_or(0, |u| u.ahb_base());
        self.profile()
            .protected_registers(ahb)
            .map(|(base, range)| ProtectedRegisters { base, range })
    }

    /// Root address currently loaded in unit 0's user context.
    ///
    /// Returns 0 from a context that must not block.
    pub fn get_current_root_address(&self) -> Result<u64, MmuError> {
        if self.platform.in_atomic_context() {
            return Ok(0);
        }
        let Some(unit) = self.units.first() else {
            return Ok(0);
        };
        let _clk = self.clocks_on()?;
        let ttbr0 = unit.read64(&self.platform, self.table, ContextId::User, Register::Ttbr0)?;
        Ok(ttbr0 & TTBR0_ADDR_MASK)
    }

    /// Append the GPU half of the cross-core lock acquire.
    ///
    /// Returns the number of dwords written, 0 when the lock is disabled.
    pub fn emit_lock(&self, cmds: &mut Vec<u32>) -> usize {
        self.sync.emit_acquire(cmds)
    }

    /// Append the GPU half of the cross-core lock release.
    pub fn emit_unlock(&self, cmds: &mut Vec<u32>) -> usize {
        self.sync.emit_release(cmds)
    }
}
