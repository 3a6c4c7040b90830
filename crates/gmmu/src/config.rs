// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bring-up configuration and platform topology.

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::layout::{MAPPED_MEM_BASE, MAPPED_MEM_SIZE, SECURE_MEM_SIZE};
use gmmu_abi::{ContextId, HwProfile, HwVersion, Paddr};

/// Maximum number of translation units per GPU.
pub const MAX_UNITS: usize = 2;

/// Maximum number of clocks gating one unit.
pub const MAX_CLOCKS: usize = 4;

bitflags::bitflags! {
    /// Page fault handling policy.
    ///
    /// - `INT_ENABLE`: fault interrupts are handled, read by the interrupt
    ///   layer that calls into this crate
    /// - `GPUHALT_ENABLE`: stall the faulting engine and hand over to recovery
    /// - `LOG_ONE_PER_PAGE`: log a given page once per pagetable
    ///
    /// Unknown bits are dropped when a policy is stored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultPolicy: u32 {
        /// Fault interrupts enabled.
        const INT_ENABLE = 1 << 0;
        /// Halt the GPU on a page fault.
        const GPUHALT_ENABLE = 1 << 1;
        /// Suppress repeat logs for the same page.
        const LOG_ONE_PER_PAGE = 1 << 2;
    }
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self::INT_ENABLE | Self::LOG_ONE_PER_PAGE
    }
}

impl FaultPolicy {
    /// Checks if the policy stalls on a fault.
    #[inline]
    #[must_use]
    pub const fn halts(self) -> bool {
        self.contains(Self::GPUHALT_ENABLE)
    }
}

/// Configuration of one IOMMU core instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmuConfig {
    /// Hardware generation and SoC behavior flags.
    pub profile: HwProfile,
    /// Initial fault policy.
    pub fault_policy: FaultPolicy,
    /// Content protection is enabled (secure pagetable and pool).
    pub secure: bool,
    /// Every process gets its own pagetable.
    pub per_process_pagetables: bool,
    /// GPU requires a TLB flush after every non-global map.
    pub flush_tlb_on_map: bool,
    /// GPU microcode implements the cross-core lock opcodes.
    pub microcode_supports_sync: bool,
    /// Physical base of the GPU register block (AHB offset reference).
    pub gpu_register_base: u64,
    /// Use the alternate v2 AHB base.
    pub a405_ahb: bool,
    /// Base of the mappable GPU virtual range.
    pub mapped_base: u64,
    /// Size of the mappable GPU virtual range, including the secure pool.
    pub mapped_size: u64,
    /// Size of the secure pool carved from the top of the mapped range.
    pub secure_pool_size: u64,
}

impl MmuConfig {
    /// Default configuration for a hardware generation.
    #[must_use]
    pub const fn new(version: HwVersion) -> Self {
        Self {
            profile: HwProfile::new(version),
            fault_policy: FaultPolicy::INT_ENABLE.union(FaultPolicy::LOG_ONE_PER_PAGE),
            secure: false,
            per_process_pagetables: true,
            flush_tlb_on_map: false,
            microcode_supports_sync: true,
            gpu_register_base: 0,
            a405_ahb: false,
            mapped_base: MAPPED_MEM_BASE,
            mapped_size: MAPPED_MEM_SIZE,
            secure_pool_size: SECURE_MEM_SIZE,
        }
    }

    /// Set the hardware profile.
    #[must_use]
    pub const fn with_profile(mut self, profile: HwProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the initial fault policy.
    #[must_use]
    pub const fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    /// Enable or disable content protection.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Enable or disable per-process pagetables.
    #[must_use]
    pub const fn with_per_process_pagetables(mut self, enabled: bool) -> Self {
        self.per_process_pagetables = enabled;
        self
    }

    /// Enable or disable flush-on-map.
    #[must_use]
    pub const fn with_flush_tlb_on_map(mut self, enabled: bool) -> Self {
        self.flush_tlb_on_map = enabled;
        self
    }

    /// Declare whether the microcode supports the lock opcodes.
    #[must_use]
    pub const fn with_microcode_sync(mut self, supported: bool) -> Self {
        self.microcode_supports_sync = supported;
        self
    }

    /// Set the physical base of the GPU register block.
    #[must_use]
    pub const fn with_gpu_register_base(mut self, base: u64) -> Self {
        self.gpu_register_base = base;
        self
    }

    /// Use the alternate v2 AHB base.
    #[must_use]
    pub const fn with_a405_ahb(mut self, a405: bool) -> Self {
        self.a405_ahb = a405;
        self
    }

    /// Override the mappable range.
    #[must_use]
    pub const fn with_mapped_range(mut self, base: u64, size: u64) -> Self {
        self.mapped_base = base;
        self.mapped_size = size;
        self
    }

    /// Mappable range `(base, size)` after carving out the secure pool.
    #[must_use]
    pub const fn mappable_range(&self) -> (u64, u64) {
        let pool = if self.secure {
            self.secure_pool_size
        } else {
            0
        };
        (self.mapped_base, self.mapped_size.saturating_sub(pool))
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self::new(HwVersion::V2)
    }
}

/// One named context as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTopology {
    /// Platform device name of the context.
    pub name: &'static str,
    /// Logical context id.
    pub ctx: ContextId,
}

/// One translation unit as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTopology {
    /// Physical start of the register window.
    pub reg_start: Paddr,
    /// Physical end (exclusive) of the register window.
    pub reg_end: Paddr,
    /// Contexts of this unit.
    pub contexts: Vec<ContextTopology>,
}

impl UnitTopology {
    /// Size of the register window in bytes.
    #[inline]
    #[must_use]
    pub const fn reg_size(&self) -> u64 {
        self.reg_end.as_u64().saturating_sub(self.reg_start.as_u64())
    }

    /// Context entry for a logical id.
    #[must_use]
    pub fn context(&self, ctx: ContextId) -> Option<&ContextTopology> {
        self.contexts.iter().find(|c| c.ctx == ctx)
    }
}

/// Platform description of the GPU's translation units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IommuTopology {
    /// Units in platform order.
    pub units: Vec<UnitTopology>,
}

impl IommuTopology {
    /// Creates an empty topology.
    #[must_use]
    pub const fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Append a unit.
    #[must_use]
    pub fn with_unit(mut self, unit: UnitTopology) -> Self {
        self.units.push(unit);
        self
    }
}
