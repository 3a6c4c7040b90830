// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Register layouts of the translation-unit generations.
//!
//! Every register access in the core goes through a [`RegisterTable`]
//! selected once from the [`HwProfile`]. A table maps a symbolic
//! [`Register`] to its offset and whether it lives in a context bank or in
//! the unit-global block.
//!
//! # Address computation
//!
//! ```text
//! global register:   base + offset
//! context register:  base + offset + (ctx << CTX_SHIFT) + ctx_offset
//! ```
//!
//! Registers a generation does not implement have no table entry, so a
//! lookup can never silently alias another register.

use crate::types::ContextId;

/// Shift applied to the context id when addressing a context bank.
pub const CTX_SHIFT: u32 = 12;

/// Valid address bits of TTBR0 (the remaining bits are control bits).
pub const TTBR0_ADDR_MASK: u64 = 0x0000_00FF_FFFF_FFE0;

/// Fixed AHB base of the v2 register block.
pub const V2_AHB_BASE: u64 = 0x28000;

/// Fixed AHB base of the v2 register block on A405-class parts.
pub const V2_AHB_BASE_A405: u64 = 0x48000;

/// Symbolic register names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Register {
    /// Base of the unit's register window.
    GlobalBase = 0,
    /// System control.
    Sctlr = 1,
    /// Translation table base 0.
    Ttbr0 = 2,
    /// Translation table base 1.
    Ttbr1 = 3,
    /// Fault status.
    Fsr = 4,
    /// Fault address.
    Far = 5,
    /// Invalidate entire TLB.
    Tlbiall = 6,
    /// Transaction resume.
    Resume = 7,
    /// TLB lock control.
    Tlblkcr = 8,
    /// Virtual-to-physical user read (victim select for lock-down).
    V2pur = 9,
    /// Fault syndrome 0.
    Fsynr0 = 10,
    /// Fault syndrome 1.
    Fsynr1 = 11,
    /// TLB sync.
    Tlbsync = 12,
    /// TLB sync status.
    Tlbstatus = 13,
    /// Implementation-defined micro-MMU control.
    ImplDefMicroMmuCtrl = 14,
}

impl Register {
    /// Number of symbolic registers.
    pub const COUNT: usize = 15;

    /// All registers in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::GlobalBase,
        Self::Sctlr,
        Self::Ttbr0,
        Self::Ttbr1,
        Self::Fsr,
        Self::Far,
        Self::Tlbiall,
        Self::Resume,
        Self::Tlblkcr,
        Self::V2pur,
        Self::Fsynr0,
        Self::Fsynr1,
        Self::Tlbsync,
        Self::Tlbstatus,
        Self::ImplDefMicroMmuCtrl,
    ];

    /// Table index of this register.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One register table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegEntry {
    /// Byte offset from the block base.
    pub offset: u32,
    /// True if the register is replicated per context bank.
    pub ctx_relative: bool,
}

impl RegEntry {
    const fn ctx(offset: u32) -> Option<Self> {
        Some(Self {
            offset,
            ctx_relative: true,
        })
    }

    const fn global(offset: u32) -> Option<Self> {
        Some(Self {
            offset,
            ctx_relative: false,
        })
    }
}

/// Immutable register layout of one hardware generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterTable {
    entries: [Option<RegEntry>; Register::COUNT],
    /// Offset of context bank 0 from the unit's mapped window.
    ctx_offset: u32,
    /// Offset of context bank 0 from the unit's AHB base.
    ctx_ahb_offset: u32,
}

/// Legacy register layout.
const V0_ENTRIES: [Option<RegEntry>; Register::COUNT] = [
    RegEntry::global(0),     // GlobalBase
    RegEntry::ctx(0x0),      // Sctlr
    RegEntry::ctx(0x10),     // Ttbr0
    RegEntry::ctx(0x14),     // Ttbr1
    RegEntry::ctx(0x20),     // Fsr
    RegEntry::ctx(0x28),     // Far
    RegEntry::ctx(0x800),    // Tlbiall
    RegEntry::ctx(0x820),    // Resume
    RegEntry::ctx(0x03C),    // Tlblkcr
    RegEntry::ctx(0x818),    // V2pur
    RegEntry::ctx(0x2C),     // Fsynr0
    RegEntry::ctx(0x30),     // Fsynr1
    None,                    // Tlbsync
    None,                    // Tlbstatus
    None,                    // ImplDefMicroMmuCtrl
];

/// SMMU-style layout shared by the v1 and v2 generations.
const V1_ENTRIES: [Option<RegEntry>; Register::COUNT] = [
    RegEntry::global(0),      // GlobalBase
    RegEntry::ctx(0x0),       // Sctlr
    RegEntry::ctx(0x20),      // Ttbr0
    RegEntry::ctx(0x28),      // Ttbr1
    RegEntry::ctx(0x58),      // Fsr
    RegEntry::ctx(0x60),      // Far
    RegEntry::ctx(0x618),     // Tlbiall
    RegEntry::ctx(0x008),     // Resume
    None,                     // Tlblkcr
    None,                     // V2pur
    RegEntry::ctx(0x68),      // Fsynr0
    RegEntry::ctx(0x6C),      // Fsynr1
    RegEntry::ctx(0x7F0),     // Tlbsync
    RegEntry::ctx(0x7F4),     // Tlbstatus
    RegEntry::global(0x2000), // ImplDefMicroMmuCtrl
];

impl RegisterTable {
    /// Legacy generation.
    pub const V0: Self = Self {
        entries: V0_ENTRIES,
        ctx_offset: 0,
        ctx_ahb_offset: 0,
    };

    /// First SMMU generation.
    pub const V1: Self = Self {
        entries: V1_ENTRIES,
        ctx_offset: 0x8000,
        ctx_ahb_offset: 0x8000,
    };

    /// Second SMMU generation.
    pub const V2: Self = Self {
        entries: V1_ENTRIES,
        ctx_offset: 0x9000,
        ctx_ahb_offset: 0xA000,
    };

    /// Table for a hardware generation.
    #[inline]
    #[must_use]
    pub const fn for_version(version: HwVersion) -> &'static Self {
        match version {
            HwVersion::V0 => &Self::V0,
            HwVersion::V1 => &Self::V1,
            HwVersion::V2 => &Self::V2,
        }
    }

    /// Table entry for a register, `None` if the generation lacks it.
    #[inline]
    #[must_use]
    pub const fn entry(&self, reg: Register) -> Option<RegEntry> {
        self.entries[reg.index()]
    }

    /// Checks whether the generation implements a register.
    #[inline]
    #[must_use]
    pub const fn supports(&self, reg: Register) -> bool {
        self.entries[reg.index()].is_some()
    }

    /// Offset of a register from the unit's mapped window.
    ///
    /// Returns `None` for registers this generation does not implement.
    #[must_use]
    pub const fn offset(&self, ctx: ContextId, reg: Register) -> Option<u64> {
        match self.entries[reg.index()] {
            Some(entry) => Some(Self::place(entry, ctx, self.ctx_offset)),
            None => None,
        }
    }

    /// Address of a register given the base of the unit's mapped window.
    #[must_use]
    pub const fn address(&self, base: u64, ctx: ContextId, reg: Register) -> Option<u64> {
        match self.offset(ctx, reg) {
            Some(offset) => Some(base + offset),
            None => None,
        }
    }

    /// Address of a register on the AHB bus given the unit's AHB base.
    #[must_use]
    pub const fn ahb_address(&self, ahb_base: u64, ctx: ContextId, reg: Register) -> Option<u64> {
        match self.entries[reg.index()] {
            Some(entry) => Some(ahb_base + Self::place(entry, ctx, self.ctx_ahb_offset)),
            None => None,
        }
    }

    const fn place(entry: RegEntry, ctx: ContextId, ctx_offset: u32) -> u64 {
        if entry.ctx_relative {
            entry.offset as u64 + ((ctx.index() as u64) << CTX_SHIFT) + ctx_offset as u64
        } else {
            entry.offset as u64
        }
    }
}

// =============================================================================
// Hardware profile
// =============================================================================

/// Translation-unit hardware generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HwVersion {
    /// Legacy IOMMU.
    V0,
    /// First SMMU generation.
    V1,
    /// Second SMMU generation.
    V2,
}

/// Hardware generation plus the behavior flags derived from the SoC.
///
/// The register layout follows `version`. Several behaviors follow the
/// independent "legacy v0 SoC" predicate instead, which normally agrees
/// with `version == V0` but is kept separate so a v2 layout on a legacy SoC
/// takes the legacy branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HwProfile {
    version: HwVersion,
    legacy_v0_soc: bool,
}

impl HwProfile {
    /// Profile for a generation on a matching SoC.
    #[inline]
    #[must_use]
    pub const fn new(version: HwVersion) -> Self {
        Self {
            version,
            legacy_v0_soc: matches!(version, HwVersion::V0),
        }
    }

    /// Override the legacy SoC predicate.
    #[inline]
    #[must_use]
    pub const fn with_legacy_v0_soc(mut self, legacy: bool) -> Self {
        self.legacy_v0_soc = legacy;
        self
    }

    /// Register layout generation.
    #[inline]
    #[must_use]
    pub const fn version(&self) -> HwVersion {
        self.version
    }

    /// Register table for this profile.
    #[inline]
    #[must_use]
    pub const fn table(&self) -> &'static RegisterTable {
        RegisterTable::for_version(self.version)
    }

    /// SoC runs the legacy IOMMU.
    #[inline]
    #[must_use]
    pub const fn is_legacy_v0(&self) -> bool {
        self.legacy_v0_soc
    }

    /// Hardware can stall on a fault instead of retiring around it.
    #[inline]
    #[must_use]
    pub const fn halt_capable(&self) -> bool {
        !self.legacy_v0_soc
    }

    /// TLB flush polls TLBSTATUS after writing TLBSYNC.
    #[inline]
    #[must_use]
    pub const fn flush_waits_for_sync(&self) -> bool {
        !self.legacy_v0_soc
    }

    /// Device must be idled before a TLB flush.
    #[inline]
    #[must_use]
    pub const fn idle_before_flush(&self) -> bool {
        self.legacy_v0_soc
    }

    /// A privileged bank pagetable is created and bound to the priv context.
    #[inline]
    #[must_use]
    pub const fn uses_priv_bank(&self) -> bool {
        self.legacy_v0_soc
    }

    /// Register windows are mapped into the global GPU address space.
    #[inline]
    #[must_use]
    pub const fn maps_register_window(&self) -> bool {
        self.legacy_v0_soc
    }

    /// Domains are created with cacheable translation-table walks.
    #[inline]
    #[must_use]
    pub const fn cacheable_domains(&self) -> bool {
        self.legacy_v0_soc
    }

    /// The cross-core lock can be used on this SoC.
    #[inline]
    #[must_use]
    pub const fn supports_sync_lock(&self) -> bool {
        self.legacy_v0_soc
    }

    /// Missing context devices after the first are tolerated at bring-up.
    #[inline]
    #[must_use]
    pub const fn tolerates_partial_contexts(&self) -> bool {
        !self.legacy_v0_soc
    }

    /// AHB base of a unit's register block.
    ///
    /// v2 uses a fixed base; the older generations derive it from the
    /// window's distance to the GPU register base.
    #[must_use]
    pub const fn ahb_base(&self, window_start: u64, gpu_register_base: u64, a405: bool) -> u64 {
        match self.version {
            HwVersion::V2 if a405 => V2_AHB_BASE_A405,
            HwVersion::V2 => V2_AHB_BASE,
            HwVersion::V0 | HwVersion::V1 => window_start.wrapping_sub(gpu_register_base),
        }
    }

    /// Register range the command-stream validator must protect.
    ///
    /// Returns `(base, range)` in dwords; `None` on legacy SoCs.
    #[must_use]
    pub const fn protected_registers(&self, unit0_ahb_base: u64) -> Option<(u32, u32)> {
        if self.legacy_v0_soc {
            return None;
        }
        match self.version {
            HwVersion::V2 => Some(((unit0_ahb_base >> 2) as u32, 10)),
            HwVersion::V0 | HwVersion::V1 => Some((0x4000, 14)),
        }
    }
}

// =============================================================================
// Bit fields
// =============================================================================

/// SCTLR: hit under previous context fault.
pub const SCTLR_HUPCF_SHIFT: u32 = 8;

/// TLBSTATUS: sync still active.
pub const TLBSTATUS_SACTIVE: u32 = 0x1;

/// TLBLKCR: lock enable.
pub const TLBLKCR_LKE_MASK: u32 = 0x1;
/// TLBLKCR: lock enable shift.
pub const TLBLKCR_LKE_SHIFT: u32 = 0;
/// TLBLKCR: TLBIALL invalidates locked entries.
pub const TLBLKCR_TLBIALLCFG_SHIFT: u32 = 1;
/// TLBLKCR: TLBIASID invalidates locked entries.
pub const TLBLKCR_TLBIASIDCFG_SHIFT: u32 = 2;
/// TLBLKCR: TLBIVAA invalidates locked entries.
pub const TLBLKCR_TLBIVAACFG_SHIFT: u32 = 3;
/// TLBLKCR: number of reserved entries.
pub const TLBLKCR_FLOOR_MASK: u32 = 0xFF;
/// TLBLKCR: floor shift.
pub const TLBLKCR_FLOOR_SHIFT: u32 = 8;
/// TLBLKCR: next victim entry.
pub const TLBLKCR_VICTIM_MASK: u32 = 0xFF;
/// TLBLKCR: victim shift.
pub const TLBLKCR_VICTIM_SHIFT: u32 = 16;

/// V2PXX: TLB entry index.
pub const V2PXX_INDEX_MASK: u32 = 0xFF;
/// V2PXX: index shift.
pub const V2PXX_INDEX_SHIFT: u32 = 0;
/// V2PXX: virtual page.
pub const V2PXX_VA_MASK: u32 = 0xF_FFFF;
/// V2PXX: virtual page shift.
pub const V2PXX_VA_SHIFT: u32 = 12;

/// TLBLKCR value that enters lock mode with `floor` reserved entries.
#[inline]
#[must_use]
pub const fn tlblkcr_lock(floor: u32) -> u32 {
    ((floor & TLBLKCR_FLOOR_MASK) << TLBLKCR_FLOOR_SHIFT)
        | (1 << TLBLKCR_TLBIALLCFG_SHIFT)
        | (1 << TLBLKCR_TLBIASIDCFG_SHIFT)
        | (1 << TLBLKCR_TLBIVAACFG_SHIFT)
        | ((1 & TLBLKCR_LKE_MASK) << TLBLKCR_LKE_SHIFT)
}

/// Replace the victim field of a TLBLKCR value.
#[inline]
#[must_use]
pub const fn tlblkcr_with_victim(tlblkcr: u32, victim: u32) -> u32 {
    (tlblkcr & !(TLBLKCR_VICTIM_MASK << TLBLKCR_VICTIM_SHIFT))
        | ((victim & TLBLKCR_VICTIM_MASK) << TLBLKCR_VICTIM_SHIFT)
}

/// Clear the lock enable bit of a TLBLKCR value.
#[inline]
#[must_use]
pub const fn tlblkcr_unlock(tlblkcr: u32) -> u32 {
    tlblkcr & !(TLBLKCR_LKE_MASK << TLBLKCR_LKE_SHIFT)
}

/// V2PUR value selecting TLB entry `index` for virtual address `vaddr`.
#[inline]
#[must_use]
pub const fn v2pxx(index: u32, vaddr: u32) -> u32 {
    ((index & V2PXX_INDEX_MASK) << V2PXX_INDEX_SHIFT) | (vaddr & (V2PXX_VA_MASK << V2PXX_VA_SHIFT))
}

/// Merge a new root address into a captured TTBR0 snapshot.
///
/// Non-address control bits come from `default_ttbr0`.
#[inline]
#[must_use]
pub const fn ttbr0_with_root(default_ttbr0: u64, root: u64) -> u64 {
    (default_ttbr0 & !TTBR0_ADDR_MASK) | (root & TTBR0_ADDR_MASK)
}
