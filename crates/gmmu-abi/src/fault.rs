// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Translation fault syndrome decoding.
//!
//! When a context bank faults, the core snapshots its fault registers into a
//! [`FaultSyndrome`]. Where the read/write direction lives depends on the
//! SoC: legacy parts report it in FSYNR1, SMMU parts in FSYNR0.

use core::fmt;

use crate::regs::HwProfile;

/// FSYNR1 (legacy): access was a write.
pub const FSYNR1_AWRITE_MASK: u32 = 0x1;
/// FSYNR1 (legacy): write bit shift.
pub const FSYNR1_AWRITE_SHIFT: u32 = 8;

/// FSYNR0 (SMMU): write-not-read.
pub const V1_FSYNR0_WNR_MASK: u32 = 0x1;
/// FSYNR0 (SMMU): write-not-read shift.
pub const V1_FSYNR0_WNR_SHIFT: u32 = 4;

/// Direction of the faulting access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultDirection {
    /// Faulting access was a read.
    Read,
    /// Faulting access was a write.
    Write,
}

impl FaultDirection {
    /// Lowercase name as used in logs and trace records.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for FaultDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a context bank's fault registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultSyndrome {
    /// Fault status (zero means no fault pending).
    pub fsr: u32,
    /// Fault syndrome 0.
    pub fsynr0: u32,
    /// Fault syndrome 1.
    pub fsynr1: u32,
    /// TTBR0 of the faulting context at fault time.
    pub ttbr0: u64,
}

impl FaultSyndrome {
    /// Checks if the status register reports a pending fault.
    #[inline]
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.fsr != 0
    }

    /// Decode the access direction.
    ///
    /// The bit consulted follows the SoC predicate, not the register layout:
    /// a v2 layout on a legacy SoC still decodes FSYNR1.
    #[must_use]
    pub const fn direction(&self, profile: &HwProfile) -> FaultDirection {
        let write = if profile.is_legacy_v0() {
            (self.fsynr1 & (FSYNR1_AWRITE_MASK << FSYNR1_AWRITE_SHIFT)) != 0
        } else {
            (self.fsynr0 & (V1_FSYNR0_WNR_MASK << V1_FSYNR0_WNR_SHIFT)) != 0
        };
        if write {
            FaultDirection::Write
        } else {
            FaultDirection::Read
        }
    }
}
