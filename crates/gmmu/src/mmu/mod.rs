// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Root state of the IOMMU core for one GPU.
//!
//! [`MmuContext`] owns the translation units, the default pagetables, the
//! cross-core lock, the guard pages and the fault state. Lifecycle methods
//! (`init`, `start`, `stop`, `close`) take ownership or `&mut self`; the
//! runtime operations take `&self` since the fault handler may run
//! alongside them.
//!
//! ```text
//!   init ──> start ──> { map / unmap / set_active_pagetable / fault / resume }
//!              │                                            │
//!              └──────────── stop <─────────────────────────┘
//!                              │
//!                            close
//! ```

mod lifecycle;
mod query;

#[cfg(test)]
mod lifecycle_test;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::{ContextId, HwProfile, Paddr, RegisterTable};
use spin::Mutex;

use crate::clock::{ClockGate, ClockGuard, UnitScope};
use crate::config::{FaultPolicy, MmuConfig};
use crate::error::MmuError;
use crate::fault::FaultLog;
use crate::pagetable::Pagetable;
use crate::platform::Platform;
use crate::sync::{SyncGuard, SyncLock};
use crate::unit::{IommuDevice, IommuUnit};

pub use query::ProtectedRegisters;

/// Guard backing shared by every allocation of one context.
#[derive(Debug)]
pub(crate) struct GuardPages {
    /// Read-only page behind ordinary guards.
    pub(crate) page: Option<Paddr>,
    /// Secure scratch region, allocated on first secure guard.
    pub(crate) secure: Mutex<Option<Paddr>>,
}

/// Mappable GPU virtual range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappableRange {
    /// First mappable address.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
}

/// IOMMU core state for one GPU.
pub struct MmuContext<P: Platform> {
    pub(crate) platform: P,
    pub(crate) config: MmuConfig,
    pub(crate) table: &'static RegisterTable,
    pub(crate) units: Vec<IommuUnit>,
    pub(crate) default_pt: Option<Pagetable>,
    pub(crate) priv_pt: Option<Pagetable>,
    pub(crate) secure_pt: Option<Pagetable>,
    pub(crate) fault: AtomicBool,
    pub(crate) fault_policy: AtomicU32,
    pub(crate) fault_log: FaultLog,
    pub(crate) mappable: MappableRange,
    pub(crate) sync: SyncLock,
    pub(crate) guard: GuardPages,
    pub(crate) clocks: ClockGate,
    pub(crate) started: bool,
}

impl<P: Platform> MmuContext<P> {
    /// Platform collaborators.
    #[inline]
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Configuration the context was brought up with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &MmuConfig {
        &self.config
    }

    /// Hardware profile.
    #[inline]
    #[must_use]
    pub const fn profile(&self) -> &HwProfile {
        &self.config.profile
    }

    /// Translation units.
    #[inline]
    #[must_use]
    pub fn units(&self) -> &[IommuUnit] {
        &self.units
    }

    /// The global default pagetable, once started.
    #[inline]
    #[must_use]
    pub const fn default_pagetable(&self) -> Option<&Pagetable> {
        self.default_pt.as_ref()
    }

    /// The privileged bank pagetable (legacy SoCs only).
    #[inline]
    #[must_use]
    pub const fn priv_pagetable(&self) -> Option<&Pagetable> {
        self.priv_pt.as_ref()
    }

    /// The secure pagetable, when content protection is on.
    #[inline]
    #[must_use]
    pub const fn secure_pagetable(&self) -> Option<&Pagetable> {
        self.secure_pt.as_ref()
    }

    /// Mappable GPU virtual range.
    #[inline]
    #[must_use]
    pub const fn mappable_range(&self) -> MappableRange {
        self.mappable
    }

    /// Checks if `start` completed.
    #[inline]
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Current fault policy.
    #[must_use]
    pub fn fault_policy(&self) -> FaultPolicy {
        FaultPolicy::from_bits_truncate(self.fault_policy.load(Ordering::Acquire))
    }

    /// Checks if a fault is being handled.
    #[must_use]
    pub fn fault_pending(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    /// Cross-core lock state.
    #[inline]
    #[must_use]
    pub const fn sync_lock(&self) -> &SyncLock {
        &self.sync
    }

    /// Enable clocks for `scope`.
    pub fn enable_clocks(&self, scope: UnitScope) -> Result<(), MmuError> {
        Ok(self.clocks.enable(&self.platform, &self.units, scope)?)
    }

    /// Disable clocks for `scope`.
    pub fn disable_clocks(&self, scope: UnitScope) -> Result<(), MmuError> {
        Ok(self.clocks.disable(&self.platform, &self.units, scope)?)
    }

    /// Hold every unit's clocks for the guard's lifetime.
    pub(crate) fn clocks_on(&self) -> Result<ClockGuard<'_, P>, MmuError> {
        Ok(self.clocks.hold(&self.platform, &self.units, UnitScope::All)?)
    }

    /// Hold the host side of the cross-core lock.
    pub(crate) fn cross_core_lock(&self) -> SyncGuard<'_, P> {
        self.sync.lock(&self.platform)
    }

    /// Pagetable bound to a context slot, if any.
    pub(crate) const fn pagetable_for(&self, ctx: ContextId) -> Option<&Pagetable> {
        match ctx {
            ContextId::User => self.default_pt.as_ref(),
            ContextId::Priv => self.priv_pt.as_ref(),
            ContextId::Secure => self.secure_pt.as_ref(),
        }
    }

    /// Attached non-secure devices across every unit.
    pub(crate) fn attached_nonsecure(&self) -> impl Iterator<Item = (&IommuUnit, &IommuDevice)> {
        self.units.iter().flat_map(|unit| {
            unit.devices()
                .iter()
                .filter(|d| d.is_attached() && !d.ctx().is_secure())
                .map(move |d| (unit, d))
        })
    }
}
