// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Translation fault handling.
//!
//! The handler runs in the platform's trap context. A compare-and-swap on
//! the context's fault flag admits one handling pass at a time; a fault that
//! arrives while one is in progress is dropped without side effects. The
//! flag stays set until [`MmuContext::resume`] clears the hardware state.
//!
//! ```text
//!   idle ──fault──> handling ──(FSR == 0)──> idle
//!                      │
//!                      └──report──> faulted ──resume──> idle
//! ```

mod diag;
mod log;


use core::sync::atomic::Ordering;

use gmmu_abi::regs::SCTLR_HUPCF_SHIFT;
use gmmu_abi::{ContextId, FaultSyndrome, Gpuaddr, Pid, Register};
use tracing::{debug, error, info};

use crate::config::FaultPolicy;
use crate::error::MmuError;
use crate::mmu::MmuContext;
use crate::platform::{DeviceHandle, Platform};
use crate::unit::{IommuDevice, IommuUnit};

pub use diag::{FreedReport, NearbyMemory, NearbyReport, OwnedEntry, find_nearby};
pub use log::FaultLog;

/// How a reported fault was dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// Fault recorded; the faulting engine keeps running.
    Reported,
    /// FSR was already clear.
    Spurious,
    /// Another fault is being handled; nothing was done.
    AlreadyHandling,
}

impl<P: Platform> MmuContext<P> {
    /// Handle a translation fault raised by `device` at `addr`.
    ///
    /// Under a halting policy the fault is reported and [`MmuError::Busy`]
    /// is returned so the platform leaves the transaction stalled.
    pub fn handle_fault(
        &self,
        device: DeviceHandle,
        addr: Gpuaddr,
    ) -> Result<FaultOutcome, MmuError> {
        let Some((unit, dev)) = self.find_device(device) else {
            error!(?device, "fault from unknown IOMMU device");
            return Err(MmuError::NoSuchDevice);
        };

        if self
            .fault
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(FaultOutcome::AlreadyHandling);
        }

        let ctx = dev.ctx();
        let fsr = unit.read32(&self.platform, self.table, ctx, Register::Fsr)?;
        if fsr == 0 {
            self.fault.store(false, Ordering::Release);
            return Ok(FaultOutcome::Spurious);
        }

        self.platform
            .mark_context_faulted(self.platform.current_context_id());
        dev.set_fault(true);

        let policy = self.fault_policy();
        if policy.halts() {
            self.platform.report_page_fault();
            self.platform.set_power_aware();
        }

        let syndrome = FaultSyndrome {
            fsr,
            fsynr0: unit.read32(&self.platform, self.table, ctx, Register::Fsynr0)?,
            fsynr1: unit.read32(&self.platform, self.table, ctx, Register::Fsynr1)?,
            ttbr0: unit.read64(&self.platform, self.table, ctx, Register::Ttbr0)?,
        };
        let direction = syndrome.direction(self.profile());
        let pt = self.platform.pagetable_id_from_root(syndrome.ttbr0);
        let pid = Pid::from(pt);

        let suppressed =
            policy.contains(FaultPolicy::LOG_ONE_PER_PAGE) && self.fault_log.record(pt, addr);

        if !suppressed {
            error!(
                addr = %addr,
                %pid,
                %ctx,
                ttbr0 = syndrome.ttbr0,
                fsr = syndrome.fsr,
                fsynr0 = syndrome.fsynr0,
                fsynr1 = syndrome.fsynr1,
                %direction,
                "GPU PAGE FAULT"
            );
            if !self.platform.in_atomic_context() {
                self.log_diagnostics(pid, addr);
            }
        }

        self.platform.trace_pagefault(addr, pt, direction);

        if policy.halts() {
            return Err(MmuError::Busy);
        }
        Ok(FaultOutcome::Reported)
    }

    /// Clear the hardware fault state and re-arm the handler.
    ///
    /// Does nothing unless a fault is being handled.
    pub fn resume(&self) -> Result<(), MmuError> {
        if !self.fault_pending() {
            return Ok(());
        }
        {
            let _clk = self.clocks_on()?;
            for (unit, dev) in self.attached_nonsecure() {
                if !dev.has_fault() {
                    continue;
                }
                let _lock = self.cross_core_lock();
                unit.write32(&self.platform, self.table, dev.ctx(), Register::Resume, 1)?;
                unit.write32(&self.platform, self.table, dev.ctx(), Register::Fsr, 0)?;
                dev.set_fault(false);
                debug!(unit = unit.index(), ctx = %dev.ctx(), "fault cleared");
            }
        }
        self.fault.store(false, Ordering::Release);
        Ok(())
    }

    /// Switch the fault policy.
    ///
    /// Only a change of the halt bit touches hardware, and only on parts
    /// that can halt. The device is idled first; SCTLR.HUPCF is cleared when
    /// halting and set otherwise.
    pub fn set_fault_policy(&self, policy: FaultPolicy) -> Result<(), MmuError> {
        let policy = FaultPolicy::from_bits_truncate(policy.bits());
        let current = self.fault_policy();
        if current.halts() == policy.halts() || self.profile().is_legacy_v0() {
            self.fault_policy.store(policy.bits(), Ordering::Release);
            return Ok(());
        }

        let _clk = self.clocks_on()?;
        self.platform.idle().map_err(MmuError::Idle)?;

        for (unit, dev) in self.attached_nonsecure() {
            let sctlr = unit.read32(&self.platform, self.table, dev.ctx(), Register::Sctlr)?;
            let sctlr = if policy.halts() {
                sctlr & !(1 << SCTLR_HUPCF_SHIFT)
            } else {
                sctlr | (1 << SCTLR_HUPCF_SHIFT)
            };
            unit.write32(&self.platform, self.table, dev.ctx(), Register::Sctlr, sctlr)?;
        }
        self.fault_policy.store(policy.bits(), Ordering::Release);
        info!(halt = policy.halts(), "fault policy changed");
        Ok(())
    }

    /// Look for a fault the interrupt path missed.
    ///
    /// The first attached non-secure context with a pending FSR is handed to
    /// [`handle_fault`](Self::handle_fault) with its FAR address.
    pub fn poll_faults(&self) -> Result<Option<FaultOutcome>, MmuError> {
        if self.fault_pending() {
            return Ok(None);
        }
        let _clk = self.clocks_on()?;
        for (unit, dev) in self.attached_nonsecure() {
            let fsr = unit.read32(&self.platform, self.table, dev.ctx(), Register::Fsr)?;
            if fsr == 0 {
                continue;
            }
            let far = unit.read64(&self.platform, self.table, dev.ctx(), Register::Far)?;
            return self.handle_fault(dev.handle(), Gpuaddr::new(far)).map(Some);
        }
        Ok(None)
    }

    fn find_device(&self, handle: DeviceHandle) -> Option<(&IommuUnit, &IommuDevice)> {
        self.units
            .iter()
            .find_map(|u| u.device_by_handle(handle).map(|d| (u, d)))
    }

    fn log_diagnostics(&self, pid: Pid, addr: Gpuaddr) {
        if let Some(freed) = self.platform.recently_freed(pid, addr) {
            info!("{}", FreedReport(&freed));
        }
        let nearby = find_nearby(&self.platform, addr);
        info!(
            "{}",
            NearbyReport {
                addr,
                nearby: &nearby
            }
        );
    }

    /// Checks if a context has an unresolved fault.
    #[must_use]
    pub fn context_faulted(&self, unit: usize, ctx: ContextId) -> bool {
        self.units
            .get(unit)
            .and_then(|u| u.device(ctx))
            .is_some_and(IommuDevice::has_fault)
    }
}
