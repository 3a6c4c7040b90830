// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bring-up and teardown.

use core::sync::atomic::{AtomicBool, AtomicU32};

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::layout::SECURE_GUARD_SIZE;
use gmmu_abi::regs::SCTLR_HUPCF_SHIFT;
use gmmu_abi::{ContextId, PagetableId, Register};
use spin::Mutex;
use tracing::{error, info, warn};

use super::{GuardPages, MappableRange, MmuContext};
use crate::clock::ClockGate;
use crate::config::{IommuTopology, MAX_UNITS, MmuConfig, UnitTopology};
use crate::error::MmuError;
use crate::fault::FaultLog;
use crate::pagetable::Pagetable;
use crate::platform::Platform;
use crate::sync::SyncLock;
use crate::unit::{IommuDevice, IommuUnit, RegisterWindow};

impl<P: Platform> MmuContext<P> {
    /// Bring up the IOMMU core from the platform topology.
    ///
    /// Resolves every unit's contexts, maps the register windows, sets up
    /// the cross-core lock and allocates the guard page. Any failure
    /// releases what was already set up.
    pub fn init(
        platform: P,
        config: MmuConfig,
        topology: &IommuTopology,
    ) -> Result<Self, MmuError> {
        if topology.units.len() > MAX_UNITS {
            error!(units = topology.units.len(), "too many IOMMU units defined");
            return Err(MmuError::TooManyUnits);
        }
        let profile = config.profile;

        let mut devices = Vec::with_capacity(topology.units.len());
        for (index, unit) in topology.units.iter().enumerate() {
            devices.push(resolve_contexts(&platform, &config, index, unit)?);
        }

        let mut units: Vec<IommuUnit> = Vec::with_capacity(topology.units.len());
        for ((index, unit), devs) in topology.units.iter().enumerate().zip(devices) {
            match map_unit_window(&platform, &config, index, unit) {
                Ok(window) => {
                    let ahb = profile.ahb_base(
                        unit.reg_start.as_u64(),
                        config.gpu_register_base,
                        config.a405_ahb,
                    );
                    units.push(IommuUnit::new(
                        index,
                        window,
                        devs,
                        ahb,
                        profile.halt_capable(),
                    ));
                }
                Err(e) => {
                    release_windows(&platform, &units);
                    return Err(e);
                }
            }
        }

        let sync = match SyncLock::init(&platform, &profile, config.per_process_pagetables) {
            Ok(sync) => sync,
            Err(e) => {
                release_windows(&platform, &units);
                return Err(e);
            }
        };

        let page = match platform.alloc_page() {
            Ok(page) => page,
            Err(e) => {
                error!(err = %e, "guard page allocation failed");
                let mut sync = sync;
                sync.release_region(&platform);
                release_windows(&platform, &units);
                return Err(MmuError::OutOfMemory);
            }
        };

        let (base, size) = config.mappable_range();
        info!(
            units = units.len(),
            version = ?profile.version(),
            sync = sync.is_initialized(),
            "IOMMU initialized"
        );
        Ok(Self {
            table: profile.table(),
            units,
            default_pt: None,
            priv_pt: None,
            secure_pt: None,
            fault: AtomicBool::new(false),
            fault_policy: AtomicU32::new(config.fault_policy.bits()),
            fault_log: FaultLog::new(),
            mappable: MappableRange { base, size },
            sync,
            guard: GuardPages {
                page: Some(page),
                secure: Mutex::new(None),
            },
            clocks: ClockGate::new(),
            started: false,
            platform,
            config,
        })
    }

    /// Create the default pagetables, attach every context and program the
    /// units.
    pub fn start(&mut self) -> Result<(), MmuError> {
        if self.default_pt.is_none() {
            self.create_default_pagetables()?;
        }
        if self.sync.is_initialized() && !self.config.microcode_supports_sync {
            error!("microcode lacks cross-core lock support");
            return Err(MmuError::SyncUnsupported);
        }

        self.attach_all()?;

        {
            let _clk = self.clocks_on()?;
            let _lock = self.cross_core_lock();
            let halts = self.fault_policy().halts();
            for (unit, dev) in self.attached_nonsecure() {
                if unit.halt_capable() && !halts {
                    let sctlr = unit.read32(&self.platform, self.table, dev.ctx(), Register::Sctlr)?;
                    unit.write32(
                        &self.platform,
                        self.table,
                        dev.ctx(),
                        Register::Sctlr,
                        sctlr | (1 << SCTLR_HUPCF_SHIFT),
                    )?;
                }
                let ttbr0 = unit.read64(&self.platform, self.table, dev.ctx(), Register::Ttbr0)?;
                dev.set_default_ttbr0(ttbr0);
            }
            self.lock_ringbuffer_in_tlb()?;
        }

        self.started = true;
        info!("IOMMU started");
        Ok(())
    }

    /// Detach every context and clear any pending fault.
    pub fn stop(&mut self) -> Result<(), MmuError> {
        self.detach_all();
        self.resume()?;
        self.started = false;
        info!("IOMMU stopped");
        Ok(())
    }

    /// Release everything `init` and `start` set up, returning the platform.
    pub fn close(mut self) -> P {
        self.detach_all();
        for mut pt in [
            self.default_pt.take(),
            self.priv_pt.take(),
            self.secure_pt.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.destroy_pagetable(&mut pt);
        }

        release_windows(&self.platform, &self.units);
        self.sync.release_region(&self.platform);

        if let Some(page) = self.guard.page.take() {
            self.platform.free_page(page);
        }
        if let Some(secure) = self.guard.secure.lock().take() {
            self.platform.free_secure(secure, SECURE_GUARD_SIZE);
        }
        info!("IOMMU closed");
        self.platform
    }

    fn create_default_pagetables(&mut self) -> Result<(), MmuError> {
        let priv_pt = if self.profile().uses_priv_bank() {
            Some(self.create_pagetable(PagetableId::PRIV)?)
        } else {
            None
        };

        let default = match self.create_pagetable(PagetableId::GLOBAL) {
            Ok(pt) => pt,
            Err(e) => {
                self.discard([priv_pt, None]);
                return Err(e);
            }
        };

        let secure = if self.config.secure {
            match self.create_secure_pagetable() {
                Ok(pt) => Some(pt),
                Err(e) => {
                    self.discard([priv_pt, Some(default)]);
                    return Err(e);
                }
            }
        } else {
            None
        };

        self.priv_pt = priv_pt;
        self.default_pt = Some(default);
        self.secure_pt = secure;
        Ok(())
    }

    fn discard<const N: usize>(&self, pts: [Option<Pagetable>; N]) {
        for mut pt in pts.into_iter().flatten() {
            self.destroy_pagetable(&mut pt);
        }
    }
}

/// Resolve a unit's contexts in id order, stopping at the first gap.
fn resolve_contexts<P: Platform>(
    platform: &P,
    config: &MmuConfig,
    index: usize,
    unit: &UnitTopology,
) -> Result<Vec<IommuDevice>, MmuError> {
    let mut devices = Vec::with_capacity(ContextId::MAX);
    for ctx in ContextId::ALL {
        let Some(entry) = unit.context(ctx) else {
            break;
        };
        let resolved = if entry.name.is_empty() {
            Err(MmuError::InvalidContextName { unit: index })
        } else {
            platform
                .context_device(entry.name)
                .ok_or(MmuError::ContextNotFound { unit: index })
        };
        match resolved {
            Ok(handle) => devices.push(IommuDevice::new(ctx, handle)),
            Err(e) if config.profile.tolerates_partial_contexts() && !devices.is_empty() => {
                warn!(unit = index, %ctx, err = %e, "context unavailable, continuing without it");
                break;
            }
            Err(e) => {
                error!(unit = index, %ctx, err = %e, "context resolution failed");
                return Err(e);
            }
        }
    }
    if devices.is_empty() {
        error!(unit = index, "no contexts");
        return Err(MmuError::NoContexts { unit: index });
    }
    Ok(devices)
}

fn map_unit_window<P: Platform>(
    platform: &P,
    config: &MmuConfig,
    index: usize,
    unit: &UnitTopology,
) -> Result<RegisterWindow, MmuError> {
    if unit.reg_start.is_null() || unit.reg_end.is_null() {
        error!(unit = index, "register range missing");
        return Err(MmuError::MissingRegisterRange { unit: index });
    }
    let size = unit.reg_size();
    let base = platform.map_window(unit.reg_start, size).map_err(|e| {
        error!(unit = index, err = %e, "register window map failed");
        MmuError::RegisterMap(e)
    })?;

    let gpuaddr = if config.profile.maps_register_window() {
        match platform.map_global(unit.reg_start, size) {
            Ok(gpuaddr) => Some(gpuaddr),
            Err(e) => {
                error!(unit = index, err = %e, "global register map failed");
                platform.unmap_window(base, size);
                return Err(MmuError::RegisterMap(e));
            }
        }
    } else {
        None
    };

    Ok(RegisterWindow {
        phys: unit.reg_start,
        size,
        base,
        gpuaddr,
    })
}

/// Unmap unit windows in reverse order.
fn release_windows<P: Platform>(platform: &P, units: &[IommuUnit]) {
    for unit in units.iter().rev() {
        let window = unit.window();
        if let Some(gpuaddr) = window.gpuaddr {
            platform.unmap_global(gpuaddr, window.size);
        }
        platform.unmap_window(window.base, window.size);
    }
}
