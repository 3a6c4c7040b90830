// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Pagetables and domain management.
//!
//! A [`Pagetable`] wraps exactly one hardware domain; both are created and
//! destroyed together. Pagetables compare by their translation root masked
//! to the TTBR0 address bits.


use gmmu_abi::regs::{TLBSTATUS_SACTIVE, TTBR0_ADDR_MASK, ttbr0_with_root};
use gmmu_abi::{ContextId, PagetableId, Register};
use tracing::{debug, error, info, warn};

use crate::error::MmuError;
use crate::mmu::MmuContext;
use crate::platform::{CLIENT_NORMAL, CLIENT_SECURE, DomainHandle, DomainLayout, Platform};

/// How long a TLB flush waits for the sync to complete.
pub const TLB_SYNC_TIMEOUT_MS: u64 = 2000;

/// One GPU address space.
#[derive(Debug, PartialEq, Eq)]
pub struct Pagetable {
    id: PagetableId,
    domain: Option<DomainHandle>,
    secure: bool,
}

impl Pagetable {
    /// Directory name of the pagetable.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> PagetableId {
        self.id
    }

    /// Hardware domain, `None` once destroyed.
    #[inline]
    #[must_use]
    pub const fn domain(&self) -> Option<DomainHandle> {
        self.domain
    }

    /// Checks if this is a content-protection pagetable.
    #[inline]
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }
}

impl<P: Platform> MmuContext<P> {
    /// Create an ordinary pagetable.
    pub fn create_pagetable(&self, id: PagetableId) -> Result<Pagetable, MmuError> {
        self.new_pagetable(id, false)
    }

    /// Create the content-protection pagetable.
    pub fn create_secure_pagetable(&self) -> Result<Pagetable, MmuError> {
        self.new_pagetable(PagetableId::SECURE, true)
    }

    fn new_pagetable(&self, id: PagetableId, secure: bool) -> Result<Pagetable, MmuError> {
        let layout = DomainLayout {
            client: if secure { CLIENT_SECURE } else { CLIENT_NORMAL },
            secure,
            cacheable: self.profile().cacheable_domains(),
        };
        let domain = self.platform.create_domain(layout).map_err(|e| {
            error!(pt = %id, err = %e, "domain creation failed");
            MmuError::DomainCreation(e)
        })?;
        if let Err(e) = self.platform.register_fault_handler(domain) {
            error!(pt = %id, err = %e, "fault handler registration failed");
            self.platform.destroy_domain(domain);
            return Err(MmuError::DomainCreation(e));
        }
        debug!(pt = %id, ?domain, secure, "pagetable created");
        Ok(Pagetable {
            id,
            domain: Some(domain),
            secure,
        })
    }

    /// Release a pagetable's domain. Safe to call twice.
    ///
    /// The fault history of the id is dropped too, so a recycled id logs
    /// its first fault again.
    pub fn destroy_pagetable(&self, pt: &mut Pagetable) {
        if let Some(domain) = pt.domain.take() {
            self.platform.unregister_fault_handler(domain);
            self.platform.destroy_domain(domain);
            self.fault_log.forget(pt.id);
            debug!(pt = %pt.id, "pagetable destroyed");
        }
    }

    /// Masked translation root of a pagetable (0 without a domain).
    #[must_use]
    pub fn pagetable_root(&self, pt: &Pagetable) -> u64 {
        pt.domain
            .map_or(0, |d| self.platform.root_address(d) & TTBR0_ADDR_MASK)
    }

    /// Checks if `pt` is the pagetable whose root is `raw_root`.
    #[must_use]
    pub fn pagetable_equal(&self, pt: &Pagetable, raw_root: u64) -> bool {
        pt.domain.is_some() && self.pagetable_root(pt) == raw_root & TTBR0_ADDR_MASK
    }

    /// Bind every context to its pagetable.
    ///
    /// Contexts without a pagetable are skipped; attached ones are left
    /// alone. The first bind on a unit captures its clocks.
    pub fn attach_all(&self) -> Result<(), MmuError> {
        for unit in &self.units {
            for dev in unit.devices() {
                let Some(domain) = self.pagetable_for(dev.ctx()).and_then(Pagetable::domain) else {
                    continue;
                };
                if dev.is_attached() {
                    continue;
                }
                self.platform.attach(domain, dev.handle()).map_err(|e| {
                    error!(unit = unit.index(), ctx = %dev.ctx(), err = %e, "failed to attach device");
                    MmuError::Attach(e)
                })?;
                dev.set_attached(true);
                info!(unit = unit.index(), ctx = %dev.ctx(), ?domain, "pagetable attached");
                unit.capture_clocks(|| self.platform.unit_clocks(dev.handle()));
            }
        }
        Ok(())
    }

    /// Unbind every attached context.
    pub fn detach_all(&self) {
        for unit in &self.units {
            for dev in unit.devices().iter().filter(|d| d.is_attached()) {
                if let Some(domain) = self.pagetable_for(dev.ctx()).and_then(Pagetable::domain) {
                    self.platform.detach(domain, dev.handle());
                }
                dev.set_attached(false);
                info!(unit = unit.index(), ctx = %dev.ctx(), "pagetable detached");
            }
        }
    }

    /// Switch every unit's user context to `pt`.
    ///
    /// The GPU is idled first so no in-flight access sees a torn switch.
    /// TTBR0 keeps the control bits captured at start-up. A pagetable
    /// without a domain is refused before the hardware is touched.
    pub fn set_active_pagetable(&self, pt: &Pagetable) -> Result<(), MmuError> {
        if pt.domain.is_none() {
            return Err(MmuError::NoDomain);
        }
        let _clk = self.clocks_on()?;
        let root = self.pagetable_root(pt);

        self.platform.spin_idle().map_err(MmuError::Idle)?;

        {
            let _lock = self.cross_core_lock();
            for unit in &self.units {
                let default = unit.device(ContextId::User).map_or(0, |d| d.default_ttbr0());
                let ttbr0 = ttbr0_with_root(default, root);
                unit.write64(&self.platform, self.table, ContextId::User, Register::Ttbr0, ttbr0)?;
                self.platform.barrier();
                let readback =
                    unit.read64(&self.platform, self.table, ContextId::User, Register::Ttbr0)?;
                debug!(unit = unit.index(), ttbr0 = readback, pt = %pt.id, "TTBR0 switched");
            }
        }

        self.flush_tlb()
    }

    /// Invalidate the user context TLB of every unit.
    ///
    /// On SMMU parts the flush waits for TLBSTATUS to settle; a sync that
    /// never completes is logged and the flush still succeeds.
    pub fn flush_tlb(&self) -> Result<(), MmuError> {
        if self.profile().idle_before_flush() {
            self.platform.spin_idle().map_err(MmuError::Idle)?;
        }
        let _clk = self.clocks_on()?;
        let _lock = self.cross_core_lock();

        for unit in &self.units {
            unit.write32(&self.platform, self.table, ContextId::User, Register::Tlbiall, 1)?;
            self.platform.barrier();
            if !self.profile().flush_waits_for_sync() {
                continue;
            }
            let deadline = self.platform.now_ms() + TLB_SYNC_TIMEOUT_MS;
            unit.write32(&self.platform, self.table, ContextId::User, Register::Tlbsync, 0)?;
            while unit.read32(&self.platform, self.table, ContextId::User, Register::Tlbstatus)?
                & TLBSTATUS_SACTIVE
                != 0
            {
                if self.platform.now_ms() > deadline {
                    warn!(unit = unit.index(), "wait limit reached for IOMMU tlb flush");
                    break;
                }
                self.platform.cpu_relax();
            }
        }
        Ok(())
    }

    /// Flush the TLB if `pt` is the pagetable currently active.
    pub(crate) fn flush_tlb_if_current(&self, pt: &Pagetable) -> Result<(), MmuError> {
        let user_attached = self
            .units
            .first()
            .and_then(|u| u.device(ContextId::User))
            .is_some_and(|d| d.is_attached());
        if !self.config.per_process_pagetables || !user_attached {
            return Ok(());
        }
        let current = self.get_current_root_address()?;
        if self.pagetable_equal(pt, current) {
            self.flush_tlb()?;
        }
        Ok(())
    }
}
