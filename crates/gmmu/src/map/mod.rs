// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mapping allocations into pagetables.
//!
//! ```text
//!   gpuaddr                     gpuaddr + size        + guard
//!   |<-------- allocation -------->|<---- guard ---->|
//!          prot (RW / RO / PRIV)      prot without WRITE
//! ```
//!
//! Secure allocations only go into the secure pagetable and vice versa.
//! Their guard is backed by a shared 1 MB secure scratch region.

#[cfg(test)]
mod map_test;

use gmmu_abi::Paddr;
use gmmu_abi::layout::{PAGE_SIZE, SECURE_GUARD_SIZE};
use tracing::{debug, error, warn};

use crate::error::MmuError;
use crate::memdesc::{MemDesc, Prot, SgEntry};
use crate::mmu::MmuContext;
use crate::pagetable::Pagetable;
use crate::platform::{DomainHandle, Platform};
use crate::sg;

/// Active reference held while touching secure mappings.
struct ActiveRef<'a, P: Platform> {
    platform: &'a P,
}

impl<'a, P: Platform> ActiveRef<'a, P> {
    fn take(platform: &'a P) -> Result<Self, MmuError> {
        platform.active_count_get().map_err(MmuError::Platform)?;
        Ok(Self { platform })
    }
}

impl<P: Platform> Drop for ActiveRef<'_, P> {
    fn drop(&mut self) {
        self.platform.active_count_put();
    }
}

impl<P: Platform> MmuContext<P> {
    /// Map an allocation and its guard into `pt`.
    ///
    /// On a guard failure the allocation itself is unmapped again so the
    /// pagetable is left as it was. Once the mapping is committed the call
    /// succeeds even if the follow-up TLB flush fails.
    pub fn map(&self, pt: &Pagetable, memdesc: &MemDesc) -> Result<(), MmuError> {
        let domain = pt.domain().ok_or(MmuError::NoDomain)?;
        if memdesc.is_secure() != pt.is_secure() {
            warn!(
                pt = %pt.id(),
                gpuaddr = %memdesc.gpuaddr,
                secure = memdesc.is_secure(),
                "memory and pagetable security mismatch"
            );
            return Err(MmuError::DomainMismatch);
        }

        let prot = Prot::for_flags(memdesc.flags);

        if memdesc.is_secure() {
            let _active = ActiveRef::take(&self.platform)?;
            self.map_sg(domain, memdesc, &memdesc.sg, prot)?;
        } else {
            let repacked = sg::repackage(&memdesc.sg)?;
            let list = repacked.as_deref().unwrap_or(&memdesc.sg);
            self.map_sg(domain, memdesc, list, prot)?;
        }

        if memdesc.has_guard_page() {
            if let Err(e) = self.map_guard(domain, memdesc, prot) {
                error!(pt = %pt.id(), gpuaddr = %memdesc.gpuaddr, err = %e, "guard page map failed");
                if let Err(undo) = self
                    .platform
                    .unmap_range(domain, memdesc.gpuaddr, memdesc.size)
                {
                    warn!(pt = %pt.id(), gpuaddr = %memdesc.gpuaddr, err = %undo, "rollback unmap failed");
                }
                return Err(e);
            }
        }

        if self.config.flush_tlb_on_map {
            self.flush_after_update(pt, memdesc);
        }
        debug!(pt = %pt.id(), gpuaddr = %memdesc.gpuaddr, size = memdesc.size, "mapped");
        Ok(())
    }

    /// Remove an allocation and its guard from `pt`.
    ///
    /// A descriptor with no size or address is ignored.
    pub fn unmap(&self, pt: &Pagetable, memdesc: &MemDesc) -> Result<(), MmuError> {
        let Some(gpuaddr) = memdesc.gpuaddr.align_up(PAGE_SIZE) else {
            return Ok(());
        };
        if memdesc.size == 0 || gpuaddr.is_null() {
            return Ok(());
        }
        let domain = pt.domain().ok_or(MmuError::NoDomain)?;
        let range = memdesc.mapped_size();

        if memdesc.is_secure() != pt.is_secure() {
            warn!(
                pt = %pt.id(),
                gpuaddr = %gpuaddr,
                secure = memdesc.is_secure(),
                "memory and pagetable security mismatch"
            );
            return Err(MmuError::DomainMismatch);
        }
        let active = if memdesc.is_secure() {
            Some(ActiveRef::take(&self.platform)?)
        } else {
            None
        };
        self.platform
            .unmap_range(domain, gpuaddr, range)
            .map_err(|e| {
                error!(pt = %pt.id(), gpuaddr = %gpuaddr, range, err = %e, "unmap failed");
                MmuError::Unmap(e)
            })?;
        drop(active);

        self.flush_after_update(pt, memdesc);
        debug!(pt = %pt.id(), gpuaddr = %gpuaddr, range, "unmapped");
        Ok(())
    }

    /// Flush `pt` after a committed update if it is the loaded pagetable.
    ///
    /// Global and secure allocations never trigger a flush. A failed flush
    /// leaves the update in place and is only logged.
    fn flush_after_update(&self, pt: &Pagetable, memdesc: &MemDesc) {
        if memdesc.is_global() || memdesc.is_secure() {
            return;
        }
        if let Err(e) = self.flush_tlb_if_current(pt) {
            warn!(pt = %pt.id(), gpuaddr = %memdesc.gpuaddr, err = %e, "TLB flush after update failed");
        }
    }

    fn map_sg(
        &self,
        domain: DomainHandle,
        memdesc: &MemDesc,
        sg: &[SgEntry],
        prot: Prot,
    ) -> Result<(), MmuError> {
        self.platform
            .map_range(domain, memdesc.gpuaddr, sg, prot)
            .map_err(|e| {
                error!(gpuaddr = %memdesc.gpuaddr, size = memdesc.size, err = %e, "map_range failed");
                MmuError::Map(e)
            })
    }

    fn map_guard(&self, domain: DomainHandle, memdesc: &MemDesc, prot: Prot) -> Result<(), MmuError> {
        let backing = if memdesc.is_secure() {
            self.secure_guard()?
        } else {
            self.guard.page.ok_or(MmuError::OutOfMemory)?
        };
        self.platform
            .map(
                domain,
                memdesc.gpuaddr.add(memdesc.size),
                backing,
                memdesc.guard_size(),
                prot.difference(Prot::WRITE),
            )
            .map_err(MmuError::GuardPage)
    }

    /// Secure guard backing, allocated on first use.
    fn secure_guard(&self) -> Result<Paddr, MmuError> {
        let mut slot = self.guard.secure.lock();
        if let Some(paddr) = *slot {
            return Ok(paddr);
        }
        let paddr = self
            .platform
            .alloc_secure(SECURE_GUARD_SIZE)
            .map_err(|_| MmuError::OutOfMemory)?;
        *slot = Some(paddr);
        debug!(paddr = %paddr, "secure guard region allocated");
        Ok(paddr)
    }
}
