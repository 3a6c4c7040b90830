// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! TLB residency lock-down of the ring buffer.
//!
//! Every page of the current ring buffer gets a pinned TLB entry in every
//! attached context, so command fetches never take a translation fault.
//! Each context owns a slice of `pages` entries starting at
//! `slot * pages`; the shared victim pointer of every context on the unit
//! is advanced after each pinned page.


use gmmu_abi::Register;
use gmmu_abi::layout::PAGE_SIZE;
use gmmu_abi::regs::{tlblkcr_lock, tlblkcr_unlock, tlblkcr_with_victim, v2pxx};
use tracing::debug;

use crate::error::MmuError;
use crate::mmu::MmuContext;
use crate::platform::Platform;
use crate::unit::{IommuDevice, IommuUnit};

fn lockable(dev: &IommuDevice) -> bool {
    dev.is_attached() && !dev.ctx().is_secure()
}

impl<P: Platform> MmuContext<P> {
    /// Pin the ring buffer's pages in the TLB of every attached context.
    ///
    /// Caller holds the clocks and the cross-core lock. Does nothing when
    /// the cross-core lock is not initialized.
    pub(crate) fn lock_ringbuffer_in_tlb(&self) -> Result<(), MmuError> {
        if !self.sync.is_initialized() {
            return Ok(());
        }
        let (rb_addr, rb_size) = self.platform.ringbuffer();
        let pages = u32::try_from(rb_size / PAGE_SIZE).unwrap_or(u32::MAX);

        for unit in &self.units {
            self.lock_unit(unit, rb_addr.as_u32(), pages)?;
        }
        debug!(pages, gpuaddr = %rb_addr, "ring buffer locked in TLB");
        Ok(())
    }

    fn lock_unit(&self, unit: &IommuUnit, rb_addr: u32, pages: u32) -> Result<(), MmuError> {
        let io = &self.platform;
        let table = self.table;
        let dev_count = u32::try_from(unit.devices().len()).unwrap_or(u32::MAX);
        let floor = pages.saturating_mul(dev_count);

        for dev in unit.devices().iter().filter(|d| lockable(d)) {
            unit.write32(io, table, dev.ctx(), Register::Tlblkcr, tlblkcr_lock(floor))?;
        }

        for (slot, dev) in unit.devices().iter().enumerate() {
            if !lockable(dev) {
                continue;
            }
            let slot = u32::try_from(slot).unwrap_or(u32::MAX);
            let base = slot.saturating_mul(pages);
            let mut vaddr = rb_addr;
            for page in 0..pages {
                unit.write32(io, table, dev.ctx(), Register::V2pur, v2pxx(page + base, vaddr))?;
                io.barrier();
                vaddr = vaddr.wrapping_add(PAGE_SIZE as u32);
                for other in unit.devices().iter().filter(|d| !d.ctx().is_secure()) {
                    let tlblkcr = unit.read32(io, table, other.ctx(), Register::Tlblkcr)?;
                    io.barrier();
                    let victim = page + 1 + base;
                    unit.write32(
                        io,
                        table,
                        other.ctx(),
                        Register::Tlblkcr,
                        tlblkcr_with_victim(tlblkcr, victim),
                    )?;
                }
            }
        }

        for dev in unit.devices().iter().filter(|d| lockable(d)) {
            let tlblkcr = unit.read32(io, table, dev.ctx(), Register::Tlblkcr)?;
            io.barrier();
            unit.write32(io, table, dev.ctx(), Register::Tlblkcr, tlblkcr_unlock(tlblkcr))?;
        }
        Ok(())
    }
}
