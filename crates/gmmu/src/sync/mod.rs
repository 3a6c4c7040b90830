// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Cross-core lock between the host and the GPU command processor.
//!
//! Peterson's two-party mutual exclusion over three shared words. The two
//! halves run on different processors:
//!
//! ```text
//!   host                                 GPU command stream
//!   ----                                 ------------------
//!   RemoteLock::acquire()                LockVars::acquire_sequence()
//!     ... TTBR0 / TLBLKCR writes ...       ... TLB lock/unlock packets ...
//!   RemoteLock::release()                LockVars::release_sequence()
//! ```
//!
//! The host half is delegated to the platform. The GPU half is a pure
//! packet generator. Both are gated on the same initialization: when the
//! platform offers no lock region the host half is a no-op and the
//! generators emit nothing.


#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::layout::PAGE_SIZE;
use gmmu_abi::pm4::{ACQUIRE_DWORDS, RELEASE_DWORDS};
use gmmu_abi::{Gpuaddr, HwProfile, LockVars, Paddr};
use tracing::{debug, warn};

use crate::error::MmuError;
use crate::platform::{MemoryOps, RemoteLock};

/// Shared lock region mapped into the global GPU address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockRegion {
    /// Page-aligned physical base.
    page: Paddr,
    /// GPU address of the mapped page.
    gpuaddr: Gpuaddr,
    /// Field addresses.
    vars: LockVars,
}

/// State of the cross-core lock for one MMU context.
#[derive(Debug, Default)]
pub struct SyncLock {
    region: Option<LockRegion>,
}

impl SyncLock {
    /// A lock that was never initialized.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { region: None }
    }

    /// Obtain and map the shared region.
    ///
    /// Only legacy SoCs with per-process pagetables use the lock. A platform
    /// without a lock region leaves the lock disabled; that is not an error.
    pub fn init<P: RemoteLock + MemoryOps + ?Sized>(
        platform: &P,
        profile: &HwProfile,
        per_process: bool,
    ) -> Result<Self, MmuError> {
        if !profile.supports_sync_lock() || !per_process {
            return Ok(Self::disabled());
        }
        let Some(phys) = platform.lock_region() else {
            warn!("cross-core lock unavailable, TLB lock-down disabled");
            return Ok(Self::disabled());
        };
        let Some((page, offset)) = phys.split_page(PAGE_SIZE) else {
            return Ok(Self::disabled());
        };
        let gpuaddr = platform
            .map_global(page, PAGE_SIZE)
            .map_err(MmuError::Platform)?;
        let vars = LockVars::at(gpuaddr.add(offset));
        debug!(phys = %phys, gpuaddr = %gpuaddr, "cross-core lock mapped");
        Ok(Self {
            region: Some(LockRegion {
                page,
                gpuaddr,
                vars,
            }),
        })
    }

    /// Checks if the lock region was obtained.
    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.region.is_some()
    }

    /// GPU addresses of the lock fields.
    #[must_use]
    pub fn vars(&self) -> Option<LockVars> {
        self.region.map(|r| r.vars)
    }

    /// Take the host side of the lock for the guard's lifetime.
    #[must_use]
    pub fn lock<'a, P: RemoteLock + ?Sized>(&self, platform: &'a P) -> SyncGuard<'a, P> {
        let held = self.is_initialized();
        if held {
            platform.acquire();
        }
        SyncGuard { platform, held }
    }

    /// Append the GPU acquire packets, returning the number of dwords.
    pub fn emit_acquire(&self, cmds: &mut Vec<u32>) -> usize {
        match self.region {
            Some(r) => {
                cmds.extend_from_slice(&r.vars.acquire_sequence());
                ACQUIRE_DWORDS
            }
            None => 0,
        }
    }

    /// Append the GPU release packets, returning the number of dwords.
    pub fn emit_release(&self, cmds: &mut Vec<u32>) -> usize {
        match self.region {
            Some(r) => {
                cmds.extend_from_slice(&r.vars.release_sequence());
                RELEASE_DWORDS
            }
            None => 0,
        }
    }

    /// Remove the global mapping; the lock is disabled afterwards.
    pub fn release_region<P: MemoryOps + ?Sized>(&mut self, platform: &P) {
        if let Some(r) = self.region.take() {
            platform.unmap_global(r.gpuaddr, PAGE_SIZE);
            debug!(page = %r.page, "cross-core lock region released");
        }
    }
}

/// Host side of the cross-core lock, released on drop.
pub struct SyncGuard<'a, P: RemoteLock + ?Sized> {
    platform: &'a P,
    held: bool,
}

impl<P: RemoteLock + ?Sized> Drop for SyncGuard<'_, P> {
    fn drop(&mut self) {
        if self.held {
            self.platform.release();
        }
    }
}
