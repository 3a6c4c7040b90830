// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Page fault diagnostics: allocations around the faulting address.

use core::fmt;

use gmmu_abi::{Gpuaddr, Pid};

use crate::memdesc::{AllocationEntry, FreedEntry, MemFlags};
use crate::platform::ProcessDirectory;

/// An allocation with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedEntry {
    /// Owning process.
    pub pid: Pid,
    /// The allocation.
    pub entry: AllocationEntry,
}

impl fmt::Display for OwnedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.entry;
        write!(
            f,
            "[{} - {}] {} {} (pid = {}) ({})",
            e.gpuaddr,
            e.end(),
            if e.flags.contains(MemFlags::GUARD_PAGE) {
                "(+guard)"
            } else {
                ""
            },
            if e.pending_free { "(pending free)" } else { "" },
            self.pid,
            e.usage,
        )
    }
}

/// Closest allocations on either side of a fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NearbyMemory {
    /// Highest allocation starting at or below the fault.
    pub prev: Option<OwnedEntry>,
    /// Lowest allocation starting at or above the fault.
    pub next: Option<OwnedEntry>,
}

/// Scan every process for the allocations closest to `addr`.
///
/// Allocations at address zero are never reported as the previous entry.
pub fn find_nearby<D: ProcessDirectory + ?Sized>(dir: &D, addr: Gpuaddr) -> NearbyMemory {
    let mut found = NearbyMemory::default();
    dir.for_each_process(&mut |pid, entries| {
        let prev = entries
            .iter()
            .take_while(|e| e.gpuaddr <= addr)
            .filter(|e| !e.gpuaddr.is_null())
            .max_by_key(|e| e.gpuaddr);
        if let Some(e) = prev {
            if found.prev.is_none_or(|p| e.gpuaddr > p.entry.gpuaddr) {
                found.prev = Some(OwnedEntry { pid, entry: *e });
            }
        }

        let next = entries
            .iter()
            .rev()
            .take_while(|e| e.gpuaddr >= addr)
            .min_by_key(|e| e.gpuaddr);
        if let Some(e) = next {
            if found.next.is_none_or(|n| e.gpuaddr < n.entry.gpuaddr) {
                found.next = Some(OwnedEntry { pid, entry: *e });
            }
        }
    });
    found
}

/// Log lines describing the neighborhood of a fault.
pub struct NearbyReport<'a> {
    /// Faulting address.
    pub addr: Gpuaddr,
    /// Neighbors.
    pub nearby: &'a NearbyMemory,
}

impl fmt::Display for NearbyReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---- nearby memory ----")?;
        match &self.nearby.prev {
            Some(p) => writeln!(f, "{p}")?,
            None => writeln!(f, "*EMPTY*")?,
        }
        writeln!(f, " <- fault @ {}", self.addr)?;
        match &self.nearby.next {
            Some(n) => write!(f, "{n}"),
            None => write!(f, "*EMPTY*"),
        }
    }
}

/// Log lines for an access to memory the process already freed.
pub struct FreedReport<'a>(pub &'a FreedEntry);

impl fmt::Display for FreedReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.0;
        writeln!(f, "---- premature free ----")?;
        write!(
            f,
            "[{}-{}] ({}) was already freed by pid {}",
            e.gpuaddr,
            e.gpuaddr.add(e.size),
            e.usage,
            e.pid,
        )
    }
}
