// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Repeat-fault suppression.

#[cfg(any(test, feature = "std"))]
use std::collections::BTreeMap;

#[cfg(not(any(test, feature = "std")))]
use alloc::collections::BTreeMap;

use gmmu_abi::layout::PAGE_SIZE;
use gmmu_abi::{Gpuaddr, PagetableId};
use spin::Mutex;

/// Last logged fault page per pagetable.
#[derive(Debug, Default)]
pub struct FaultLog {
    last: Mutex<BTreeMap<PagetableId, u64>>,
}

impl FaultLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record a fault at `addr` in `pt`.
    ///
    /// Returns `true` if the same page was the last one logged for `pt`,
    /// meaning the log line should be suppressed.
    pub fn record(&self, pt: PagetableId, addr: Gpuaddr) -> bool {
        let page = addr.as_u64() & !(PAGE_SIZE - 1);
        self.last.lock().insert(pt, page) == Some(page)
    }

    /// Forget the history of `pt`.
    pub fn forget(&self, pt: PagetableId) {
        self.last.lock().remove(&pt);
    }
}
