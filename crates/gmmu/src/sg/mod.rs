// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Scatter list repackaging.
//!
//! The domain map primitive takes no entry larger than 64 KB. Runs of a
//! megabyte or more are split into 64 KB pieces, with a 4 KB tail for the
//! remainder; smaller runs pass through unchanged. Physical content and
//! order are preserved.


#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::layout::{PAGE_SIZE, SZ_1M, SZ_64K};

use crate::error::MmuError;
use crate::memdesc::SgEntry;

/// Runs at least this long are split.
pub const LARGE_RUN: u64 = SZ_1M;

/// Checks if a run is long enough to be split.
#[inline]
#[must_use]
const fn is_large(entry: &SgEntry) -> bool {
    entry.len >= LARGE_RUN
}

/// Number of pieces a run turns into.
fn piece_count(entry: &SgEntry) -> usize {
    if !is_large(entry) {
        return 1;
    }
    let big = entry.len / SZ_64K;
    let tail = (entry.len % SZ_64K).div_ceil(PAGE_SIZE);
    usize::try_from(big + tail).unwrap_or(usize::MAX)
}

/// Split the large runs of `sg`.
///
/// Returns `Ok(None)` if no run needs splitting, so the caller maps the
/// original list. The new list is sized up front; an allocation failure is
/// reported as [`MmuError::OutOfMemory`].
pub fn repackage(sg: &[SgEntry]) -> Result<Option<Vec<SgEntry>>, MmuError> {
    if !sg.iter().any(is_large) {
        return Ok(None);
    }

    let total = sg
        .iter()
        .map(piece_count)
        .fold(0usize, usize::saturating_add);
    let mut out = Vec::new();
    out.try_reserve_exact(total)
        .map_err(|_| MmuError::OutOfMemory)?;

    for entry in sg {
        if !is_large(entry) {
            out.push(*entry);
            continue;
        }
        let mut paddr = entry.paddr;
        let mut remaining = entry.len;
        while remaining > 0 {
            let piece = if remaining >= SZ_64K {
                SZ_64K
            } else {
                remaining.min(PAGE_SIZE)
            };
            out.push(SgEntry::new(paddr, piece));
            paddr = paddr.add(piece);
            remaining -= piece;
        }
    }
    Ok(Some(out))
}
