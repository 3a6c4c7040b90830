// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Page sizes and GPU address-space layout constants.
//!
//! # GPU address space (32-bit)
//!
//! ```text
//! 0x0000_0000  unmapped
//! 0x2000_0000  mapped region (per-process allocations)
//! 0xE800_0000  secure pool (only carved out when content protection is on)
//! 0xF800_0000  global region (shared buffers, register windows)
//! ```

/// One megabyte in bytes.
const MB: u64 = 1024 * 1024;

/// One kilobyte in bytes.
const KB: u64 = 1024;

/// Standard page size (4 KB).
pub const PAGE_SIZE: u64 = 4 * KB;

/// Page size shift (log2 of `PAGE_SIZE`).
pub const PAGE_SHIFT: u32 = 12;

/// Largest unit the range-map primitive accepts in one scatter entry.
pub const SZ_64K: u64 = 64 * KB;

/// Scatter runs of at least this size are split before mapping.
pub const SZ_1M: u64 = MB;

/// Guard extent for ordinary allocations.
pub const GUARD_SIZE: u64 = PAGE_SIZE;

/// Guard extent for secure allocations.
///
/// The secure domain maps at 1 MB granularity, so the guard is backed by a
/// dedicated scratch region of this size.
pub const SECURE_GUARD_SIZE: u64 = SZ_1M;

// =============================================================================
// Mapped region
// =============================================================================

/// Base of the GPU virtual range handed out to allocations.
pub const MAPPED_MEM_BASE: u64 = 0x2000_0000;

/// Size of the mapped range, including the secure pool when carved out.
pub const MAPPED_MEM_SIZE: u64 = 0xC800_0000;

/// Size of the secure pool at the top of the mapped range.
pub const SECURE_MEM_SIZE: u64 = 256 * MB;

/// Base of the global region shared by every pagetable.
pub const GLOBAL_MEM_BASE: u64 = 0xF800_0000;

// Sanity checks
const _: () = assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
const _: () = assert!(SZ_64K % PAGE_SIZE == 0);
const _: () = assert!(SECURE_MEM_SIZE < MAPPED_MEM_SIZE);
const _: () = assert!(MAPPED_MEM_BASE + MAPPED_MEM_SIZE <= GLOBAL_MEM_BASE);

/// Round `size` up to a whole number of pages.
#[inline]
#[must_use]
pub const fn page_align(size: u64) -> u64 {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Number of pages needed to cover `size` bytes.
#[inline]
#[must_use]
pub const fn pages_for(size: u64) -> u64 {
    page_align(size) >> PAGE_SHIFT
}
