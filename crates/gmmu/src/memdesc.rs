// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory descriptors handed in by the allocator.

use core::fmt;

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use gmmu_abi::layout::{GUARD_SIZE, SECURE_GUARD_SIZE};
use gmmu_abi::{Gpuaddr, Paddr, Pid};

bitflags::bitflags! {
    /// Properties of one allocation.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemFlags: u32 {
        /// GPU may only read.
        const READ_ONLY = 1 << 0;
        /// Only privileged GPU clients may access.
        const PRIVILEGED = 1 << 1;
        /// Content-protected memory.
        const SECURE = 1 << 2;
        /// Map a read-only guard right above the allocation.
        const GUARD_PAGE = 1 << 3;
        /// Mapped in every pagetable.
        const GLOBAL = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Protection bits passed to the domain map primitives.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Prot: u32 {
        /// Readable.
        const READ = 1 << 0;
        /// Writable.
        const WRITE = 1 << 1;
        /// Privileged only.
        const PRIV = 1 << 5;
    }
}

impl Prot {
    /// Protection for an allocation with the given flags.
    #[must_use]
    pub const fn for_flags(flags: MemFlags) -> Self {
        let mut prot = Self::READ;
        if !flags.contains(MemFlags::READ_ONLY) {
            prot = prot.union(Self::WRITE);
        }
        if flags.contains(MemFlags::PRIVILEGED) {
            prot = prot.union(Self::PRIV);
        }
        prot
    }
}

/// One physically contiguous run of backing memory.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SgEntry {
    /// Physical start of the run.
    pub paddr: Paddr,
    /// Length of the run in bytes.
    pub len: u64,
}

impl SgEntry {
    /// Creates a new scatter entry.
    #[inline]
    #[must_use]
    pub const fn new(paddr: Paddr, len: u64) -> Self {
        Self { paddr, len }
    }

    /// Physical end (exclusive) of the run.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Paddr {
        self.paddr.add(self.len)
    }
}

impl fmt::Debug for SgEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SgEntry({:#x}+{:#x})", self.paddr.as_u64(), self.len)
    }
}

/// One mapped allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemDesc {
    /// GPU virtual address of the allocation.
    pub gpuaddr: Gpuaddr,
    /// Size in bytes (without guard).
    pub size: u64,
    /// Backing runs in GPU address order.
    pub sg: Vec<SgEntry>,
    /// Allocation properties.
    pub flags: MemFlags,
}

impl MemDesc {
    /// Creates a descriptor over the given backing runs.
    #[must_use]
    pub fn new(gpuaddr: Gpuaddr, sg: Vec<SgEntry>, flags: MemFlags) -> Self {
        let size = sg.iter().map(|s| s.len).sum();
        Self {
            gpuaddr,
            size,
            sg,
            flags,
        }
    }

    /// Checks if the allocation is content-protected.
    #[inline]
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.flags.contains(MemFlags::SECURE)
    }

    /// Checks if the allocation is mapped in every pagetable.
    #[inline]
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.flags.contains(MemFlags::GLOBAL)
    }

    /// Checks if a guard follows the allocation.
    #[inline]
    #[must_use]
    pub const fn has_guard_page(&self) -> bool {
        self.flags.contains(MemFlags::GUARD_PAGE)
    }

    /// Size of the guard extent (zero without a guard).
    #[inline]
    #[must_use]
    pub const fn guard_size(&self) -> u64 {
        if !self.has_guard_page() {
            0
        } else if self.is_secure() {
            SECURE_GUARD_SIZE
        } else {
            GUARD_SIZE
        }
    }

    /// Total mapped extent including the guard.
    #[inline]
    #[must_use]
    pub const fn mapped_size(&self) -> u64 {
        self.size + self.guard_size()
    }
}

/// What an allocation is used for, as shown in fault diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MemUsage {
    /// Unspecified.
    #[default]
    Any,
    /// Generic driver buffer.
    Gl,
    /// Command buffer.
    Command,
    /// Vertex array buffer.
    ArrayBuffer,
    /// Index buffer.
    ElementArrayBuffer,
    /// Vertex buffer.
    VertexArrayBuffer,
    /// Texture.
    Texture,
    /// Render target.
    RenderBuffer,
    /// Ring buffer.
    RingBuffer,
    /// Scratch memory.
    Scratch,
}

impl MemUsage {
    /// Short name as printed in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any(0)",
            Self::Gl => "gl",
            Self::Command => "cmd",
            Self::ArrayBuffer => "arraybuffer",
            Self::ElementArrayBuffer => "elementarraybuffer",
            Self::VertexArrayBuffer => "vertexarraybuffer",
            Self::Texture => "texture",
            Self::RenderBuffer => "renderbuffer",
            Self::RingBuffer => "ringbuffer",
            Self::Scratch => "scratch",
        }
    }
}

impl fmt::Display for MemUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a process's allocation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationEntry {
    /// GPU start address.
    pub gpuaddr: Gpuaddr,
    /// Size in bytes (without guard).
    pub size: u64,
    /// Allocation properties.
    pub flags: MemFlags,
    /// Usage as recorded by the allocator.
    pub usage: MemUsage,
    /// Freed by userspace but not yet released.
    pub pending_free: bool,
}

impl AllocationEntry {
    /// GPU end address (exclusive), guard excluded.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Gpuaddr {
        self.gpuaddr.add(self.size)
    }
}

/// A recently freed allocation as remembered by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreedEntry {
    /// Owner of the freed allocation.
    pub pid: Pid,
    /// GPU start address.
    pub gpuaddr: Gpuaddr,
    /// Size in bytes.
    pub size: u64,
    /// Allocation properties.
    pub flags: MemFlags,
    /// Usage as recorded by the allocator.
    pub usage: MemUsage,
}
