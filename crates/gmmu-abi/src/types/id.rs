// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! ID types for contexts, pagetables, and processes.

use core::fmt;

/// Logical context bank within one translation unit.
///
/// Every unit exposes its hardware clients as numbered context banks. The
/// core binds each bank to exactly one pagetable:
/// - `User` runs the per-process (or global) address space
/// - `Priv` runs the privileged bank table on legacy hardware
/// - `Secure` runs the content-protection address space
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ContextId {
    /// Global/user context (bank 0).
    User = 0,
    /// Privileged context (bank 1).
    Priv = 1,
    /// Secure context (bank 2).
    Secure = 2,
}

impl ContextId {
    /// Maximum number of context banks per unit.
    pub const MAX: usize = 3;

    /// All context ids in bank order.
    pub const ALL: [Self; Self::MAX] = [Self::User, Self::Priv, Self::Secure];

    /// Look up a context by its bank number.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::User),
            1 => Some(Self::Priv),
            2 => Some(Self::Secure),
            _ => None,
        }
    }

    /// Bank number of this context.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true for the secure context bank.
    #[inline]
    #[must_use]
    pub const fn is_secure(self) -> bool {
        matches!(self, Self::Secure)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Name of a pagetable in the external pagetable directory.
///
/// Per-process pagetables are named after the owning process; the shared
/// tables use reserved names.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PagetableId(u32);

impl PagetableId {
    /// The global (default) pagetable.
    pub const GLOBAL: Self = Self(0);

    /// The secure pagetable.
    pub const SECURE: Self = Self(0xFFFF_FFFE);

    /// The privileged bank pagetable.
    pub const PRIV: Self = Self(0xFFFF_FFFF);

    /// Creates a new pagetable id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PagetableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PagetableId({})", self.0)
    }
}

impl fmt::Display for PagetableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operating-system process id of an allocation owner.
///
/// Used only as a lookup key; the core never holds references into the
/// process it names. ID 0 means "unknown".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// The unknown/unresolved process id.
    pub const UNKNOWN: Self = Self(0);

    /// Creates a new process id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Checks if this is the unknown process id.
    #[inline]
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({})", self.0)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PagetableId> for Pid {
    /// Per-process pagetables are named after their owning process.
    fn from(id: PagetableId) -> Self {
        Self(id.as_u32())
    }
}
