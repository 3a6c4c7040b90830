// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Error types for the IOMMU core.

use core::fmt;

use gmmu_abi::Register;

/// Opaque error reported by an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformError {
    /// Negative errno-style code.
    pub code: i32,
    /// Short description of the failing primitive.
    pub desc: &'static str,
}

impl PlatformError {
    /// Creates a new platform error.
    #[inline]
    #[must_use]
    pub const fn new(code: i32, desc: &'static str) -> Self {
        Self { code, desc }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (err {})", self.desc, self.code)
    }
}

impl core::error::Error for PlatformError {}

/// Clock gating failure.
///
/// Both variants are unrecoverable: the core refuses every later register
/// access once one is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// A clock never came up within its retry budget.
    Fatal {
        /// Unit whose clock failed.
        unit: usize,
        /// Index of the failing clock within the unit.
        clock: usize,
    },
    /// Disable without a matching enable.
    Underflow {
        /// Unit whose enable count would go negative.
        unit: usize,
    },
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal { unit, clock } => {
                write!(f, "unit {unit}: clock {clock} failed to enable")
            }
            Self::Underflow { unit } => write!(f, "unit {unit}: clock enable count underflow"),
        }
    }
}

impl core::error::Error for ClockError {}

/// Top-level error of the IOMMU core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuError {
    /// Topology lists more units than supported.
    TooManyUnits,
    /// A unit has no usable context.
    NoContexts {
        /// Unit index.
        unit: usize,
    },
    /// A context has an empty name.
    InvalidContextName {
        /// Unit index.
        unit: usize,
    },
    /// A context name did not resolve to a device.
    ContextNotFound {
        /// Unit index.
        unit: usize,
    },
    /// A unit's register window is missing from the topology.
    MissingRegisterRange {
        /// Unit index.
        unit: usize,
    },
    /// Mapping a register window failed.
    RegisterMap(PlatformError),
    /// Memory allocation failed.
    OutOfMemory,
    /// Creating a hardware domain failed.
    DomainCreation(PlatformError),
    /// Binding a domain to a context device failed.
    Attach(PlatformError),
    /// Device did not reach idle.
    Idle(PlatformError),
    /// Secure memory against a non-secure pagetable or vice versa.
    DomainMismatch,
    /// Range map failed.
    Map(PlatformError),
    /// Range unmap failed.
    Unmap(PlatformError),
    /// Guard page mapping failed.
    GuardPage(PlatformError),
    /// Fault reported for a device the core does not own.
    NoSuchDevice,
    /// Fault left stalled for the recovery path.
    Busy,
    /// Microcode lacks the opcodes of the cross-core lock.
    SyncUnsupported,
    /// Register not implemented by this hardware generation.
    UnsupportedRegister(Register),
    /// Pagetable has no domain.
    NoDomain,
    /// Operation requires a started context.
    NotStarted,
    /// Clock gating failure.
    Clock(ClockError),
    /// Other collaborator failure.
    Platform(PlatformError),
}

impl fmt::Display for MmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyUnits => write!(f, "too many IOMMU units defined"),
            Self::NoContexts { unit } => write!(f, "unit {unit}: no contexts"),
            Self::InvalidContextName { unit } => write!(f, "unit {unit}: context name missing"),
            Self::ContextNotFound { unit } => write!(f, "unit {unit}: context device not found"),
            Self::MissingRegisterRange { unit } => {
                write!(f, "unit {unit}: register range missing")
            }
            Self::RegisterMap(e) => write!(f, "register map failed: {e}"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::DomainCreation(e) => write!(f, "domain creation failed: {e}"),
            Self::Attach(e) => write!(f, "attach failed: {e}"),
            Self::Idle(e) => write!(f, "device idle failed: {e}"),
            Self::DomainMismatch => write!(f, "memory and pagetable security mismatch"),
            Self::Map(e) => write!(f, "map failed: {e}"),
            Self::Unmap(e) => write!(f, "unmap failed: {e}"),
            Self::GuardPage(e) => write!(f, "guard page map failed: {e}"),
            Self::NoSuchDevice => write!(f, "no such IOMMU device"),
            Self::Busy => write!(f, "fault stalled, device busy"),
            Self::SyncUnsupported => write!(f, "microcode lacks cross-core lock support"),
            Self::UnsupportedRegister(reg) => write!(f, "register {reg:?} not implemented"),
            Self::NoDomain => write!(f, "pagetable has no domain"),
            Self::NotStarted => write!(f, "IOMMU not started"),
            Self::Clock(e) => write!(f, "{e}"),
            Self::Platform(e) => write!(f, "{e}"),
        }
    }
}

impl core::error::Error for MmuError {}

impl From<ClockError> for MmuError {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

impl From<PlatformError> for MmuError {
    fn from(e: PlatformError) -> Self {
        Self::Platform(e)
    }
}
