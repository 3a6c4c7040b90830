// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # GPU IOMMU core
//!
//! Management of the translation units sitting between an Adreno-class GPU
//! and system memory.
//!
//! This crate:
//! - Brings up the units from a platform topology and gates their clocks
//! - Creates pagetables, binds them to contexts and switches the active one
//! - Maps allocations with guard pages and splits large physical runs
//! - Handles translation faults with deduplicated diagnostics
//! - Pins the ring buffer in the TLB under a host/GPU cross-core lock
//!
//! Everything hardware- or OS-specific goes through the traits in
//! [`platform`], so the core runs unchanged on the host against
//! [`MockPlatform`](platform::MockPlatform).

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod map;
pub mod memdesc;
pub mod mmu;
pub mod pagetable;
pub mod platform;
pub mod sg;
pub mod sync;
pub mod tlb_lock;
pub mod unit;

#[cfg(test)]
mod testing;

pub use clock::{ClockGate, UnitScope};
pub use config::{
    ContextTopology, FaultPolicy, IommuTopology, MAX_CLOCKS, MAX_UNITS, MmuConfig, UnitTopology,
};
pub use error::{ClockError, MmuError, PlatformError};
pub use fault::FaultOutcome;
pub use memdesc::{AllocationEntry, FreedEntry, MemDesc, MemFlags, MemUsage, Prot, SgEntry};
pub use mmu::{MappableRange, MmuContext, ProtectedRegisters};
pub use pagetable::Pagetable;

pub use gmmu_abi::{
    ContextId, FaultDirection, Gpuaddr, HwProfile, HwVersion, Paddr, PagetableId, Pid, Register,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
