// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared definitions for the GPU IOMMU management core.
//!
//! This crate is the contract between the IOMMU core and anything that has
//! to talk to the same hardware from a command stream:
//! - Address newtypes and identifiers (`Paddr`, `Gpuaddr`, `ContextId`)
//! - Register layouts for the three translation-unit generations
//! - Hardware profile: generation plus per-generation behavior flags
//! - Fault syndrome decoding
//! - Command processor (PM4) packet encoding
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data types, 100% host-testable
//! - **Selected once**: the hardware profile is chosen at bring-up and
//!   consulted everywhere instead of re-testing the generation ad hoc
//!
//! # Modules
//!
//! - [`types`]: Addresses and identifiers
//! - [`layout`]: Page sizes and GPU address-space constants
//! - [`regs`]: Register tables, hardware profile, bit fields
//! - [`fault`]: Fault syndrome decoding
//! - [`pm4`]: Command processor packets

#![cfg_attr(not(test), no_std)]

pub mod fault;
pub mod layout;
pub mod pm4;
pub mod regs;
pub mod types;


// Re-export commonly used types at crate root
pub use fault::{FaultDirection, FaultSyndrome};
pub use pm4::LockVars;
pub use regs::{HwProfile, HwVersion, RegEntry, Register, RegisterTable};
pub use types::{ContextId, Gpuaddr, Paddr, PagetableId, Pid};
