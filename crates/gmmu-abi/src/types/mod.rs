// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Core type definitions for addresses and identifiers.
//!
//! These newtypes prevent accidentally mixing different address and ID types
//! at compile time.

mod addr;
mod id;

#[cfg(test)]
mod addr_test;
#[cfg(test)]
mod id_test;

pub use addr::{Gpuaddr, Paddr};
pub use id::{ContextId, PagetableId, Pid};
