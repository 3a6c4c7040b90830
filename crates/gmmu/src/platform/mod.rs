// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform abstraction for the IOMMU core.
//!
//! The traits describe every collaborator the core consumes: register
//! windows, hardware domains, clocks, the GPU device, the allocator's
//! process directory, trace events, memory and the host half of the
//! cross-core lock. A mock implementation lets the core run on the host.


// Mock requires alloc, only available with std or test
#[cfg(any(test, feature = "std"))]
mod mock;
mod traits;

#[cfg(any(test, feature = "std"))]
pub use mock::{MockDomain, MockEvent, MockMapping, MockPlatform};
pub use traits::{
    CLIENT_NORMAL, CLIENT_SECURE, ClockFailure, ClockHandle, ClockOps, ClockSet, DeviceHandle,
    DomainHandle, DomainLayout, DomainOps, GpuDevice, MemoryOps, Platform, ProcessDirectory,
    RegisterIo, RemoteLock, TraceSink,
};
