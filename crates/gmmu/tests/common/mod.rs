// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for integration tests.
//!
//! This module provides a single-unit bring-up over
//! [`MockPlatform`] and a few helpers to reach unit registers.
//!
//! This module is **not** a test file, so it must comply with full clippy rules.

#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use gmmu::platform::{DeviceHandle, MockPlatform};
use gmmu::{
    ContextId, ContextTopology, IommuTopology, MmuConfig, MmuContext, MmuError, Paddr, Register,
    UnitTopology,
};

/// Physical start of the unit's register window.
pub const UNIT_REGS: u64 = 0x0200_0000;

/// Size of the register window.
pub const UNIT_REGS_SIZE: u64 = 0x1_0000;

/// Device handle of a context.
#[must_use]
pub const fn device(ctx: ContextId) -> DeviceHandle {
    DeviceHandle(10 + ctx.index() as u32)
}

const fn context_name(ctx: ContextId) -> &'static str {
    match ctx {
        ContextId::User => "gfx3d_user",
        ContextId::Priv => "gfx3d_priv",
        ContextId::Secure => "gfx3d_secure",
    }
}

/// Mock platform knowing every context of one unit.
#[must_use]
pub fn platform() -> MockPlatform {
    let platform = MockPlatform::new();
    for ctx in ContextId::ALL {
        platform.add_context(context_name(ctx), device(ctx));
    }
    platform
}

/// Topology of one unit with the given contexts.
#[must_use]
pub fn topology(ctxs: &[ContextId]) -> IommuTopology {
    IommuTopology::new().with_unit(UnitTopology {
        reg_start: Paddr::new(UNIT_REGS),
        reg_end: Paddr::new(UNIT_REGS + UNIT_REGS_SIZE),
        contexts: ctxs
            .iter()
            .map(|&ctx| ContextTopology {
                name: context_name(ctx),
                ctx,
            })
            .collect(),
    })
}

/// Initialize and start a context over `platform`.
///
/// # Errors
///
/// Returns the first bring-up failure.
pub fn bring_up_on(
    platform: MockPlatform,
    config: MmuConfig,
    ctxs: &[ContextId],
) -> Result<MmuContext<MockPlatform>, MmuError> {
    let mut mmu = MmuContext::init(platform, config, &topology(ctxs))?;
    mmu.start()?;
    Ok(mmu)
}

/// Initialize and start a context over a fresh platform.
///
/// # Errors
///
/// Returns the first bring-up failure.
pub fn bring_up(
    config: MmuConfig,
    ctxs: &[ContextId],
) -> Result<MmuContext<MockPlatform>, MmuError> {
    bring_up_on(platform(), config, ctxs)
}

/// Mapped address of a register of unit 0.
///
/// # Errors
///
/// Returns [`MmuError::UnsupportedRegister`] if the generation lacks it.
pub fn reg(mmu: &MmuContext<MockPlatform>, ctx: ContextId, reg: Register) -> Result<u64, MmuError> {
    mmu.units()
        .first()
        .ok_or(MmuError::NotStarted)?
        .reg_addr(mmu.profile().table(), ctx, reg)
}
