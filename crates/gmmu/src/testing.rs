// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared fixtures for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::vec::Vec;

use gmmu_abi::{ContextId, Paddr, Register};

use crate::config::{ContextTopology, IommuTopology, MmuConfig, UnitTopology};
use crate::mmu::MmuContext;
use crate::platform::{DeviceHandle, MockPlatform};

/// Physical start of unit 0's register window.
pub const UNIT0_REGS: u64 = 0x0200_0000;

/// Physical start of unit 1's register window.
pub const UNIT1_REGS: u64 = 0x0210_0000;

/// Size of a register window.
pub const REGS_SIZE: u64 = 0x1_0000;

/// Device handle of a context on a unit.
pub const fn handle(unit: usize, ctx: ContextId) -> DeviceHandle {
    DeviceHandle((unit as u32 + 1) * 10 + ctx.index() as u32)
}

const fn name(unit: usize, ctx: ContextId) -> &'static str {
    match (unit, ctx) {
        (0, ContextId::User) => "gfx3d_user",
        (0, ContextId::Priv) => "gfx3d_priv",
        (0, ContextId::Secure) => "gfx3d_secure",
        (_, ContextId::User) => "gfx3d1_user",
        (_, ContextId::Priv) => "gfx3d1_priv",
        (_, ContextId::Secure) => "gfx3d1_secure",
    }
}

/// Mock platform knowing every context name of two units.
pub fn platform() -> MockPlatform {
    let platform = MockPlatform::new();
    for unit in 0..2 {
        for ctx in ContextId::ALL {
            platform.add_context(name(unit, ctx), handle(unit, ctx));
        }
    }
    platform
}

/// Topology entry of one unit with the given contexts.
pub fn unit(index: usize, ctxs: &[ContextId]) -> UnitTopology {
    let start = if index == 0 { UNIT0_REGS } else { UNIT1_REGS };
    UnitTopology {
        reg_start: Paddr::new(start),
        reg_end: Paddr::new(start + REGS_SIZE),
        contexts: ctxs
            .iter()
            .map(|&ctx| ContextTopology {
                name: name(index, ctx),
                ctx,
            })
            .collect::<Vec<_>>(),
    }
}

/// Topology of `units` units, each with the given contexts.
pub fn topology(units: usize, ctxs: &[ContextId]) -> IommuTopology {
    (0..units).fold(IommuTopology::new(), |t, i| t.with_unit(unit(i, ctxs)))
}

/// Install a log subscriber writing through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Initialized but not started context.
pub fn init(config: MmuConfig, topology: &IommuTopology) -> MmuContext<MockPlatform> {
    init_on(platform(), config, topology)
}

/// Initialized context over a preconfigured platform.
pub fn init_on(
    platform: MockPlatform,
    config: MmuConfig,
    topology: &IommuTopology,
) -> MmuContext<MockPlatform> {
    init_tracing();
    MmuContext::init(platform, config, topology).expect("init")
}

/// Started context.
pub fn started(config: MmuConfig, topology: &IommuTopology) -> MmuContext<MockPlatform> {
    let mut ctx = init(config, topology);
    ctx.start().expect("start");
    ctx
}

/// Started single-unit context with a user context only.
pub fn user_only(config: MmuConfig) -> MmuContext<MockPlatform> {
    started(config, &topology(1, &[ContextId::User]))
}

/// Mapped address of a context register.
pub fn reg(mmu: &MmuContext<MockPlatform>, unit: usize, ctx: ContextId, reg: Register) -> u64 {
    mmu.units()[unit]
        .reg_addr(mmu.profile().table(), ctx, reg)
        .expect("register implemented")
}

/// Checks that no clock is left enabled.
pub fn assert_clocks_idle(mmu: &MmuContext<MockPlatform>) {
    for unit in mmu.units() {
        assert_eq!(unit.clk_enable_count(), 0, "unit {} clocks left on", unit.index());
    }
}
