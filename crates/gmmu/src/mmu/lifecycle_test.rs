// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for bring-up and teardown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gmmu_abi::layout::{MAPPED_MEM_BASE, MAPPED_MEM_SIZE, PAGE_SIZE, SECURE_MEM_SIZE};
use gmmu_abi::regs::SCTLR_HUPCF_SHIFT;
use gmmu_abi::{Gpuaddr, HwVersion, PagetableId, Register};

use super::*;
use crate::config::{ContextTopology, IommuTopology, UnitTopology};
use crate::error::PlatformError;
use crate::memdesc::{MemDesc, MemFlags, SgEntry};
use crate::platform::{MockEvent, MockPlatform};
use crate::testing::{self, assert_clocks_idle, handle, reg};

fn v2() -> MmuConfig {
    MmuConfig::new(HwVersion::V2)
}

fn legacy() -> MmuConfig {
    MmuConfig::new(HwVersion::V0)
}

fn try_init(
    platform: MockPlatform,
    config: MmuConfig,
    topology: &IommuTopology,
) -> Result<MmuContext<MockPlatform>, MmuError> {
    testing::init_tracing();
    MmuContext::init(platform, config, topology)
}

fn single(name: &'static str) -> IommuTopology {
    IommuTopology::new().with_unit(UnitTopology {
        reg_start: Paddr::new(testing::UNIT0_REGS),
        reg_end: Paddr::new(testing::UNIT0_REGS + testing::REGS_SIZE),
        contexts: vec![ContextTopology {
            name,
            ctx: ContextId::User,
        }],
    })
}

// =============================================================================
// init
// =============================================================================

#[test]
fn init_maps_windows_and_guard_page() {
    let mmu = testing::init(v2(), &testing::topology(2, &[ContextId::User]));
    assert_eq!(mmu.unit_count(), 2);
    assert_eq!(mmu.platform().live_windows(), 2);
    assert_eq!(mmu.platform().live_pages(), 1);
    assert!(!mmu.is_started());
    assert!(mmu.default_pagetable().is_none());
    assert_eq!(
        mmu.mappable_range(),
        MappableRange {
            base: MAPPED_MEM_BASE,
            size: MAPPED_MEM_SIZE
        }
    );
}

#[test]
fn secure_config_shrinks_mappable_range() {
    let mmu = testing::init(v2().with_secure(true), &testing::topology(1, &[ContextId::User]));
    assert_eq!(mmu.mappable_range().size, MAPPED_MEM_SIZE - SECURE_MEM_SIZE);
}

#[test]
fn too_many_units() {
    let topo = testing::topology(3, &[ContextId::User]);
    let err = try_init(testing::platform(), v2(), &topo).err().unwrap();
    assert_eq!(err, MmuError::TooManyUnits);
}

#[test]
fn unit_without_contexts() {
    let topo = testing::topology(1, &[]);
    let err = try_init(testing::platform(), v2(), &topo).err().unwrap();
    assert_eq!(err, MmuError::NoContexts { unit: 0 });
}

#[test]
fn empty_context_name() {
    let err = try_init(testing::platform(), v2(), &single("")).err().unwrap();
    assert_eq!(err, MmuError::InvalidContextName { unit: 0 });
}

#[test]
fn unknown_context_name() {
    let err = try_init(testing::platform(), v2(), &single("nope")).err().unwrap();
    assert_eq!(err, MmuError::ContextNotFound { unit: 0 });
}

#[test]
fn missing_later_context_tolerated_on_smmu() {
    let platform = MockPlatform::new();
    platform.add_context("gfx3d_user", handle(0, ContextId::User));
    let topo = testing::topology(1, &[ContextId::User, ContextId::Priv]);

    let mmu = try_init(platform, v2(), &topo).unwrap();
    assert_eq!(mmu.units()[0].devices().len(), 1);
}

#[test]
fn missing_later_context_fatal_on_legacy() {
    let platform = MockPlatform::new();
    platform.add_context("gfx3d_user", handle(0, ContextId::User));
    let topo = testing::topology(1, &[ContextId::User, ContextId::Priv]);

    let err = try_init(platform, legacy(), &topo).err().unwrap();
    assert_eq!(err, MmuError::ContextNotFound { unit: 0 });
}

#[test]
fn contexts_stop_at_first_gap() {
    let topo = testing::topology(1, &[ContextId::User, ContextId::Secure]);
    let mmu = testing::init(v2(), &topo);
    let ctxs: Vec<ContextId> = mmu.units()[0].devices().iter().map(|d| d.ctx()).collect();
    assert_eq!(ctxs, vec![ContextId::User]);
}

#[test]
fn missing_register_range() {
    let mut topo = testing::topology(1, &[ContextId::User]);
    topo.units[0].reg_start = Paddr::null();
    let err = try_init(testing::platform(), v2(), &topo).err().unwrap();
    assert_eq!(err, MmuError::MissingRegisterRange { unit: 0 });
}

#[test]
fn window_map_failure() {
    let platform = testing::platform();
    let err = PlatformError::new(-12, "ioremap");
    platform.fail_map_window(Some(err));
    let got = try_init(platform, v2(), &testing::topology(1, &[ContextId::User]))
        .err()
        .unwrap();
    assert_eq!(got, MmuError::RegisterMap(err));
}

#[test]
fn global_window_failure_unwinds() {
    let platform = testing::platform();
    let observer = platform.clone();
    let err = PlatformError::new(-12, "global map");
    platform.fail_map_global(Some(err));
    let topo = testing::topology(2, &[ContextId::User, ContextId::Priv]);

    let got = try_init(platform, legacy(), &topo).err().unwrap();
    assert_eq!(got, MmuError::RegisterMap(err));
    assert_eq!(observer.live_windows(), 0);
    assert_eq!(observer.live_globals(), 0);
}

#[test]
fn legacy_windows_are_mapped_globally() {
    let mmu = testing::init(legacy(), &testing::topology(1, &[ContextId::User]));
    assert_eq!(mmu.platform().live_globals(), 1);
    assert!(mmu.units()[0].window().gpuaddr.is_some());
}

#[test]
fn sync_lock_initialized_on_legacy() {
    let platform = testing::platform();
    platform.set_lock_region(Some(Paddr::new(0x8000_0000)));
    let mmu = testing::init_on(platform, legacy(), &testing::topology(1, &[ContextId::User]));
    assert!(mmu.sync_lock().is_initialized());
    assert_eq!(mmu.platform().live_globals(), 2);
}

#[test]
fn guard_page_failure_releases_everything() {
    let platform = testing::platform();
    let observer = platform.clone();
    platform.set_lock_region(Some(Paddr::new(0x8000_0000)));
    platform.fail_alloc_page(Some(PlatformError::new(-12, "no pages")));
    let topo = testing::topology(2, &[ContextId::User, ContextId::Priv]);

    assert_eq!(
        try_init(platform, legacy(), &topo).err().unwrap(),
        MmuError::OutOfMemory
    );
    assert_eq!(observer.live_windows(), 0);
    assert_eq!(observer.live_globals(), 0);
    assert_eq!(observer.live_pages(), 0);
}

#[test]
fn context_failure_maps_nothing() {
    let platform = MockPlatform::new();
    let observer = platform.clone();
    let topo = testing::topology(1, &[ContextId::User]);
    assert!(try_init(platform, v2(), &topo).is_err());
    assert_eq!(observer.live_windows(), 0);
}

// =============================================================================
// start / stop
// =============================================================================

#[test]
fn start_programs_units() {
    let mmu = testing::user_only(v2());
    assert!(mmu.is_started());
    let pt = mmu.default_pagetable().unwrap();
    assert_eq!(pt.id(), PagetableId::GLOBAL);
    assert!(mmu.priv_pagetable().is_none());
    assert!(mmu.secure_pagetable().is_none());

    let sctlr = reg(&mmu, 0, ContextId::User, Register::Sctlr);
    assert_eq!(mmu.platform().register(sctlr), 1 << SCTLR_HUPCF_SHIFT);
    assert_clocks_idle(&mmu);
}

#[test]
fn halting_start_leaves_hupcf_clear() {
    let config = v2().with_fault_policy(FaultPolicy::GPUHALT_ENABLE);
    let mmu = testing::user_only(config);
    let sctlr = reg(&mmu, 0, ContextId::User, Register::Sctlr);
    assert_eq!(mmu.platform().register(sctlr), 0);
}

#[test]
fn legacy_start_creates_priv_bank() {
    let mmu = testing::started(
        legacy(),
        &testing::topology(1, &[ContextId::User, ContextId::Priv]),
    );
    assert_eq!(mmu.priv_pagetable().unwrap().id(), PagetableId::PRIV);
    let sctlr = reg(&mmu, 0, ContextId::User, Register::Sctlr);
    assert_eq!(mmu.platform().register(sctlr), 0);
}

#[test]
fn secure_start_binds_secure_context() {
    let mmu = testing::started(v2().with_secure(true), &testing::topology(1, &ContextId::ALL));
    let secure = mmu.secure_pagetable().unwrap();
    assert!(secure.is_secure());
    assert_eq!(
        mmu.platform().attached_domain(handle(0, ContextId::Secure)),
        secure.domain()
    );
    let sctlr = reg(&mmu, 0, ContextId::Secure, Register::Sctlr);
    assert_eq!(mmu.platform().register(sctlr), 0);
}

#[test]
fn start_rejects_microcode_without_lock_opcodes() {
    let platform = testing::platform();
    platform.set_lock_region(Some(Paddr::new(0x8000_0000)));
    let mut mmu = testing::init_on(
        platform,
        legacy().with_microcode_sync(false),
        &testing::topology(1, &[ContextId::User]),
    );
    assert_eq!(mmu.start().unwrap_err(), MmuError::SyncUnsupported);
    assert!(!mmu.is_started());
}

#[test]
fn pagetable_creation_failure_fails_start() {
    let mut mmu = testing::init(v2(), &testing::topology(1, &[ContextId::User]));
    let err = PlatformError::new(-12, "no domains");
    mmu.platform().fail_create_domain(Some(err));
    assert_eq!(mmu.start().unwrap_err(), MmuError::DomainCreation(err));
    assert_eq!(mmu.platform().domain_count(), 0);
}

#[test]
fn secure_creation_failure_discards_default() {
    let mut mmu = testing::init(
        legacy().with_secure(true),
        &testing::topology(1, &ContextId::ALL),
    );
    let err = PlatformError::new(-12, "no secure domains");
    mmu.platform().fail_secure_domain(Some(err));

    assert_eq!(mmu.start().unwrap_err(), MmuError::DomainCreation(err));
    assert_eq!(mmu.platform().domain_count(), 0);
    assert!(mmu.default_pagetable().is_none());
    assert!(mmu.priv_pagetable().is_none());
}

#[test]
fn stop_then_restart() {
    let mut mmu = testing::user_only(v2());
    let domains = mmu.platform().domain_count();
    mmu.stop().unwrap();
    assert!(!mmu.is_started());
    assert!(!mmu.units()[0].device(ContextId::User).unwrap().is_attached());

    mmu.platform().clear_journal();
    mmu.start().unwrap();
    assert!(mmu.is_started());
    assert_eq!(mmu.platform().domain_count(), domains);
    assert!(
        mmu.platform()
            .journal()
            .iter()
            .any(|e| matches!(e, MockEvent::Attach(..)))
    );
}

#[test]
fn stop_clears_pending_fault() {
    let mut mmu = testing::user_only(v2());
    let fsr = reg(&mmu, 0, ContextId::User, Register::Fsr);
    mmu.platform().set_register(fsr, 1);
    mmu.handle_fault(handle(0, ContextId::User), Gpuaddr::new(0x1000))
        .unwrap();
    assert!(mmu.fault_pending());

    mmu.stop().unwrap();
    assert!(!mmu.fault_pending());
}

// =============================================================================
// close
// =============================================================================

#[test]
fn close_releases_everything() {
    let platform = testing::platform();
    platform.set_lock_region(Some(Paddr::new(0x8000_0000)));
    let mut mmu = testing::init_on(
        platform,
        legacy().with_secure(true),
        &testing::topology(2, &ContextId::ALL),
    );
    mmu.start().unwrap();

    let secure = mmu.secure_pagetable().unwrap();
    let md = MemDesc::new(
        Gpuaddr::new(0x100_0000),
        vec![SgEntry::new(Paddr::new(0xB000_0000), PAGE_SIZE)],
        MemFlags::SECURE | MemFlags::GUARD_PAGE,
    );
    mmu.map(secure, &md).unwrap();
    assert_eq!(mmu.platform().live_secure(), 1);

    let platform = mmu.close();
    assert_eq!(platform.domain_count(), 0);
    assert_eq!(platform.live_windows(), 0);
    assert_eq!(platform.live_globals(), 0);
    assert_eq!(platform.live_pages(), 0);
    assert_eq!(platform.live_secure(), 0);
    assert_eq!(platform.attached_domain(handle(0, ContextId::User)), None);
}

#[test]
fn close_without_start() {
    let mmu = testing::init(v2(), &testing::topology(1, &[ContextId::User]));
    let platform = mmu.close();
    assert_eq!(platform.live_windows(), 0);
    assert_eq!(platform.live_pages(), 0);
}
