// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for mapping and unmapping allocations.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gmmu_abi::layout::{GUARD_SIZE, SZ_1M};
use gmmu_abi::{ContextId, Gpuaddr, HwVersion, PagetableId, Register};

use super::*;
use crate::config::MmuConfig;
use crate::error::PlatformError;
use crate::memdesc::MemFlags;
use crate::platform::{MockEvent, MockPlatform};
use crate::testing::{self, reg};

fn v2() -> MmuConfig {
    MmuConfig::new(HwVersion::V2)
}

fn desc(gpuaddr: u64, len: u64, flags: MemFlags) -> MemDesc {
    MemDesc::new(
        Gpuaddr::new(gpuaddr),
        vec![SgEntry::new(Paddr::new(0x5000_0000), len)],
        flags,
    )
}

fn mapped_events(mmu: &MmuContext<MockPlatform>) -> usize {
    mmu.platform()
        .journal()
        .iter()
        .filter(|e| matches!(e, MockEvent::Map(..)))
        .count()
}

#[test]
fn guard_page_follows_allocation() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let domain = pt.domain().unwrap();
    let md = desc(0x1000, PAGE_SIZE, MemFlags::GUARD_PAGE);

    mmu.map(pt, &md).unwrap();

    let body = mmu.platform().mapping_at(domain, Gpuaddr::new(0x1000)).unwrap();
    assert_eq!(body.prot, Prot::READ | Prot::WRITE);
    assert_eq!(body.paddr, Paddr::new(0x5000_0000));
    let guard = mmu.platform().mapping_at(domain, Gpuaddr::new(0x2000)).unwrap();
    assert_eq!(guard.prot, Prot::READ);
    assert_eq!(guard.size, GUARD_SIZE);
    assert!(mmu.platform().mapping_at(domain, Gpuaddr::new(0x3000)).is_none());

    mmu.unmap(pt, &md).unwrap();
    assert!(mmu.platform().mapping_at(domain, Gpuaddr::new(0x1000)).is_none());
    assert!(mmu.platform().mapping_at(domain, Gpuaddr::new(0x2000)).is_none());
    assert!(
        mmu.platform()
            .journal()
            .contains(&MockEvent::Unmap(domain, Gpuaddr::new(0x1000), 0x2000))
    );
}

#[test]
fn secure_memory_rejected_by_ordinary_pagetable() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let md = desc(0x10_0000, PAGE_SIZE, MemFlags::SECURE);
    mmu.platform().clear_journal();

    assert_eq!(mmu.map(pt, &md).unwrap_err(), MmuError::DomainMismatch);
    assert_eq!(mapped_events(&mmu), 0);
    let dom = mmu.platform().domain(pt.domain().unwrap()).unwrap();
    assert!(dom.mappings.is_empty());
    assert_eq!(mmu.platform().active_refs(), 0);
}

#[test]
fn ordinary_memory_rejected_by_secure_pagetable() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_secure_pagetable().unwrap();
    let md = desc(0x10_0000, PAGE_SIZE, MemFlags::empty());
    assert_eq!(mmu.map(&pt, &md).unwrap_err(), MmuError::DomainMismatch);
}

#[test]
fn unmap_ordinary_from_secure_pagetable() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_secure_pagetable().unwrap();
    let secure = desc(0x10_0000, PAGE_SIZE, MemFlags::SECURE);
    mmu.map(&pt, &secure).unwrap();
    mmu.platform().clear_journal();

    let ordinary = desc(0x10_0000, PAGE_SIZE, MemFlags::empty());
    assert_eq!(mmu.unmap(&pt, &ordinary).unwrap_err(), MmuError::DomainMismatch);
    assert!(
        !mmu.platform()
            .journal()
            .iter()
            .any(|e| matches!(e, MockEvent::Unmap(..)))
    );
    let domain = pt.domain().unwrap();
    assert!(mmu.platform().mapping_at(domain, Gpuaddr::new(0x10_0000)).is_some());
}

#[test]
fn protection_follows_flags() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let domain = pt.domain().unwrap();

    mmu.map(pt, &desc(0x10_0000, PAGE_SIZE, MemFlags::READ_ONLY)).unwrap();
    mmu.map(pt, &desc(0x20_0000, PAGE_SIZE, MemFlags::PRIVILEGED)).unwrap();

    let ro = mmu.platform().mapping_at(domain, Gpuaddr::new(0x10_0000)).unwrap();
    assert_eq!(ro.prot, Prot::READ);
    let privileged = mmu.platform().mapping_at(domain, Gpuaddr::new(0x20_0000)).unwrap();
    assert_eq!(privileged.prot, Prot::READ | Prot::WRITE | Prot::PRIV);
}

#[test]
fn large_runs_are_split_before_mapping() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let domain = pt.domain().unwrap();

    mmu.map(pt, &desc(0x100_0000, 2 * SZ_1M, MemFlags::empty())).unwrap();

    let dom = mmu.platform().domain(domain).unwrap();
    assert_eq!(dom.mappings.len(), 32);
    let last = mmu
        .platform()
        .mapping_at(domain, Gpuaddr::new(0x100_0000 + 2 * SZ_1M - 1))
        .unwrap();
    assert_eq!(last.paddr, Paddr::new(0x5000_0000 + 2 * SZ_1M - 0x1_0000));
}

#[test]
fn secure_map_keeps_original_list_and_balances_active_refs() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_secure_pagetable().unwrap();
    let md = desc(0x100_0000, PAGE_SIZE, MemFlags::SECURE);

    mmu.map(&pt, &md).unwrap();
    assert_eq!(mmu.platform().active_refs(), 0);
    mmu.unmap(&pt, &md).unwrap();
    assert_eq!(mmu.platform().active_refs(), 0);
}

#[test]
fn secure_map_fails_without_active_ref() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_secure_pagetable().unwrap();
    let err = PlatformError::new(-5, "gpu power");
    mmu.platform().fail_active(Some(err));

    let md = desc(0x100_0000, PAGE_SIZE, MemFlags::SECURE);
    assert_eq!(mmu.map(&pt, &md).unwrap_err(), MmuError::Platform(err));
    assert!(mmu.platform().domain(pt.domain().unwrap()).unwrap().mappings.is_empty());
}

#[test]
fn secure_guard_region_is_shared() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_secure_pagetable().unwrap();
    let domain = pt.domain().unwrap();
    let flags = MemFlags::SECURE | MemFlags::GUARD_PAGE;

    mmu.map(&pt, &desc(0x100_0000, SZ_1M / 2, flags)).unwrap();
    mmu.map(&pt, &desc(0x400_0000, SZ_1M / 2, flags)).unwrap();

    assert_eq!(mmu.platform().live_secure(), 1);
    let first = mmu
        .platform()
        .mapping_at(domain, Gpuaddr::new(0x100_0000 + SZ_1M / 2))
        .unwrap();
    let second = mmu
        .platform()
        .mapping_at(domain, Gpuaddr::new(0x400_0000 + SZ_1M / 2))
        .unwrap();
    assert_eq!(first.paddr, second.paddr);
    assert_eq!(first.size, SECURE_GUARD_SIZE);
}

#[test]
fn secure_guard_allocation_failure() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_secure_pagetable().unwrap();
    mmu.platform()
        .fail_alloc_secure(Some(PlatformError::new(-12, "pool exhausted")));

    let md = desc(0x100_0000, PAGE_SIZE, MemFlags::SECURE | MemFlags::GUARD_PAGE);
    assert_eq!(mmu.map(&pt, &md).unwrap_err(), MmuError::OutOfMemory);
    assert!(mmu.platform().domain(pt.domain().unwrap()).unwrap().mappings.is_empty());
}

#[test]
fn guard_failure_rolls_back() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let err = PlatformError::new(-12, "no pte");
    mmu.platform().fail_map(Some(err));

    let md = desc(0x1000, PAGE_SIZE, MemFlags::GUARD_PAGE);
    assert_eq!(mmu.map(pt, &md).unwrap_err(), MmuError::GuardPage(err));
    assert!(mmu.platform().domain(pt.domain().unwrap()).unwrap().mappings.is_empty());
}

#[test]
fn failed_rollback_keeps_guard_error() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let err = PlatformError::new(-12, "no pte");
    mmu.platform().fail_map(Some(err));
    mmu.platform()
        .fail_unmap_range(Some(PlatformError::new(-22, "bad range")));

    let md = desc(0x1000, PAGE_SIZE, MemFlags::GUARD_PAGE);
    assert_eq!(mmu.map(pt, &md).unwrap_err(), MmuError::GuardPage(err));
}

#[test]
fn map_failure_is_reported() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let err = PlatformError::new(-12, "no pte");
    mmu.platform().fail_map_range(Some(err));
    assert_eq!(
        mmu.map(pt, &desc(0x1000, PAGE_SIZE, MemFlags::empty())).unwrap_err(),
        MmuError::Map(err)
    );
}

#[test]
fn map_into_destroyed_pagetable() {
    let mmu = testing::user_only(v2());
    let mut pt = mmu.create_pagetable(PagetableId::new(4)).unwrap();
    mmu.destroy_pagetable(&mut pt);
    let md = desc(0x1000, PAGE_SIZE, MemFlags::empty());
    assert_eq!(mmu.map(&pt, &md).unwrap_err(), MmuError::NoDomain);
    assert_eq!(mmu.unmap(&pt, &md).unwrap_err(), MmuError::NoDomain);
}

#[test]
fn unmap_ignores_empty_descriptors() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    mmu.platform().clear_journal();

    mmu.unmap(pt, &MemDesc::new(Gpuaddr::new(0x1000), Vec::new(), MemFlags::empty()))
        .unwrap();
    mmu.unmap(pt, &desc(0, PAGE_SIZE, MemFlags::empty())).unwrap();
    assert!(mmu.platform().journal().is_empty());
}

#[test]
fn unmap_failure_is_reported() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let md = desc(0x1000, PAGE_SIZE, MemFlags::empty());
    mmu.map(pt, &md).unwrap();

    let err = PlatformError::new(-22, "bad range");
    mmu.platform().fail_unmap_range(Some(err));
    assert_eq!(mmu.unmap(pt, &md).unwrap_err(), MmuError::Unmap(err));
}

#[test]
fn unmap_secure_from_ordinary_pagetable() {
    let mmu = testing::user_only(v2());
    let pt = mmu.default_pagetable().unwrap();
    let md = desc(0x1000, PAGE_SIZE, MemFlags::SECURE);
    assert_eq!(mmu.unmap(pt, &md).unwrap_err(), MmuError::DomainMismatch);
}

#[test]
fn unmap_flushes_active_pagetable() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_pagetable(PagetableId::new(8)).unwrap();
    mmu.set_active_pagetable(&pt).unwrap();
    let md = desc(0x1000, PAGE_SIZE, MemFlags::empty());
    mmu.map(&pt, &md).unwrap();
    let tlbiall = reg(&mmu, 0, ContextId::User, Register::Tlbiall);

    mmu.platform().clear_journal();
    mmu.unmap(&pt, &md).unwrap();
    assert!(mmu.platform().journal().contains(&MockEvent::Write32(tlbiall, 1)));
}

#[test]
fn flush_on_map_skips_global_memory() {
    let mmu = testing::user_only(v2().with_flush_tlb_on_map(true));
    let pt = mmu.create_pagetable(PagetableId::new(8)).unwrap();
    mmu.set_active_pagetable(&pt).unwrap();
    let tlbiall = reg(&mmu, 0, ContextId::User, Register::Tlbiall);

    mmu.platform().clear_journal();
    mmu.map(&pt, &desc(0x1000, PAGE_SIZE, MemFlags::GLOBAL)).unwrap();
    assert!(!mmu.platform().journal().contains(&MockEvent::Write32(tlbiall, 1)));

    mmu.map(&pt, &desc(0x8000, PAGE_SIZE, MemFlags::empty())).unwrap();
    assert!(mmu.platform().journal().contains(&MockEvent::Write32(tlbiall, 1)));
}

#[test]
fn no_flush_on_map_by_default() {
    let mmu = testing::user_only(v2());
    let pt = mmu.create_pagetable(PagetableId::new(8)).unwrap();
    mmu.set_active_pagetable(&pt).unwrap();
    mmu.platform().clear_journal();
    mmu.map(&pt, &desc(0x1000, PAGE_SIZE, MemFlags::empty())).unwrap();
    assert!(
        !mmu.platform()
            .journal()
            .iter()
            .any(MockEvent::is_register_access)
    );
}

#[test]
fn failed_flush_keeps_committed_mapping() {
    let config = MmuConfig::new(HwVersion::V0).with_flush_tlb_on_map(true);
    let mmu = testing::started(
        config,
        &testing::topology(1, &[ContextId::User, ContextId::Priv]),
    );
    let pt = mmu.create_pagetable(PagetableId::new(8)).unwrap();
    mmu.set_active_pagetable(&pt).unwrap();
    mmu.platform()
        .fail_spin_idle(Some(PlatformError::new(-110, "idle timeout")));

    mmu.map(&pt, &desc(0x1000, PAGE_SIZE, MemFlags::empty())).unwrap();
    let domain = pt.domain().unwrap();
    assert!(mmu.platform().mapping_at(domain, Gpuaddr::new(0x1000)).is_some());
    assert_eq!(mmu.units()[0].clk_enable_count(), 0);
}

#[test]
fn secure_updates_never_flush() {
    let mmu = testing::user_only(v2().with_flush_tlb_on_map(true));
    let pt = mmu.create_secure_pagetable().unwrap();
    let ttbr0 = reg(&mmu, 0, ContextId::User, Register::Ttbr0);
    mmu.platform().set_register(ttbr0, mmu.pagetable_root(&pt));
    let tlbiall = reg(&mmu, 0, ContextId::User, Register::Tlbiall);
    let md = desc(0x100_0000, PAGE_SIZE, MemFlags::SECURE);
    mmu.platform().clear_journal();

    mmu.map(&pt, &md).unwrap();
    mmu.unmap(&pt, &md).unwrap();
    assert!(!mmu.platform().journal().contains(&MockEvent::Write32(tlbiall, 1)));
    assert!(
        !mmu.platform()
            .journal()
            .iter()
            .any(MockEvent::is_register_access)
    );
}
