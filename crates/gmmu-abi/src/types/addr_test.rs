// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for address types.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::addr::{Gpuaddr, Paddr};

#[test]
fn paddr_split_page() {
    let (base, offset) = Paddr::new(0x1234_5678).split_page(0x1000).unwrap();
    assert_eq!(base, Paddr::new(0x1234_5000));
    assert_eq!(offset, 0x678);
}

#[test]
fn paddr_split_page_rejects_bad_size() {
    assert!(Paddr::new(0x1000).split_page(0).is_none());
    assert!(Paddr::new(0x1000).split_page(3000).is_none());
}

#[test]
fn gpuaddr_alignment() {
    let addr = Gpuaddr::new(0x1001);
    assert_eq!(addr.align_up(0x1000), Some(Gpuaddr::new(0x2000)));
    assert_eq!(addr.align_down(0x1000), Some(Gpuaddr::new(0x1000)));
    assert_eq!(addr.align_up(0), None);
}

#[test]
fn gpuaddr_arithmetic() {
    let addr = Gpuaddr::new(0x1000);
    assert_eq!(addr + 0x1000, Gpuaddr::new(0x2000));
    assert_eq!(addr - 0x1000, Gpuaddr::null());
    assert!(Gpuaddr::null().is_null());
}

#[test]
fn gpuaddr_display_is_fixed_width_hex() {
    assert_eq!(format!("{}", Gpuaddr::new(0x1000)), "00001000");
    assert_eq!(format!("{:?}", Gpuaddr::new(0x1000)), "Gpuaddr(0x1000)");
}

#[test]
fn command_stream_address_truncates() {
    assert_eq!(Gpuaddr::new(0x1_0000_2000).as_u32(), 0x2000);
}
