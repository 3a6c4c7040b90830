// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for ID types.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::id::{ContextId, PagetableId, Pid};

#[test]
fn context_id_bank_order() {
    for (index, ctx) in ContextId::ALL.iter().enumerate() {
        assert_eq!(ctx.index(), index);
        assert_eq!(ContextId::from_index(index), Some(*ctx));
    }
    assert_eq!(ContextId::from_index(ContextId::MAX), None);
}

#[test]
fn only_secure_bank_is_secure() {
    assert!(ContextId::Secure.is_secure());
    assert!(!ContextId::User.is_secure());
    assert!(!ContextId::Priv.is_secure());
}

#[test]
fn reserved_pagetable_names_are_distinct() {
    assert_ne!(PagetableId::GLOBAL, PagetableId::SECURE);
    assert_ne!(PagetableId::GLOBAL, PagetableId::PRIV);
    assert_ne!(PagetableId::SECURE, PagetableId::PRIV);
}

#[test]
fn pid_from_pagetable_name() {
    let pid = Pid::from(PagetableId::new(1234));
    assert_eq!(pid.as_u32(), 1234);
    assert!(Pid::UNKNOWN.is_unknown());
    assert!(!pid.is_unknown());
}
