// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Clock gating around register access.
//!
//! Every register touch happens between an enable and a disable. Enabling
//! retries each clock a few times; a clock that never comes up is fatal,
//! since touching registers of a partially clocked unit is undefined. After
//! a fatal failure the gate stays closed and every later enable fails
//! without touching hardware.


use core::sync::atomic::Ordering;

use spin::Once;
use tracing::error;

use crate::error::ClockError;
use crate::platform::ClockOps;
use crate::unit::IommuUnit;

/// Attempts per clock before giving up.
pub const CLOCK_RETRIES: usize = 4;

/// Which units an enable/disable applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitScope {
    /// Every unit.
    All,
    /// A single unit.
    Unit(usize),
}

impl UnitScope {
    /// Checks if a unit index is covered.
    #[inline]
    #[must_use]
    pub const fn covers(self, index: usize) -> bool {
        match self {
            Self::All => true,
            Self::Unit(i) => i == index,
        }
    }
}

/// Clock gate shared by all units of one context.
#[derive(Debug, Default)]
pub struct ClockGate {
    latched: Once<ClockError>,
}

impl ClockGate {
    /// Creates an open gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latched: Once::new(),
        }
    }

    /// Checks if a fatal clock failure was recorded.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.latched.is_completed()
    }

    /// The failure that closed the gate, if any.
    #[inline]
    #[must_use]
    pub fn latched(&self) -> Option<ClockError> {
        self.latched.get().copied()
    }

    /// Close the gate. The first failure is the one reported from then on.
    fn latch(&self, err: ClockError) -> ClockError {
        *self.latched.call_once(|| err)
    }

    /// Enable the clocks of every unit in scope.
    ///
    /// The enable count of a unit is bumped once all its clocks are on.
    pub fn enable<C: ClockOps + ?Sized>(
        &self,
        clocks: &C,
        units: &[IommuUnit],
        scope: UnitScope,
    ) -> Result<(), ClockError> {
        if let Some(err) = self.latched() {
            return Err(err);
        }
        for unit in units.iter().filter(|u| scope.covers(u.index())) {
            if let Some(set) = unit.clocks() {
                for (clock, handle) in set.iter().enumerate() {
                    let Some(handle) = handle else { continue };
                    if !prepare_enable_retry(clocks, *handle) {
                        error!(unit = unit.index(), clock, "IOMMU clk enable failed");
                        return Err(self.latch(ClockError::Fatal {
                            unit: unit.index(),
                            clock,
                        }));
                    }
                }
            }
            unit.clk_count().fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    /// Disable the clocks of every unit in scope, in reverse order.
    ///
    /// A unit whose count is already zero is rejected before anything is
    /// touched.
    pub fn disable<C: ClockOps + ?Sized>(
        &self,
        clocks: &C,
        units: &[IommuUnit],
        scope: UnitScope,
    ) -> Result<(), ClockError> {
        for unit in units.iter().filter(|u| scope.covers(u.index())) {
            let dec = unit
                .clk_count()
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n > 0).then(|| n - 1)
                });
            if dec.is_err() {
                error!(unit = unit.index(), "IOMMU clk enable count underflow");
                return Err(self.latch(ClockError::Underflow { unit: unit.index() }));
            }
            if let Some(set) = unit.clocks() {
                for handle in set.iter().rev().flatten() {
                    clocks.disable_unprepare(*handle);
                }
            }
        }
        Ok(())
    }

    /// Enable clocks for the lifetime of the returned guard.
    pub fn hold<'a, C: ClockOps + ?Sized>(
        &'a self,
        clocks: &'a C,
        units: &'a [IommuUnit],
        scope: UnitScope,
    ) -> Result<ClockGuard<'a, C>, ClockError> {
        self.enable(clocks, units, scope)?;
        Ok(ClockGuard {
            gate: self,
            clocks,
            units,
            scope,
        })
    }
}

fn prepare_enable_retry<C: ClockOps + ?Sized>(
    clocks: &C,
    handle: crate::platform::ClockHandle,
) -> bool {
    (0..CLOCK_RETRIES).any(|_| clocks.prepare_enable(handle).is_ok())
}

/// Clocks held on, disabled on drop.
pub struct ClockGuard<'a, C: ClockOps + ?Sized> {
    gate: &'a ClockGate,
    clocks: &'a C,
    units: &'a [IommuUnit],
    scope: UnitScope,
}

impl<C: ClockOps + ?Sized> Drop for ClockGuard<'_, C> {
    fn drop(&mut self) {
        // Paired with the enable in `hold`, so the count cannot underflow.
        let _ = self.gate.disable(self.clocks, self.units, self.scope);
    }
}
