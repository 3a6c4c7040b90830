// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Command processor (PM4) packets for the cross-core lock.
//!
//! The GPU half of the host/GPU Peterson lock runs as command-stream
//! packets. This module encodes exactly the packets that protocol needs;
//! it is not a general PM4 assembler.
//!
//! # Lock variables
//!
//! ```text
//! +0  interested[HOST]
//! +4  interested[GPU]
//! +8  turn
//! ```
//!
//! `turn == HOST` (0) hands priority to the host.

use crate::types::Gpuaddr;

/// Type-3 packet: no operation.
pub const CP_NOP: u32 = 0x10;
/// Type-3 packet: wait for the pipeline to drain.
pub const CP_WAIT_FOR_IDLE: u32 = 0x26;
/// Type-3 packet: poll a memory location until it matches.
pub const CP_WAIT_REG_MEM: u32 = 0x3C;
/// Type-3 packet: write a dword to memory.
pub const CP_MEM_WRITE: u32 = 0x3D;
/// Type-3 packet: set the register protection mode.
pub const CP_SET_PROTECTED_MODE: u32 = 0x5F;
/// Type-3 packet: compare two memory locations (Peterson test).
pub const CP_TEST_TWO_MEMS: u32 = 0x71;

/// `CP_WAIT_REG_MEM` function: memory space, compare equal.
const WAIT_MEM_EQUAL: u32 = 0x13;

/// Dwords emitted by the idle sequence.
pub const IDLE_DWORDS: usize = 2;

/// Dwords emitted by [`LockVars::acquire_sequence`].
pub const ACQUIRE_DWORDS: usize = 34;

/// Dwords emitted by [`LockVars::release_sequence`].
pub const RELEASE_DWORDS: usize = 13;

/// Byte offset of `interested[HOST]` in the lock region.
pub const FLAG_HOST_OFFSET: u64 = 0;
/// Byte offset of `interested[GPU]` in the lock region.
pub const FLAG_GPU_OFFSET: u64 = 4;
/// Byte offset of `turn` in the lock region.
pub const TURN_OFFSET: u64 = 8;

/// `turn` value giving priority to the host.
pub const TURN_HOST: u32 = 0;

/// Encode a type-3 packet header.
///
/// `count` is the number of payload dwords that follow the header.
#[inline]
#[must_use]
pub const fn cp_type3_packet(opcode: u32, count: u32) -> u32 {
    (3 << 30) | ((count.wrapping_sub(1) & 0x3FFF) << 16) | ((opcode & 0xFF) << 8)
}

/// Header of a `CP_NOP` packet skipping `count` payload dwords.
#[inline]
#[must_use]
pub const fn cp_nop_packet(count: u32) -> u32 {
    cp_type3_packet(CP_NOP, count)
}

/// GPU addresses of the three Peterson lock fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockVars {
    /// `interested[HOST]`.
    pub flag_host: Gpuaddr,
    /// `interested[GPU]`.
    pub flag_gpu: Gpuaddr,
    /// `turn`.
    pub turn: Gpuaddr,
}

impl LockVars {
    /// Field addresses for a lock region mapped at `base`.
    #[inline]
    #[must_use]
    pub const fn at(base: Gpuaddr) -> Self {
        Self {
            flag_host: base.add(FLAG_HOST_OFFSET),
            flag_gpu: base.add(FLAG_GPU_OFFSET),
            turn: base.add(TURN_OFFSET),
        }
    }

    /// Packets taking the lock on behalf of the GPU.
    #[must_use]
    pub const fn acquire_sequence(&self) -> [u32; ACQUIRE_DWORDS] {
        let mut e = Emitter::<ACQUIRE_DWORDS>::new();
        e = e.mem_write(self.flag_gpu, 1);
        e = e.idle();
        e = e.wait_mem_equal(self.flag_gpu, 1);
        e = e.clear_protected_mode();
        e = e.mem_write(self.turn, TURN_HOST);
        e = e.idle();
        e = e.wait_mem_equal(self.flag_gpu, 1);
        e = e.clear_protected_mode();
        e = e.push(cp_type3_packet(CP_TEST_TWO_MEMS, 3));
        e = e.push(self.flag_host.as_u32());
        e = e.push(self.turn.as_u32());
        e = e.push(0);
        e = e.clear_protected_mode();
        e = e.idle();
        e.finish()
    }

    /// Packets dropping the GPU's claim on the lock.
    #[must_use]
    pub const fn release_sequence(&self) -> [u32; RELEASE_DWORDS] {
        let mut e = Emitter::<RELEASE_DWORDS>::new();
        e = e.mem_write(self.flag_gpu, 0);
        e = e.wait_mem_equal(self.flag_gpu, 0);
        e = e.clear_protected_mode();
        e = e.idle();
        e.finish()
    }
}

/// Fixed-size packet writer usable in const context.
struct Emitter<const N: usize> {
    buf: [u32; N],
    len: usize,
}

impl<const N: usize> Emitter<N> {
    const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
        }
    }

    const fn push(mut self, dword: u32) -> Self {
        self.buf[self.len] = dword;
        self.len += 1;
        self
    }

    const fn idle(self) -> Self {
        self.push(cp_type3_packet(CP_WAIT_FOR_IDLE, 1)).push(0)
    }

    const fn mem_write(self, addr: Gpuaddr, value: u32) -> Self {
        self.push(cp_type3_packet(CP_MEM_WRITE, 2))
            .push(addr.as_u32())
            .push(value)
    }

    const fn wait_mem_equal(self, addr: Gpuaddr, reference: u32) -> Self {
        self.push(cp_type3_packet(CP_WAIT_REG_MEM, 5))
            .push(WAIT_MEM_EQUAL)
            .push(addr.as_u32())
            .push(reference)
            .push(0x1) // mask
            .push(0x1) // poll interval
    }

    const fn clear_protected_mode(self) -> Self {
        self.push(cp_type3_packet(CP_SET_PROTECTED_MODE, 1)).push(0)
    }

    const fn finish(self) -> [u32; N] {
        debug_assert!(self.len == N, "packet sequence length mismatch");
        self.buf
    }
}
