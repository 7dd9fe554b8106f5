// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Barrel shifter and ALU flag helpers
//!
//! The shifter produces `(result, carry_out)` where the carry out is the
//! last bit shifted off the end. Two variants exist: [`shift`] for
//! register-supplied amounts (amount 0 passes the value through with the
//! carry preserved) and [`shift_special`] for immediate amounts, where an
//! encoded amount of 0 selects the ARM special cases (LSR #32, ASR #32,
//! RRX).
//!
//! The arithmetic helpers return `(result, carry, overflow)` with the ARM
//! conventions: for subtraction the carry flag is the inverted borrow, and
//! SBC/RSC use the extended-precision definition `a - b - (1 - C_in)`.

/// The four shift kinds of operand-2 encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    /// Logical shift left
    Lsl,
    /// Logical shift right
    Lsr,
    /// Arithmetic shift right
    Asr,
    /// Rotate right
    Ror,
}

impl ShiftKind {
    /// Decode an instruction shift-type field (bits 6:5)
    pub fn from_bits(bits: u32) -> ShiftKind {
        match bits & 3 {
            0 => ShiftKind::Lsl,
            1 => ShiftKind::Lsr,
            2 => ShiftKind::Asr,
            _ => ShiftKind::Ror,
        }
    }
}

/// Shift with a register-supplied amount
///
/// The amount is taken modulo 256 (only the low byte of the register
/// participates). Amount 0 passes the value through unchanged with the
/// carry preserved; amounts of 32 and beyond follow the ARM long-shift
/// rules.
pub fn shift(value: u32, kind: ShiftKind, amount: u32, carry_in: bool) -> (u32, bool) {
    let amount = amount & 0xFF;
    if amount == 0 {
        return (value, carry_in);
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => (value << amount, value >> (32 - amount) & 1 != 0),
            32 => (0, value & 1 != 0),
            _ => (0, false),
        },
        ShiftKind::Lsr => match amount {
            1..=31 => (value >> amount, value >> (amount - 1) & 1 != 0),
            32 => (0, value >> 31 != 0),
            _ => (0, false),
        },
        ShiftKind::Asr => {
            if amount >= 32 {
                let sign = value >> 31 != 0;
                (if sign { u32::MAX } else { 0 }, sign)
            } else {
                (
                    ((value as i32) >> amount) as u32,
                    value >> (amount - 1) & 1 != 0,
                )
            }
        }
        ShiftKind::Ror => {
            let rotation = amount & 0x1F;
            if rotation == 0 {
                // Multiple of 32: value unchanged, carry = bit 31
                (value, value >> 31 != 0)
            } else {
                (value.rotate_right(rotation), value >> (rotation - 1) & 1 != 0)
            }
        }
    }
}

/// Shift with an immediate amount, applying the encoding's amount-0 quirks
///
/// - LSL #0: value unchanged, carry unchanged
/// - LSR #0: LSR #32 (result 0, carry = bit 31)
/// - ASR #0: ASR #32 (result = replicated sign, carry = bit 31)
/// - ROR #0: RRX (result = carry:value >> 1, carry = bit 0)
pub fn shift_special(value: u32, kind: ShiftKind, amount: u32, carry_in: bool) -> (u32, bool) {
    if amount != 0 {
        return shift(value, kind, amount, carry_in);
    }

    match kind {
        ShiftKind::Lsl => (value, carry_in),
        ShiftKind::Lsr => (0, value >> 31 != 0),
        ShiftKind::Asr => {
            let sign = value >> 31 != 0;
            (if sign { u32::MAX } else { 0 }, sign)
        }
        ShiftKind::Ror => (((carry_in as u32) << 31) | (value >> 1), value & 1 != 0),
    }
}

/// ADD with flags: result, carry out of bit 31, signed overflow
#[inline(always)]
pub fn add(a: u32, b: u32) -> (u32, bool, bool) {
    let (result, carry) = a.overflowing_add(b);
    let overflow = (!(a ^ b) & (a ^ result)) >> 31 != 0;
    (result, carry, overflow)
}

/// ADC with flags, using the extended-precision carry out
#[inline(always)]
pub fn adc(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let wide = a as u64 + b as u64 + carry_in as u64;
    let result = wide as u32;
    let carry = wide > u32::MAX as u64;
    let overflow = (!(a ^ b) & (a ^ result)) >> 31 != 0;
    (result, carry, overflow)
}

/// SUB with flags: carry = NOT borrow (a >= b)
#[inline(always)]
pub fn sub(a: u32, b: u32) -> (u32, bool, bool) {
    let result = a.wrapping_sub(b);
    let carry = a >= b;
    let overflow = ((a ^ b) & (a ^ result)) >> 31 != 0;
    (result, carry, overflow)
}

/// SBC with flags: `a - b - (1 - C_in)`, carry = NOT borrow
#[inline(always)]
pub fn sbc(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let borrow = !carry_in as u64;
    let result = (a as u64).wrapping_sub(b as u64).wrapping_sub(borrow) as u32;
    let carry = (a as u64) >= (b as u64 + borrow);
    let overflow = ((a ^ b) & (a ^ result)) >> 31 != 0;
    (result, carry, overflow)
}
