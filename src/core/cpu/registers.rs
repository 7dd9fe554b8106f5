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

//! ARM7TDMI register file
//!
//! The register file is a flat array of physical 32-bit slots plus a
//! virtual view of 18 logical names (R0-R12, SP, LR, PC, CPSR, SPSR). The
//! virtual-to-physical mapping depends on the processor mode; banked
//! registers (the FIQ alternates for R8-R12 and the per-mode SP/LR/SPSR
//! groups) are selected by rebuilding the mapping on every mode change, so
//! reads and writes through a logical name are one table lookup each.

/// CPSR/SPSR bit masks
pub mod psr {
    /// N flag (bit 31)
    pub const NEGATIVE: u32 = 1 << 31;
    /// Z flag (bit 30)
    pub const ZERO: u32 = 1 << 30;
    /// C flag (bit 29)
    pub const CARRY: u32 = 1 << 29;
    /// V flag (bit 28)
    pub const OVERFLOW: u32 = 1 << 28;
    /// I bit (bit 7): IRQ disable
    pub const IRQ_DISABLE: u32 = 1 << 7;
    /// F bit (bit 6): FIQ disable
    pub const FIQ_DISABLE: u32 = 1 << 6;
    /// T bit (bit 5): Thumb state
    pub const THUMB: u32 = 1 << 5;
    /// Mode field (bits 4-0)
    pub const MODE_MASK: u32 = 0x1F;

    /// MSR field mask: control byte (mode, T, F, I)
    pub const MASK_CONTROL: u32 = 0x0000_00FF;
    /// MSR field mask: extension byte
    pub const MASK_EXTENSION: u32 = 0x0000_FF00;
    /// MSR field mask: status byte
    pub const MASK_STATUS: u32 = 0x00FF_0000;
    /// MSR field mask: flags byte (N, Z, C, V)
    pub const MASK_FLAGS: u32 = 0xFF00_0000;
}

/// Processor modes (CPSR bits 4-0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl Mode {
    /// Decode the CPSR mode field
    ///
    /// Returns None for the 25 reserved encodings.
    pub fn from_bits(bits: u8) -> Option<Mode> {
        match bits & 0x1F {
            0x10 => Some(Mode::User),
            0x11 => Some(Mode::Fiq),
            0x12 => Some(Mode::Irq),
            0x13 => Some(Mode::Supervisor),
            0x17 => Some(Mode::Abort),
            0x1B => Some(Mode::Undefined),
            0x1F => Some(Mode::System),
            _ => None,
        }
    }

    /// True for every mode with a banked SPSR
    pub fn has_spsr(self) -> bool {
        !matches!(self, Mode::User | Mode::System)
    }
}

/// Virtual register names
///
/// These are the names instructions operate on; the current mode decides
/// which physical slot each one reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Sp,
    Lr,
    Pc,
    Cpsr,
    Spsr,
}

impl Reg {
    /// Map a 4-bit instruction register field to its virtual name
    pub fn gpr(index: u32) -> Reg {
        match index & 0xF {
            0 => Reg::R0,
            1 => Reg::R1,
            2 => Reg::R2,
            3 => Reg::R3,
            4 => Reg::R4,
            5 => Reg::R5,
            6 => Reg::R6,
            7 => Reg::R7,
            8 => Reg::R8,
            9 => Reg::R9,
            10 => Reg::R10,
            11 => Reg::R11,
            12 => Reg::R12,
            13 => Reg::Sp,
            14 => Reg::Lr,
            _ => Reg::Pc,
        }
    }
}

/// Physical slot indices
mod phys {
    // R0-R12 shared slots are 0-12
    pub const SP: usize = 13;
    pub const LR: usize = 14;
    pub const PC: usize = 15;

    pub const R8_FIQ: usize = 16; // through R12_FIQ = 20
    pub const SP_FIQ: usize = 21;
    pub const LR_FIQ: usize = 22;
    pub const SPSR_FIQ: usize = 23;

    pub const SP_SVC: usize = 24;
    pub const LR_SVC: usize = 25;
    pub const SPSR_SVC: usize = 26;

    pub const SP_ABT: usize = 27;
    pub const LR_ABT: usize = 28;
    pub const SPSR_ABT: usize = 29;

    pub const SP_IRQ: usize = 30;
    pub const LR_IRQ: usize = 31;
    pub const SPSR_IRQ: usize = 32;

    pub const SP_UND: usize = 33;
    pub const LR_UND: usize = 34;
    pub const SPSR_UND: usize = 35;

    pub const CPSR: usize = 36;

    pub const COUNT: usize = 37;

    /// Sentinel for "no register" (SPSR in User/System)
    pub const NONE: usize = usize::MAX;
}

/// The banked register file
pub struct RegisterBank {
    /// Every physical slot, alive for the machine lifetime
    physical: [u32; phys::COUNT],

    /// Virtual name → physical slot, rebuilt on mode change
    map: [usize; 18],

    /// Cached decode of the CPSR mode field
    mode: Mode,
}

impl RegisterBank {
    /// Create a register file in Undefined mode with every slot zeroed
    ///
    /// The machine is expected to call [`reset`](Self::reset) before
    /// stepping; construction mirrors the pre-reset state.
    pub fn new() -> Self {
        let mut bank = Self {
            physical: [0; phys::COUNT],
            map: [phys::NONE; 18],
            mode: Mode::Undefined,
        };
        bank.physical[phys::CPSR] = Mode::Undefined as u32;
        bank.rebuild_map();
        bank
    }

    /// Zero all physical slots and enter Supervisor mode
    ///
    /// After reset: mode = Supervisor, T clear, IRQs enabled at the CPSR
    /// level, FIQs disabled, PC = 0.
    pub fn reset(&mut self) {
        self.physical = [0; phys::COUNT];
        self.set_cpsr(Mode::Supervisor as u32 | psr::FIQ_DISABLE);
    }

    /// Read a virtual register
    ///
    /// Reading SPSR in a mode without one returns 0.
    #[inline(always)]
    pub fn get(&self, r: Reg) -> u32 {
        let index = self.map[r as usize];
        if index == phys::NONE {
            0
        } else {
            self.physical[index]
        }
    }

    /// Write a virtual register
    ///
    /// Writes to SPSR in a mode without one are dropped. CPSR writes are
    /// routed through [`set_cpsr`](Self::set_cpsr) so mode changes rebank.
    #[inline(always)]
    pub fn set(&mut self, r: Reg, value: u32) {
        if r == Reg::Cpsr {
            self.set_cpsr(value);
            return;
        }
        let index = self.map[r as usize];
        if index == phys::NONE {
            log::trace!("write to banked SPSR dropped in mode {:?}", self.mode);
            return;
        }
        self.physical[index] = value;
    }

    /// Current CPSR value
    #[inline(always)]
    pub fn cpsr(&self) -> u32 {
        self.physical[phys::CPSR]
    }

    /// Replace CPSR, rebanking if the mode field changed
    ///
    /// A reserved mode encoding keeps the current mode bits (the rest of
    /// the word is still written).
    pub fn set_cpsr(&mut self, value: u32) {
        let value = match Mode::from_bits((value & psr::MODE_MASK) as u8) {
            Some(mode) => {
                if mode != self.mode {
                    self.mode = mode;
                    self.rebuild_map();
                }
                value
            }
            None => {
                log::warn!("reserved mode bits 0x{:02X} ignored", value & psr::MODE_MASK);
                (value & !psr::MODE_MASK) | (self.mode as u32)
            }
        };
        self.physical[phys::CPSR] = value;
    }

    /// Current mode
    #[inline(always)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Test a CPSR bit mask
    #[inline(always)]
    pub fn flag(&self, mask: u32) -> bool {
        self.cpsr() & mask != 0
    }

    /// Set or clear CPSR bits (never touches the mode field)
    pub fn set_flag(&mut self, mask: u32, set: bool) {
        let mask = mask & !psr::MODE_MASK;
        if set {
            self.physical[phys::CPSR] |= mask;
        } else {
            self.physical[phys::CPSR] &= !mask;
        }
    }

    /// Update N and Z from a result
    #[inline(always)]
    pub fn set_nz(&mut self, result: u32) {
        self.set_flag(psr::NEGATIVE, result & 0x8000_0000 != 0);
        self.set_flag(psr::ZERO, result == 0);
    }

    /// True when the CPU is in Thumb state
    #[inline(always)]
    pub fn thumb(&self) -> bool {
        self.flag(psr::THUMB)
    }

    /// Read a register through the User-mode banking, regardless of the
    /// current mode
    ///
    /// Used by LDM/STM with the S bit and by post-indexed transfers with
    /// forced user banking.
    pub fn get_user(&self, r: Reg) -> u32 {
        let index = Self::user_index(r);
        if index == phys::NONE {
            0
        } else {
            self.physical[index]
        }
    }

    /// Write a register through the User-mode banking
    pub fn set_user(&mut self, r: Reg, value: u32) {
        let index = Self::user_index(r);
        if index != phys::NONE {
            self.physical[index] = value;
        }
    }

    /// Physical index of a register under User banking
    fn user_index(r: Reg) -> usize {
        match r {
            Reg::Sp => phys::SP,
            Reg::Lr => phys::LR,
            Reg::Pc => phys::PC,
            Reg::Cpsr => phys::CPSR,
            Reg::Spsr => phys::NONE,
            gpr => gpr as usize,
        }
    }

    /// Rebuild the virtual-to-physical mapping for the current mode
    fn rebuild_map(&mut self) {
        for i in 0..=12 {
            self.map[i] = i;
        }
        if self.mode == Mode::Fiq {
            for i in 0..5 {
                self.map[Reg::R8 as usize + i] = phys::R8_FIQ + i;
            }
        }

        let (sp, lr, spsr) = match self.mode {
            Mode::User | Mode::System => (phys::SP, phys::LR, phys::NONE),
            Mode::Fiq => (phys::SP_FIQ, phys::LR_FIQ, phys::SPSR_FIQ),
            Mode::Irq => (phys::SP_IRQ, phys::LR_IRQ, phys::SPSR_IRQ),
            Mode::Supervisor => (phys::SP_SVC, phys::LR_SVC, phys::SPSR_SVC),
            Mode::Abort => (phys::SP_ABT, phys::LR_ABT, phys::SPSR_ABT),
            Mode::Undefined => (phys::SP_UND, phys::LR_UND, phys::SPSR_UND),
        };
        self.map[Reg::Sp as usize] = sp;
        self.map[Reg::Lr as usize] = lr;
        self.map[Reg::Pc as usize] = phys::PC;
        self.map[Reg::Cpsr as usize] = phys::CPSR;
        self.map[Reg::Spsr as usize] = spsr;
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_state() {
        let mut bank = RegisterBank::new();
        bank.set(Reg::R5, 0xFFFF);
        bank.reset();
        assert_eq!(bank.mode(), Mode::Supervisor);
        assert_eq!(bank.get(Reg::R5), 0);
        assert_eq!(bank.get(Reg::Pc), 0);
        assert!(!bank.flag(psr::THUMB));
        assert!(!bank.flag(psr::IRQ_DISABLE));
        assert!(bank.flag(psr::FIQ_DISABLE));
    }

    #[test]
    fn test_shared_registers_cross_modes() {
        let mut bank = RegisterBank::new();
        bank.reset();
        bank.set(Reg::R0, 0x1234);
        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::Irq as u32);
        assert_eq!(bank.get(Reg::R0), 0x1234);
    }

    #[test]
    fn test_sp_is_banked_per_mode() {
        let mut bank = RegisterBank::new();
        bank.reset();
        bank.set(Reg::Sp, 0x0300_7F00); // Supervisor SP

        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::Irq as u32);
        assert_eq!(bank.get(Reg::Sp), 0);
        bank.set(Reg::Sp, 0x0300_7FA0); // IRQ SP

        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::Supervisor as u32);
        assert_eq!(bank.get(Reg::Sp), 0x0300_7F00);

        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::User as u32);
        assert_eq!(bank.get(Reg::Sp), 0);
    }

    #[test]
    fn test_fiq_banks_r8_to_r12() {
        let mut bank = RegisterBank::new();
        bank.reset();
        bank.set(Reg::R8, 8);
        bank.set(Reg::R12, 12);
        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::Fiq as u32);
        assert_eq!(bank.get(Reg::R8), 0);
        assert_eq!(bank.get(Reg::R12), 0);
        bank.set(Reg::R8, 0x88);
        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::System as u32);
        assert_eq!(bank.get(Reg::R8), 8);
        // R7 and below are never banked
        bank.set(Reg::R7, 7);
        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::Fiq as u32);
        assert_eq!(bank.get(Reg::R7), 7);
    }

    #[test]
    fn test_spsr_sentinel_in_user_and_system() {
        let mut bank = RegisterBank::new();
        bank.reset();
        bank.set(Reg::Spsr, 0xAAAA); // Supervisor: has SPSR
        assert_eq!(bank.get(Reg::Spsr), 0xAAAA);

        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::System as u32);
        bank.set(Reg::Spsr, 0xBBBB); // dropped
        assert_eq!(bank.get(Reg::Spsr), 0);

        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::Supervisor as u32);
        assert_eq!(bank.get(Reg::Spsr), 0xAAAA);
    }

    #[test]
    fn test_reserved_mode_bits_keep_current_mode() {
        let mut bank = RegisterBank::new();
        bank.reset();
        bank.set_cpsr(psr::NEGATIVE | 0x03); // reserved mode field
        assert_eq!(bank.mode(), Mode::Supervisor);
        assert_eq!(bank.cpsr() & psr::MODE_MASK, Mode::Supervisor as u32);
        assert!(bank.flag(psr::NEGATIVE));
    }

    #[test]
    fn test_user_bank_access_from_privileged_mode() {
        let mut bank = RegisterBank::new();
        bank.reset();
        bank.set(Reg::Sp, 0x1000); // Supervisor SP
        bank.set_user(Reg::Sp, 0x2000); // User SP slot
        assert_eq!(bank.get(Reg::Sp), 0x1000);
        assert_eq!(bank.get_user(Reg::Sp), 0x2000);

        bank.set_cpsr((bank.cpsr() & !psr::MODE_MASK) | Mode::User as u32);
        assert_eq!(bank.get(Reg::Sp), 0x2000);
    }

    #[test]
    fn test_mode_encodings() {
        assert_eq!(Mode::from_bits(0x10), Some(Mode::User));
        assert_eq!(Mode::from_bits(0x11), Some(Mode::Fiq));
        assert_eq!(Mode::from_bits(0x12), Some(Mode::Irq));
        assert_eq!(Mode::from_bits(0x13), Some(Mode::Supervisor));
        assert_eq!(Mode::from_bits(0x17), Some(Mode::Abort));
        assert_eq!(Mode::from_bits(0x1B), Some(Mode::Undefined));
        assert_eq!(Mode::from_bits(0x1F), Some(Mode::System));
        assert_eq!(Mode::from_bits(0x00), None);
        assert!(Mode::Supervisor.has_spsr());
        assert!(!Mode::User.has_spsr());
        assert!(!Mode::System.has_spsr());
    }
}
