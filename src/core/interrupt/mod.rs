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

//! GBA Interrupt Controller
//!
//! The interrupt controller owns the IE/IF register pair of the I/O
//! aperture and decides which hardware requests reach the CPU.
//!
//! ## Registers
//!
//! - **IE** (0x04000200): Interrupt enable register (R/W)
//!   - 1 = interrupt source enabled, 0 = disabled
//!
//! - **IF** (0x04000202): Interrupt request register (R/W)
//!   - Reading returns the pending request flags
//!   - Writing 1 to a bit acknowledges that interrupt (clears the bit)
//!   - Writing 0 to a bit has no effect
//!
//! ## Interrupt Sources (Bit Positions)
//!
//! ```text
//! Bit  | Source    | Description
//! -----|-----------|----------------------------------
//! 0    | VBLANK    | Vertical blank
//! 1    | HBLANK    | Horizontal blank
//! 2    | VCOUNT    | Scanline compare match
//! 3    | TIMER0    | Timer 0 overflow
//! 4    | TIMER1    | Timer 1 overflow
//! 5    | TIMER2    | Timer 2 overflow
//! 6    | TIMER3    | Timer 3 overflow
//! 7    | SERIAL    | Serial communication
//! 8    | DMA0      | DMA channel 0 complete
//! 9    | DMA1      | DMA channel 1 complete
//! 10   | DMA2      | DMA channel 2 complete
//! 11   | DMA3      | DMA channel 3 complete
//! 12   | KEYPAD    | Key input condition
//! 13   | GAMEPAK   | Cartridge interrupt line
//! 14-15| -         | Not used
//! ```

/// Interrupt source bit flags
///
/// These constants represent the bit positions in IE and IF
/// for each interrupt source.
pub mod interrupts {
    /// Vertical blank interrupt (bit 0)
    pub const VBLANK: u16 = 1 << 0;

    /// Horizontal blank interrupt (bit 1)
    pub const HBLANK: u16 = 1 << 1;

    /// Scanline compare match interrupt (bit 2)
    pub const VCOUNT: u16 = 1 << 2;

    /// Timer 0 overflow interrupt (bit 3)
    pub const TIMER0: u16 = 1 << 3;

    /// Timer 1 overflow interrupt (bit 4)
    pub const TIMER1: u16 = 1 << 4;

    /// Timer 2 overflow interrupt (bit 5)
    pub const TIMER2: u16 = 1 << 5;

    /// Timer 3 overflow interrupt (bit 6)
    pub const TIMER3: u16 = 1 << 6;

    /// Serial communication interrupt (bit 7)
    pub const SERIAL: u16 = 1 << 7;

    /// DMA channel 0 completion interrupt (bit 8)
    pub const DMA0: u16 = 1 << 8;

    /// DMA channel 1 completion interrupt (bit 9)
    pub const DMA1: u16 = 1 << 9;

    /// DMA channel 2 completion interrupt (bit 10)
    pub const DMA2: u16 = 1 << 10;

    /// DMA channel 3 completion interrupt (bit 11)
    pub const DMA3: u16 = 1 << 11;

    /// Keypad interrupt (bit 12)
    pub const KEYPAD: u16 = 1 << 12;

    /// Game Pak interrupt line (bit 13)
    pub const GAMEPAK: u16 = 1 << 13;
}

/// GBA interrupt controller
///
/// Holds the IE/IF register pair and gates hardware requests against the
/// enable mask before they become pending for the CPU.
///
/// # Example
///
/// ```
/// use gbarx::core::interrupt::{interrupts, InterruptController};
///
/// let mut ic = InterruptController::new();
///
/// // Enable V-blank interrupts, then request one
/// ic.write_enable(interrupts::VBLANK as u32);
/// ic.request(interrupts::VBLANK);
/// assert!(ic.is_pending());
///
/// // Acknowledge it (write 1 to clear)
/// ic.write_request(interrupts::VBLANK as u32);
/// assert!(!ic.is_pending());
/// ```
pub struct InterruptController {
    /// IE (0x04000200) - Interrupt enable register
    enable: u16,

    /// IF (0x04000202) - Interrupt request register
    ///
    /// Each bit is a pending request from a specific source. Writing 1 to
    /// a bit acknowledges (clears) that request; writing 0 leaves it alone.
    request: u16,
}

impl InterruptController {
    /// Create a new interrupt controller with all sources disabled and no
    /// pending requests
    pub fn new() -> Self {
        Self {
            enable: 0,
            request: 0,
        }
    }

    /// Reset both registers to zero
    pub fn reset(&mut self) {
        self.enable = 0;
        self.request = 0;
    }

    /// Request an interrupt
    ///
    /// Sets the IF bits for the given source mask, gated by IE: a request
    /// for a disabled source is discarded. This is the path hardware events
    /// (video edges, DMA completion) arrive through.
    ///
    /// # Arguments
    ///
    /// * `interrupt` - Interrupt bit(s) to raise (can be multiple ORed together)
    ///
    /// # Returns
    ///
    /// true if any of the requested bits landed (i.e. the CPU should be
    /// notified / woken from HALT)
    ///
    /// # Example
    ///
    /// ```
    /// use gbarx::core::interrupt::{interrupts, InterruptController};
    ///
    /// let mut ic = InterruptController::new();
    ///
    /// // Masked: nothing lands
    /// assert!(!ic.request(interrupts::HBLANK));
    ///
    /// ic.write_enable(interrupts::HBLANK as u32);
    /// assert!(ic.request(interrupts::HBLANK));
    /// ```
    pub fn request(&mut self, interrupt: u16) -> bool {
        let armed = interrupt & self.enable;
        self.request |= armed;
        if armed != 0 {
            log::trace!(
                "IRQ requested: 0x{:04X}, IF=0x{:04X}",
                interrupt,
                self.request
            );
        }
        armed != 0
    }

    /// Check if any interrupt is pending for the CPU
    ///
    /// # Returns
    ///
    /// true if (IF & IE) != 0, false otherwise
    pub fn is_pending(&self) -> bool {
        (self.request & self.enable) != 0
    }

    /// Read IE
    pub fn read_enable(&self) -> u32 {
        self.enable as u32
    }

    /// Write IE
    ///
    /// # Arguments
    ///
    /// * `value` - Enable mask (lower 16 bits used)
    pub fn write_enable(&mut self, value: u32) {
        self.enable = value as u16;
        log::debug!("IE set: 0x{:04X}", self.enable);
    }

    /// Read IF
    pub fn read_request(&self) -> u32 {
        self.request as u32
    }

    /// Write IF (acknowledge)
    ///
    /// Clears the request bits that are 1 in `value`; 0 bits are unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use gbarx::core::interrupt::{interrupts, InterruptController};
    ///
    /// let mut ic = InterruptController::new();
    /// ic.write_enable((interrupts::VBLANK | interrupts::VCOUNT) as u32);
    /// ic.request(interrupts::VBLANK | interrupts::VCOUNT);
    ///
    /// ic.write_request(interrupts::VBLANK as u32);
    /// assert_eq!(ic.read_request(), interrupts::VCOUNT as u32);
    /// ```
    pub fn write_request(&mut self, value: u32) {
        self.request &= !(value as u16);
        log::trace!("IRQ acknowledged, IF=0x{:04X}", self.request);
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}
