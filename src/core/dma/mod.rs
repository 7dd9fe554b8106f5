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

//! DMA (Direct Memory Access) engine
//!
//! The GBA has four DMA channels. Each channel owns three guest-visible
//! registers in the I/O aperture plus an internal set of shadows that latch
//! when the channel is enabled:
//!
//! | Offset (+0x0B0 + 12·n) | Register | Purpose |
//! |---|---|---|
//! | +0x0 | DMAnSAD | Source address |
//! | +0x4 | DMAnDAD | Destination address |
//! | +0x8 | DMAnCNT_L | Transfer count (units, not bytes) |
//! | +0xA | DMAnCNT_H | Control |
//!
//! # Control word
//!
//! - Bits 5-6: destination step (increment / decrement / fixed / increment-with-reload)
//! - Bits 7-8: source step (increment / decrement / fixed)
//! - Bit 9: repeat
//! - Bit 10: unit size (0 = halfword, 1 = word)
//! - Bits 12-13: start timing (immediate / V-blank / H-blank / special)
//! - Bit 14: IRQ on completion
//! - Bit 15: enable; writing it latches the source/destination/count shadows
//!
//! The channels only hold state and decode control bits; the actual copies
//! run on the bus (see `Bus::dma_trigger`), which owns the engine so an
//! arming store can complete an immediate transfer before it returns.

use crate::core::interrupt::interrupts;

/// DMA start timing selector (control bits 12-13)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaTiming {
    /// Transfer immediately on arm
    Immediate = 0,
    /// Transfer when the next V-blank begins
    VBlank = 1,
    /// Transfer when the next H-blank begins
    HBlank = 2,
    /// Sound FIFO / video capture timing (not implemented by this core)
    Special = 3,
}

/// Address stepping mode for source and destination pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStep {
    Increment,
    Decrement,
    Fixed,
    /// Increment during the transfer, reload the latched destination on
    /// repeat completion (destination only)
    IncrementReload,
}

impl AddressStep {
    /// Signed byte delta per transferred unit
    pub fn delta(self, unit: u32) -> i64 {
        match self {
            AddressStep::Increment | AddressStep::IncrementReload => unit as i64,
            AddressStep::Decrement => -(unit as i64),
            AddressStep::Fixed => 0,
        }
    }
}

/// A single DMA channel
#[derive(Clone)]
pub struct DmaChannel {
    /// DMAnSAD - guest-written source address
    source: u32,

    /// DMAnDAD - guest-written destination address
    destination: u32,

    /// DMAnCNT_L - guest-written transfer count
    count: u16,

    /// DMAnCNT_H - control word mirror
    control: u16,

    /// Latched source pointer (advances during transfers)
    src_current: u32,

    /// Latched destination pointer (advances during transfers)
    dst_current: u32,

    /// Channel ID (0-3)
    channel_id: u8,
}

impl DmaChannel {
    fn new(channel_id: u8) -> Self {
        Self {
            source: 0,
            destination: 0,
            count: 0,
            control: 0,
            src_current: 0,
            dst_current: 0,
            channel_id,
        }
    }

    /// Check if the channel is armed (control bit 15)
    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        (self.control & 0x8000) != 0
    }

    /// Start timing (control bits 12-13)
    #[inline(always)]
    pub fn timing(&self) -> DmaTiming {
        match (self.control >> 12) & 3 {
            0 => DmaTiming::Immediate,
            1 => DmaTiming::VBlank,
            2 => DmaTiming::HBlank,
            _ => DmaTiming::Special,
        }
    }

    /// Check if completion raises an interrupt (control bit 14)
    #[inline(always)]
    pub fn irq_on_complete(&self) -> bool {
        (self.control & 0x4000) != 0
    }

    /// Check if the repeat bit is set (control bit 9)
    #[inline(always)]
    pub fn repeats(&self) -> bool {
        (self.control & 0x0200) != 0
    }

    /// Transfer unit size in bytes: 4 if control bit 10, else 2
    #[inline(always)]
    pub fn unit_size(&self) -> u32 {
        if (self.control & 0x0400) != 0 {
            4
        } else {
            2
        }
    }

    /// Destination stepping mode (control bits 5-6)
    pub fn destination_step(&self) -> AddressStep {
        match (self.control >> 5) & 3 {
            0 => AddressStep::Increment,
            1 => AddressStep::Decrement,
            2 => AddressStep::Fixed,
            _ => AddressStep::IncrementReload,
        }
    }

    /// Source stepping mode (control bits 7-8)
    ///
    /// Mode 3 is not defined for sources; it is treated as fixed.
    pub fn source_step(&self) -> AddressStep {
        match (self.control >> 7) & 3 {
            0 => AddressStep::Increment,
            1 => AddressStep::Decrement,
            _ => AddressStep::Fixed,
        }
    }

    /// Effective transfer count in units
    ///
    /// A written count of zero selects the hardware default: 0x10000 units
    /// for channel 3, 0x4000 for the others.
    pub fn effective_count(&self) -> u32 {
        if self.count != 0 {
            self.count as u32
        } else if self.channel_id == 3 {
            0x10000
        } else {
            0x4000
        }
    }

    /// Disarm the channel (clear control bit 15)
    fn disable(&mut self) {
        log::trace!("DMA{} disabled", self.channel_id);
        self.control &= !0x8000;
    }
}

/// Transfer parameters snapshot handed to the bus copy loop
#[derive(Debug, Clone, Copy)]
pub struct TransferPlan {
    /// Channel being serviced
    pub channel: usize,
    /// Starting source pointer
    pub source: u32,
    /// Starting destination pointer
    pub destination: u32,
    /// Units left to copy
    pub count: u32,
    /// 2 or 4 bytes per unit
    pub unit: u32,
    /// Source pointer delta per unit
    pub src_delta: i64,
    /// Destination pointer delta per unit
    pub dst_delta: i64,
}

/// The four-channel DMA engine
///
/// # Example
///
/// ```
/// use gbarx::core::dma::{DmaController, DmaTiming};
///
/// let mut dma = DmaController::new();
/// dma.write16(0x0B0 - 0x0B0, 0x3000);          // DMA0SAD low
/// dma.write16(0x0BA - 0x0B0, 0x8000);          // DMA0CNT_H: enable, immediate
/// assert_eq!(dma.pending(DmaTiming::Immediate), vec![0]);
/// ```
pub struct DmaController {
    channels: [DmaChannel; 4],
}

impl DmaController {
    /// I/O aperture offset of the first DMA register (DMA0SAD)
    pub const REG_BASE: u32 = 0x0B0;

    /// I/O aperture offset one past the last DMA register
    pub const REG_END: u32 = 0x0E0;

    /// Bytes of register space per channel
    const CHANNEL_STRIDE: u32 = 12;

    /// Create the engine with all channels idle
    pub fn new() -> Self {
        Self {
            channels: [
                DmaChannel::new(0),
                DmaChannel::new(1),
                DmaChannel::new(2),
                DmaChannel::new(3),
            ],
        }
    }

    /// Reset all channels to power-on state
    pub fn reset(&mut self) {
        for ch in 0..4 {
            self.channels[ch] = DmaChannel::new(ch as u8);
        }
    }

    /// Read a halfword from the DMA register file
    ///
    /// `offset` is relative to [`REG_BASE`](Self::REG_BASE) and must be
    /// even. Source, destination, and count read back as written; control
    /// reflects the live enable bit.
    pub fn read16(&self, offset: u32) -> u16 {
        let ch = &self.channels[(offset / Self::CHANNEL_STRIDE) as usize];
        match offset % Self::CHANNEL_STRIDE {
            0x0 => ch.source as u16,
            0x2 => (ch.source >> 16) as u16,
            0x4 => ch.destination as u16,
            0x6 => (ch.destination >> 16) as u16,
            0x8 => ch.count,
            _ => ch.control,
        }
    }

    /// Write a halfword to the DMA register file
    ///
    /// Writing a control word with bit 15 set latches the source,
    /// destination, and count shadows.
    ///
    /// # Returns
    ///
    /// The channel index when the write armed a previously idle channel
    /// (the caller services immediate-timing channels right away).
    pub fn write16(&mut self, offset: u32, value: u16) -> Option<usize> {
        let index = (offset / Self::CHANNEL_STRIDE) as usize;
        let ch = &mut self.channels[index];
        match offset % Self::CHANNEL_STRIDE {
            0x0 => ch.source = (ch.source & 0xFFFF_0000) | value as u32,
            0x2 => ch.source = (ch.source & 0x0000_FFFF) | ((value as u32) << 16),
            0x4 => ch.destination = (ch.destination & 0xFFFF_0000) | value as u32,
            0x6 => ch.destination = (ch.destination & 0x0000_FFFF) | ((value as u32) << 16),
            0x8 => ch.count = value,
            _ => {
                let was_enabled = ch.is_enabled();
                ch.control = value;
                if ch.is_enabled() && !was_enabled {
                    ch.src_current = ch.source;
                    ch.dst_current = ch.destination;
                    log::debug!(
                        "DMA{} armed: src=0x{:08X} dst=0x{:08X} count=0x{:X} ctrl=0x{:04X}",
                        index,
                        ch.source,
                        ch.destination,
                        ch.effective_count(),
                        ch.control
                    );
                    return Some(index);
                }
            }
        }
        None
    }

    /// Channels armed for the given start timing
    pub fn pending(&self, timing: DmaTiming) -> Vec<usize> {
        (0..4)
            .filter(|&ch| self.channels[ch].is_enabled() && self.channels[ch].timing() == timing)
            .collect()
    }

    /// Build the copy plan for an armed channel
    pub fn plan(&self, channel: usize) -> TransferPlan {
        let ch = &self.channels[channel];
        let unit = ch.unit_size();
        TransferPlan {
            channel,
            source: ch.src_current,
            destination: ch.dst_current,
            count: ch.effective_count(),
            unit,
            src_delta: ch.source_step().delta(unit),
            dst_delta: ch.destination_step().delta(unit),
        }
    }

    /// Record the end of a transfer and apply completion effects
    ///
    /// Repeat channels stay armed with their destination optionally
    /// reloaded; everything else disarms. Immediate-timing channels always
    /// disarm (repeat has no trigger to wait for).
    ///
    /// # Arguments
    ///
    /// * `channel` - Channel index
    /// * `src_end` / `dst_end` - Pointer values after the copy loop
    ///
    /// # Returns
    ///
    /// The interrupt mask to raise (DMA0..DMA3), or 0
    pub fn complete(&mut self, channel: usize, src_end: u32, dst_end: u32) -> u16 {
        let ch = &mut self.channels[channel];
        ch.src_current = src_end;
        ch.dst_current = dst_end;

        if ch.repeats() && ch.timing() != DmaTiming::Immediate {
            if ch.destination_step() == AddressStep::IncrementReload {
                ch.dst_current = ch.destination;
            }
            log::trace!("DMA{} repeat re-armed", channel);
        } else {
            ch.disable();
        }

        if ch.irq_on_complete() {
            interrupts::DMA0 << channel
        } else {
            0
        }
    }
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}
