// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! I/O aperture dispatch
//!
//! This module handles the memory-mapped register window at 0x04000000.
//! Accesses are dispatched at halfword granularity: byte accesses
//! read-modify-write their containing halfword, word accesses compose two
//! halfwords. Registers route to the owning component:
//!
//! - **0x000-0x05F**: LCD block (DISPCNT, DISPSTAT, VCOUNT, BGnCNT, scroll) → video controller
//! - **0x0B0-0x0DF**: DMA register file → DMA engine
//! - **0x200/0x202**: IE / IF → interrupt controller
//! - **0x301**: HALTCNT → halt request latch
//!
//! Everything else reads and writes a raw backing for simple read-back
//! behavior. Offsets at 0x800 and above follow the hardware mirroring rule:
//! only the 4-byte memory-control word at 0x800 repeats, every 64 KiB;
//! other high offsets are faults.

use super::Bus;
use crate::core::dma::{DmaController, DmaTiming};
use crate::core::error::{EmulatorError, Result};

impl Bus {
    /// One-past-the-end of the LCD register block
    const IO_LCD_END: u32 = 0x60;

    /// KEYINPUT register offset (read-only key state)
    const IO_KEYINPUT: u32 = 0x130;

    /// IE register offset
    const IO_IE: u32 = 0x200;

    /// IF register offset
    const IO_IF: u32 = 0x202;

    /// POSTFLG register offset (boot flag)
    const IO_POSTFLG: u32 = 0x300;

    /// HALTCNT register offset
    const IO_HALTCNT: u32 = 0x301;

    /// Populate power-on values of the raw register file
    pub(super) fn init_io_defaults(&mut self) {
        // KEYINPUT: all ten keys released
        self.io_raw[Self::IO_KEYINPUT as usize] = 0xFF;
        self.io_raw[Self::IO_KEYINPUT as usize + 1] = 0x03;
    }

    /// Apply the aperture mirroring rule
    ///
    /// Offsets below 0x804 map directly. Above that, only the
    /// memory-control word at 0x800 is visible, repeated every 64 KiB.
    fn fold_io_offset(&self, address: u32, offset: u32) -> Result<u32> {
        if offset < Self::IO_RAW_SIZE as u32 {
            return Ok(offset);
        }
        let low = offset & 0xFFFF;
        if (0x800..0x804).contains(&low) {
            Ok(low)
        } else {
            Err(EmulatorError::IoError { address })
        }
    }

    /// Read a halfword from the raw register file
    fn io_raw_read16(&self, offset: u32) -> u16 {
        let off = offset as usize;
        u16::from_le_bytes([self.io_raw[off], self.io_raw[off + 1]])
    }

    /// Read an I/O register halfword
    pub(super) fn read_io16(&self, address: u32, offset: u32) -> Result<u16> {
        let offset = self.fold_io_offset(address, offset)?;
        let value = match offset {
            0x00..Self::IO_LCD_END => match &self.video {
                Some(video) => video.borrow().read_register(offset),
                None => {
                    log::warn!("LCD register read at 0x{:08X} before video connected", address);
                    self.io_raw_read16(offset)
                }
            },
            DmaController::REG_BASE..DmaController::REG_END => {
                self.dma.read16(offset - DmaController::REG_BASE)
            }
            Self::IO_IE => self.interrupts.read_enable() as u16,
            Self::IO_IF => self.interrupts.read_request() as u16,
            _ => self.io_raw_read16(offset),
        };
        log::trace!("I/O read16 0x{:08X} -> 0x{:04X}", address, value);
        Ok(value)
    }

    /// Read an I/O register byte
    pub(super) fn read_io8(&self, address: u32, offset: u32) -> Result<u8> {
        let folded = self.fold_io_offset(address, offset)?;
        let half = self.read_io16(address & !1, folded & !1)?;
        Ok(if folded & 1 == 0 {
            half as u8
        } else {
            (half >> 8) as u8
        })
    }

    /// Write an I/O register halfword
    pub(super) fn write_io16(&mut self, address: u32, offset: u32, value: u16) -> Result<()> {
        let offset = self.fold_io_offset(address, offset)?;
        log::trace!("I/O write16 0x{:08X} = 0x{:04X}", address, value);
        match offset {
            0x00..Self::IO_LCD_END => match &self.video {
                Some(video) => video.borrow_mut().write_register(offset, value),
                None => {
                    log::warn!("LCD register write at 0x{:08X} before video connected", address);
                }
            },
            DmaController::REG_BASE..DmaController::REG_END => {
                let armed = self.dma.write16(offset - DmaController::REG_BASE, value);
                if armed.is_some() {
                    // Immediate-timing channels transfer inside the arming
                    // store; other timings wait for their video edge.
                    self.dma_trigger(DmaTiming::Immediate)?;
                }
            }
            Self::IO_IE => self.interrupts.write_enable(value as u32),
            Self::IO_IF => self.interrupts.write_request(value as u32),
            Self::IO_KEYINPUT => {
                log::trace!("write to read-only KEYINPUT ignored");
            }
            Self::IO_POSTFLG => {
                // POSTFLG and HALTCNT share a halfword
                self.write_io8(address, offset, value as u8)?;
                self.write_io8(address + 1, offset + 1, (value >> 8) as u8)?;
            }
            _ => {
                let off = offset as usize;
                self.io_raw[off..off + 2].copy_from_slice(&value.to_le_bytes());
            }
        }
        Ok(())
    }

    /// Write an I/O register byte
    pub(super) fn write_io8(&mut self, address: u32, offset: u32, value: u8) -> Result<()> {
        let offset = self.fold_io_offset(address, offset)?;
        match offset {
            Self::IO_HALTCNT => {
                if value & 0x80 == 0 {
                    log::debug!("HALTCNT: entering halt");
                    self.halt_requested = true;
                } else {
                    log::warn!("HALTCNT: stop mode requested (treated as halt)");
                    self.halt_requested = true;
                }
                self.io_raw[offset as usize] = value;
            }
            Self::IO_POSTFLG => {
                self.io_raw[offset as usize] = value;
            }
            // IF acknowledges written-1 bits; a byte store must only
            // acknowledge its own lane, so it bypasses the RMW path
            Self::IO_IF => self.interrupts.write_request(value as u32),
            0x203 => self.interrupts.write_request((value as u32) << 8),
            _ => {
                // Read-modify-write the containing halfword so byte stores
                // to halfword registers behave
                let half = self.read_io16(address & !1, offset & !1)?;
                let merged = if offset & 1 == 0 {
                    (half & 0xFF00) | value as u16
                } else {
                    (half & 0x00FF) | ((value as u16) << 8)
                };
                self.write_io16(address & !1, offset & !1, merged)?;
            }
        }
        Ok(())
    }
}
