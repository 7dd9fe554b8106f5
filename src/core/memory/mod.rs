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

//! Memory bus implementation for the GBA emulator
//!
//! The Bus is the central component for all memory operations. It owns the
//! plain memory regions, the DMA engine, the interrupt controller, and the
//! raw I/O register file, and routes every typed load/store to the correct
//! backing through a sparse interval map built once at construction.
//!
//! # Memory Map
//!
//! | Base        | Size       | Backing               | Access |
//! |-------------|------------|-----------------------|--------|
//! | 0x00000000  | 0x4000     | System ROM (BIOS)     | R only |
//! | 0x02000000  | 0x40000    | On-board work RAM     | R/W    |
//! | 0x03000000  | 0x8000     | On-chip work RAM      | R/W    |
//! | 0x03FFFF00  | 0x100      | On-chip RAM tail mirror | R/W  |
//! | 0x04000000  | (mirrored) | I/O aperture          | R/W    |
//! | 0x05000000  | 0x400      | Palette RAM           | R/W    |
//! | 0x06000000  | 0x18000    | Video RAM             | R/W    |
//! | 0x07000000  | 0x400     | Object attribute memory | R/W   |
//! | 0x08000000  | 0x2000000  | Cartridge ROM (WS0)   | R only |
//! | 0x0A000000  | 0x2000000  | Cartridge ROM (WS1)   | R only |
//! | 0x0C000000  | 0x2000000  | Cartridge ROM (WS2)   | R only |
//! | 0x0E000000  | 0x10000    | Cartridge SRAM/EEPROM | R/W    |
//!
//! All multi-byte values are little-endian. The CPU aligns halfword/word
//! addresses before dispatching, so the bus assumes natural alignment.
//!
//! # Example
//!
//! ```
//! use gbarx::core::memory::Bus;
//!
//! let mut bus = Bus::new();
//! bus.write32(0x02000000, 0x12345678).unwrap();
//! assert_eq!(bus.read32(0x02000000).unwrap(), 0x12345678);
//! ```

use crate::core::dma::{DmaController, DmaTiming};
use crate::core::eeprom::Eeprom;
use crate::core::error::{EmulatorError, Result};
use crate::core::interrupt::InterruptController;
use crate::core::video::VideoController;
use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::rc::Rc;

// Sub-modules
mod io_ports;
mod region;

// Re-export public types
pub use region::MemoryRegion;

/// Cartridge save backing selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveType {
    /// 64 KiB battery-backed SRAM (byte-addressed)
    Sram,
    /// 512-byte serial EEPROM
    Eeprom512,
    /// 8 KiB serial EEPROM
    Eeprom8k,
}

/// What a mapped interval dispatches to
#[derive(Debug, Clone, Copy)]
enum Backing {
    /// Index into the bus-owned region store
    Region(usize),
    /// The I/O aperture (see `io_ports.rs`)
    Io,
    /// Palette RAM, owned by the video controller
    Palette,
    /// Video RAM, owned by the video controller
    Vram,
    /// Object attribute memory, owned by the video controller
    Oam,
    /// The cartridge save device (SRAM region or EEPROM)
    Save,
}

/// One interval of the address map
#[derive(Debug, Clone, Copy)]
struct Mapping {
    base: u32,
    length: u32,
    offset: u32,
    backing: Backing,
}

/// The configured save device
enum SaveMedia {
    /// Backed by the SRAM region
    Sram,
    /// Backed by a serial EEPROM state machine
    Eeprom(Eeprom),
}

/// Memory bus managing all memory accesses
pub struct Bus {
    /// Owning store for the plain regions; `Backing::Region` indexes here
    regions: Vec<MemoryRegion>,

    /// Interval map sorted by base address, built once at construction
    map: Vec<Mapping>,

    /// Raw I/O register file: 2 KiB plus the 4-byte memory-control word
    /// at 0x800 that mirrors every 64 KiB
    io_raw: [u8; Self::IO_RAW_SIZE],

    /// Four-channel DMA engine
    ///
    /// Owned directly (not shared) so that a store arming an
    /// immediate-timing channel can complete the transfer before the store
    /// returns.
    dma: DmaController,

    /// IE/IF register pair
    interrupts: InterruptController,

    /// Video controller, shared with the system for memory-mapped access
    video: Option<Rc<RefCell<VideoController>>>,

    /// Cartridge save device behind 0x0E000000
    save: SaveMedia,

    /// Set by a HALTCNT store; drained by the system each step
    halt_requested: bool,
}

/// Region store index: system ROM (BIOS)
const REGION_BIOS: usize = 0;
/// Region store index: on-board (external) work RAM
const REGION_EWRAM: usize = 1;
/// Region store index: on-chip (internal) work RAM
const REGION_IWRAM: usize = 2;
/// Region store index: cartridge ROM
const REGION_CART_ROM: usize = 3;
/// Region store index: cartridge SRAM
const REGION_SRAM: usize = 4;

impl Bus {
    /// BIOS size (16 KiB)
    pub const BIOS_SIZE: usize = 0x4000;

    /// On-board work RAM size (256 KiB)
    pub const EWRAM_SIZE: usize = 0x40000;

    /// On-chip work RAM size (32 KiB)
    pub const IWRAM_SIZE: usize = 0x8000;

    /// Cartridge ROM window size (32 MiB)
    pub const CART_ROM_SIZE: usize = 0x0200_0000;

    /// Cartridge SRAM size (64 KiB)
    pub const SRAM_SIZE: usize = 0x10000;

    /// Raw I/O register file size
    const IO_RAW_SIZE: usize = 0x804;

    /// Create a new bus with all regions zeroed and the address map built
    ///
    /// The map is never mutated after construction.
    pub fn new() -> Self {
        let regions = vec![
            MemoryRegion::new_read_only(Self::BIOS_SIZE),
            MemoryRegion::new(Self::EWRAM_SIZE),
            MemoryRegion::new(Self::IWRAM_SIZE),
            MemoryRegion::new_read_only(Self::CART_ROM_SIZE),
            MemoryRegion::new(Self::SRAM_SIZE),
        ];

        let mut bus = Self {
            regions,
            map: Vec::new(),
            io_raw: [0; Self::IO_RAW_SIZE],
            dma: DmaController::new(),
            interrupts: InterruptController::new(),
            video: None,
            save: SaveMedia::Sram,
            halt_requested: false,
        };

        bus.attach(0x0000_0000, Backing::Region(REGION_BIOS), 0, 0x4000);
        bus.attach(0x0200_0000, Backing::Region(REGION_EWRAM), 0, 0x40000);
        bus.attach(0x0300_0000, Backing::Region(REGION_IWRAM), 0, 0x8000);
        // The last 256 bytes of on-chip RAM are also visible at the top of
        // the 0x03 block (the BIOS keeps the IRQ vector there)
        bus.attach(0x03FF_FF00, Backing::Region(REGION_IWRAM), 0x7F00, 0x100);
        bus.attach(0x0400_0000, Backing::Io, 0, 0x0100_0000);
        bus.attach(0x0500_0000, Backing::Palette, 0, 0x400);
        bus.attach(0x0600_0000, Backing::Vram, 0, 0x18000);
        bus.attach(0x0700_0000, Backing::Oam, 0, 0x400);
        bus.attach(0x0800_0000, Backing::Region(REGION_CART_ROM), 0, 0x0200_0000);
        bus.attach(0x0A00_0000, Backing::Region(REGION_CART_ROM), 0, 0x0200_0000);
        bus.attach(0x0C00_0000, Backing::Region(REGION_CART_ROM), 0, 0x0200_0000);
        bus.attach(0x0E00_0000, Backing::Save, 0, 0x10000);

        bus.init_io_defaults();
        bus
    }

    /// Register an interval in the address map
    ///
    /// Intervals must be attached in ascending base order; lookup is a
    /// binary search for the greatest base ≤ the accessed address.
    fn attach(&mut self, base: u32, backing: Backing, offset: u32, length: u32) {
        debug_assert!(self.map.last().map_or(true, |m| m.base < base));
        self.map.push(Mapping {
            base,
            length,
            offset,
            backing,
        });
    }

    /// Connect the video controller for memory-mapped access
    ///
    /// # Example
    ///
    /// ```
    /// use gbarx::core::memory::Bus;
    /// use gbarx::core::video::VideoController;
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let mut bus = Bus::new();
    /// let video = Rc::new(RefCell::new(VideoController::new()));
    /// bus.set_video(video.clone());
    /// ```
    pub fn set_video(&mut self, video: Rc<RefCell<VideoController>>) {
        self.video = Some(video);
    }

    /// Select the cartridge save backing behind 0x0E000000
    ///
    /// The address map is unchanged; only the device the `Save` backing
    /// dispatches to is swapped. EEPROM contents are lost when switching
    /// types.
    pub fn set_save_type(&mut self, save_type: SaveType) {
        self.save = match save_type {
            SaveType::Sram => SaveMedia::Sram,
            SaveType::Eeprom512 => SaveMedia::Eeprom(Eeprom::new(Eeprom::SIZE_512)),
            SaveType::Eeprom8k => SaveMedia::Eeprom(Eeprom::new(Eeprom::SIZE_8K)),
        };
        log::info!("save type set to {:?}", save_type);
    }

    /// Reset volatile state
    ///
    /// Work RAM and the I/O register file clear; BIOS, cartridge ROM, and
    /// save contents are preserved.
    pub fn reset(&mut self) {
        self.regions[REGION_EWRAM].clear();
        self.regions[REGION_IWRAM].clear();
        self.io_raw = [0; Self::IO_RAW_SIZE];
        self.init_io_defaults();
        self.dma.reset();
        self.interrupts.reset();
        self.halt_requested = false;
    }

    /// Load a BIOS image from a file
    ///
    /// The file must be exactly 16 KiB.
    ///
    /// # Errors
    ///
    /// `BiosNotFound` if the file cannot be opened, `InvalidBiosSize` if it
    /// is not exactly [`BIOS_SIZE`](Self::BIOS_SIZE) bytes.
    pub fn load_bios(&mut self, path: &str) -> Result<()> {
        let mut file =
            File::open(path).map_err(|_| EmulatorError::BiosNotFound(path.to_string()))?;
        let metadata = file.metadata()?;
        if metadata.len() != Self::BIOS_SIZE as u64 {
            return Err(EmulatorError::InvalidBiosSize {
                expected: Self::BIOS_SIZE,
                got: metadata.len() as usize,
            });
        }
        let mut data = vec![0u8; Self::BIOS_SIZE];
        file.read_exact(&mut data)?;
        self.load_bios_data(&data)
    }

    /// Load a BIOS image from memory
    pub fn load_bios_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != Self::BIOS_SIZE {
            return Err(EmulatorError::InvalidBiosSize {
                expected: Self::BIOS_SIZE,
                got: data.len(),
            });
        }
        self.regions[REGION_BIOS].load_data(0, data)?;
        log::info!("BIOS loaded ({} bytes)", data.len());
        Ok(())
    }

    /// Load a cartridge ROM image from a file
    ///
    /// # Errors
    ///
    /// `RomTooLarge` if the image exceeds the 32 MiB ROM window.
    pub fn load_rom(&mut self, path: &str) -> Result<()> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        self.load_rom_data(&data)
    }

    /// Load a cartridge ROM image from memory
    pub fn load_rom_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > Self::CART_ROM_SIZE {
            return Err(EmulatorError::RomTooLarge {
                limit: Self::CART_ROM_SIZE,
                got: data.len(),
            });
        }
        self.regions[REGION_CART_ROM].load_data(0, data)?;
        log::info!("cartridge ROM loaded ({} bytes)", data.len());
        Ok(())
    }

    /// Resolve an address to its backing
    ///
    /// Finds the greatest mapped base ≤ `address`; the access is legal iff
    /// it fits inside that interval.
    fn resolve(&self, address: u32, size: u32) -> Result<(Backing, u32)> {
        let index = self.map.partition_point(|m| m.base <= address);
        if index == 0 {
            return Err(EmulatorError::InvalidMemoryAccess { address });
        }
        let mapping = &self.map[index - 1];
        let relative = address - mapping.base;
        if relative as u64 + size as u64 > mapping.length as u64 {
            return Err(EmulatorError::InvalidMemoryAccess { address });
        }
        Ok((mapping.backing, mapping.offset + relative))
    }

    /// Read an 8-bit value
    pub fn read8(&self, address: u32) -> Result<u8> {
        let (backing, offset) = self.resolve(address, 1)?;
        match backing {
            Backing::Region(index) => self.regions[index].read8(offset),
            Backing::Io => self.read_io8(address, offset),
            Backing::Palette => self.with_video(address, |v| v.palette_read8(offset)),
            Backing::Vram => self.with_video(address, |v| v.vram_read8(offset)),
            Backing::Oam => self.with_video(address, |v| v.oam_read8(offset)),
            Backing::Save => match &self.save {
                SaveMedia::Sram => self.regions[REGION_SRAM].read8(offset),
                SaveMedia::Eeprom(_) => {
                    log::warn!("byte read from EEPROM at 0x{:08X}", address);
                    Ok(0xFF)
                }
            },
        }
    }

    /// Read a 16-bit value (little-endian, naturally aligned)
    pub fn read16(&mut self, address: u32) -> Result<u16> {
        let (backing, offset) = self.resolve(address, 2)?;
        match backing {
            Backing::Region(index) => self.regions[index].read16(offset),
            Backing::Io => self.read_io16(address, offset),
            Backing::Palette => self.with_video(address, |v| v.palette_read16(offset)),
            Backing::Vram => self.with_video(address, |v| v.vram_read16(offset)),
            Backing::Oam => self.with_video(address, |v| v.oam_read16(offset)),
            Backing::Save => match &mut self.save {
                SaveMedia::Sram => self.regions[REGION_SRAM].read16(offset),
                SaveMedia::Eeprom(eeprom) => Ok(eeprom.load16()),
            },
        }
    }

    /// Read a 32-bit value (little-endian, naturally aligned)
    pub fn read32(&mut self, address: u32) -> Result<u32> {
        let (backing, offset) = self.resolve(address, 4)?;
        match backing {
            Backing::Region(index) => self.regions[index].read32(offset),
            Backing::Io => {
                let low = self.read_io16(address, offset)? as u32;
                let high = self.read_io16(address + 2, offset + 2)? as u32;
                Ok(low | (high << 16))
            }
            Backing::Palette => self.with_video(address, |v| v.palette_read32(offset)),
            Backing::Vram => self.with_video(address, |v| v.vram_read32(offset)),
            Backing::Oam => self.with_video(address, |v| v.oam_read32(offset)),
            Backing::Save => match &mut self.save {
                SaveMedia::Sram => self.regions[REGION_SRAM].read32(offset),
                SaveMedia::Eeprom(eeprom) => {
                    let low = eeprom.load16() as u32;
                    let high = eeprom.load16() as u32;
                    Ok(low | (high << 16))
                }
            },
        }
    }

    /// Write an 8-bit value
    ///
    /// Stores to read-only backings are logged and dropped.
    pub fn write8(&mut self, address: u32, value: u8) -> Result<()> {
        let (backing, offset) = self.resolve(address, 1)?;
        let result = match backing {
            Backing::Region(index) => self.regions[index].write8(offset, value),
            Backing::Io => return self.write_io8(address, offset, value),
            Backing::Palette => self.with_video(address, |v| v.palette_write8(offset, value)),
            Backing::Vram => self.with_video(address, |v| v.vram_write8(offset, value)),
            Backing::Oam => self.with_video(address, |v| v.oam_write8(offset, value)),
            Backing::Save => match &mut self.save {
                SaveMedia::Sram => self.regions[REGION_SRAM].write8(offset, value),
                SaveMedia::Eeprom(_) => {
                    log::warn!("byte write to EEPROM at 0x{:08X} (dropped)", address);
                    Ok(())
                }
            },
        };
        self.filter_read_only(address, result)
    }

    /// Write a 16-bit value (little-endian, naturally aligned)
    pub fn write16(&mut self, address: u32, value: u16) -> Result<()> {
        let (backing, offset) = self.resolve(address, 2)?;
        let result = match backing {
            Backing::Region(index) => self.regions[index].write16(offset, value),
            Backing::Io => return self.write_io16(address, offset, value),
            Backing::Palette => self.with_video(address, |v| v.palette_write16(offset, value)),
            Backing::Vram => self.with_video(address, |v| v.vram_write16(offset, value)),
            Backing::Oam => self.with_video(address, |v| v.oam_write16(offset, value)),
            Backing::Save => match &mut self.save {
                SaveMedia::Sram => self.regions[REGION_SRAM].write16(offset, value),
                SaveMedia::Eeprom(eeprom) => {
                    eeprom.store16(value);
                    Ok(())
                }
            },
        };
        self.filter_read_only(address, result)
    }

    /// Write a 32-bit value (little-endian, naturally aligned)
    pub fn write32(&mut self, address: u32, value: u32) -> Result<()> {
        let (backing, offset) = self.resolve(address, 4)?;
        let result = match backing {
            Backing::Region(index) => self.regions[index].write32(offset, value),
            Backing::Io => {
                self.write_io16(address, offset, value as u16)?;
                return self.write_io16(address + 2, offset + 2, (value >> 16) as u16);
            }
            Backing::Palette => self.with_video(address, |v| v.palette_write32(offset, value)),
            Backing::Vram => self.with_video(address, |v| v.vram_write32(offset, value)),
            Backing::Oam => self.with_video(address, |v| v.oam_write32(offset, value)),
            Backing::Save => match &mut self.save {
                SaveMedia::Sram => self.regions[REGION_SRAM].write32(offset, value),
                SaveMedia::Eeprom(eeprom) => {
                    eeprom.store16(value as u16);
                    eeprom.store16((value >> 16) as u16);
                    Ok(())
                }
            },
        };
        self.filter_read_only(address, result)
    }

    /// Run a closure against the shared video controller
    ///
    /// Video memory accessed before the controller is connected reads as
    /// zero and drops writes, mirroring how the other peripherals degrade.
    fn with_video<T: Default>(
        &self,
        address: u32,
        f: impl FnOnce(&mut VideoController) -> Result<T>,
    ) -> Result<T> {
        match &self.video {
            Some(video) => f(&mut video.borrow_mut()),
            None => {
                log::warn!(
                    "video memory access at 0x{:08X} before video controller connected",
                    address
                );
                Ok(T::default())
            }
        }
    }

    /// Swallow read-only violations (logged, not propagated)
    fn filter_read_only(&self, address: u32, result: Result<()>) -> Result<()> {
        match result {
            Err(EmulatorError::ReadOnlyViolation { .. }) => {
                log::warn!("write to read-only memory at 0x{:08X} (dropped)", address);
                Ok(())
            }
            other => other,
        }
    }

    /// Trigger all channels armed for the given DMA timing
    ///
    /// Called by the system when the video controller reports a blank edge,
    /// and internally when a store arms an immediate-timing channel.
    pub fn dma_trigger(&mut self, timing: DmaTiming) -> Result<()> {
        for channel in self.dma.pending(timing) {
            self.run_dma_channel(channel)?;
        }
        Ok(())
    }

    /// Execute one armed channel's transfer to completion
    fn run_dma_channel(&mut self, channel: usize) -> Result<()> {
        let plan = self.dma.plan(channel);
        log::debug!(
            "DMA{}: 0x{:08X} -> 0x{:08X}, {} x {} bytes",
            channel,
            plan.source,
            plan.destination,
            plan.count,
            plan.unit
        );

        let mut source = plan.source;
        let mut destination = plan.destination;
        for _ in 0..plan.count {
            if plan.unit == 4 {
                let value = self.read32(source & !3)?;
                self.write32(destination & !3, value)?;
            } else {
                let value = self.read16(source & !1)?;
                self.write16(destination & !1, value)?;
            }
            source = (source as i64 + plan.src_delta) as u32;
            destination = (destination as i64 + plan.dst_delta) as u32;
        }

        let irq = self.dma.complete(channel, source, destination);
        if irq != 0 {
            self.request_interrupt(irq);
        }
        Ok(())
    }

    /// Raise interrupt request bits (masked by IE)
    ///
    /// # Returns
    ///
    /// true if any bit landed and the CPU should be notified
    pub fn request_interrupt(&mut self, mask: u16) -> bool {
        self.interrupts.request(mask)
    }

    /// Check if an unmasked interrupt request is pending
    pub fn irq_pending(&self) -> bool {
        self.interrupts.is_pending()
    }

    /// Drain the HALT request latched by a HALTCNT store
    pub fn take_halt_request(&mut self) -> bool {
        std::mem::take(&mut self.halt_requested)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interrupt::interrupts;

    fn bus_with_video() -> (Bus, Rc<RefCell<VideoController>>) {
        let mut bus = Bus::new();
        let video = Rc::new(RefCell::new(VideoController::new()));
        bus.set_video(video.clone());
        (bus, video)
    }

    #[test]
    fn test_ram_round_trip() {
        let mut bus = Bus::new();
        bus.write32(0x0200_0000, 0xCAFEBABE).unwrap();
        assert_eq!(bus.read32(0x0200_0000).unwrap(), 0xCAFEBABE);
        bus.write16(0x0300_0010, 0x1234).unwrap();
        assert_eq!(bus.read16(0x0300_0010).unwrap(), 0x1234);
        bus.write8(0x0300_7FFF, 0xAB).unwrap();
        assert_eq!(bus.read8(0x0300_7FFF).unwrap(), 0xAB);
    }

    #[test]
    fn test_byte_round_trip_block() {
        let mut bus = Bus::new();
        let bytes: Vec<u8> = (0..32).map(|i| i as u8 ^ 0x5A).collect();
        for (i, &b) in bytes.iter().enumerate() {
            bus.write8(0x0200_1000 + i as u32, b).unwrap();
        }
        for (i, &b) in bytes.iter().enumerate() {
            assert_eq!(bus.read8(0x0200_1000 + i as u32).unwrap(), b);
        }
    }

    #[test]
    fn test_iwram_tail_mirror() {
        let mut bus = Bus::new();
        bus.write32(0x0300_7F00, 0xDEADBEEF).unwrap();
        assert_eq!(bus.read32(0x03FF_FF00).unwrap(), 0xDEADBEEF);
        bus.write32(0x03FF_FFFC, 0x11223344).unwrap();
        assert_eq!(bus.read32(0x0300_7FFC).unwrap(), 0x11223344);
    }

    #[test]
    fn test_unmapped_access_faults() {
        let mut bus = Bus::new();
        assert!(matches!(
            bus.read32(0x0100_0000),
            Err(EmulatorError::InvalidMemoryAccess { .. })
        ));
        assert!(matches!(
            bus.write8(0x1000_0000, 0),
            Err(EmulatorError::InvalidMemoryAccess { .. })
        ));
        // Past the end of an interval
        assert!(matches!(
            bus.read8(0x0300_8000),
            Err(EmulatorError::InvalidMemoryAccess { .. })
        ));
        // Straddling the end of an interval
        assert!(matches!(
            bus.read32(0x0203_FFFE),
            Err(EmulatorError::InvalidMemoryAccess { .. })
        ));
    }

    #[test]
    fn test_rom_writes_are_dropped() {
        let mut bus = Bus::new();
        bus.load_bios_data(&vec![0xAA; Bus::BIOS_SIZE]).unwrap();
        bus.write32(0x0000_0000, 0x12345678).unwrap();
        assert_eq!(bus.read8(0x0000_0000).unwrap(), 0xAA);

        bus.load_rom_data(&[1, 2, 3, 4]).unwrap();
        bus.write16(0x0800_0000, 0xFFFF).unwrap();
        assert_eq!(bus.read16(0x0800_0000).unwrap(), 0x0201);
    }

    #[test]
    fn test_rom_visible_at_all_wait_states() {
        let mut bus = Bus::new();
        bus.load_rom_data(&[0x11, 0x22, 0x33, 0x44]).unwrap();
        let word = bus.read32(0x0800_0000).unwrap();
        assert_eq!(word, 0x44332211);
        assert_eq!(bus.read32(0x0A00_0000).unwrap(), word);
        assert_eq!(bus.read32(0x0C00_0000).unwrap(), word);
    }

    #[test]
    fn test_bios_size_validation() {
        let mut bus = Bus::new();
        assert!(matches!(
            bus.load_bios_data(&[0u8; 100]),
            Err(EmulatorError::InvalidBiosSize { .. })
        ));
    }

    #[test]
    fn test_load_bios_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0x5Au8; Bus::BIOS_SIZE]).unwrap();
        let mut bus = Bus::new();
        bus.load_bios(file.path().to_str().unwrap()).unwrap();
        assert_eq!(bus.read8(0).unwrap(), 0x5A);

        assert!(matches!(
            bus.load_bios("/nonexistent/bios.bin"),
            Err(EmulatorError::BiosNotFound(_))
        ));
    }

    #[test]
    fn test_video_memory_dispatch() {
        let (mut bus, video) = bus_with_video();
        bus.write16(0x0500_0000, 0x7FFF).unwrap();
        bus.write32(0x0600_0000, 0x12345678).unwrap();
        bus.write16(0x0700_0004, 0xBEEF).unwrap();
        assert_eq!(bus.read16(0x0500_0000).unwrap(), 0x7FFF);
        assert_eq!(bus.read32(0x0600_0000).unwrap(), 0x12345678);
        assert_eq!(bus.read16(0x0700_0004).unwrap(), 0xBEEF);
        assert_eq!(video.borrow().vram_read16(0).unwrap(), 0x5678);
    }

    #[test]
    fn test_interrupt_registers_via_bus() {
        let mut bus = Bus::new();
        bus.write16(0x0400_0200, interrupts::VBLANK).unwrap();
        assert_eq!(bus.read16(0x0400_0200).unwrap(), interrupts::VBLANK);

        assert!(bus.request_interrupt(interrupts::VBLANK));
        assert!(bus.irq_pending());
        assert_eq!(bus.read16(0x0400_0202).unwrap(), interrupts::VBLANK);

        // Acknowledge by writing 1
        bus.write16(0x0400_0202, interrupts::VBLANK).unwrap();
        assert!(!bus.irq_pending());
    }

    #[test]
    fn test_halt_request_via_io() {
        let mut bus = Bus::new();
        assert!(!bus.take_halt_request());
        bus.write8(0x0400_0301, 0x00).unwrap();
        assert!(bus.take_halt_request());
        // Drained
        assert!(!bus.take_halt_request());
    }

    #[test]
    fn test_keyinput_defaults_to_released() {
        let mut bus = Bus::new();
        assert_eq!(bus.read16(0x0400_0130).unwrap(), 0x03FF);
    }

    #[test]
    fn test_io_mirror_above_0x800() {
        let mut bus = Bus::new();
        bus.write32(0x0400_0800, 0x0D00_0020).unwrap();
        assert_eq!(bus.read32(0x0401_0800).unwrap(), 0x0D00_0020);
        assert_eq!(bus.read32(0x04FF_0800).unwrap(), 0x0D00_0020);
        assert!(matches!(
            bus.read16(0x0401_0000),
            Err(EmulatorError::IoError { .. })
        ));
    }

    #[test]
    fn test_immediate_dma_runs_inside_arming_store() {
        let mut bus = Bus::new();
        for i in 0..4u32 {
            bus.write32(0x0200_0000 + i * 4, 0x1111_0000 + i).unwrap();
        }
        // DMA0: source 0x02000000, destination 0x03000000, 4 words, enable
        bus.write32(0x0400_00B0, 0x0200_0000).unwrap();
        bus.write32(0x0400_00B4, 0x0300_0000).unwrap();
        bus.write16(0x0400_00B8, 4).unwrap();
        bus.write16(0x0400_00BA, 0x8400).unwrap(); // enable, 32-bit, immediate

        for i in 0..4u32 {
            assert_eq!(bus.read32(0x0300_0000 + i * 4).unwrap(), 0x1111_0000 + i);
        }
        // Channel disarmed after the immediate transfer
        assert_eq!(bus.read16(0x0400_00BA).unwrap() & 0x8000, 0);
    }

    #[test]
    fn test_vblank_dma_and_completion_irq() {
        let mut bus = Bus::new();
        bus.write16(0x0400_0200, interrupts::DMA0).unwrap(); // enable DMA0 irq
        bus.write32(0x0200_0100, 0xAABBCCDD).unwrap();
        bus.write32(0x0400_00B0, 0x0200_0100).unwrap();
        bus.write32(0x0400_00B4, 0x0200_0200).unwrap();
        bus.write16(0x0400_00B8, 2).unwrap();
        // enable, v-blank timing, 16-bit, IRQ on complete
        bus.write16(0x0400_00BA, 0xD000).unwrap();

        // Nothing moved yet
        assert_eq!(bus.read32(0x0200_0200).unwrap(), 0);

        bus.dma_trigger(DmaTiming::VBlank).unwrap();
        assert_eq!(bus.read32(0x0200_0200).unwrap(), 0xAABBCCDD);
        assert!(bus.irq_pending());
        assert_eq!(bus.read16(0x0400_0202).unwrap(), interrupts::DMA0);
    }

    #[test]
    fn test_eeprom_behind_save_window() {
        let mut bus = Bus::new();
        bus.set_save_type(SaveType::Eeprom512);
        // Untimely read streams ones
        assert_eq!(bus.read16(0x0E00_0000).unwrap(), 0xFFFF);

        // SRAM save type uses the byte-addressed region
        bus.set_save_type(SaveType::Sram);
        bus.write8(0x0E00_0000, 0x42).unwrap();
        assert_eq!(bus.read8(0x0E00_0000).unwrap(), 0x42);
    }

    #[test]
    fn test_reset_preserves_rom_and_save() {
        let mut bus = Bus::new();
        bus.load_rom_data(&[9, 9, 9, 9]).unwrap();
        bus.write8(0x0E00_0000, 0x77).unwrap();
        bus.write32(0x0200_0000, 0xFFFF_FFFF).unwrap();
        bus.reset();
        assert_eq!(bus.read32(0x0200_0000).unwrap(), 0);
        assert_eq!(bus.read8(0x0E00_0000).unwrap(), 0x77);
        assert_eq!(bus.read8(0x0800_0000).unwrap(), 9);
    }
}
