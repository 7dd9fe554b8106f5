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

//! Cartridge EEPROM save device
//!
//! EEPROM saves talk a serial one-bit protocol over the cartridge bus: the
//! guest performs halfword stores whose bit 0 carries one protocol bit, and
//! halfword loads that return one bit per access. Two variants exist, 512 B
//! (6 address bits) and 8 KiB (14 address bits); addresses count 8-byte
//! blocks.
//!
//! ## Protocol
//!
//! A request starts with a 1 bit, followed by a second bit selecting read
//! (1) or write (0), then the block address MSB-first. A write request then
//! carries 64 data bits MSB-first; either request ends with a terminator
//! bit. After a read request, subsequent loads stream the addressed data one
//! bit per halfword, MSB-first. Loads with no read request pending return
//! all-ones.
//!
//! Contents persist across system resets within one run.

/// Request decoding state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    /// Waiting for the leading 1 bit of a request
    Idle,
    /// Got the leading bit, waiting for the read/write selector
    Selecting,
    /// Accumulating address bits; true = read request
    Address { read: bool },
    /// Accumulating 64 data bits of a write request
    WriteData,
    /// Address (and data, for writes) complete; next bit terminates
    Terminating,
}

/// Serial EEPROM save device (512 B or 8 KiB)
///
/// # Example
///
/// ```
/// use gbarx::core::eeprom::Eeprom;
///
/// let mut eeprom = Eeprom::new(512);
/// // A load before any read request returns all-ones
/// assert_eq!(eeprom.load16(), 1);
/// ```
pub struct Eeprom {
    /// Save contents, persistent across resets
    storage: Vec<u8>,

    /// Address field width: 6 bits for 512 B devices, 14 bits for 8 KiB
    address_bits: u32,

    state: RequestState,

    /// Number of address bits accumulated so far
    address_bits_received: u32,

    /// Decoded address; block-granular while accumulating, byte-granular
    /// once complete
    current_address: u32,

    /// Bit offset within the current byte while streaming reads (0 = MSB)
    read_bit: u32,

    /// True once a read request has completed and loads should stream data
    reading: bool,

    /// Number of data bits accumulated for the current write
    data_bits_received: u32,

    /// Partial byte being assembled from incoming write bits
    current_byte: u8,
}

impl Eeprom {
    /// 512-byte device size
    pub const SIZE_512: usize = 512;

    /// 8 KiB device size
    pub const SIZE_8K: usize = 8 * 1024;

    /// Create an EEPROM of the given size (512 or 8192 bytes), zero-filled
    pub fn new(size: usize) -> Self {
        Self {
            storage: vec![0u8; size],
            address_bits: if size <= Self::SIZE_512 { 6 } else { 14 },
            state: RequestState::Idle,
            address_bits_received: 0,
            current_address: 0,
            read_bit: 0,
            reading: false,
            data_bits_received: 0,
            current_byte: 0,
        }
    }

    /// Device size in bytes
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// True if the device has zero capacity
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Borrow the raw save contents
    pub fn storage(&self) -> &[u8] {
        &self.storage
    }

    /// Replace the save contents (save-file import)
    ///
    /// Data beyond the device size is ignored.
    pub fn load_data(&mut self, data: &[u8]) {
        let n = data.len().min(self.storage.len());
        self.storage[..n].copy_from_slice(&data[..n]);
    }

    /// Handle a halfword load from the EEPROM window
    ///
    /// Returns the next data bit in bit 0 while a read is streaming,
    /// all-ones otherwise.
    pub fn load16(&mut self) -> u16 {
        if !self.reading {
            return 0xFFFF;
        }

        let byte = self
            .storage
            .get(self.current_address as usize)
            .copied()
            .unwrap_or(0xFF);
        let bit = (byte >> (7 - self.read_bit)) & 1;

        self.read_bit += 1;
        if self.read_bit == 8 {
            self.read_bit = 0;
            self.current_address = self.current_address.wrapping_add(1);
        }

        bit as u16
    }

    /// Handle a halfword store to the EEPROM window
    ///
    /// Bit 0 of `value` is the next protocol bit.
    pub fn store16(&mut self, value: u16) {
        let bit = value & 1 != 0;

        match self.state {
            RequestState::Idle => {
                // A new request cancels any read stream in progress
                if bit {
                    self.state = RequestState::Selecting;
                    self.reading = false;
                }
            }
            RequestState::Selecting => {
                self.state = RequestState::Address { read: bit };
                self.current_address = 0;
                self.address_bits_received = 0;
                self.current_byte = 0;
                self.data_bits_received = 0;
            }
            RequestState::Address { read } => {
                self.current_address = (self.current_address << 1) | bit as u32;
                self.address_bits_received += 1;
                if self.address_bits_received == self.address_bits {
                    // Address complete: blocks are 8 bytes
                    self.current_address <<= 3;
                    self.state = if read {
                        RequestState::Terminating
                    } else {
                        RequestState::WriteData
                    };
                }
            }
            RequestState::WriteData => {
                self.current_byte = (self.current_byte << 1) | bit as u8;
                self.data_bits_received += 1;
                if self.data_bits_received % 8 == 0 {
                    let addr = self.current_address as usize;
                    if let Some(slot) = self.storage.get_mut(addr) {
                        *slot = self.current_byte;
                    } else {
                        log::warn!("EEPROM write past end at byte 0x{:X}", addr);
                    }
                    self.current_address = self.current_address.wrapping_add(1);
                    self.current_byte = 0;
                }
                if self.data_bits_received == 64 {
                    self.state = RequestState::Terminating;
                }
            }
            RequestState::Terminating => {
                // The terminator bit ends the request. A write advanced
                // current_address while committing bytes; a read left it at
                // the decoded byte address and starts streaming from there.
                self.state = RequestState::Idle;
                if self.data_bits_received == 0 {
                    self.read_bit = 0;
                    self.reading = true;
                    log::trace!("EEPROM read armed at byte 0x{:X}", self.current_address);
                } else {
                    log::trace!("EEPROM write committed");
                }
            }
        }
    }
}
