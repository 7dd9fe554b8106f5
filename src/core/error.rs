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

//! Error types for the emulator
//!
//! All fallible core operations return [`Result<T>`]. Guest-visible
//! exceptions (SWI, IRQ) are emulated and never surface here; these errors
//! describe conditions the host has to deal with, such as unmapped memory
//! accesses or undecodable opcodes.

use thiserror::Error;

/// Emulator error type
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// Access to an unmapped address or past the end of a backing
    #[error("invalid memory access at 0x{address:08X}")]
    InvalidMemoryAccess {
        /// Faulting bus address
        address: u32,
    },

    /// Store to a read-only region
    ///
    /// Produced by [`crate::core::memory::MemoryRegion::write8`] and friends.
    /// The bus logs and swallows this; it never propagates out of a store.
    #[error("write to read-only memory at 0x{address:08X}")]
    ReadOnlyViolation {
        /// Faulting bus address (or region offset when raised by a region)
        address: u32,
    },

    /// Opcode that matches none of the decoder patterns
    #[error("unknown instruction 0x{opcode:08X} at 0x{pc:08X} (thumb: {thumb})")]
    UnknownInstruction {
        /// The undecodable opcode word
        opcode: u32,
        /// Instruction-set state at fetch time
        thumb: bool,
        /// Address the opcode was fetched from
        pc: u32,
    },

    /// Malformed I/O register access
    #[error("invalid I/O access at 0x{address:08X}")]
    IoError {
        /// Faulting bus address
        address: u32,
    },

    /// Feature the core explicitly does not implement
    #[error("unimplemented feature: {0}")]
    Unimplemented(&'static str),

    /// BIOS file not found
    #[error("BIOS file not found: {0}")]
    BiosNotFound(String),

    /// BIOS file has the wrong size
    #[error("invalid BIOS size: expected {expected} bytes, got {got}")]
    InvalidBiosSize {
        /// Required size in bytes
        expected: usize,
        /// Actual file size in bytes
        got: usize,
    },

    /// Cartridge image larger than the addressable ROM window
    #[error("ROM too large: limit {limit} bytes, got {got}")]
    RomTooLarge {
        /// Maximum loadable size in bytes
        limit: usize,
        /// Actual file size in bytes
        got: usize,
    },

    /// Underlying I/O error from the host filesystem
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, EmulatorError>;
