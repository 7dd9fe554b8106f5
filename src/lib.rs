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

//! gbarx: A Game Boy Advance (GBA) emulator core
//!
//! This crate provides an interpretive emulator of the GBA's ARM7TDMI
//! processor, its segmented memory bus, and its scanline-driven video
//! controller.
//!
//! # Architecture
//!
//! The emulator is organized into the following modules:
//!
//! - [`core`]: Core emulation components (CPU, Memory, Video, DMA, System)
//!
//! # Example
//!
//! ```no_run
//! use gbarx::core::system::GameBoyAdvance;
//!
//! let mut gba = GameBoyAdvance::new();
//! // gba.load_bios("path/to/bios.bin")?;
//! // gba.load_rom("path/to/game.gba")?;
//! // gba.run()?;
//! # Ok::<(), gbarx::core::error::EmulatorError>(())
//! ```
//!
//! # Getting Started
//!
//! 1. Create a [`core::system::GameBoyAdvance`] instance
//! 2. Load a BIOS image and a cartridge image
//! 3. Run the emulation loop, presenting frames via [`core::video::Presenter`]
//!
//! # Modules
//!
//! - [`core::cpu`]: ARM7TDMI CPU emulation (ARM and Thumb instruction sets)
//! - [`core::memory`]: Memory bus, address resolution, and I/O dispatch
//! - [`core::video`]: Video timing, rasterizer, and frame handoff
//! - [`core::system`]: System integration and main loop
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, EmulatorError>`.

pub mod core;

// Re-export commonly used types
pub use core::error::{EmulatorError, Result};
