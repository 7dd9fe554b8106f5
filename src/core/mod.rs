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

//! Core emulation components
//!
//! Leaf components first: memory regions and the EEPROM save device, then
//! the bus that dispatches to them, the interrupt controller and DMA engine
//! reachable through the I/O aperture, the video controller, the CPU, and
//! finally the system that wires everything together.

pub mod cpu;
pub mod dma;
pub mod eeprom;
pub mod error;
pub mod interrupt;
pub mod memory;
pub mod system;
pub mod video;

// Re-export commonly used types
pub use cpu::Cpu;
pub use memory::Bus;
pub use system::GameBoyAdvance;
pub use video::VideoController;
