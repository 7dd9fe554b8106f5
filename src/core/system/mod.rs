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

//! System integration module
//!
//! Ties the CPU, bus, and video controller together and drives the tick
//! loop: one CPU instruction, then three video pixel clocks (the 1:3
//! CPU-to-pixel ratio of this model). Video edges fan out from here to the
//! interrupt controller and the DMA engine, both of which live on the bus.

use super::cpu::Cpu;
use super::dma::DmaTiming;
use super::error::Result;
use super::memory::{Bus, SaveType};
use super::video::{Presenter, VideoController};
use std::cell::RefCell;
use std::rc::Rc;

/// Pixel clocks advanced per CPU step
const VIDEO_CYCLES_PER_STEP: u32 = 3;

/// Game Boy Advance system
///
/// # Components
/// - CPU: ARM7TDMI interpreter
/// - Bus: memory regions, I/O aperture, DMA engine, interrupt controller
/// - Video: timing counters and rasterizer (shared with the bus for
///   memory-mapped access)
///
/// # Example
/// ```no_run
/// use gbarx::core::system::GameBoyAdvance;
///
/// let mut gba = GameBoyAdvance::new();
/// gba.load_bios("gba_bios.bin").unwrap();
/// gba.load_rom("game.gba").unwrap();
/// gba.reset();
/// gba.run().unwrap();
/// ```
pub struct GameBoyAdvance {
    /// CPU instance
    cpu: Cpu,
    /// Memory bus
    bus: Bus,
    /// Video controller (shared via Rc<RefCell> for memory-mapped access)
    video: Rc<RefCell<VideoController>>,
    /// Total CPU steps executed (halted steps included)
    cycles: u64,
    /// Running state
    running: bool,
}

impl GameBoyAdvance {
    /// Create a new system with all components in their power-on state
    ///
    /// Call [`reset`](Self::reset) (after loading images) before running.
    pub fn new() -> Self {
        let video = Rc::new(RefCell::new(VideoController::new()));
        let mut bus = Bus::new();
        bus.set_video(video.clone());

        log::info!("system: components initialized");

        Self {
            cpu: Cpu::new(),
            bus,
            video,
            cycles: 0,
            running: false,
        }
    }

    /// Load a BIOS image (exactly 16 KiB)
    pub fn load_bios(&mut self, path: &str) -> Result<()> {
        self.bus.load_bios(path)
    }

    /// Load a cartridge ROM image (up to 32 MiB)
    pub fn load_rom(&mut self, path: &str) -> Result<()> {
        self.bus.load_rom(path)
    }

    /// Select the cartridge save backing
    pub fn set_save_type(&mut self, save_type: SaveType) {
        self.bus.set_save_type(save_type);
    }

    /// Reset the machine
    ///
    /// Re-zeroes the registers and volatile memory, raises the CPU into
    /// Supervisor mode with PC = 0, and restarts video timing. ROM images
    /// and save contents survive.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        self.video.borrow_mut().reset();
        self.cycles = 0;
        self.running = true;
    }

    /// Execute one tick: one CPU instruction plus three pixel clocks
    ///
    /// While halted the CPU is skipped and only video advances; the halt
    /// ends when an interrupt request lands in IF.
    ///
    /// # Errors
    ///
    /// Propagates decoder and bus faults; the run loop halts on them.
    pub fn step(&mut self) -> Result<()> {
        if !self.cpu.is_halted() {
            self.cpu.step(&mut self.bus)?;
        }

        for _ in 0..VIDEO_CYCLES_PER_STEP {
            let events = self.video.borrow_mut().cycle();
            if events.irq != 0 {
                self.bus.request_interrupt(events.irq);
            }
            if events.vblank_started {
                self.bus.dma_trigger(DmaTiming::VBlank)?;
            }
            if events.hblank_started {
                self.bus.dma_trigger(DmaTiming::HBlank)?;
            }
        }

        if self.bus.take_halt_request() {
            self.cpu.halt();
        }
        if self.bus.irq_pending() {
            self.cpu.wake();
            self.cpu.try_interrupt();
        }

        self.cycles += 1;
        Ok(())
    }

    /// Execute `n` ticks
    pub fn step_n(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Run until the next frame is published
    pub fn run_frame(&mut self) -> Result<()> {
        let start = self.video.borrow().frame_count();
        while self.video.borrow().frame_count() == start {
            self.step()?;
        }
        Ok(())
    }

    /// Run until stopped or until an error halts the machine
    pub fn run(&mut self) -> Result<()> {
        log::info!("emulation loop started");
        while self.running {
            if let Err(error) = self.step() {
                log::error!("emulation halted: {}", error);
                self.cpu.dump_registers();
                self.running = false;
                return Err(error);
            }
        }
        Ok(())
    }

    /// Ask the run loop to stop after the current tick
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Create the host-side frame handle
    ///
    /// The presenter is `Send`; hand it to the display thread.
    pub fn presenter(&self) -> Presenter {
        self.video.borrow().presenter()
    }

    /// Total ticks executed since reset
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Frames published since construction
    pub fn frame_count(&self) -> u64 {
        self.video.borrow().frame_count()
    }

    /// Get reference to the CPU
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Get mutable reference to the CPU
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Get reference to the memory bus
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Get mutable reference to the memory bus
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Get reference to the video controller
    pub fn video(&self) -> Rc<RefCell<VideoController>> {
        Rc::clone(&self.video)
    }
}

impl Default for GameBoyAdvance {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpu::{psr, Mode, Reg};
    use crate::core::interrupt::interrupts;

    fn machine() -> GameBoyAdvance {
        let mut gba = GameBoyAdvance::new();
        gba.reset();
        gba
    }

    #[test]
    fn test_reset_scenario() {
        let gba = machine();
        assert_eq!(gba.cpu().mode(), Mode::Supervisor);
        assert_eq!(gba.cpu().reg(Reg::Pc), 0);
        assert!(gba.cpu().pipeline_empty());
        let cpsr = gba.cpu().reg(Reg::Cpsr);
        assert_eq!(cpsr & psr::THUMB, 0);
        assert_eq!(cpsr & psr::IRQ_DISABLE, 0);
        for i in 0..13 {
            assert_eq!(gba.cpu().reg(Reg::gpr(i)), 0);
        }
    }

    #[test]
    fn test_video_advances_three_pixels_per_step() {
        let mut gba = machine();
        // BIOS is all zeros: the CPU retires andeq r0, r0, r0 forever
        gba.step_n(10).unwrap();
        let video = gba.video();
        let video = video.borrow();
        assert_eq!(video.current_dot(), 30);
        assert_eq!(video.current_scanline(), 0);
    }

    #[test]
    fn test_mode3_frame_end_to_end() {
        let mut gba = machine();
        let mut presenter = gba.presenter();

        // DISPCNT: mode 3, sprites off
        gba.bus_mut().write16(0x0400_0000, 0x0003).unwrap();
        // Pixel (0, 0): red=10, green=20, blue=30
        let entry: u16 = 10 | (20 << 5) | (30 << 10);
        gba.bus_mut().write16(0x0600_0000, entry).unwrap();

        gba.run_frame().unwrap();

        let frame = presenter.acquire();
        assert_eq!(frame.pixel(0, 0), (10 << 3, 20 << 3, 30 << 3));
    }

    #[test]
    fn test_vblank_interrupt_scenario() {
        let mut gba = machine();
        // Enable V-blank in IE and in DISPSTAT
        gba.bus_mut()
            .write16(0x0400_0200, interrupts::VBLANK)
            .unwrap();
        gba.bus_mut().write16(0x0400_0004, 0x0008).unwrap();

        // Run until the scanline counter crosses into V-blank
        while gba.video().borrow().current_scanline() < 160 {
            gba.step().unwrap();
        }
        // One more step lets the CPU observe the request
        gba.step().unwrap();

        assert_eq!(
            gba.bus_mut().read16(0x0400_0202).unwrap(),
            interrupts::VBLANK
        );
        assert_eq!(gba.cpu().mode(), Mode::Irq);
        assert_ne!(gba.cpu().reg(Reg::Cpsr) & psr::IRQ_DISABLE, 0);
        // LR reflects the pre-interrupt pipeline; the handler runs at 0x18
        assert!(gba.cpu().reg(Reg::Lr) > 4);

        // Acknowledge: write 1 to IF bit 0
        gba.bus_mut()
            .write16(0x0400_0202, interrupts::VBLANK)
            .unwrap();
        assert_eq!(gba.bus_mut().read16(0x0400_0202).unwrap(), 0);
    }

    #[test]
    fn test_halt_until_interrupt() {
        let mut gba = machine();
        gba.bus_mut()
            .write16(0x0400_0200, interrupts::HBLANK)
            .unwrap();
        // DISPSTAT: H-blank IRQ enable
        gba.bus_mut().write16(0x0400_0004, 0x0010).unwrap();
        // HALTCNT write: the CPU stops on the next tick
        gba.bus_mut().write8(0x0400_0301, 0x00).unwrap();

        gba.step().unwrap();
        let halted_pc = gba.cpu().reg(Reg::Pc);
        assert!(gba.cpu().is_halted() || gba.bus().irq_pending());

        // Video keeps running while halted; the H-blank edge of line 0
        // arrives within 80 steps (240 dots / 3 per step) and wakes the CPU
        for _ in 0..81 {
            gba.step().unwrap();
        }
        assert!(!gba.cpu().is_halted());
        assert_eq!(gba.cpu().mode(), Mode::Irq);
        let _ = halted_pc;
    }

    #[test]
    fn test_stop_ends_run_loop() {
        let mut gba = machine();
        gba.stop();
        gba.run().unwrap();
        assert_eq!(gba.cycles(), 0);
    }
}
