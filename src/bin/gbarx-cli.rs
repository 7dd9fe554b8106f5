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

//! gbarx CLI entry point
//!
//! Headless runner: the emulator core runs on its own thread while the
//! main thread acts as the presenter, acquiring frames at a fixed cadence.
//! A host display surface would sit where the frame polling loop is.

use clap::Parser;
use gbarx::core::memory::SaveType;
use gbarx::core::system::GameBoyAdvance;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A Game Boy Advance emulator
#[derive(Parser)]
#[command(name = "gbarx-cli", version, about)]
struct Args {
    /// Path to the 16 KiB BIOS image
    bios: String,

    /// Path to the cartridge ROM image
    rom: String,

    /// Cartridge save backing
    #[arg(long, value_parser = parse_save_type, default_value = "sram")]
    save_type: SaveType,

    /// Stop after this many frames (run forever when omitted)
    #[arg(long)]
    frames: Option<u64>,
}

fn parse_save_type(value: &str) -> Result<SaveType, String> {
    match value {
        "sram" => Ok(SaveType::Sram),
        "eeprom512" => Ok(SaveType::Eeprom512),
        "eeprom8k" => Ok(SaveType::Eeprom8k),
        other => Err(format!(
            "unknown save type '{other}' (expected sram, eeprom512, or eeprom8k)"
        )),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Environment first, then logging from RUST_LOG
    dotenvy::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    log::info!("BIOS: {}", args.bios);
    log::info!("ROM: {}", args.rom);

    // The machine is built and driven on the emulator thread; the
    // presenter handle comes back over a channel.
    let (presenter_tx, presenter_rx) = mpsc::channel();
    let bios_path = args.bios.clone();
    let rom_path = args.rom.clone();
    let save_type = args.save_type;

    let emulator = thread::spawn(move || -> gbarx::Result<()> {
        let mut gba = GameBoyAdvance::new();
        gba.set_save_type(save_type);
        gba.load_bios(&bios_path)?;
        gba.load_rom(&rom_path)?;
        gba.reset();

        presenter_tx
            .send(gba.presenter())
            .expect("presenter receiver dropped");

        gba.run()
    });

    let mut presenter = match presenter_rx.recv() {
        Ok(presenter) => presenter,
        Err(_) => {
            // The emulator thread died before handing the presenter over
            return match emulator.join() {
                Ok(Err(error)) => Err(error.into()),
                _ => Err("emulator thread failed during startup".into()),
            };
        }
    };

    // Presentation loop: poll at roughly the hardware frame rate
    loop {
        thread::sleep(Duration::from_millis(16));
        let frames = presenter.frame_count();
        let _frame = presenter.acquire();

        if frames > 0 && frames % 600 == 0 {
            log::info!("{} frames presented", frames);
        }
        if let Some(limit) = args.frames {
            if frames >= limit {
                log::info!("frame limit reached ({limit}), exiting");
                // Dropping the presenter; the emulator thread is detached
                // and exits with the process.
                return Ok(());
            }
        }
        if emulator.is_finished() {
            return match emulator.join() {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(error.into()),
                Err(_) => Err("emulator thread panicked".into()),
            };
        }
    }
}
