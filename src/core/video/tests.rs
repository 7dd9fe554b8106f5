// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Video controller tests

use super::*;

/// Pixel clocks in one full frame
const CYCLES_PER_FRAME: u32 = 308 * 228;

#[test]
fn test_cursor_stays_in_raster_bounds() {
    let mut video = VideoController::new();
    for _ in 0..CYCLES_PER_FRAME + 1000 {
        video.cycle();
        assert!(video.current_dot() < VideoController::TOTAL_WIDTH);
        assert!(video.current_scanline() < VideoController::TOTAL_HEIGHT);
    }
}

#[test]
fn test_scanline_advances_once_per_line() {
    let mut video = VideoController::new();
    for _ in 0..VideoController::TOTAL_WIDTH {
        video.cycle();
    }
    assert_eq!(video.current_scanline(), 1);
    assert_eq!(video.current_dot(), 0);
}

#[test]
fn test_status_flags_track_cursor() {
    let mut video = VideoController::new();
    for _ in 0..CYCLES_PER_FRAME {
        video.cycle();
        let stat = video.status();
        assert_eq!(
            stat.in_hblank(),
            video.current_dot() >= VideoController::HBLANK_START
        );
        assert_eq!(
            stat.in_vblank(),
            video.current_scanline() >= VideoController::VBLANK_START
        );
        assert_eq!(
            stat.vcount_matched(),
            video.current_scanline() == stat.vcount_compare()
        );
    }
}

#[test]
fn test_hblank_edge_fires_once_per_line() {
    let mut video = VideoController::new();
    let mut edges = 0;
    for _ in 0..VideoController::TOTAL_WIDTH {
        if video.cycle().hblank_started {
            edges += 1;
            assert_eq!(video.current_dot(), VideoController::HBLANK_START);
        }
    }
    assert_eq!(edges, 1);
}

#[test]
fn test_vblank_edge_fires_at_line_160() {
    let mut video = VideoController::new();
    let mut saw_vblank = false;
    for _ in 0..CYCLES_PER_FRAME {
        let events = video.cycle();
        if events.vblank_started {
            assert!(!saw_vblank, "v-blank edge fired more than once per frame");
            saw_vblank = true;
            assert_eq!(video.current_scanline(), VideoController::VBLANK_START);
            assert_eq!(video.current_dot(), 0);
        }
    }
    assert!(saw_vblank);
}

#[test]
fn test_blank_irqs_respect_enable_bits() {
    let mut video = VideoController::new();
    // No enables: edges still reported, no IRQs requested
    for _ in 0..CYCLES_PER_FRAME {
        assert_eq!(video.cycle().irq, 0);
    }

    // Enable V-blank and H-blank IRQs (bits 3 and 4)
    video.write_register(0x04, 0x0018);
    let mut irqs = 0u16;
    for _ in 0..CYCLES_PER_FRAME {
        irqs |= video.cycle().irq;
    }
    assert_ne!(irqs & crate::core::interrupt::interrupts::VBLANK, 0);
    assert_ne!(irqs & crate::core::interrupt::interrupts::HBLANK, 0);
    assert_eq!(irqs & crate::core::interrupt::interrupts::VCOUNT, 0);
}

#[test]
fn test_vcount_match_irq() {
    let mut video = VideoController::new();
    // Compare value 100, match IRQ enable (bit 5)
    video.write_register(0x04, (100 << 8) | 0x20);
    let mut matched_at = None;
    for _ in 0..CYCLES_PER_FRAME {
        let events = video.cycle();
        if events.irq & crate::core::interrupt::interrupts::VCOUNT != 0 {
            matched_at = Some(video.current_scanline());
        }
    }
    assert_eq!(matched_at, Some(100));
}

#[test]
fn test_vcount_register_is_read_only() {
    let mut video = VideoController::new();
    video.write_register(0x06, 0x1234);
    assert_eq!(video.read_register(0x06), 0);
}

#[test]
fn test_mode3_frame_reaches_presenter() {
    let mut video = VideoController::new();
    let mut presenter = video.presenter();

    // Mode 3, no sprites
    video.write_register(0x00, 0x0003);
    // Pixel (0, 0): BGR555 red=31, green=15, blue=7
    let entry: u16 = 31 | (15 << 5) | (7 << 10);
    video.vram_write16(0, entry).unwrap();
    // Pixel (1, 0) in the second halfword
    video.vram_write16(2, 0x7FFF).unwrap();

    let mut published = false;
    for _ in 0..CYCLES_PER_FRAME {
        if video.cycle().frame_published {
            published = true;
            break;
        }
    }
    assert!(published);

    let frame = presenter.acquire();
    assert_eq!(frame.pixel(0, 0), (31 << 3, 15 << 3, 7 << 3));
    assert_eq!(frame.pixel(1, 0), (0xF8, 0xF8, 0xF8));
}

#[test]
fn test_forced_blank_renders_white() {
    let mut video = VideoController::new();
    let mut presenter = video.presenter();

    // Forced blank with a non-white backdrop in the palette
    video.write_register(0x00, 0x0080);
    video.palette_write16(0, 0x001F).unwrap();

    while !video.cycle().frame_published {}
    let frame = presenter.acquire();
    assert_eq!(frame.pixel(120, 80), (0xFF, 0xFF, 0xFF));
}

#[test]
fn test_backdrop_fills_frame_in_mode0() {
    let mut video = VideoController::new();
    let mut presenter = video.presenter();

    // Mode 0, all backgrounds disabled: the frame is the backdrop colour
    video.write_register(0x00, 0x0000);
    video.palette_write16(0, 0x03E0).unwrap(); // pure green
    while !video.cycle().frame_published {}
    let frame = presenter.acquire();
    assert_eq!(frame.pixel(0, 0), (0, 31 << 3, 0));
    assert_eq!(frame.pixel(239, 159), (0, 31 << 3, 0));
}

#[test]
fn test_mode0_tiled_background_with_scroll() {
    let mut video = VideoController::new();
    let mut presenter = video.presenter();

    // Mode 0, BG0 enabled; BG0: map block 2, tile block 0, 16-colour
    video.write_register(0x00, 0x0100);
    video.write_register(0x08, 2 << 8);

    // Tile 1: solid colour index 5 (both nibbles of every byte)
    for i in 0..32 {
        video.vram_write8(32 + i, 0x55).unwrap();
    }
    // Map entry (0, 0) selects tile 1 with palette bank 2
    video.vram_write16(2 * 0x800, (2 << 12) | 1).unwrap();
    // Palette bank 2, colour 5
    video.palette_write16((2 * 16 + 5) * 2, 0x7C00).unwrap(); // pure blue

    while !video.cycle().frame_published {}
    let frame = presenter.acquire();
    // Tile (0,0) covers pixels 0..8 in both axes
    assert_eq!(frame.pixel(3, 3), (0, 0, 31 << 3));
    // Outside the tile the backdrop (black) shows through
    assert_eq!(frame.pixel(9, 0), (0, 0, 0));

    // Scroll the background 8 pixels right: the tile leaves the screen origin
    video.write_register(0x10, 8);
    while !video.cycle().frame_published {}
    let frame = presenter.acquire();
    assert_eq!(frame.pixel(3, 3), (0, 0, 0));
}

#[test]
fn test_sprite_blit_16_colour() {
    let mut video = VideoController::new();
    let mut presenter = video.presenter();

    // Mode 0 with sprites enabled, 1D mapping
    video.write_register(0x00, 0x1040);

    // OBJ tile 2: solid colour index 1
    let tile_offset = 0x10000 + 2 * 32;
    for i in 0..32 {
        video.vram_write8((tile_offset + i) as u32, 0x11).unwrap();
    }
    // OAM entry 0: 8×8 sprite at (20, 30), tile 2, palette bank 1
    video.oam_write16(0, 30).unwrap();
    video.oam_write16(2, 20).unwrap();
    video.oam_write16(4, (1 << 12) | 2).unwrap();
    // OBJ palette bank 1, colour 1
    video
        .palette_write16(0x200 + (16 + 1) * 2, 0x001F)
        .unwrap(); // pure red

    while !video.cycle().frame_published {}
    let frame = presenter.acquire();
    assert_eq!(frame.pixel(20, 30), (31 << 3, 0, 0));
    assert_eq!(frame.pixel(27, 37), (31 << 3, 0, 0));
    assert_eq!(frame.pixel(28, 38), (0, 0, 0));
}

#[test]
fn test_hidden_sprites_are_skipped() {
    let mut video = VideoController::new();
    let mut presenter = video.presenter();

    video.write_register(0x00, 0x1000);
    let tile_offset = 0x10000;
    for i in 0..32 {
        video.vram_write8((tile_offset + i) as u32, 0x11).unwrap();
    }
    // Hidden bit (attr0 bit 9) set
    video.oam_write16(0, 0x0200 | 40).unwrap();
    video.oam_write16(2, 40).unwrap();
    video.oam_write16(4, 0).unwrap();
    video.palette_write16(0x200 + 2, 0x7FFF).unwrap();

    while !video.cycle().frame_published {}
    let frame = presenter.acquire();
    assert_eq!(frame.pixel(40, 40), (0, 0, 0));
}

#[test]
fn test_reset_restores_initial_state() {
    let mut video = VideoController::new();
    video.write_register(0x00, 0x1234 & 0xFFF7);
    video.vram_write16(0, 0xABCD).unwrap();
    for _ in 0..1000 {
        video.cycle();
    }
    video.reset();
    assert_eq!(video.current_dot(), 0);
    assert_eq!(video.current_scanline(), 0);
    assert_eq!(video.read_register(0x00), 0);
    assert_eq!(video.vram_read16(0).unwrap(), 0);
}
