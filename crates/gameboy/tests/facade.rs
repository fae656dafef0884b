//! End-to-end tests driving the emulator through `GameboyCore`.

mod common;

use std::sync::{Arc, Mutex};

use common::{vblank_loop_rom, vram_painter_rom, RomBuilder};
use gameboycore::{CartridgeError, CoreError, GameboyCore, Key};

fn loaded(rom: &[u8]) -> GameboyCore {
    let mut core = GameboyCore::new();
    core.load_rom(rom).expect("load rom");
    core
}

#[test]
fn writes_work_ram_then_halts() {
    let rom = RomBuilder::new()
        .code(&[
            0x3E, 0x42, // LD A,$42
            0xEA, 0x00, 0xC0, // LD ($C000),A
            0x76, // HALT
        ])
        .build();
    let mut core = loaded(&rom);
    core.write_memory(0xFFFF, 0x00);

    core.update(10).expect("update");
    assert_eq!(core.read_memory(0xC000), 0x42);
    assert!(core.is_done());
}

#[test]
fn one_frame_delivers_visible_scanlines_in_order() {
    let mut core = loaded(&vblank_loop_rom());
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    core.set_scanline_callback(Box::new(move |row, ly| {
        assert_eq!(row.len(), 160);
        sink.lock().unwrap().push(ly);
    }));

    core.emulate_frame().expect("frame");
    assert_eq!(*lines.lock().unwrap(), (0..144).collect::<Vec<u8>>());

    lines.lock().unwrap().clear();
    core.emulate_frame().expect("frame");
    assert_eq!(*lines.lock().unwrap(), (0..144).collect::<Vec<u8>>());
}

#[test]
fn vblank_callback_fires_once_per_frame() {
    let mut core = loaded(&vblank_loop_rom());
    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    core.set_vblank_callback(Box::new(move |frame| {
        assert_eq!(frame.pixels.len(), 160 * 144);
        *sink.lock().unwrap() += 1;
    }));

    for _ in 0..3 {
        core.emulate_frame().expect("frame");
    }
    // Line 144 is reached by the step that ends each frame
    assert_eq!(*count.lock().unwrap(), 3);
}

#[test]
fn split_updates_match_single_update() {
    let rom = vram_painter_rom();
    let mut a = loaded(&rom);
    let mut b = loaded(&rom);

    a.update(12_345).expect("update");
    b.update(5_000).expect("update");
    b.update(7_345).expect("update");

    assert_eq!(a.debug_state(), b.debug_state());
    for addr in (0x8000..=0x9FFFu16).chain(0xFF00..=0xFFFF) {
        assert_eq!(a.read_memory(addr), b.read_memory(addr), "addr {:04X}", addr);
    }
}

#[test]
fn failed_load_keeps_previous_machine() {
    let mut core = loaded(&vblank_loop_rom());
    core.update(100).expect("update");
    let before = core.debug_state();

    let bad = RomBuilder::new().cart_type(0x22).build();
    assert_eq!(
        core.load_rom(&bad),
        Err(CoreError::Cartridge(CartridgeError::UnsupportedMapper(0x22)))
    );
    assert_eq!(core.debug_state(), before);
    core.update(100).expect("still runs");
}

#[test]
fn joypad_press_wakes_halt() {
    let rom = RomBuilder::new()
        .code(&[
            0x3E, 0x10, // LD A,$10
            0xE0, 0xFF, // LDH ($FF),A
            0x76, // HALT
            0x3E, 0x99, // LD A,$99
            0xEA, 0x00, 0xC0, // LD ($C000),A
            0x76, // HALT
        ])
        .build();
    let mut core = loaded(&rom);
    core.update(50).expect("update");
    assert!(core.is_done());
    assert_eq!(core.read_memory(0xC000), 0x00);

    core.input(Key::Start, true);
    core.update(5).expect("update");
    assert_eq!(core.read_memory(0xC000), 0x99);

    // Select the button group and read Start as low
    core.write_memory(0xFF00, 0x10);
    assert_eq!(core.read_memory(0xFF00) & 0x08, 0);
}

#[test]
fn audio_callback_set_after_load_receives_samples() {
    let mut core = loaded(&vblank_loop_rom());
    core.emulate_frame().expect("frame");

    let received = Arc::new(Mutex::new(0usize));
    let sink = received.clone();
    core.set_audio_sample_callback(Box::new(move |samples| {
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        *sink.lock().unwrap() += samples.len();
    }));
    for _ in 0..2 {
        core.emulate_frame().expect("frame");
    }
    let received = *received.lock().unwrap();
    assert!(received >= 512, "got {} samples", received);
    assert_eq!(received % core.config().audio_batch, 0);
}

#[test]
fn mbc1_bank_switching_through_memory_writes() {
    let mut builder = RomBuilder::new().cart_type(0x01).rom_banks(4);
    for bank in 1..4usize {
        builder = builder.at(bank * 0x4000, &[0xB0 + bank as u8]);
    }
    let mut core = loaded(&builder.build());

    assert_eq!(core.read_memory(0x4000), 0xB1);
    core.write_memory(0x2000, 3);
    assert_eq!(core.read_memory(0x4000), 0xB3);
    // Bank 0 selects bank 1
    core.write_memory(0x2000, 0);
    assert_eq!(core.read_memory(0x4000), 0xB1);
    assert_eq!(core.cartridge_info().map(|i| i.rom_banks), Some(4));
}

#[test]
fn loading_logs_through_log_crate() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = gb_core::logging::LogConfig::global();
    config.set_level(
        gb_core::logging::LogCategory::Cartridge,
        gb_core::logging::LogLevel::Info,
    );
    let mut core = loaded(&vblank_loop_rom());
    assert!(core.load_rom(&[0; 8]).is_err());
    assert!(core.is_loaded());
}
