mod common;

use common::{CapturingHost, NullHost, SPIN, rom_with, step_many};
use dotmatrix_core::Emulator;
use dotmatrix_core::bus::{Interrupts, LCDC, OBP0, OBP1, STAT};
use dotmatrix_core::ppu::Mode;

#[test]
fn twelve_sprites_on_a_line_render_only_the_first_ten() {
    let rom = rom_with(&SPIN);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = CapturingHost::default();

    emulator.bus.write(LCDC, 0x93, &mut mbc); // sprites on
    emulator.bus.write(OBP0, 0xff, &mut mbc); // every index solid black
    emulator.bus.write(OBP1, 0x00, &mut mbc); // every index white

    // tile 1 is solid color 3
    for byte in emulator.bus.ppu.vram[16..32].iter_mut() {
        *byte = 0xff;
    }
    // ten sprites filling the line budget, in OAM order
    for index in 0..10 {
        let base = index * 4;
        emulator.bus.ppu.oam[base] = 16;
        emulator.bus.ppu.oam[base + 1] = 24 + index as u8 * 8;
        emulator.bus.ppu.oam[base + 2] = 1;
    }
    // an eleventh at the far left and a twelfth on top of the first, using
    // the other palette so a win would be visible
    emulator.bus.ppu.oam[40] = 16;
    emulator.bus.ppu.oam[41] = 8;
    emulator.bus.ppu.oam[42] = 1;
    emulator.bus.ppu.oam[44] = 16;
    emulator.bus.ppu.oam[45] = 24;
    emulator.bus.ppu.oam[46] = 1;
    emulator.bus.ppu.oam[47] = 0x10; // OBP1

    assert!(!emulator.run_frame(&mut mbc, &mut host).unwrap());

    let line0 = &host.last_frame[..160];
    // the eleventh sprite (pixels 0-7) lost the OAM-order cut
    assert_eq!(0xffff_ffff, line0[0]);
    // sprite 1 at x=24 beats the twelfth entry parked at the same x
    assert_eq!(0xff00_0000, line0[16]);
    // the last budgeted sprite still draws
    assert_eq!(0xff00_0000, line0[24 + 9 * 8 - 8]);
}

#[test]
fn hblank_stat_interrupt_fires_once_per_entry() {
    let rom = rom_with(&SPIN);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    emulator.bus.write(STAT, 0x08, &mut mbc);
    emulator.bus.interrupt_flag = Interrupts::empty();

    while emulator.bus.ppu.mode() != Mode::HBlank {
        step_many(&mut emulator, &mut mbc, &mut host, 1);
    }
    assert!(emulator.bus.interrupt_flag.contains(Interrupts::LCD));

    // holding in mode 0 must not fire again
    emulator.bus.interrupt_flag = Interrupts::empty();
    while emulator.bus.ppu.mode() == Mode::HBlank {
        step_many(&mut emulator, &mut mbc, &mut host, 1);
        assert!(!emulator.bus.interrupt_flag.contains(Interrupts::LCD));
    }

    // the next HBlank entry is a fresh edge
    while emulator.bus.ppu.mode() != Mode::HBlank {
        step_many(&mut emulator, &mut mbc, &mut host, 1);
    }
    assert!(emulator.bus.interrupt_flag.contains(Interrupts::LCD));
}

#[test]
fn vblank_interrupt_coincides_with_ly_144() {
    let rom = rom_with(&SPIN);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    emulator.bus.interrupt_flag = Interrupts::empty();
    while !emulator.bus.interrupt_flag.contains(Interrupts::VBLANK) {
        step_many(&mut emulator, &mut mbc, &mut host, 1);
        assert!(emulator.bus.ppu.ly() <= 153);
    }
    assert_eq!(144, emulator.bus.ppu.ly());
}

#[test]
fn oam_reads_are_blocked_during_dma() {
    let rom = rom_with(&SPIN);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    // park the PPU in VBlank so OAM would otherwise be readable
    while emulator.bus.ppu.mode() != Mode::VBlank {
        step_many(&mut emulator, &mut mbc, &mut host, 1);
    }
    emulator.bus.ppu.oam[0] = 0x42;
    assert_eq!(0x42, emulator.bus.read(0xfe00, &mbc));

    emulator.bus.write(0xff46, 0xc0, &mut mbc);
    step_many(&mut emulator, &mut mbc, &mut host, 3);
    assert!(emulator.bus.ppu.dma_active());
    assert_eq!(0xff, emulator.bus.read(0xfe00, &mbc));

    // 160 bytes plus startup, with margin; then OAM opens up again
    step_many(&mut emulator, &mut mbc, &mut host, 170);
    assert!(!emulator.bus.ppu.dma_active());
    assert_eq!(0x00, emulator.bus.read(0xfe00, &mbc));
}

#[test]
fn frame_is_blitted_and_presented_once() {
    let rom = rom_with(&SPIN);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = CapturingHost::default();

    assert!(!emulator.run_frame(&mut mbc, &mut host).unwrap());
    assert_eq!(1, host.frames_presented);
    assert_eq!(160 * 144, host.last_frame.len());
}
