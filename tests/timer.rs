mod common;

use common::{NullHost, SPIN, rom_with, step_many};
use dotmatrix_core::Emulator;
use dotmatrix_core::bus::{DIV, Interrupts, TIMA};

#[test]
fn div_starts_at_the_post_boot_value_and_counts() {
    let rom = rom_with(&SPIN);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    assert_eq!(0xab, emulator.bus.read(DIV, &mbc));
    // the post-boot counter is 64-cycle aligned; a JR spin is 3 m-cycles
    step_many(&mut emulator, &mut mbc, &mut host, 22);
    assert_eq!(0xac, emulator.bus.read(DIV, &mbc));
}

#[test]
fn div_reset_with_the_watched_bit_high_bumps_tima() {
    // LD A,$FC ; LDH ($07),A ; LD A,$00 ; LDH ($04),A
    // TAC $FC: enabled, 4096 Hz. The system counter sits at $2AC0 after boot,
    // so the watched bit is high when the DIV write lands 9 m-cycles later.
    let rom = rom_with(&[0x3e, 0xfc, 0xe0, 0x07, 0x3e, 0x00, 0xe0, 0x04, 0x00, 0x00]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 3);
    assert_eq!(0, emulator.bus.read(TIMA, &mbc));
    step_many(&mut emulator, &mut mbc, &mut host, 1);
    assert_eq!(1, emulator.bus.read(TIMA, &mbc));
    assert_eq!(0, emulator.bus.read(DIV, &mbc));
}

#[test]
fn overflow_requests_the_interrupt_and_reloads_tma() {
    // LD A,$23 ; LDH ($06),A ; LD A,$FE ; LDH ($05),A ; LD A,$05 ; LDH ($07),A
    let rom = {
        let mut program = vec![0x3e, 0x23, 0xe0, 0x06, 0x3e, 0xfe, 0xe0, 0x05, 0x3e, 0x05, 0xe0, 0x07];
        program.extend_from_slice(&SPIN);
        rom_with(&program)
    };
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    emulator.bus.interrupt_flag = Interrupts::empty();
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 6);
    // 262144 Hz: two increments overflow TIMA quickly
    for _ in 0..32 {
        step_many(&mut emulator, &mut mbc, &mut host, 1);
        if emulator.bus.interrupt_flag.contains(Interrupts::TIMER) {
            break;
        }
    }
    assert!(emulator.bus.interrupt_flag.contains(Interrupts::TIMER));
    assert_eq!(0x23, emulator.bus.read(TIMA, &mbc));
}
