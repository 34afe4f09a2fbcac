mod common;

use common::{NullHost, rom_with, step_many};
use dotmatrix_core::Emulator;
use dotmatrix_core::bus::Interrupts;
use dotmatrix_core::cpu::{Flags, Ime, StepError};

#[test]
fn daa_corrects_packed_bcd_after_add() {
    // LD A,$45 ; LD B,$38 ; ADD A,B ; DAA
    let rom = rom_with(&[0x3e, 0x45, 0x06, 0x38, 0x80, 0x27]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 3);
    assert_eq!(0x7d, emulator.cpu.a);
    assert!(!emulator.cpu.f.contains(Flags::H));

    step_many(&mut emulator, &mut mbc, &mut host, 1);
    assert_eq!(0x83, emulator.cpu.a);
    assert!(!emulator.cpu.f.contains(Flags::C));
    assert!(!emulator.cpu.f.contains(Flags::Z));
}

#[test]
fn halt_bug_executes_the_next_byte_twice() {
    // HALT ; INC A with IME off and an interrupt already pending
    let rom = rom_with(&[0x76, 0x3c, 0x00, 0x00]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    emulator.bus.interrupt_enable = Interrupts::VBLANK;
    emulator.bus.interrupt_flag = Interrupts::VBLANK;
    let mut host = NullHost;

    let a_before = emulator.cpu.a;
    step_many(&mut emulator, &mut mbc, &mut host, 3);
    assert_eq!(a_before.wrapping_add(2), emulator.cpu.a);
    // both executions consumed the same byte, so PC sits past INC A only once
    assert_eq!(0x102, emulator.cpu.pc);
}

#[test]
fn flag_low_nibble_is_never_set() {
    // LD BC,$FFFF ; PUSH BC ; POP AF
    let rom = rom_with(&[0x01, 0xff, 0xff, 0xc5, 0xf1]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 3);
    assert_eq!(0xff, emulator.cpu.a);
    assert_eq!(0xf0, emulator.cpu.f.bits());
}

#[test]
fn registers_read_back_what_was_written() {
    // LD B,$12 ; LD C,$34 ; LD D,$56 ; LD E,$78 ; LD H,$9A ; LD L,$BC ; LD A,$DE
    let rom = rom_with(&[
        0x06, 0x12, 0x0e, 0x34, 0x16, 0x56, 0x1e, 0x78, 0x26, 0x9a, 0x2e, 0xbc, 0x3e, 0xde,
    ]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 7);
    let cpu = &emulator.cpu;
    assert_eq!(
        (0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde),
        (cpu.b, cpu.c, cpu.d, cpu.e, cpu.h, cpu.l, cpu.a)
    );
}

#[test]
fn ei_enables_one_instruction_late() {
    // EI ; NOP ; NOP with a VBlank request already pending
    let rom = rom_with(&[0xfb, 0x00, 0x00]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    emulator.bus.interrupt_enable = Interrupts::VBLANK;
    emulator.bus.interrupt_flag = Interrupts::VBLANK;
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 1); // EI
    assert_eq!(Ime::Pending, emulator.cpu.ime);
    step_many(&mut emulator, &mut mbc, &mut host, 1); // NOP, still shielded
    assert_ne!(0x0040, emulator.cpu.pc);
    step_many(&mut emulator, &mut mbc, &mut host, 1); // dispatch
    assert_eq!(0x0040, emulator.cpu.pc);
    assert_eq!(Ime::Off, emulator.cpu.ime);
    assert!(!emulator.bus.interrupt_flag.contains(Interrupts::VBLANK));
}

#[test]
fn di_is_immediate() {
    // EI ; DI ; NOP
    let rom = rom_with(&[0xfb, 0xf3, 0x00]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    emulator.bus.interrupt_enable = Interrupts::VBLANK;
    emulator.bus.interrupt_flag = Interrupts::VBLANK;
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 3);
    assert_eq!(Ime::Off, emulator.cpu.ime);
    assert_ne!(0x0040, emulator.cpu.pc);
}

#[test]
fn interrupt_cancelled_by_its_own_push_lands_at_zero() {
    // pushing PC's high byte over IE wipes the only pending source
    let rom = rom_with(&[0x00; 16]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    emulator.cpu.ime = Ime::On;
    emulator.cpu.sp = 0x0000; // high push lands on $FFFF
    emulator.cpu.pc = 0x0012; // high byte $00 clears IE
    emulator.bus.interrupt_enable = Interrupts::VBLANK;
    emulator.bus.interrupt_flag = Interrupts::VBLANK;
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 1);
    assert_eq!(0x0000, emulator.cpu.pc);
    // nothing was serviced, the request is still there
    assert!(emulator.bus.interrupt_flag.contains(Interrupts::VBLANK));
}

#[test]
fn illegal_opcodes_are_fatal() {
    for opcode in [0xd3u8, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd] {
        let rom = rom_with(&[opcode]);
        let mut mbc: &[u8] = &rom;
        let mut emulator = Emulator::post_boot();
        let mut host = NullHost;

        assert_eq!(
            Err(StepError::IllegalOpcode { opcode, pc: 0x100 }),
            emulator.step(&mut mbc, &mut host)
        );
    }
}

#[test]
fn add_sp_flags_come_from_the_low_byte() {
    // LD SP,$00FF ; ADD SP,$01 ; LD HL,SP+$FF
    let rom = rom_with(&[0x31, 0xff, 0x00, 0xe8, 0x01, 0xf8, 0xff]);
    let mut mbc: &[u8] = &rom;
    let mut emulator = Emulator::post_boot();
    let mut host = NullHost;

    step_many(&mut emulator, &mut mbc, &mut host, 2);
    assert_eq!(0x0100, emulator.cpu.sp);
    assert!(emulator.cpu.f.contains(Flags::C));
    assert!(emulator.cpu.f.contains(Flags::H));
    assert!(!emulator.cpu.f.contains(Flags::Z));

    step_many(&mut emulator, &mut mbc, &mut host, 1);
    // $0100 + (-1) = $00FF; low byte $00 + $FF carries nothing
    assert_eq!(0x00ff, emulator.cpu.hl());
    assert!(!emulator.cpu.f.contains(Flags::C));
    assert!(!emulator.cpu.f.contains(Flags::H));
}
