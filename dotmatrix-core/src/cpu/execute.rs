use crate::cpu::{Cpu, Ctx, Flags, Ime, StepError};

// $D3, $DB, $DD, $E3, $E4, $EB, $EC, $ED, $F4, $FC, $FD
const ILLEGAL_OPCODES: [u8; 11] = [
    0xd3, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd,
];

fn half_carry_add(first: u8, second: u8) -> bool {
    (first & 0x0f) + (second & 0x0f) > 0x0f
}

fn half_carry_adc(first: u8, second: u8, carry: bool) -> bool {
    (first & 0x0f) + (second & 0x0f) + carry as u8 > 0x0f
}

fn half_carry_sub(first: u8, second: u8) -> bool {
    first & 0x0f < second & 0x0f
}

impl Cpu {
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f.bits()])
    }

    fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    fn set_af(&mut self, value: u16) {
        let [high, low] = value.to_be_bytes();
        self.a = high;
        // the low nibble of F does not exist in silicon
        self.f = Flags::from_bits_truncate(low);
    }

    /// B C D E H L (HL) A by the usual 3-bit encoding; (HL) costs a cycle.
    fn read_r8(&mut self, index: u8, ctx: &mut Ctx) -> u8 {
        match index {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => ctx.read(self.hl()),
            _ => self.a,
        }
    }

    fn write_r8(&mut self, index: u8, value: u8, ctx: &mut Ctx) {
        match index {
            0 => self.b = value,
            1 => self.c = value,
            2 => self.d = value,
            3 => self.e = value,
            4 => self.h = value,
            5 => self.l = value,
            6 => ctx.write(self.hl(), value),
            _ => self.a = value,
        }
    }

    /// BC DE HL SP by the 2-bit encoding used outside PUSH/POP.
    fn read_r16(&self, index: u8) -> u16 {
        match index {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    fn write_r16(&mut self, index: u8, value: u16) {
        match index {
            0 => self.set_bc(value),
            1 => self.set_de(value),
            2 => self.set_hl(value),
            _ => self.sp = value,
        }
    }

    /// NZ Z NC C
    fn condition(&self, index: u8) -> bool {
        match index {
            0 => !self.f.contains(Flags::Z),
            1 => self.f.contains(Flags::Z),
            2 => !self.f.contains(Flags::C),
            _ => self.f.contains(Flags::C),
        }
    }

    fn push16(&mut self, value: u16, ctx: &mut Ctx) {
        let [high, low] = value.to_be_bytes();
        self.sp = self.sp.wrapping_sub(1);
        ctx.write(self.sp, high);
        self.sp = self.sp.wrapping_sub(1);
        ctx.write(self.sp, low);
    }

    fn pop16(&mut self, ctx: &mut Ctx) -> u16 {
        let low = ctx.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        let high = ctx.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        u16::from_be_bytes([high, low])
    }

    pub(crate) fn execute(&mut self, opcode: u8, ctx: &mut Ctx) -> Result<(), StepError> {
        match opcode {
            0x00 => {} // NOP
            // https://gist.github.com/SonoSooS/c0055300670d678b5ae8433e20bea595#nop-and-stop
            // no speed switch on this hardware: STOP is a two-byte NOP
            0x10 => {
                self.fetch8(ctx);
            }
            0x76 => self.halt_instruction(ctx),
            0xf3 => self.ime = Ime::Off, // DI
            0xfb => {
                // EI, effective after the next instruction
                if self.ime == Ime::Off {
                    self.ime = Ime::Pending;
                }
            }

            // 8-bit loads
            0x40..=0x7f => {
                let value = self.read_r8(opcode & 7, ctx);
                self.write_r8(opcode >> 3 & 7, value, ctx);
            }
            opcode if opcode & 0xc7 == 0x06 => {
                // LD r, n
                let value = self.fetch8(ctx);
                self.write_r8(opcode >> 3 & 7, value, ctx);
            }
            0x02 => ctx.write(self.bc(), self.a),
            0x12 => ctx.write(self.de(), self.a),
            0x0a => self.a = ctx.read(self.bc()),
            0x1a => self.a = ctx.read(self.de()),
            0x22 => {
                ctx.write(self.hl(), self.a);
                self.set_hl(self.hl().wrapping_add(1));
            }
            0x32 => {
                ctx.write(self.hl(), self.a);
                self.set_hl(self.hl().wrapping_sub(1));
            }
            0x2a => {
                self.a = ctx.read(self.hl());
                self.set_hl(self.hl().wrapping_add(1));
            }
            0x3a => {
                self.a = ctx.read(self.hl());
                self.set_hl(self.hl().wrapping_sub(1));
            }
            0xe0 => {
                let offset = self.fetch8(ctx);
                ctx.write(0xff00 | u16::from(offset), self.a);
            }
            0xf0 => {
                let offset = self.fetch8(ctx);
                self.a = ctx.read(0xff00 | u16::from(offset));
            }
            0xe2 => ctx.write(0xff00 | u16::from(self.c), self.a),
            0xf2 => self.a = ctx.read(0xff00 | u16::from(self.c)),
            0xea => {
                let address = self.fetch16(ctx);
                ctx.write(address, self.a);
            }
            0xfa => {
                let address = self.fetch16(ctx);
                self.a = ctx.read(address);
            }

            // 16-bit loads
            opcode if opcode & 0xcf == 0x01 => {
                let value = self.fetch16(ctx);
                self.write_r16(opcode >> 4 & 3, value);
            }
            0x08 => {
                // LD (a16), SP
                let address = self.fetch16(ctx);
                let [high, low] = self.sp.to_be_bytes();
                ctx.write(address, low);
                ctx.write(address.wrapping_add(1), high);
            }
            opcode if opcode & 0xcf == 0xc5 => {
                ctx.tick();
                let value = match opcode >> 4 & 3 {
                    0 => self.bc(),
                    1 => self.de(),
                    2 => self.hl(),
                    _ => self.af(),
                };
                self.push16(value, ctx);
            }
            opcode if opcode & 0xcf == 0xc1 => {
                let value = self.pop16(ctx);
                match opcode >> 4 & 3 {
                    0 => self.set_bc(value),
                    1 => self.set_de(value),
                    2 => self.set_hl(value),
                    _ => self.set_af(value),
                }
            }
            0xf9 => {
                ctx.tick();
                self.sp = self.hl();
            }
            0xf8 => {
                // LD HL, SP + e8
                let offset = self.fetch8(ctx);
                ctx.tick();
                let result = self.add_sp_offset(offset);
                self.set_hl(result);
            }

            // 8-bit arithmetic and logic
            0x80..=0xbf => {
                let value = self.read_r8(opcode & 7, ctx);
                self.alu(opcode >> 3 & 7, value);
            }
            opcode if opcode & 0xc7 == 0xc6 => {
                let value = self.fetch8(ctx);
                self.alu(opcode >> 3 & 7, value);
            }
            opcode if opcode & 0xc7 == 0x04 => {
                // INC r, carry untouched
                let index = opcode >> 3 & 7;
                let value = self.read_r8(index, ctx);
                let result = value.wrapping_add(1);
                self.f.set(Flags::Z, result == 0);
                self.f.remove(Flags::N);
                self.f.set(Flags::H, half_carry_add(value, 1));
                self.write_r8(index, result, ctx);
            }
            opcode if opcode & 0xc7 == 0x05 => {
                // DEC r, carry untouched
                let index = opcode >> 3 & 7;
                let value = self.read_r8(index, ctx);
                let result = value.wrapping_sub(1);
                self.f.set(Flags::Z, result == 0);
                self.f.insert(Flags::N);
                self.f.set(Flags::H, half_carry_sub(value, 1));
                self.write_r8(index, result, ctx);
            }
            0x27 => self.daa(),
            0x2f => {
                self.a = !self.a;
                self.f.insert(Flags::N | Flags::H);
            }
            0x37 => {
                self.f.remove(Flags::N | Flags::H);
                self.f.insert(Flags::C);
            }
            0x3f => {
                self.f.remove(Flags::N | Flags::H);
                self.f.toggle(Flags::C);
            }

            // 16-bit arithmetic
            opcode if opcode & 0xcf == 0x03 => {
                ctx.tick();
                let index = opcode >> 4 & 3;
                self.write_r16(index, self.read_r16(index).wrapping_add(1));
            }
            opcode if opcode & 0xcf == 0x0b => {
                ctx.tick();
                let index = opcode >> 4 & 3;
                self.write_r16(index, self.read_r16(index).wrapping_sub(1));
            }
            opcode if opcode & 0xcf == 0x09 => {
                // ADD HL, rr: Z preserved, half-carry from bit 11
                ctx.tick();
                let hl = self.hl();
                let value = self.read_r16(opcode >> 4 & 3);
                let (result, carry) = hl.overflowing_add(value);
                self.f.remove(Flags::N);
                self.f
                    .set(Flags::H, (hl & 0x0fff) + (value & 0x0fff) > 0x0fff);
                self.f.set(Flags::C, carry);
                self.set_hl(result);
            }
            0xe8 => {
                // ADD SP, e8
                let offset = self.fetch8(ctx);
                ctx.tick();
                ctx.tick();
                self.sp = self.add_sp_offset(offset);
            }

            // rotates on A clear Z
            0x07 => {
                let result = self.rlc(self.a);
                self.a = result;
                self.f.remove(Flags::Z);
            }
            0x0f => {
                let result = self.rrc(self.a);
                self.a = result;
                self.f.remove(Flags::Z);
            }
            0x17 => {
                let result = self.rl(self.a);
                self.a = result;
                self.f.remove(Flags::Z);
            }
            0x1f => {
                let result = self.rr(self.a);
                self.a = result;
                self.f.remove(Flags::Z);
            }

            // jumps
            0xc3 => {
                let target = self.fetch16(ctx);
                ctx.tick();
                self.pc = target;
            }
            0xe9 => self.pc = self.hl(),
            opcode if opcode & 0xe7 == 0xc2 => {
                let target = self.fetch16(ctx);
                if self.condition(opcode >> 3 & 3) {
                    ctx.tick();
                    self.pc = target;
                }
            }
            0x18 => {
                let offset = self.fetch8(ctx);
                ctx.tick();
                self.pc = self.pc.wrapping_add_signed(i16::from(offset.cast_signed()));
            }
            opcode if opcode & 0xe7 == 0x20 => {
                let offset = self.fetch8(ctx);
                if self.condition(opcode >> 3 & 3) {
                    ctx.tick();
                    self.pc = self.pc.wrapping_add_signed(i16::from(offset.cast_signed()));
                }
            }

            // calls and returns
            0xcd => {
                let target = self.fetch16(ctx);
                ctx.tick();
                self.push16(self.pc, ctx);
                self.pc = target;
            }
            opcode if opcode & 0xe7 == 0xc4 => {
                let target = self.fetch16(ctx);
                if self.condition(opcode >> 3 & 3) {
                    ctx.tick();
                    self.push16(self.pc, ctx);
                    self.pc = target;
                }
            }
            0xc9 => {
                self.pc = self.pop16(ctx);
                ctx.tick();
            }
            0xd9 => {
                // RETI enables interrupts without the EI delay
                self.pc = self.pop16(ctx);
                ctx.tick();
                self.ime = Ime::On;
            }
            opcode if opcode & 0xe7 == 0xc0 => {
                ctx.tick();
                if self.condition(opcode >> 3 & 3) {
                    self.pc = self.pop16(ctx);
                    ctx.tick();
                }
            }
            opcode if opcode & 0xc7 == 0xc7 => {
                // RST
                ctx.tick();
                self.push16(self.pc, ctx);
                self.pc = u16::from(opcode & 0x38);
            }

            0xcb => {
                let cb_opcode = self.fetch8(ctx);
                self.execute_cb(cb_opcode, ctx);
            }

            _ => {
                debug_assert!(ILLEGAL_OPCODES.contains(&opcode));
                log::warn!(
                    "illegal opcode ${opcode:02x} at ${:04x}",
                    self.pc.wrapping_sub(1)
                );
                return Err(StepError::IllegalOpcode {
                    opcode,
                    pc: self.pc.wrapping_sub(1),
                });
            }
        }
        Ok(())
    }

    fn execute_cb(&mut self, opcode: u8, ctx: &mut Ctx) {
        let index = opcode & 7;
        let bit = opcode >> 3 & 7;
        match opcode >> 6 {
            0 => {
                let value = self.read_r8(index, ctx);
                let result = match bit {
                    0 => self.rlc(value),
                    1 => self.rrc(value),
                    2 => self.rl(value),
                    3 => self.rr(value),
                    4 => self.sla(value),
                    5 => self.sra(value),
                    6 => self.swap(value),
                    _ => self.srl(value),
                };
                self.write_r8(index, result, ctx);
            }
            1 => {
                // BIT only reads
                let value = self.read_r8(index, ctx);
                self.f.set(Flags::Z, value & (1 << bit) == 0);
                self.f.remove(Flags::N);
                self.f.insert(Flags::H);
            }
            2 => {
                let value = self.read_r8(index, ctx);
                self.write_r8(index, value & !(1 << bit), ctx);
            }
            _ => {
                let value = self.read_r8(index, ctx);
                self.write_r8(index, value | 1 << bit, ctx);
            }
        }
    }

    /// ADD ADC SUB SBC AND XOR OR CP by the 3-bit encoding.
    fn alu(&mut self, operation: u8, value: u8) {
        match operation {
            0 => self.add(value),
            1 => self.adc(value),
            2 => self.sub(value),
            3 => self.sbc(value),
            4 => {
                self.a &= value;
                self.f.set(Flags::Z, self.a == 0);
                self.f.remove(Flags::N | Flags::C);
                self.f.insert(Flags::H);
            }
            5 => {
                self.a ^= value;
                self.f.set(Flags::Z, self.a == 0);
                self.f.remove(Flags::N | Flags::H | Flags::C);
            }
            6 => {
                self.a |= value;
                self.f.set(Flags::Z, self.a == 0);
                self.f.remove(Flags::N | Flags::H | Flags::C);
            }
            _ => {
                // CP: SUB without the store
                let a = self.a;
                let (result, carry) = a.overflowing_sub(value);
                self.f.set(Flags::Z, result == 0);
                self.f.insert(Flags::N);
                self.f.set(Flags::H, half_carry_sub(a, value));
                self.f.set(Flags::C, carry);
            }
        }
    }

    fn add(&mut self, value: u8) {
        let a = self.a;
        let (result, carry) = a.overflowing_add(value);
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N);
        self.f.set(Flags::H, half_carry_add(a, value));
        self.f.set(Flags::C, carry);
        self.a = result;
    }

    fn adc(&mut self, value: u8) {
        let a = u16::from(self.a);
        let carry = self.f.contains(Flags::C);
        let result = a + u16::from(value) + u16::from(carry);
        self.f.set(Flags::Z, result as u8 == 0);
        self.f.remove(Flags::N);
        self.f.set(Flags::H, half_carry_adc(self.a, value, carry));
        self.f.set(Flags::C, result > 0xff);
        self.a = result as u8;
    }

    fn sub(&mut self, value: u8) {
        let a = self.a;
        let (result, carry) = a.overflowing_sub(value);
        self.f.set(Flags::Z, result == 0);
        self.f.insert(Flags::N);
        self.f.set(Flags::H, half_carry_sub(a, value));
        self.f.set(Flags::C, carry);
        self.a = result;
    }

    fn sbc(&mut self, value: u8) {
        let a = u16::from(self.a);
        let carry = self.f.contains(Flags::C);
        let result = a.wrapping_sub(u16::from(value)).wrapping_sub(u16::from(carry));
        self.f.set(Flags::Z, result as u8 == 0);
        self.f.insert(Flags::N);
        self.f.set(
            Flags::H,
            self.a & 0x0f < (value & 0x0f) + carry as u8,
        );
        self.f.set(Flags::C, result > 0xff);
        self.a = result as u8;
    }

    // https://rgbds.gbdev.io/docs/v1.0.0/gbz80.7#DAA
    fn daa(&mut self) {
        let mut adjustment = 0u8;
        let result = if self.f.contains(Flags::N) {
            if self.f.contains(Flags::H) {
                adjustment += 0x06;
            }
            if self.f.contains(Flags::C) {
                adjustment += 0x60;
            }
            self.a.wrapping_sub(adjustment)
        } else {
            if self.f.contains(Flags::H) || self.a & 0x0f > 0x09 {
                adjustment += 0x06;
            }
            if self.f.contains(Flags::C) || self.a > 0x99 {
                adjustment += 0x60;
                self.f.insert(Flags::C);
            }
            self.a.wrapping_add(adjustment)
        };
        self.a = result;
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::H);
    }

    /// Carry and half-carry come from the unsigned low byte for both signs
    /// of the offset; Z and N always clear.
    fn add_sp_offset(&mut self, offset: u8) -> u16 {
        let low = self.sp as u8;
        self.f.remove(Flags::Z | Flags::N);
        self.f.set(Flags::H, half_carry_add(low, offset));
        self.f.set(Flags::C, low.checked_add(offset).is_none());
        self.sp.wrapping_add_signed(i16::from(offset.cast_signed()))
    }

    fn rlc(&mut self, value: u8) -> u8 {
        let result = value.rotate_left(1);
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H);
        self.f.set(Flags::C, value & 0x80 != 0);
        result
    }

    fn rrc(&mut self, value: u8) -> u8 {
        let result = value.rotate_right(1);
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H);
        self.f.set(Flags::C, value & 1 != 0);
        result
    }

    fn rl(&mut self, value: u8) -> u8 {
        let result = value << 1 | self.f.contains(Flags::C) as u8;
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H);
        self.f.set(Flags::C, value & 0x80 != 0);
        result
    }

    fn rr(&mut self, value: u8) -> u8 {
        let result = value >> 1 | (self.f.contains(Flags::C) as u8) << 7;
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H);
        self.f.set(Flags::C, value & 1 != 0);
        result
    }

    fn sla(&mut self, value: u8) -> u8 {
        let result = value << 1;
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H);
        self.f.set(Flags::C, value & 0x80 != 0);
        result
    }

    fn sra(&mut self, value: u8) -> u8 {
        let result = value >> 1 | value & 0x80;
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H);
        self.f.set(Flags::C, value & 1 != 0);
        result
    }

    fn srl(&mut self, value: u8) -> u8 {
        let result = value >> 1;
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H);
        self.f.set(Flags::C, value & 1 != 0);
        result
    }

    fn swap(&mut self, value: u8) -> u8 {
        let result = value.rotate_left(4);
        self.f.set(Flags::Z, result == 0);
        self.f.remove(Flags::N | Flags::H | Flags::C);
        result
    }
}
