mod execute;

use crate::Host;
use crate::bus::{Bus, Interrupts};
use crate::mbc::Mbc;
use crate::save_state::{Reader, StateError, Writer};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        const Z = 1 << 7;
        const N = 1 << 6;
        const H = 1 << 5;
        const C = 1 << 4;
    }
}

// https://gbdev.io/pandocs/Interrupts.html#ime-interrupt-master-enable-flag-write-only
// EI takes effect one instruction late; DI is immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ime {
    Off,
    Pending,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltState {
    Running,
    Halted,
    /// HALT with IME off and an interrupt already pending: the next opcode
    /// byte is fetched without advancing PC, so it executes twice.
    HaltBug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    /// $D3-family opcodes lock up the silicon; here they end the emulation.
    IllegalOpcode { opcode: u8, pc: u16 },
}

impl core::fmt::Display for StepError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::IllegalOpcode { opcode, pc } => {
                write!(f, "illegal opcode ${opcode:02x} at PC ${pc:04x}")
            }
        }
    }
}

/// Everything the CPU reaches during an instruction: the bus for memory and
/// peripheral time, the cartridge, and the host for frame/audio delivery.
pub struct Ctx<'a> {
    pub bus: &'a mut Bus,
    pub mbc: &'a mut dyn Mbc,
    pub host: &'a mut dyn Host,
}

impl Ctx<'_> {
    /// A memory read occupies one m-cycle; the access lands first, then the
    /// peripherals advance.
    fn read(&mut self, address: u16) -> u8 {
        let value = self.bus.read(address, self.mbc);
        self.bus.cycle(self.mbc, self.host, false);
        value
    }

    fn write(&mut self, address: u16, value: u8) {
        self.bus.write(address, value, self.mbc);
        self.bus.cycle(self.mbc, self.host, false);
    }

    /// An internal cycle with no bus access.
    fn tick(&mut self) {
        self.bus.cycle(self.mbc, self.host, false);
    }

    fn tick_halted(&mut self) {
        self.bus.cycle(self.mbc, self.host, true);
    }
}

#[derive(Clone)]
pub struct Cpu {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub ime: Ime,
    pub halt: HaltState,
    /// last opcode fetched, for harnesses watching for sentinels
    pub current_opcode: u8,
}

impl Default for Cpu {
    fn default() -> Self {
        Self {
            a: 0,
            f: Flags::empty(),
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            ime: Ime::Off,
            halt: HaltState::Running,
            current_opcode: 0,
        }
    }
}

impl Cpu {
    /// Register file as the boot ROM leaves it on DMG hardware.
    pub fn post_boot() -> Self {
        Self {
            a: 0x01,
            f: Flags::from_bits_truncate(0xb0),
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xd8,
            h: 0x01,
            l: 0x4d,
            sp: 0xfffe,
            pc: 0x0100,
            ..Self::default()
        }
    }

    /// One instruction, one interrupt dispatch, or one halted m-cycle.
    pub fn step(&mut self, ctx: &mut Ctx) -> Result<(), StepError> {
        let pending = ctx.bus.interrupt_enable & ctx.bus.interrupt_flag & Interrupts::all();

        if self.halt == HaltState::Halted {
            if pending.is_empty() {
                ctx.tick_halted();
                return Ok(());
            }
            // a pending interrupt ends HALT even with IME off
            self.halt = HaltState::Running;
        }

        if self.ime == Ime::On && !pending.is_empty() {
            self.service_interrupt(ctx);
            return Ok(());
        }

        let enable_delay = self.ime == Ime::Pending;
        let opcode = self.fetch8(ctx);
        self.current_opcode = opcode;
        self.execute(opcode, ctx)?;
        if enable_delay && self.ime == Ime::Pending {
            self.ime = Ime::On;
        }
        Ok(())
    }

    fn service_interrupt(&mut self, ctx: &mut Ctx) {
        self.ime = Ime::Off;
        ctx.tick();
        ctx.tick();

        let [pc_high, pc_low] = self.pc.to_be_bytes();
        self.sp = self.sp.wrapping_sub(1);
        ctx.write(self.sp, pc_high);
        // the high push may overwrite IE; the vector choice happens after it,
        // and with nothing left to serve PC ends up at $0000
        let pending = ctx.bus.interrupt_enable & ctx.bus.interrupt_flag & Interrupts::all();
        self.sp = self.sp.wrapping_sub(1);
        ctx.write(self.sp, pc_low);

        let serviced = pending.iter().next();
        self.pc = serviced.map_or(0x0000, Interrupts::vector);
        if let Some(interrupt) = serviced {
            ctx.bus.interrupt_flag.remove(interrupt);
        }
        ctx.tick();
    }

    fn fetch8(&mut self, ctx: &mut Ctx) -> u8 {
        let value = ctx.read(self.pc);
        if self.halt == HaltState::HaltBug {
            self.halt = HaltState::Running;
        } else {
            self.pc = self.pc.wrapping_add(1);
        }
        value
    }

    fn fetch16(&mut self, ctx: &mut Ctx) -> u16 {
        let low = self.fetch8(ctx);
        let high = self.fetch8(ctx);
        u16::from_be_bytes([high, low])
    }

    pub(crate) fn halt_instruction(&mut self, ctx: &mut Ctx) {
        let pending = ctx.bus.interrupt_enable & ctx.bus.interrupt_flag & Interrupts::all();
        if pending.is_empty() {
            self.halt = HaltState::Halted;
        } else if self.ime != Ime::On {
            // https://gbdev.io/pandocs/halt.html#halt-bug
            self.halt = HaltState::HaltBug;
        }
        // with IME on the pending interrupt is serviced at the next boundary
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_u8(self.a)?;
        writer.write_u8(self.f.bits())?;
        writer.write_u8(self.b)?;
        writer.write_u8(self.c)?;
        writer.write_u8(self.d)?;
        writer.write_u8(self.e)?;
        writer.write_u8(self.h)?;
        writer.write_u8(self.l)?;
        writer.write_u16(self.sp)?;
        writer.write_u16(self.pc)?;
        writer.write_u8(match self.ime {
            Ime::Off => 0,
            Ime::Pending => 1,
            Ime::On => 2,
        })?;
        writer.write_u8(match self.halt {
            HaltState::Running => 0,
            HaltState::Halted => 1,
            HaltState::HaltBug => 2,
        })?;
        writer.write_u8(self.current_opcode)
    }

    pub fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        self.a = reader.read_u8()?;
        self.f = Flags::from_bits_truncate(reader.read_u8()?);
        self.b = reader.read_u8()?;
        self.c = reader.read_u8()?;
        self.d = reader.read_u8()?;
        self.e = reader.read_u8()?;
        self.h = reader.read_u8()?;
        self.l = reader.read_u8()?;
        self.sp = reader.read_u16()?;
        self.pc = reader.read_u16()?;
        self.ime = match reader.read_u8()? {
            0 => Ime::Off,
            1 => Ime::Pending,
            2 => Ime::On,
            _ => return Err(StateError::Corrupt),
        };
        self.halt = match reader.read_u8()? {
            0 => HaltState::Running,
            1 => HaltState::Halted,
            2 => HaltState::HaltBug,
            _ => return Err(StateError::Corrupt),
        };
        self.current_opcode = reader.read_u8()?;
        Ok(())
    }
}

