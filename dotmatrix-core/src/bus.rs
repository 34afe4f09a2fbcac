use crate::apu::Apu;
use crate::joypad::Joypad;
use crate::mbc::Mbc;
use crate::ppu::Ppu;
use crate::save_state::{Reader, StateError, Writer};
use crate::timer::Timer;
use crate::{Host, PITCH};

// region bases
pub const ROM_BANK: u16 = 0x0000;
pub const SWITCHABLE_ROM_BANK: u16 = 0x4000;
pub const VIDEO_RAM: u16 = 0x8000;
pub const EXTERNAL_RAM: u16 = 0xa000;
pub const WORK_RAM: u16 = 0xc000;
pub const ECHO_RAM: u16 = 0xe000;
pub const OAM: u16 = 0xfe00;
pub const NOT_USABLE: u16 = 0xfea0;
pub const HRAM: u16 = 0xff80;

// I/O registers
pub const JOYP: u16 = 0xff00;
pub const SB: u16 = 0xff01;
pub const SC: u16 = 0xff02;
pub const DIV: u16 = 0xff04;
pub const TIMA: u16 = 0xff05;
pub const TMA: u16 = 0xff06;
pub const TAC: u16 = 0xff07;
pub const IF: u16 = 0xff0f;
pub const AUDIO_START: u16 = 0xff10;
pub const LCDC: u16 = 0xff40;
pub const STAT: u16 = 0xff41;
pub const SCY: u16 = 0xff42;
pub const SCX: u16 = 0xff43;
pub const LY: u16 = 0xff44;
pub const LYC: u16 = 0xff45;
pub const DMA: u16 = 0xff46;
pub const BGP: u16 = 0xff47;
pub const OBP0: u16 = 0xff48;
pub const OBP1: u16 = 0xff49;
pub const WY: u16 = 0xff4a;
pub const WX: u16 = 0xff4b;
pub const BOOT_ROM_DISABLE: u16 = 0xff50;
pub const IE: u16 = 0xffff;

bitflags::bitflags! {
    // bits in service priority order
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Interrupts: u8 {
        const VBLANK = 1;
        const LCD = 1 << 1;
        const TIMER = 1 << 2;
        const SERIAL = 1 << 3;
        const JOYPAD = 1 << 4;
    }
}

impl Interrupts {
    pub fn vector(self) -> u16 {
        match self {
            Interrupts::VBLANK => 0x0040,
            Interrupts::LCD => 0x0048,
            Interrupts::TIMER => 0x0050,
            Interrupts::SERIAL => 0x0058,
            Interrupts::JOYPAD => 0x0060,
            _ => 0x0000,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SerialControl: u8 {
        const TRANSFER_ENABLE = 1 << 7;
        const CLOCK_SELECT = 1;
    }
}

/// Owns memory and every peripheral; the CPU reaches all of them through
/// `read`/`write`, and `cycle` is the single place they advance in time.
#[derive(Clone)]
pub struct Bus {
    pub wram: [u8; 0x2000],
    pub hram: [u8; 0x7f],
    pub interrupt_flag: Interrupts,
    pub interrupt_enable: Interrupts,
    pub sb: u8,
    pub sc: SerialControl,
    boot_rom: Option<[u8; 256]>,
    boot_rom_enabled: bool,
    pub timer: Timer,
    pub joypad: Joypad,
    pub ppu: Ppu,
    pub apu: Apu,
    /// m-cycles since power-on
    pub cycles: u64,
    frame_completed: bool,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            wram: [0; 0x2000],
            hram: [0; 0x7f],
            interrupt_flag: Interrupts::empty(),
            interrupt_enable: Interrupts::empty(),
            sb: 0,
            sc: SerialControl::empty(),
            boot_rom: None,
            boot_rom_enabled: false,
            timer: Timer::default(),
            joypad: Joypad::default(),
            ppu: Ppu::default(),
            apu: Apu::default(),
            cycles: 0,
            frame_completed: false,
        }
    }
}

impl Bus {
    pub fn post_boot() -> Self {
        Self {
            interrupt_flag: Interrupts::from_bits_truncate(0xe1),
            timer: Timer::post_boot(),
            ppu: Ppu::post_boot(),
            apu: Apu::post_boot(),
            ..Self::default()
        }
    }

    pub fn with_boot_rom(boot_rom: [u8; 256]) -> Self {
        Self {
            boot_rom: Some(boot_rom),
            boot_rom_enabled: true,
            ..Self::default()
        }
    }

    /// One m-cycle for every peripheral, in the fixed order timer, APU, MBC,
    /// OAM DMA, PPU. The CPU's memory access for this cycle (if any) has
    /// already happened.
    pub fn cycle(&mut self, mbc: &mut dyn Mbc, host: &mut dyn Host, cpu_halted: bool) {
        let sequencer_step = self.timer.tick(&mut self.interrupt_flag);
        self.apu.tick(sequencer_step, host);
        mbc.tick();

        let Self { ppu, wram, .. } = self;
        ppu.tick_dma(&mut |address| match address {
            WORK_RAM..ECHO_RAM => wram[usize::from(address - WORK_RAM)],
            // DMA sees a wider echo than the CPU does
            ECHO_RAM.. => wram[usize::from(address - ECHO_RAM)],
            _ => mbc.read(address),
        });
        self.ppu.tick(&mut self.interrupt_flag, cpu_halted);

        if let Some(screen) = self.ppu.take_frame() {
            host.blit_screen(&screen.pixels, PITCH);
            self.frame_completed = true;
        }

        self.cycles = self.cycles.wrapping_add(1);
    }

    /// Set once a frame reached the host; cleared by the caller.
    pub fn take_frame_completed(&mut self) -> bool {
        core::mem::replace(&mut self.frame_completed, false)
    }

    pub fn read(&self, address: u16, mbc: &dyn Mbc) -> u8 {
        match address {
            // https://gbdev.io/pandocs/Power_Up_Sequence.html
            ..0x0100 if self.boot_rom_enabled => {
                self.boot_rom.map_or(0xff, |rom| rom[usize::from(address)])
            }
            ROM_BANK..VIDEO_RAM => mbc.read(address),
            VIDEO_RAM..EXTERNAL_RAM => self.ppu.read_vram(address),
            EXTERNAL_RAM..WORK_RAM => mbc.read(address),
            WORK_RAM..ECHO_RAM => self.wram[usize::from(address - WORK_RAM)],
            ECHO_RAM..OAM => self.wram[usize::from(address - ECHO_RAM)],
            OAM..NOT_USABLE => self.ppu.read_oam(address),
            NOT_USABLE..JOYP => 0xff,
            JOYP => self.joypad.read_register(),
            SB => self.sb,
            SC => self.sc.bits() | 0b0111_1110,
            DIV => self.timer.get_div(),
            TIMA => self.timer.get_tima(),
            TMA => self.timer.get_tma(),
            TAC => self.timer.get_tac(),
            IF => self.interrupt_flag.bits() | 0b1110_0000,
            AUDIO_START..LCDC => self.apu.read(address),
            LCDC..=WX => self.ppu.read_register(address),
            HRAM..IE => self.hram[usize::from(address - HRAM)],
            IE => self.interrupt_enable.bits(),
            // 0xff03, 0xff08-0xff0e, 0xff4c-0xff7f
            _ => 0xff,
        }
    }

    pub fn write(&mut self, address: u16, value: u8, mbc: &mut dyn Mbc) {
        match address {
            ROM_BANK..VIDEO_RAM => mbc.write(address, value),
            VIDEO_RAM..EXTERNAL_RAM => self.ppu.write_vram(address, value),
            EXTERNAL_RAM..WORK_RAM => mbc.write(address, value),
            WORK_RAM..ECHO_RAM => self.wram[usize::from(address - WORK_RAM)] = value,
            ECHO_RAM..OAM => self.wram[usize::from(address - ECHO_RAM)] = value,
            OAM..NOT_USABLE => self.ppu.write_oam(address, value),
            NOT_USABLE..JOYP => {}
            JOYP => self.joypad.write_register(value, &mut self.interrupt_flag),
            SB => self.sb = value,
            SC => self.sc = SerialControl::from_bits_truncate(value),
            DIV => {
                // the counter reset may itself be a sequencer edge
                if self.timer.write_div() {
                    self.apu.step_sequencer();
                }
            }
            TIMA => self.timer.write_tima(value),
            TMA => self.timer.write_tma(value),
            TAC => self.timer.write_tac(value),
            IF => self.interrupt_flag = Interrupts::from_bits_truncate(value),
            AUDIO_START..LCDC => self.apu.write(address, value),
            LCDC..=WX => self.ppu.write_register(address, value, &mut self.interrupt_flag),
            BOOT_ROM_DISABLE => {
                if self.boot_rom_enabled {
                    log::info!("boot ROM unmapped");
                    self.boot_rom_enabled = false;
                }
            }
            HRAM..IE => self.hram[usize::from(address - HRAM)] = value,
            IE => self.interrupt_enable = Interrupts::from_bits_retain(value),
            _ => {}
        }
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_bytes(&self.wram)?;
        writer.write_bytes(&self.hram)?;
        writer.write_u8(self.interrupt_flag.bits())?;
        writer.write_u8(self.interrupt_enable.bits())?;
        writer.write_u8(self.sb)?;
        writer.write_u8(self.sc.bits())?;
        writer.write_bool(self.boot_rom_enabled)?;
        writer.write_u64(self.cycles)?;
        writer.write_bool(self.frame_completed)
    }

    pub fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        reader.read_bytes(&mut self.wram)?;
        reader.read_bytes(&mut self.hram)?;
        self.interrupt_flag = Interrupts::from_bits_truncate(reader.read_u8()?);
        self.interrupt_enable = Interrupts::from_bits_retain(reader.read_u8()?);
        self.sb = reader.read_u8()?;
        self.sc = SerialControl::from_bits_truncate(reader.read_u8()?);
        self.boot_rom_enabled = reader.read_bool()?;
        self.cycles = reader.read_u64()?;
        self.frame_completed = reader.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_priority_follows_bit_order() {
        let mut pending = Interrupts::all();
        let mut order = [Interrupts::empty(); 5];
        for slot in order.iter_mut() {
            let next = pending.iter().next().unwrap();
            pending.remove(next);
            *slot = next;
        }
        assert_eq!(
            [
                Interrupts::VBLANK,
                Interrupts::LCD,
                Interrupts::TIMER,
                Interrupts::SERIAL,
                Interrupts::JOYPAD
            ],
            order
        );
    }

    #[test]
    fn vectors() {
        assert_eq!(0x40, Interrupts::VBLANK.vector());
        assert_eq!(0x60, Interrupts::JOYPAD.vector());
    }

    #[test]
    fn echo_ram_mirrors_work_ram() {
        let mut bus = Bus::default();
        let mut mbc: &[u8] = &[];
        bus.write(0xc123, 0x42, &mut mbc);
        assert_eq!(0x42, bus.read(0xe123, &mbc));
        bus.write(0xe456, 0x24, &mut mbc);
        assert_eq!(0x24, bus.read(0xc456, &mbc));
    }

    #[test]
    fn prohibited_region_reads_ff_and_eats_writes() {
        let mut bus = Bus::default();
        let mut mbc: &[u8] = &[];
        bus.write(0xfee0, 0x11, &mut mbc);
        assert_eq!(0xff, bus.read(0xfee0, &mbc));
    }

    #[test]
    fn unmapped_io_reads_ff() {
        let bus = Bus::default();
        let mbc: &[u8] = &[];
        assert_eq!(0xff, bus.read(0xff03, &mbc));
        assert_eq!(0xff, bus.read(0xff4d, &mbc));
        assert_eq!(0xff, bus.read(0xff7f, &mbc));
    }

    #[test]
    fn interrupt_flag_upper_bits_read_high() {
        let bus = Bus::default();
        let mbc: &[u8] = &[];
        assert_eq!(0xe0, bus.read(IF, &mbc));
    }

    #[test]
    fn boot_rom_overlays_the_cartridge_until_disabled() {
        let image = [0xaa; 0x8000];
        let mut mbc: &[u8] = &image;
        let mut bus = Bus::with_boot_rom([0x55; 256]);
        assert_eq!(0x55, bus.read(0x0000, &mbc));
        assert_eq!(0xaa, bus.read(0x0100, &mbc));
        bus.write(BOOT_ROM_DISABLE, 1, &mut mbc);
        assert_eq!(0xaa, bus.read(0x0000, &mbc));
        // the unmap is permanent
        bus.write(BOOT_ROM_DISABLE, 0, &mut mbc);
        assert_eq!(0xaa, bus.read(0x0000, &mbc));
    }
}
