use core::ops::Deref;

use crate::mbc::*;
use crate::save_state::{Reader, StateError, Writer};

#[derive(Clone)]
pub struct Mbc5<T> {
    rom: T,
    // 9 bits, and unlike MBC1 bank 0 really maps bank 0
    rom_bank: u16,
    ram_bank: u8,
    ram: [u8; 16 * RAM_BANK_SIZE],
    ram_enabled: bool,
    dirty: DirtyRam,
}

impl<T: Deref<Target = [u8]>> Mbc5<T> {
    pub fn new(rom: T) -> Self {
        Self {
            rom,
            rom_bank: 1,
            ram_bank: 0,
            ram: [0; 16 * RAM_BANK_SIZE],
            ram_enabled: false,
            dirty: DirtyRam::default(),
        }
    }

    fn high_rom_offset(&self) -> usize {
        let banks = rom_bank_count(&self.rom).unwrap_or(2);
        usize::from(self.rom_bank & (banks - 1)) * ROM_BANK_SIZE
    }

    fn ram_offset(&self) -> usize {
        usize::from(self.ram_bank) * RAM_BANK_SIZE
    }

    fn has_ram(&self) -> bool {
        ram_bank_count(&self.rom).unwrap_or(0) > 0
    }
}

impl<T: Deref<Target = [u8]>> Mbc for Mbc5<T> {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..0x4000 => self.rom.get(usize::from(address)).copied().unwrap_or(0xff),
            0x4000..0x8000 => {
                let offset = self.high_rom_offset() + usize::from(address - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xff)
            }
            0xa000..0xc000 => {
                if !self.ram_enabled || !self.has_ram() {
                    return 0xff;
                }
                self.ram[self.ram_offset() + usize::from(address - 0xa000)]
            }
            _ => 0xff,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..0x2000 => self.ram_enabled = value & 0x0f == 0x0a,
            0x2000..0x3000 => self.rom_bank = self.rom_bank & 0x100 | u16::from(value),
            0x3000..0x4000 => self.rom_bank = u16::from(value & 1) << 8 | self.rom_bank & 0xff,
            0x4000..0x6000 => self.ram_bank = value & 0x0f,
            0xa000..0xc000 => {
                if !self.ram_enabled || !self.has_ram() {
                    return;
                }
                self.ram[self.ram_offset() + usize::from(address - 0xa000)] = value;
                self.dirty.mark();
            }
            _ => {}
        }
    }

    fn tick(&mut self) {
        self.dirty.tick();
    }

    fn ram_to_flush(&mut self) -> Option<&[u8]> {
        let banks = usize::from(ram_bank_count(&self.rom).unwrap_or(0)) * RAM_BANK_SIZE;
        self.dirty.take_settled().then(|| &self.ram[..banks])
    }

    fn load_saved_ram(&mut self, save: &[u8]) {
        let count = save.len().min(self.ram.len());
        self.ram[..count].copy_from_slice(&save[..count]);
    }

    fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_u16(self.rom_bank)?;
        writer.write_u8(self.ram_bank)?;
        writer.write_bool(self.ram_enabled)?;
        self.dirty.save_state(writer)?;
        writer.write_bytes(&self.ram)
    }

    fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        // staged into locals, with the RAM image last: a short stream errors
        // out before anything is applied
        let rom_bank = reader.read_u16()? & 0x1ff;
        let ram_bank = reader.read_u8()? & 0x0f;
        let ram_enabled = reader.read_bool()?;
        let mut dirty = DirtyRam::default();
        dirty.load_state(reader)?;
        reader.read_bytes(&mut self.ram)?;

        self.rom_bank = rom_bank;
        self.ram_bank = ram_bank;
        self.ram_enabled = ram_enabled;
        self.dirty = dirty;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom() -> [u8; 0x150] {
        let mut rom = [0u8; 0x150];
        rom[0x147] = 0x1b;
        rom[0x148] = 8; // 512 banks
        rom[0x149] = 4; // 16 RAM banks
        rom
    }

    #[test]
    fn nine_bit_bank_select() {
        let image = rom();
        let mut mbc = Mbc5::new(&image[..]);
        mbc.write(0x2000, 0x34);
        mbc.write(0x3000, 0x01);
        assert_eq!(0x134 * ROM_BANK_SIZE, mbc.high_rom_offset());
    }

    #[test]
    fn bank_zero_stays_bank_zero() {
        let image = rom();
        let mut mbc = Mbc5::new(&image[..]);
        mbc.write(0x2000, 0x00);
        assert_eq!(0, mbc.high_rom_offset());
    }

    #[test]
    fn ram_banking() {
        let image = rom();
        let mut mbc = Mbc5::new(&image[..]);
        mbc.write(0x0000, 0x0a);
        mbc.write(0x4000, 0x05);
        mbc.write(0xa000, 0x99);
        mbc.write(0x4000, 0x00);
        assert_eq!(0x00, mbc.read(0xa000));
        mbc.write(0x4000, 0x05);
        assert_eq!(0x99, mbc.read(0xa000));
    }
}
