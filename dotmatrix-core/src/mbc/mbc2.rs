use core::ops::Deref;

use crate::mbc::*;
use crate::save_state::{Reader, StateError, Writer};

// MBC2 carries its RAM on the controller die: 512 half-bytes, mirrored across
// the whole $A000-$BFFF window. The upper nibble is not driven and reads 1s.
const MBC2_RAM_SIZE: usize = 512;

#[derive(Clone)]
pub struct Mbc2<T> {
    rom: T,
    rom_bank: u8,
    ram: [u8; MBC2_RAM_SIZE],
    ram_enabled: bool,
    dirty: DirtyRam,
}

impl<T: Deref<Target = [u8]>> Mbc2<T> {
    pub fn new(rom: T) -> Self {
        Self {
            rom,
            rom_bank: 1,
            ram: [0; MBC2_RAM_SIZE],
            ram_enabled: false,
            dirty: DirtyRam::default(),
        }
    }

    fn high_rom_offset(&self) -> usize {
        let banks = rom_bank_count(&self.rom).unwrap_or(2);
        usize::from(u16::from(self.rom_bank) & (banks - 1)) * ROM_BANK_SIZE
    }
}

impl<T: Deref<Target = [u8]>> Mbc for Mbc2<T> {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..0x4000 => self.rom.get(usize::from(address)).copied().unwrap_or(0xff),
            0x4000..0x8000 => {
                let offset = self.high_rom_offset() + usize::from(address - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xff)
            }
            0xa000..0xc000 => {
                if !self.ram_enabled {
                    return 0xff;
                }
                self.ram[usize::from(address) & (MBC2_RAM_SIZE - 1)] | 0xf0
            }
            _ => 0xff,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            // One register region: bit 8 of the address picks which register.
            // https://gbdev.io/pandocs/MBC2.html#00003fff--ram-enable-rom-bank-number-write-only
            0x0000..0x4000 => {
                if address & 0x100 == 0 {
                    self.ram_enabled = value & 0x0f == 0x0a;
                } else {
                    self.rom_bank = (value & 0x0f).max(1);
                }
            }
            0xa000..0xc000 => {
                if !self.ram_enabled {
                    return;
                }
                self.ram[usize::from(address) & (MBC2_RAM_SIZE - 1)] = value & 0x0f;
                self.dirty.mark();
            }
            _ => {}
        }
    }

    fn tick(&mut self) {
        self.dirty.tick();
    }

    fn ram_to_flush(&mut self) -> Option<&[u8]> {
        self.dirty.take_settled().then_some(&self.ram[..])
    }

    fn load_saved_ram(&mut self, save: &[u8]) {
        let count = save.len().min(self.ram.len());
        self.ram[..count].copy_from_slice(&save[..count]);
    }

    fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_u8(self.rom_bank)?;
        writer.write_bool(self.ram_enabled)?;
        self.dirty.save_state(writer)?;
        writer.write_bytes(&self.ram)
    }

    fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        // staged into locals, with the RAM image last: a short stream errors
        // out before anything is applied
        let rom_bank = (reader.read_u8()? & 0x0f).max(1);
        let ram_enabled = reader.read_bool()?;
        let mut dirty = DirtyRam::default();
        dirty.load_state(reader)?;
        reader.read_bytes(&mut self.ram)?;

        self.rom_bank = rom_bank;
        self.ram_enabled = ram_enabled;
        self.dirty = dirty;
        Ok(())
    }
}
