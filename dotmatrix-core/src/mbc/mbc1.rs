use core::ops::Deref;

use crate::mbc::*;
use crate::save_state::{Reader, StateError, Writer};

#[derive(Clone, Copy, PartialEq, Eq)]
enum BankingMode {
    Simple,
    Advanced,
}

#[derive(Clone)]
pub struct Mbc1<T> {
    rom: T,
    // 5-bit bank register; 0 behaves as 1
    bank1: u8,
    // 2-bit register, upper ROM bits or RAM bank depending on the mode
    bank2: u8,
    ram: [u8; 4 * RAM_BANK_SIZE],
    ram_enabled: bool,
    banking_mode: BankingMode,
    dirty: DirtyRam,
}

impl<T: Deref<Target = [u8]>> Mbc1<T> {
    pub fn new(rom: T) -> Self {
        Self {
            rom,
            bank1: 1,
            bank2: 0,
            ram: [0; 4 * RAM_BANK_SIZE],
            ram_enabled: false,
            banking_mode: BankingMode::Simple,
            dirty: DirtyRam::default(),
        }
    }

    fn rom_banks(&self) -> u16 {
        rom_bank_count(&self.rom).unwrap_or(2)
    }

    fn ram_banks(&self) -> u8 {
        ram_bank_count(&self.rom).unwrap_or(0)
    }

    fn high_rom_offset(&self) -> usize {
        // https://gbdev.io/pandocs/MBC1.html#20003fff--rom-bank-number-write-only
        // Citation: If this register is set to $00, it behaves as if it is set
        // to $01. [...] the bank number is masked to the required number of bits.
        let bank = (u16::from(self.bank2) << 5 | u16::from(self.bank1.max(1)))
            & (self.rom_banks() - 1);
        usize::from(bank) * ROM_BANK_SIZE
    }

    fn low_rom_offset(&self) -> usize {
        match self.banking_mode {
            // in mode 1 bank2 also steers the fixed region
            BankingMode::Advanced => {
                let bank = (u16::from(self.bank2) << 5) & (self.rom_banks() - 1);
                usize::from(bank) * ROM_BANK_SIZE
            }
            BankingMode::Simple => 0,
        }
    }

    fn ram_offset(&self) -> usize {
        match self.banking_mode {
            BankingMode::Advanced if self.ram_banks() == 4 => {
                usize::from(self.bank2) * RAM_BANK_SIZE
            }
            _ => 0,
        }
    }

    fn has_ram(&self) -> bool {
        self.ram_banks() > 0
    }
}

impl<T: Deref<Target = [u8]>> Mbc for Mbc1<T> {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..0x4000 => {
                let offset = self.low_rom_offset() + usize::from(address);
                self.rom.get(offset).copied().unwrap_or(0xff)
            }
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
            0x2000..0x4000 => self.bank1 = value & 0x1f,
            0x4000..0x6000 => self.bank2 = value & 0x03,
            0x6000..0x8000 => {
                // https://gbdev.io/pandocs/MBC1.html#60007fff--banking-mode-select-write-only
                // Citation: If the cart is not large enough to use the 2-bit
                // register (<= 8 KiB RAM and <= 512 KiB ROM) this mode select
                // has no observable effect
                if self.rom_banks() <= 32 && self.ram_banks() <= 1 {
                    return;
                }
                self.banking_mode = if value & 1 == 0 {
                    BankingMode::Simple
                } else {
                    BankingMode::Advanced
                };
            }
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
        let banks = usize::from(self.ram_banks()) * RAM_BANK_SIZE;
        self.dirty.take_settled().then(|| &self.ram[..banks])
    }

    fn load_saved_ram(&mut self, save: &[u8]) {
        let count = save.len().min(self.ram.len());
        self.ram[..count].copy_from_slice(&save[..count]);
    }

    fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_u8(self.bank1)?;
        writer.write_u8(self.bank2)?;
        writer.write_bool(self.ram_enabled)?;
        writer.write_bool(self.banking_mode == BankingMode::Advanced)?;
        self.dirty.save_state(writer)?;
        writer.write_bytes(&self.ram)
    }

    fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        // staged into locals, with the RAM image last: a short stream errors
        // out before anything is applied
        let bank1 = reader.read_u8()? & 0x1f;
        let bank2 = reader.read_u8()? & 0x03;
        let ram_enabled = reader.read_bool()?;
        let banking_mode = if reader.read_bool()? {
            BankingMode::Advanced
        } else {
            BankingMode::Simple
        };
        let mut dirty = DirtyRam::default();
        dirty.load_state(reader)?;
        reader.read_bytes(&mut self.ram)?;

        self.bank1 = bank1;
        self.bank2 = bank2;
        self.ram_enabled = ram_enabled;
        self.banking_mode = banking_mode;
        self.dirty = dirty;
        Ok(())
    }
}
