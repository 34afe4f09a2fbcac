mod mbc1;
mod mbc2;
mod mbc5;

use core::ops::Deref;

pub use mbc1::*;
pub use mbc2::*;
pub use mbc5::*;

use crate::save_state::{Reader, StateError, Writer};

pub const ROM_BANK_SIZE: usize = 16384;
pub const RAM_BANK_SIZE: usize = 8192;

/// Quiet m-cycles after the last external-RAM write before the image is
/// offered to the host for flushing (about one emulated second).
const FLUSH_SETTLE_CYCLES: u32 = 1 << 20;

/// Cartridge-side view of the address space: ROM at $0000-$7FFF (where writes
/// land in the banking registers) and external RAM at $A000-$BFFF.
pub trait Mbc {
    fn read(&self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);
    /// One m-cycle, driven by the bus alongside the other peripherals.
    fn tick(&mut self) {}
    /// Battery-backed RAM image, once writes have settled. Taking it re-arms
    /// the dirty tracking.
    fn ram_to_flush(&mut self) -> Option<&[u8]> {
        None
    }
    fn load_saved_ram(&mut self, _save: &[u8]) {}
    /// Banking registers and external RAM; the ROM borrow is re-bound by the
    /// host after a load.
    fn save_state(&self, _writer: &mut Writer) -> Result<(), StateError> {
        Ok(())
    }
    /// Restores what `save_state` wrote. Implementations stage the segment
    /// and apply it only once every field has been read, so a short or
    /// corrupt stream leaves the controller untouched.
    fn load_state(&mut self, _reader: &mut Reader) -> Result<(), StateError> {
        Ok(())
    }
}

// A bare ROM image is a valid no-MBC cartridge: bank 0 and 1 fixed, control
// writes ignored, no external RAM.
impl<T: Deref<Target = [u8]>> Mbc for T {
    fn read(&self, address: u16) -> u8 {
        match address {
            0xa000.. => 0xff,
            _ => self.deref().get(usize::from(address)).copied().unwrap_or(0xff),
        }
    }

    fn write(&mut self, _address: u16, _value: u8) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeType {
    RomOnly,
    Mbc1,
    Mbc1Ram,
    Mbc1RamBattery,
    Mbc2,
    Mbc2Battery,
    Mbc5,
    Mbc5Ram,
    Mbc5RamBattery,
    Mbc5Rumble,
    Mbc5RumbleRam,
    Mbc5RumbleRamBattery,
}

impl CartridgeType {
    pub fn has_battery(self) -> bool {
        use CartridgeType::*;
        matches!(
            self,
            Mbc1RamBattery | Mbc2Battery | Mbc5RamBattery | Mbc5RumbleRamBattery
        )
    }
}

impl TryFrom<u8> for CartridgeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        // https://gbdev.io/pandocs/The_Cartridge_Header.html#0147--cartridge-type
        match value {
            0x00 => Ok(Self::RomOnly),
            0x01 => Ok(Self::Mbc1),
            0x02 => Ok(Self::Mbc1Ram),
            0x03 => Ok(Self::Mbc1RamBattery),
            0x05 => Ok(Self::Mbc2),
            0x06 => Ok(Self::Mbc2Battery),
            0x19 => Ok(Self::Mbc5),
            0x1a => Ok(Self::Mbc5Ram),
            0x1b => Ok(Self::Mbc5RamBattery),
            0x1c => Ok(Self::Mbc5Rumble),
            0x1d => Ok(Self::Mbc5RumbleRam),
            0x1e => Ok(Self::Mbc5RumbleRamBattery),
            _ => Err(value),
        }
    }
}

// https://gbdev.io/pandocs/The_Cartridge_Header.html#0148--rom-size
pub fn rom_bank_count(rom: &[u8]) -> Option<u16> {
    let code = rom.get(0x148).copied()?;
    (code <= 8).then(|| 2 << code)
}

// https://gbdev.io/pandocs/The_Cartridge_Header.html#0149--ram-size
pub fn ram_bank_count(rom: &[u8]) -> Option<u8> {
    match rom.get(0x149).copied()? {
        0 | 1 => Some(0),
        2 => Some(1),
        3 => Some(4),
        4 => Some(16),
        5 => Some(8),
        _ => None,
    }
}

/// Tracks whether battery RAM has unsaved writes and how long they have been
/// quiet, so flushing happens once per burst of writes instead of per byte.
#[derive(Clone, Default)]
pub(crate) struct DirtyRam {
    dirty: bool,
    quiet_cycles: u32,
}

impl DirtyRam {
    pub fn mark(&mut self) {
        self.dirty = true;
        self.quiet_cycles = 0;
    }

    pub fn tick(&mut self) {
        if self.dirty && self.quiet_cycles < FLUSH_SETTLE_CYCLES {
            self.quiet_cycles += 1;
        }
    }

    pub fn take_settled(&mut self) -> bool {
        if self.dirty && self.quiet_cycles >= FLUSH_SETTLE_CYCLES {
            self.dirty = false;
            true
        } else {
            false
        }
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_bool(self.dirty)?;
        writer.write_u32(self.quiet_cycles)
    }

    pub fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        self.dirty = reader.read_bool()?;
        self.quiet_cycles = reader.read_u32()?;
        Ok(())
    }
}
