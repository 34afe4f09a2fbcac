//! Host-side glue for the `dotmatrix-core` emulation core: cartridge image
//! validation and MBC selection. Windowing, audio output and input are left
//! to the embedding frontend, which drives the core through its `Host` trait.

use std::sync::Arc;

use dotmatrix_core::mbc::{CartridgeType, Mbc, Mbc1, Mbc2, Mbc5, ram_bank_count, rom_bank_count};

pub use dotmatrix_core as core;

/// Smallest image that still contains a full cartridge header.
pub const MIN_ROM_SIZE: usize = 0x150;

const CGB_ONLY_FLAG: u8 = 0xc0;
const TITLE_RANGE: std::ops::Range<usize> = 0x134..0x144;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    TooSmall(usize),
    UnsupportedCartridgeType(u8),
    InvalidRomSize(u8),
    InvalidRamSize(u8),
    CgbOnly,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooSmall(size) => {
                write!(f, "ROM too small: {size} bytes (minimum {MIN_ROM_SIZE})")
            }
            Self::UnsupportedCartridgeType(code) => {
                write!(f, "unsupported cartridge type ${code:02x}")
            }
            Self::InvalidRomSize(code) => write!(f, "invalid ROM size code ${code:02x}"),
            Self::InvalidRamSize(code) => write!(f, "invalid RAM size code ${code:02x}"),
            Self::CgbOnly => write!(f, "CGB-only cartridges are not supported"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Printable title from the cartridge header.
pub fn rom_title(rom: &[u8]) -> String {
    rom.get(TITLE_RANGE)
        .map(|title| {
            title
                .iter()
                .copied()
                .take_while(|byte| *byte != 0)
                .map(|byte| if byte.is_ascii_graphic() { byte as char } else { ' ' })
                .collect()
        })
        .unwrap_or_default()
}

/// Validates the header and wires the image to the matching bank controller.
/// The `Arc` keeps save states cheap: the ROM itself is never copied.
pub fn load_cartridge(rom: Arc<[u8]>) -> Result<Box<dyn Mbc>, LoadError> {
    if rom.len() < MIN_ROM_SIZE {
        return Err(LoadError::TooSmall(rom.len()));
    }
    if rom[0x143] == CGB_ONLY_FLAG {
        return Err(LoadError::CgbOnly);
    }

    let cartridge_type =
        CartridgeType::try_from(rom[0x147]).map_err(LoadError::UnsupportedCartridgeType)?;
    let rom_banks = rom_bank_count(&rom).ok_or(LoadError::InvalidRomSize(rom[0x148]))?;
    let ram_banks = ram_bank_count(&rom).ok_or(LoadError::InvalidRamSize(rom[0x149]))?;

    log::info!(
        "cartridge \"{}\": {cartridge_type:?}, {} KiB ROM, {} KiB RAM{}",
        rom_title(&rom),
        u32::from(rom_banks) * 16,
        u32::from(ram_banks) * 8,
        if cartridge_type.has_battery() {
            ", battery"
        } else {
            ""
        },
    );

    Ok(match cartridge_type {
        CartridgeType::RomOnly => Box::new(rom),
        CartridgeType::Mbc1 | CartridgeType::Mbc1Ram | CartridgeType::Mbc1RamBattery => {
            Box::new(Mbc1::new(rom))
        }
        CartridgeType::Mbc2 | CartridgeType::Mbc2Battery => Box::new(Mbc2::new(rom)),
        CartridgeType::Mbc5
        | CartridgeType::Mbc5Ram
        | CartridgeType::Mbc5RamBattery
        | CartridgeType::Mbc5Rumble
        | CartridgeType::Mbc5RumbleRam
        | CartridgeType::Mbc5RumbleRamBattery => Box::new(Mbc5::new(rom)),
    })
}
