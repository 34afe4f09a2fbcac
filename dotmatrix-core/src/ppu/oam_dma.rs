use crate::ppu::Ppu;
use crate::save_state::{Reader, StateError, Writer};

// about bus conflicts while a transfer runs:
// https://github.com/Gekkio/mooneye-gb/issues/39#issuecomment-265953981

const STARTUP_WAIT_CYCLES: u8 = 2;
const TRANSFER_LENGTH: u8 = 160;

/// One in-flight OAM DMA: 160 bytes, one per m-cycle, after a short startup
/// delay. Restarting DMA does not cancel a running transfer, so several can
/// be live at once.
#[derive(Clone)]
pub struct OamDma {
    source: u16,
    index: u8,
    wait: u8,
}

impl OamDma {
    pub fn running(&self) -> bool {
        self.wait == 0
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_u16(self.source)?;
        writer.write_u8(self.index)?;
        writer.write_u8(self.wait)
    }

    pub fn from_state(reader: &mut Reader) -> Result<Self, StateError> {
        let source = reader.read_u16()?;
        let index = reader.read_u8()?;
        let wait = reader.read_u8()?;
        if index >= TRANSFER_LENGTH || wait > STARTUP_WAIT_CYCLES {
            return Err(StateError::Corrupt);
        }
        Ok(Self {
            source,
            index,
            wait,
        })
    }
}

impl Ppu {
    /// DMA register write: `page * $100` becomes the source. Sources in the
    /// OAM/prohibited page are remapped down into WRAM.
    pub fn start_dma(&mut self, page: u8) {
        let mut source = u16::from(page) << 8;
        if source >= 0xfe00 {
            source = (source - 1) & 0x1000 | source & 0x0fff | 0xc000;
        }
        if self.dmas.is_full() {
            self.dmas.remove(0);
        }
        self.dmas.push(OamDma {
            source,
            index: 0,
            wait: STARTUP_WAIT_CYCLES,
        });
    }

    pub fn dma_active(&self) -> bool {
        self.dmas.iter().any(OamDma::running)
    }

    /// One m-cycle of every live transfer. `read_external` resolves sources
    /// outside the PPU (cartridge, WRAM); VRAM sources are read directly so
    /// the transfer ignores the CPU-side mode gating.
    pub fn tick_dma(&mut self, read_external: &mut dyn FnMut(u16) -> u8) {
        let mut slot = 0;
        while slot < self.dmas.len() {
            let OamDma {
                source,
                index,
                wait,
            } = self.dmas[slot];

            if wait > 0 {
                self.dmas[slot].wait -= 1;
                slot += 1;
                continue;
            }

            let address = source.wrapping_add(u16::from(index));
            let value = match address {
                0x8000..0xa000 => self.vram[usize::from(address - 0x8000)],
                _ => read_external(address),
            };
            self.oam[usize::from(index)] = value;

            if index + 1 == TRANSFER_LENGTH {
                self.dmas.remove(slot);
            } else {
                self.dmas[slot].index = index + 1;
                slot += 1;
            }
        }
    }
}
