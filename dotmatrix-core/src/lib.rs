#![no_std]

//! Cycle-accurate DMG emulation core. The host supplies a cartridge (through
//! the [`mbc::Mbc`] trait) and the four callbacks of [`Host`]; everything
//! else — CPU, bus, timer, joypad, PPU and APU — advances in lockstep, one
//! m-cycle at a time, underneath [`Emulator::step`].

use crate::bus::Bus;
use crate::cpu::{Cpu, Ctx};
use crate::joypad::JoypadInput;
use crate::mbc::Mbc;
use crate::save_state::{Reader, StateError, Writer};

pub mod apu;
pub mod bus;
pub mod cpu;
pub mod joypad;
pub mod mbc;
pub mod ppu;
pub mod save_state;
pub mod timer;

pub use cpu::StepError;

pub const SCREEN_WIDTH: u8 = 160;
pub const SCREEN_HEIGHT: u8 = 144;
pub const SCREEN_PIXELS: usize = SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize;
/// Bytes per framebuffer row handed to `blit_screen`.
pub const PITCH: usize = SCREEN_WIDTH as usize * 4;

/// m-cycles per second
pub const MACHINE_CLOCK_FREQUENCY: u32 = 1 << 20;
/// m-cycles per video frame (~59.73 Hz)
pub const FRAME_M_CYCLES: u64 = 17556;

/// The emulator's view of the outside world. All four callbacks fire from
/// inside the stepping thread; none of them may re-enter the emulator.
pub trait Host {
    /// Interleaved L/R signed PCM at ~48 kHz.
    fn on_audio_generated(&mut self, samples: &[i16]);
    /// A blitted frame is complete and can be flipped.
    fn present_frame(&mut self);
    /// Poll input into `input`; return true to quit.
    fn handle_events(&mut self, input: &mut JoypadInput) -> bool;
    /// 160x144 ARGB8888, top-left origin.
    fn blit_screen(&mut self, pixels: &[u32; SCREEN_PIXELS], pitch: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongBootRomSize(pub usize);

impl core::fmt::Display for WrongBootRomSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "boot ROM must be exactly 256 bytes, got {}", self.0)
    }
}

#[derive(Clone)]
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::post_boot()
    }
}

impl Emulator {
    /// Start from the DMG post-boot state, no boot ROM involved.
    pub fn post_boot() -> Self {
        Self {
            cpu: Cpu::post_boot(),
            bus: Bus::post_boot(),
        }
    }

    /// Start cold with the given boot ROM mapped over $0000-$00FF.
    pub fn with_boot_rom(boot_rom: &[u8]) -> Result<Self, WrongBootRomSize> {
        let boot_rom: [u8; 256] = boot_rom
            .try_into()
            .map_err(|_| WrongBootRomSize(boot_rom.len()))?;
        Ok(Self {
            cpu: Cpu::default(),
            bus: Bus::with_boot_rom(boot_rom),
        })
    }

    /// One instruction (or one halted m-cycle, or one interrupt dispatch).
    pub fn step(&mut self, mbc: &mut dyn Mbc, host: &mut dyn Host) -> Result<(), StepError> {
        self.cpu.step(&mut Ctx {
            bus: &mut self.bus,
            mbc,
            host,
        })
    }

    /// Steps until the PPU hands the host a finished frame — or, with the
    /// display off, until a frame's worth of m-cycles has passed — then polls
    /// input and latches it into the joypad. Returns true when the host asked
    /// to quit.
    pub fn run_frame(&mut self, mbc: &mut dyn Mbc, host: &mut dyn Host) -> Result<bool, StepError> {
        let frame_start = self.bus.cycles;
        let mut completed = false;
        while !completed && self.bus.cycles.wrapping_sub(frame_start) < FRAME_M_CYCLES {
            self.step(mbc, host)?;
            completed = self.bus.take_frame_completed();
        }

        if completed {
            host.present_frame();
        }

        let mut input = self.bus.joypad.input();
        let quit = host.handle_events(&mut input);
        self.bus.joypad.update(input, &mut self.bus.interrupt_flag);
        Ok(quit)
    }

    /// Serializes the whole machine (minus ROM and callbacks) into `buffer`;
    /// returns the number of bytes written.
    pub fn save_state(&self, mbc: &dyn Mbc, buffer: &mut [u8]) -> Result<usize, StateError> {
        let mut writer = Writer::new(buffer);
        writer.write_bytes(&save_state::STATE_MAGIC)?;
        writer.write_u32(save_state::STATE_VERSION)?;
        self.cpu.save_state(&mut writer)?;
        self.bus.timer.save_state(&mut writer)?;
        self.bus.joypad.save_state(&mut writer)?;
        self.bus.save_state(&mut writer)?;
        self.bus.ppu.save_state(&mut writer)?;
        self.bus.apu.save_state(&mut writer)?;
        mbc.save_state(&mut writer)?;
        Ok(writer.position())
    }

    /// Restores a stream produced by [`Emulator::save_state`]. A stream with
    /// the wrong magic or version is rejected before anything is touched;
    /// any later error leaves both the emulator and the cartridge exactly as
    /// they were. The emulator loads into a scratch clone, and the cartridge
    /// segment sits at the end of the stream with each bank controller
    /// applying it atomically, so neither side can end up half-loaded or out
    /// of step with the other.
    pub fn load_state(&mut self, mbc: &mut dyn Mbc, bytes: &[u8]) -> Result<(), StateError> {
        let mut reader = Reader::new(bytes);
        let mut magic = [0u8; 4];
        reader.read_bytes(&mut magic)?;
        if magic != save_state::STATE_MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = reader.read_u32()?;
        if version != save_state::STATE_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }

        // stage into scratch copies so a truncated stream cannot leave the
        // machine half-loaded
        let mut staged = self.clone();
        staged.cpu.load_state(&mut reader)?;
        staged.bus.timer.load_state(&mut reader)?;
        staged.bus.joypad.load_state(&mut reader)?;
        staged.bus.load_state(&mut reader)?;
        staged.bus.ppu.load_state(&mut reader)?;
        staged.bus.apu.load_state(&mut reader)?;
        // the cartridge goes last: once it has applied, nothing can fail
        mbc.load_state(&mut reader)?;
        *self = staged;
        Ok(())
    }
}
