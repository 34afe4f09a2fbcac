#![allow(dead_code)]

use dotmatrix_core::joypad::JoypadInput;
use dotmatrix_core::{Emulator, Host, SCREEN_PIXELS};

/// Swallows every callback; for tests that only care about machine state.
pub struct NullHost;

impl Host for NullHost {
    fn on_audio_generated(&mut self, _samples: &[i16]) {}
    fn present_frame(&mut self) {}
    fn handle_events(&mut self, _input: &mut JoypadInput) -> bool {
        false
    }
    fn blit_screen(&mut self, _pixels: &[u32; SCREEN_PIXELS], _pitch: usize) {}
}

/// Records everything the core pushes out, for output-identity checks.
#[derive(Default)]
pub struct CapturingHost {
    pub samples: Vec<i16>,
    pub last_frame: Vec<u32>,
    pub frames_presented: usize,
    pub input: JoypadInput,
}

impl Host for CapturingHost {
    fn on_audio_generated(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    fn present_frame(&mut self) {
        self.frames_presented += 1;
    }

    fn handle_events(&mut self, input: &mut JoypadInput) -> bool {
        *input = self.input;
        false
    }

    fn blit_screen(&mut self, pixels: &[u32; SCREEN_PIXELS], _pitch: usize) {
        self.last_frame = pixels.to_vec();
    }
}

/// A 32 KiB no-MBC image with `program` placed at the entry point $0100.
pub fn rom_with(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    rom
}

/// `JR -2`: parks the CPU on a two-byte treadmill so peripherals keep running.
pub const SPIN: [u8; 2] = [0x18, 0xfe];

pub fn step_many(
    emulator: &mut Emulator,
    mbc: &mut &[u8],
    host: &mut impl Host,
    steps: u32,
) {
    for _ in 0..steps {
        emulator.step(mbc, host).expect("program must stay legal");
    }
}
