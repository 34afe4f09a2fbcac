use crate::apu::envelope::Envelope;
use crate::apu::length::LengthCounter;
use crate::apu::sweep::{Sweep, SweepStep};
use crate::save_state::{Reader, StateError, Writer};

// https://gbdev.io/pandocs/Audio_Registers.html#ff11--nr11-channel-1-length-timer--duty-cycle
const DUTY_TABLES: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%
];

/// Channel 1 carries a sweep unit, channel 2 does not; everything else about
/// the two square channels is identical.
pub trait SweepSlot: Clone + Default {
    #[must_use]
    fn write(&mut self, value: u8) -> bool;
    fn read(&self) -> u8;
    #[must_use]
    fn trigger(&mut self, period: u16) -> bool;
    fn clock(&mut self) -> SweepStep;
    fn save_state(&self, writer: &mut Writer) -> Result<(), StateError>;
    fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError>;
}

impl SweepSlot for Sweep {
    fn write(&mut self, value: u8) -> bool {
        self.write_register(value)
    }
    fn read(&self) -> u8 {
        self.read_register()
    }
    fn trigger(&mut self, period: u16) -> bool {
        Sweep::trigger(self, period)
    }
    fn clock(&mut self) -> SweepStep {
        self.tick()
    }
    fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        Sweep::save_state(self, writer)
    }
    fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        Sweep::load_state(self, reader)
    }
}

impl SweepSlot for () {
    fn write(&mut self, _value: u8) -> bool {
        false
    }
    fn read(&self) -> u8 {
        0xff
    }
    fn trigger(&mut self, _period: u16) -> bool {
        false
    }
    fn clock(&mut self) -> SweepStep {
        SweepStep::default()
    }
    fn save_state(&self, _writer: &mut Writer) -> Result<(), StateError> {
        Ok(())
    }
    fn load_state(&mut self, _reader: &mut Reader) -> Result<(), StateError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct PulseChannel<S: SweepSlot> {
    sweep: S,
    duty: u8,
    duty_position: u8,
    // t-cycles until the duty pointer moves; reloads to (2048 - period) * 4
    frequency_timer: u16,
    period: u16, // 11 bits
    envelope_register: u8,
    envelope: Envelope,
    length: LengthCounter<64>,
    enabled: bool,
}

impl<S: SweepSlot> PulseChannel<S> {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    // https://gbdev.io/pandocs/Audio_details.html#dacs
    fn dac_enabled(&self) -> bool {
        self.envelope_register & 0xf8 != 0
    }

    fn timer_reload(&self) -> u16 {
        (2048 - self.period) * 4
    }

    /// One m-cycle (4 t-cycles) of the frequency timer.
    pub fn tick(&mut self) {
        let mut t_cycles = 4u16;
        while t_cycles >= self.frequency_timer {
            t_cycles -= self.frequency_timer;
            self.frequency_timer = self.timer_reload();
            self.duty_position = (self.duty_position + 1) % 8;
        }
        self.frequency_timer -= t_cycles;
    }

    pub fn clock_length(&mut self) {
        if self.length.tick() {
            self.enabled = false;
        }
    }

    pub fn clock_envelope(&mut self) {
        if self.enabled {
            self.envelope.tick();
        }
    }

    pub fn clock_sweep(&mut self) {
        if !self.enabled {
            return;
        }
        let step = self.sweep.clock();
        if let Some(period) = step.period {
            self.period = period;
        }
        if step.disable {
            self.enabled = false;
        }
    }

    pub fn output(&self) -> f32 {
        if !self.enabled {
            return 0.0;
        }
        let sample = DUTY_TABLES[usize::from(self.duty)][usize::from(self.duty_position)];
        f32::from(sample * self.envelope.volume()) / 7.5 - 1.0
    }

    fn trigger(&mut self, next_step_is_length: bool) {
        // an off DAC blocks the enable but not the length reload
        self.length.trigger(next_step_is_length);
        if !self.dac_enabled() {
            return;
        }
        self.enabled = true;
        self.envelope = Envelope::from_register(self.envelope_register);
        self.frequency_timer = self.timer_reload();
        if self.sweep.trigger(self.period) {
            self.enabled = false;
        }
    }

    pub fn write_nrx0(&mut self, value: u8) {
        if self.sweep.write(value) {
            self.enabled = false;
        }
    }

    pub fn read_nrx0(&self) -> u8 {
        self.sweep.read()
    }

    pub fn write_nrx1(&mut self, value: u8, powered: bool) {
        if powered {
            self.duty = value >> 6;
        }
        self.length.set_length(value & 0x3f);
    }

    pub fn read_nrx1(&self) -> u8 {
        self.duty << 6 | 0x3f
    }

    pub fn write_nrx2(&mut self, value: u8) {
        self.envelope_register = value;
        if !self.dac_enabled() {
            self.enabled = false;
        }
    }

    pub fn read_nrx2(&self) -> u8 {
        self.envelope_register
    }

    pub fn write_nrx3(&mut self, value: u8) {
        self.period = self.period & 0x700 | u16::from(value);
    }

    pub fn read_nrx3(&self) -> u8 {
        0xff
    }

    pub fn write_nrx4(&mut self, value: u8, next_step_is_length: bool) {
        self.period = u16::from(value & 0x07) << 8 | self.period & 0xff;
        if self
            .length
            .set_enabled(value & 0x40 != 0, next_step_is_length)
        {
            self.enabled = false;
        }
        if value & 0x80 != 0 {
            self.trigger(next_step_is_length);
        }
    }

    pub fn read_nrx4(&self) -> u8 {
        (self.length.enabled() as u8) << 6 | 0xbf
    }

    pub fn power_off(&mut self) {
        let mut length = self.length.clone();
        length.power_off();
        *self = Self {
            length,
            ..Self::default()
        };
    }

    pub fn power_on(&mut self) {
        self.duty_position = 0;
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        self.sweep.save_state(writer)?;
        writer.write_u8(self.duty)?;
        writer.write_u8(self.duty_position)?;
        writer.write_u16(self.frequency_timer)?;
        writer.write_u16(self.period)?;
        writer.write_u8(self.envelope_register)?;
        self.envelope.save_state(writer)?;
        self.length.save_state(writer)?;
        writer.write_bool(self.enabled)
    }

    pub fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        self.sweep.load_state(reader)?;
        self.duty = reader.read_u8()? & 0x03;
        self.duty_position = reader.read_u8()? % 8;
        self.frequency_timer = reader.read_u16()?;
        self.period = reader.read_u16()? & 0x7ff;
        self.envelope_register = reader.read_u8()?;
        self.envelope.load_state(reader)?;
        self.length.load_state(reader)?;
        self.enabled = reader.read_bool()?;
        Ok(())
    }
}
