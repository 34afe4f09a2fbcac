use crate::save_state::{Reader, StateError, Writer};

/// Length counter: counts down on frame-sequencer steps 0/2/4/6 and silences
/// the channel when it reaches zero. `MAX` is 64 for the square and noise
/// channels and 256 for the wave channel.
#[derive(Clone, Default)]
pub struct LengthCounter<const MAX: u16> {
    enabled: bool,
    counter: u16,
}

impl<const MAX: u16> LengthCounter<MAX> {
    pub fn set_length(&mut self, value: u8) {
        self.counter = MAX - u16::from(value);
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Frame-sequencer clock. Returns true when the counter just expired and
    /// the channel must turn off. `tick` never increases the counter.
    #[must_use]
    pub fn tick(&mut self) -> bool {
        if !self.enabled || self.counter == 0 {
            return false;
        }
        self.counter -= 1;
        self.counter == 0
    }

    /// NRx4 bit 6. Enabling while the next frame-sequencer step is not a
    /// length step clocks the counter one extra time.
    #[must_use]
    pub fn set_enabled(&mut self, enabled: bool, next_step_is_length: bool) -> bool {
        let was_enabled = self.enabled;
        self.enabled = enabled;
        if enabled && !was_enabled && !next_step_is_length {
            return self.tick();
        }
        false
    }

    /// NRx4 bit 7. A trigger with an expired counter reloads it to full
    /// length, minus the same off-step extra clock.
    pub fn trigger(&mut self, next_step_is_length: bool) {
        if self.counter == 0 {
            self.counter = MAX;
            if self.enabled && !next_step_is_length {
                self.counter -= 1;
            }
        }
    }

    /// Powering the APU off clears NRx4 but keeps the count itself.
    pub fn power_off(&mut self) {
        self.enabled = false;
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_bool(self.enabled)?;
        writer.write_u16(self.counter)
    }

    pub fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        self.enabled = reader.read_bool()?;
        self.counter = reader.read_u16()?;
        if self.counter > MAX {
            return Err(StateError::Corrupt);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_the_programmed_length() {
        let mut length = LengthCounter::<64>::default();
        length.set_length(62);
        assert!(!length.set_enabled(true, true));
        assert!(!length.tick());
        assert!(length.tick());
    }

    #[test]
    fn off_step_enable_clocks_once() {
        let mut length = LengthCounter::<64>::default();
        length.set_length(63);
        assert!(length.set_enabled(true, false));
    }

    #[test]
    fn trigger_reloads_only_an_expired_counter() {
        let mut length = LengthCounter::<64>::default();
        length.set_length(60);
        length.trigger(true);
        assert!(!length.set_enabled(true, true));
        assert!(!length.tick()); // 4 steps left, not 64
        assert!(!length.tick());
        assert!(!length.tick());
        assert!(length.tick());
        length.trigger(true);
        for _ in 0..63 {
            assert!(!length.tick());
        }
        assert!(length.tick());
    }
}
