use crate::bus::Interrupts;
use crate::save_state::{Reader, StateError, Writer};

// The system counter counts m-cycles. DIV is bits 13-6 of that counter, so it
// increments at 1048576 / 64 = 16384 Hz as pandocs says.
// https://gbdev.io/pandocs/Timer_and_Divider_Registers.html#ff04--div-divider-register

// TAC bits 1-0 select which bit of the system counter TIMA watches for a
// falling edge: 4096 / 262144 / 65536 / 16384 Hz.
const TAC_EDGE_BITS: [u16; 4] = [1 << 7, 1 << 1, 1 << 3, 1 << 5];

const TAC_ENABLE: u8 = 1 << 2;

// The APU frame sequencer runs at 512 Hz, one step per falling edge of bit 10.
const SEQUENCER_BIT: u16 = 1 << 10;

fn bit_fell(before: u16, after: u16, mask: u16) -> bool {
    before & mask != 0 && after & mask == 0
}

#[derive(Clone)]
pub struct Timer {
    internal_clock: u16,
    tima: u8,
    tma: u8,
    tac: u8,
    // https://gbdev.io/pandocs/Timer_Obscure_Behaviour.html#timer-overflow-behavior
    // Citation: TIMA does not get reloaded from TMA until one M-cycle after the overflow.
    overflow_pending: bool,
    reloaded_this_cycle: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            internal_clock: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            overflow_pending: false,
            reloaded_this_cycle: false,
        }
    }
}

impl Timer {
    pub fn post_boot() -> Self {
        Self {
            // DIV reads 0xab right after the boot ROM hands over
            internal_clock: 0xab << 6,
            ..Self::default()
        }
    }

    fn selected_bit(&self) -> u16 {
        TAC_EDGE_BITS[usize::from(self.tac & 0b11)]
    }

    /// Advances one m-cycle. Returns true when the APU frame sequencer must
    /// step (falling edge of bit 10 of the system counter).
    pub fn tick(&mut self, interrupt_flag: &mut Interrupts) -> bool {
        self.reloaded_this_cycle = false;
        if self.overflow_pending {
            self.reload(interrupt_flag);
        }

        let previous = self.internal_clock;
        self.internal_clock = previous.wrapping_add(1);

        if self.tac & TAC_ENABLE != 0
            && bit_fell(previous, self.internal_clock, self.selected_bit())
        {
            self.increment_tima();
        }

        bit_fell(previous, self.internal_clock, SEQUENCER_BIT)
    }

    fn increment_tima(&mut self) {
        self.tima = self.tima.wrapping_add(1);
        if self.tima == 0 {
            self.overflow_pending = true;
        }
    }

    fn reload(&mut self, interrupt_flag: &mut Interrupts) {
        self.tima = self.tma;
        interrupt_flag.insert(Interrupts::TIMER);
        self.overflow_pending = false;
        self.reloaded_this_cycle = true;
    }

    pub fn get_div(&self) -> u8 {
        (self.internal_clock >> 6) as u8
    }

    /// Writing any value to DIV zeroes the whole system counter. If the bit
    /// TIMA watches was high, that reset is a falling edge and TIMA counts it.
    /// Returns true when the reset also clocked the frame sequencer.
    pub fn write_div(&mut self) -> bool {
        let previous = self.internal_clock;
        self.internal_clock = 0;

        if self.tac & TAC_ENABLE != 0 && bit_fell(previous, 0, self.selected_bit()) {
            self.increment_tima();
        }

        bit_fell(previous, 0, SEQUENCER_BIT)
    }

    pub fn get_tima(&self) -> u8 {
        self.tima
    }

    pub fn write_tima(&mut self, value: u8) {
        if self.overflow_pending {
            // writing in the overflow gap cancels the reload and the interrupt
            self.overflow_pending = false;
            self.tima = value;
            return;
        }
        if self.reloaded_this_cycle {
            // the TMA reload wins over a write landing on the same m-cycle
            return;
        }
        self.tima = value;
    }

    pub fn get_tma(&self) -> u8 {
        self.tma
    }

    pub fn write_tma(&mut self, value: u8) {
        // If TMA is written on the m-cycle TIMA is being reloaded from it,
        // TIMA picks up the new value as well.
        if self.reloaded_this_cycle {
            self.tima = value;
        }
        self.tma = value;
    }

    pub fn get_tac(&self) -> u8 {
        self.tac | 0xf8
    }

    /// A TAC write that moves the watched bit from a high position to a low
    /// one (by changing the select or by disabling the timer) is seen by TIMA
    /// as a falling edge.
    pub fn write_tac(&mut self, value: u8) {
        let was_high = self.tac & TAC_ENABLE != 0 && self.internal_clock & self.selected_bit() != 0;

        self.tac = value & 0x07;

        let is_high = self.tac & TAC_ENABLE != 0 && self.internal_clock & self.selected_bit() != 0;

        if was_high && !is_high {
            self.increment_tima();
        }
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_u16(self.internal_clock)?;
        writer.write_u8(self.tima)?;
        writer.write_u8(self.tma)?;
        writer.write_u8(self.tac)?;
        writer.write_bool(self.overflow_pending)?;
        writer.write_bool(self.reloaded_this_cycle)
    }

    pub fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        self.internal_clock = reader.read_u16()?;
        self.tima = reader.read_u8()?;
        self.tma = reader.read_u8()?;
        self.tac = reader.read_u8()? & 0x07;
        self.overflow_pending = reader.read_bool()?;
        self.reloaded_this_cycle = reader.read_bool()?;
        Ok(())
    }
}
