use crate::bus::Interrupts;
use crate::save_state::{Reader, StateError, Writer};

bitflags::bitflags! {
    // Everything in P1 is active-low.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct P1: u8 {
        const NOT_BUTTONS = 1 << 5;
        const NOT_DPAD = 1 << 4;
        const NOT_START_DOWN = 1 << 3;
        const NOT_SELECT_UP = 1 << 2;
        const NOT_B_LEFT = 1 << 1;
        const NOT_A_RIGHT = 1;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct Lines: u8 {
        const A = 1;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const RIGHT = 1 << 4;
        const LEFT = 1 << 5;
        const UP = 1 << 6;
        const DOWN = 1 << 7;
    }
}

impl Lines {
    const BUTTONS: Lines = Lines::A.union(Lines::B).union(Lines::SELECT).union(Lines::START);
    const DPAD: Lines = Lines::RIGHT.union(Lines::LEFT).union(Lines::UP).union(Lines::DOWN);
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct JoypadInput {
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
    pub right: bool,
    pub left: bool,
    pub up: bool,
    pub down: bool,
}

impl JoypadInput {
    fn lines(self) -> Lines {
        let mut lines = Lines::empty();
        lines.set(Lines::A, self.a);
        lines.set(Lines::B, self.b);
        lines.set(Lines::SELECT, self.select);
        lines.set(Lines::START, self.start);
        lines.set(Lines::RIGHT, self.right);
        lines.set(Lines::LEFT, self.left);
        lines.set(Lines::UP, self.up);
        lines.set(Lines::DOWN, self.down);
        lines
    }
}

/// Host input is latched once per emulated frame. Press edges found while a
/// column is deselected stay pending until the CPU selects that column, and
/// only then raise the joypad interrupt.
#[derive(Clone, Default)]
pub struct Joypad {
    input: JoypadInput,
    pending: Lines,
    buttons_selected: bool,
    dpad_selected: bool,
}

impl Joypad {
    pub fn input(&self) -> JoypadInput {
        self.input
    }

    pub fn update(&mut self, input: JoypadInput, interrupt_flag: &mut Interrupts) {
        let previous = self.input.lines();
        let current = input.lines();
        // releases drop their pending edge
        self.pending = (self.pending | (current & !previous)) & current;
        self.input = input;
        self.deliver_pending(interrupt_flag);
    }

    pub fn write_register(&mut self, value: u8, interrupt_flag: &mut Interrupts) {
        let value = P1::from_bits_truncate(value);
        self.buttons_selected = !value.contains(P1::NOT_BUTTONS);
        self.dpad_selected = !value.contains(P1::NOT_DPAD);
        self.deliver_pending(interrupt_flag);
    }

    fn deliver_pending(&mut self, interrupt_flag: &mut Interrupts) {
        let mut visible = Lines::empty();
        if self.buttons_selected {
            visible |= Lines::BUTTONS;
        }
        if self.dpad_selected {
            visible |= Lines::DPAD;
        }
        if self.pending.intersects(visible) {
            interrupt_flag.insert(Interrupts::JOYPAD);
        }
        self.pending -= visible;
    }

    pub fn read_register(&self) -> u8 {
        let mut value = P1::NOT_START_DOWN | P1::NOT_SELECT_UP | P1::NOT_B_LEFT | P1::NOT_A_RIGHT;
        if self.dpad_selected {
            if self.input.down {
                value.remove(P1::NOT_START_DOWN);
            }
            if self.input.up {
                value.remove(P1::NOT_SELECT_UP);
            }
            if self.input.left {
                value.remove(P1::NOT_B_LEFT);
            }
            if self.input.right {
                value.remove(P1::NOT_A_RIGHT);
            }
        }
        if self.buttons_selected {
            if self.input.start {
                value.remove(P1::NOT_START_DOWN);
            }
            if self.input.select {
                value.remove(P1::NOT_SELECT_UP);
            }
            if self.input.b {
                value.remove(P1::NOT_B_LEFT);
            }
            if self.input.a {
                value.remove(P1::NOT_A_RIGHT);
            }
        }
        value.set(P1::NOT_BUTTONS, !self.buttons_selected);
        value.set(P1::NOT_DPAD, !self.dpad_selected);
        value.bits() | 0b1100_0000 // unused bits read 1
    }

    pub fn save_state(&self, writer: &mut Writer) -> Result<(), StateError> {
        writer.write_u8(self.input.lines().bits())?;
        writer.write_u8(self.pending.bits())?;
        writer.write_bool(self.buttons_selected)?;
        writer.write_bool(self.dpad_selected)
    }

    pub fn load_state(&mut self, reader: &mut Reader) -> Result<(), StateError> {
        let lines = Lines::from_bits_truncate(reader.read_u8()?);
        self.input = JoypadInput {
            a: lines.contains(Lines::A),
            b: lines.contains(Lines::B),
            select: lines.contains(Lines::SELECT),
            start: lines.contains(Lines::START),
            right: lines.contains(Lines::RIGHT),
            left: lines.contains(Lines::LEFT),
            up: lines.contains(Lines::UP),
            down: lines.contains(Lines::DOWN),
        };
        self.pending = Lines::from_bits_truncate(reader.read_u8()?);
        self.buttons_selected = reader.read_bool()?;
        self.dpad_selected = reader.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_register_reads_high() {
        let joypad = Joypad::default();
        assert_eq!(0xff, joypad.read_register());
    }

    #[test]
    fn selected_column_shows_in_the_low_nibble() {
        let mut joypad = Joypad::default();
        let mut interrupt_flag = Interrupts::empty();
        joypad.update(
            JoypadInput {
                a: true,
                down: true,
                ..Default::default()
            },
            &mut interrupt_flag,
        );
        joypad.write_register(0x10, &mut interrupt_flag); // buttons column
        assert_eq!(0b1101_1110, joypad.read_register());
        joypad.write_register(0x20, &mut interrupt_flag); // dpad column
        assert_eq!(0b1110_0111, joypad.read_register());
        joypad.write_register(0x30, &mut interrupt_flag); // neither
        assert_eq!(0x0f, joypad.read_register() & 0x0f);
    }

    #[test]
    fn press_edge_fires_once_the_column_is_selected() {
        let mut joypad = Joypad::default();
        let mut interrupt_flag = Interrupts::empty();
        joypad.update(
            JoypadInput {
                start: true,
                ..Default::default()
            },
            &mut interrupt_flag,
        );
        // column not selected yet, edge is held back
        assert!(interrupt_flag.is_empty());
        joypad.write_register(0x10, &mut interrupt_flag);
        assert!(interrupt_flag.contains(Interrupts::JOYPAD));

        // no repeat while the button is held
        interrupt_flag = Interrupts::empty();
        joypad.write_register(0x10, &mut interrupt_flag);
        assert!(interrupt_flag.is_empty());
    }

    #[test]
    fn release_clears_the_pending_edge() {
        let mut joypad = Joypad::default();
        let mut interrupt_flag = Interrupts::empty();
        joypad.update(
            JoypadInput {
                b: true,
                ..Default::default()
            },
            &mut interrupt_flag,
        );
        joypad.update(JoypadInput::default(), &mut interrupt_flag);
        joypad.write_register(0x10, &mut interrupt_flag);
        assert!(interrupt_flag.is_empty());
    }
}
