//! Versioned save-state stream: a little-endian byte cursor over a
//! caller-supplied buffer, written as a post-order traversal of the
//! component tree. ROM contents and host callbacks are never serialized,
//! they are re-bound after load.

pub const STATE_MAGIC: [u8; 4] = *b"DMGS";
pub const STATE_VERSION: u32 = 1;

/// Large enough for any supported configuration (128 KiB of external RAM
/// plus VRAM, WRAM and every register bank).
pub const STATE_CAPACITY: usize = 160 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The destination buffer is too small.
    Overflow,
    /// The stream ended in the middle of a field.
    UnexpectedEnd,
    BadMagic,
    UnsupportedVersion(u32),
    /// A field holds a value no running emulator can produce.
    Corrupt,
}

impl core::fmt::Display for StateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overflow => write!(f, "save-state buffer too small"),
            Self::UnexpectedEnd => write!(f, "save-state stream truncated"),
            Self::BadMagic => write!(f, "not a save-state stream"),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported save-state version {version}")
            }
            Self::Corrupt => write!(f, "save-state stream corrupt"),
        }
    }
}

pub struct Writer<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let end = self.position + bytes.len();
        let Some(destination) = self.buffer.get_mut(self.position..end) else {
            return Err(StateError::Overflow);
        };
        destination.copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), StateError> {
        self.write_bytes(&[value])
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), StateError> {
        self.write_u8(value as u8)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), StateError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), StateError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), StateError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), StateError> {
        self.write_u32(value.to_bits())
    }
}

pub struct Reader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], StateError> {
        let end = self.position + count;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(StateError::UnexpectedEnd)?;
        self.position = end;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, destination: &mut [u8]) -> Result<(), StateError> {
        destination.copy_from_slice(self.take(destination.len())?);
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, StateError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(StateError::Corrupt),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, StateError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, StateError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, StateError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32, StateError> {
        Ok(f32::from_bits(self.read_u32()?))
    }
}
