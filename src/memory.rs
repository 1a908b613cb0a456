use crate::Fault;

pub type Byte = u8; // 1 byte
pub type Word = u16; // 2 bytes

/// Capacity of the default memory in bytes
pub const MEMORY_SIZE: usize = 4096;

/// Default memory
pub type StdMem = Memory<MEMORY_SIZE>;

/// Emulates memory for use with the CPU
///
/// Words are two consecutive bytes, big-endian. Every access is
/// bounds-checked; there is no implicit wraparound, so callers compute the
/// full 16-bit address before the check applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: [Byte; S],
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes the memory
    fn default() -> Self {
        Memory { data: [0; S] }
    }
}

impl<const S: usize> Memory<S> {
    /// Bounds check for an access of `len` bytes starting at `position`
    fn offset(position: Word, len: usize) -> Result<usize, Fault> {
        let start = position as usize;
        if start + len > S {
            return Err(Fault::Bounds(position));
        }
        Ok(start)
    }

    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Word) -> Result<Byte, Fault> {
        let at = Self::offset(position, 1)?;
        Ok(self.data[at])
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Word, value: Byte) -> Result<(), Fault> {
        let at = Self::offset(position, 1)?;
        self.data[at] = value;
        Ok(())
    }

    /// Reads a word from the memory (big endian)
    pub fn read_word(&self, position: Word) -> Result<Word, Fault> {
        let at = Self::offset(position, 2)?;
        Ok((self.data[at] as Word) << 8 | self.data[at + 1] as Word)
    }

    /// Writes a word to the memory (big endian)
    pub fn write_word(&mut self, position: Word, value: Word) -> Result<(), Fault> {
        let at = Self::offset(position, 2)?;
        self.data[at] = (value >> 8) as Byte;
        self.data[at + 1] = (value & 0xFF) as Byte;
        Ok(())
    }

    /// Copies `bytes` verbatim into the memory starting at `position`.
    /// A program that does not fit is rejected whole; memory is untouched.
    pub fn load(&mut self, position: Word, bytes: &[Byte]) -> Result<(), Fault> {
        let at = Self::offset(position, bytes.len()).map_err(|_| Fault::ProgramTooLarge {
            address: position,
            len: bytes.len(),
        })?;
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Bounded prefix of the memory for display-oriented consumers
    pub fn window(&self, len: usize) -> &[Byte] {
        &self.data[..len.min(S)]
    }
}
