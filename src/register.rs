use crate::memory::{Word, MEMORY_SIZE};
use crate::Fault;

/// Number of general-purpose registers
pub const REGISTER_COUNT: usize = 16;

/// Display names of the general-purpose registers, in index order
pub const NAMES: [&str; REGISTER_COUNT] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
    "r15",
];

/// The register file: sixteen general-purpose 16-bit registers plus the
/// program counter, the stack pointer and the condition flags.
///
/// Registers store unsigned values and arithmetic wraps; the negative flag
/// reflects the two's-complement sign bit of the last ALU result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterFile {
    regs: [Word; REGISTER_COUNT],
    /// Program counter
    pub pc: Word,
    /// Stack pointer, initialized to the top of memory
    pub sp: Word,
    /// Zero flag, set when the last ALU result was zero
    pub zero: bool,
    /// Negative flag, set when the last ALU result had the sign bit set
    pub negative: bool,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Initializes the register file. Everything starts at zero except the
    /// stack pointer, which starts at the top of memory.
    pub fn new() -> Self {
        Self {
            regs: [0; REGISTER_COUNT],
            pc: 0,
            sp: MEMORY_SIZE as Word,
            zero: false,
            negative: false,
        }
    }

    /// Reads a general-purpose register
    pub fn get(&self, index: u8) -> Result<Word, Fault> {
        self.regs
            .get(index as usize)
            .copied()
            .ok_or(Fault::Index(index))
    }

    /// Writes a general-purpose register
    pub fn set(&mut self, index: u8, value: Word) -> Result<(), Fault> {
        match self.regs.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Fault::Index(index)),
        }
    }

    /// All general-purpose register values, in index order
    pub fn values(&self) -> [Word; REGISTER_COUNT] {
        self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_roundtrip_all_indices() -> Result<()> {
        let mut regs = RegisterFile::new();

        for index in 0..REGISTER_COUNT as u8 {
            for value in [0, 1, 0x7FFF, 0x8000, 0xFFFF] {
                regs.set(index, value)?;
                assert_eq!(regs.get(index)?, value);
            }
        }

        Ok(())
    }

    #[test]
    fn test_index_out_of_range() {
        let mut regs = RegisterFile::new();

        assert_eq!(regs.get(16), Err(Fault::Index(16)));
        assert_eq!(regs.set(255, 1), Err(Fault::Index(255)));
    }

    #[test]
    fn test_initial_state() {
        let regs = RegisterFile::new();

        assert_eq!(regs.values(), [0; REGISTER_COUNT]);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.sp, MEMORY_SIZE as Word);
        assert!(!regs.zero);
        assert!(!regs.negative);
    }
}
