use crate::isa::{decode, Opcode};
use crate::memory::{Memory, Word};
use crate::register::RegisterFile;
use crate::Fault;
use log::*;

/// Width of one instruction in bytes
pub const INSTRUCTION_WIDTH: Word = 2;

/// What a completed step asks the driver to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep executing
    Continue,
    /// The program executed HALT
    Halt,
}

/// Emulates the CPU core: one fetch-decode-execute cycle at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Processor {
    /// The register file, including pc, sp and the condition flags
    pub regs: RegisterFile,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Initializes a new CPU core
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
        }
    }

    /// Executes a single instruction against `memory`.
    ///
    /// The program counter advances by one instruction width before
    /// execution; branches and jumps overwrite it. A fault leaves the
    /// registers and memory as they were at the point of the fault.
    pub fn step<const S: usize>(&mut self, memory: &mut Memory<S>) -> Result<Outcome, Fault> {
        let word = memory.read_word(self.regs.pc)?;
        self.regs.pc = self.regs.pc.wrapping_add(INSTRUCTION_WIDTH);

        let inst = decode(word);
        let opcode = inst.classify()?;

        match opcode {
            Opcode::NOP => {}
            Opcode::ADD => {
                let value = self.regs.get(inst.rs)?.wrapping_add(self.regs.get(inst.rt)?);
                self.alu(inst.rd, value)?;
            }
            Opcode::SUB => {
                let value = self.regs.get(inst.rs)?.wrapping_sub(self.regs.get(inst.rt)?);
                self.alu(inst.rd, value)?;
            }
            Opcode::AND => {
                let value = self.regs.get(inst.rs)? & self.regs.get(inst.rt)?;
                self.alu(inst.rd, value)?;
            }
            Opcode::OR => {
                let value = self.regs.get(inst.rs)? | self.regs.get(inst.rt)?;
                self.alu(inst.rd, value)?;
            }
            Opcode::XOR => {
                let value = self.regs.get(inst.rs)? ^ self.regs.get(inst.rt)?;
                self.alu(inst.rd, value)?;
            }
            Opcode::SLL => {
                let amount = self.regs.get(inst.rt)? & 0xF;
                let value = self.regs.get(inst.rs)? << amount;
                self.alu(inst.rd, value)?;
            }
            Opcode::SRL => {
                let amount = self.regs.get(inst.rt)? & 0xF;
                let value = self.regs.get(inst.rs)? >> amount;
                self.alu(inst.rd, value)?;
            }
            Opcode::ADDI => {
                let value = self.regs.get(inst.rd)?.wrapping_add(inst.imm as Word);
                self.alu(inst.rd, value)?;
            }
            Opcode::SUBI => {
                let value = self.regs.get(inst.rd)?.wrapping_sub(inst.imm as Word);
                self.alu(inst.rd, value)?;
            }
            Opcode::LW => {
                let address = self.regs.get(inst.rs)?.wrapping_add(inst.imm as Word);
                let value = memory.read_word(address)?;
                self.regs.set(inst.rd, value)?;
            }
            Opcode::SW => {
                let address = self.regs.get(inst.rs)?.wrapping_add(inst.imm as Word);
                memory.write_word(address, self.regs.get(inst.rd)?)?;
            }
            Opcode::BRZ => {
                if self.regs.get(inst.rd)? == 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(inst.imm as Word);
                }
            }
            Opcode::JR => {
                self.regs.pc = self.regs.get(inst.rd)?;
            }
            Opcode::HALT => {
                debug!("HALT");
                return Ok(Outcome::Halt);
            }
        }

        debug!("{} 0x{:04X}", opcode, word);
        Ok(Outcome::Continue)
    }

    /// Writes an ALU result and updates the condition flags from it
    fn alu(&mut self, rd: u8, value: Word) -> Result<(), Fault> {
        self.regs.set(rd, value)?;
        self.regs.zero = value == 0;
        self.regs.negative = (value as i16) < 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{StdMem, MEMORY_SIZE};
    use color_eyre::eyre::Result;

    fn with_program(words: &[Word]) -> (Processor, StdMem) {
        let mut mem = StdMem::default();
        for (i, word) in words.iter().enumerate() {
            mem.write_word(i as Word * 2, *word).unwrap();
        }
        (Processor::new(), mem)
    }

    #[test]
    fn test_add() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::ADD.rrr(1, 2, 3)]);
        cpu.regs.set(2, 2)?;
        cpu.regs.set(3, 3)?;

        assert_eq!(cpu.step(&mut mem)?, Outcome::Continue);
        assert_eq!(cpu.regs.get(1)?, 5);
        assert_eq!(cpu.regs.pc, 2);
        assert!(!cpu.regs.zero);
        assert!(!cpu.regs.negative);

        Ok(())
    }

    #[test]
    fn test_add_wraps_around() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::ADD.rrr(1, 2, 3)]);
        cpu.regs.set(2, 65535)?;
        cpu.regs.set(3, 1)?;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.get(1)?, 0);
        assert!(cpu.regs.zero);
        assert!(!cpu.regs.negative);

        Ok(())
    }

    #[test]
    fn test_sub() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::SUB.rrr(1, 2, 3)]);
        cpu.regs.set(2, 5)?;
        cpu.regs.set(3, 3)?;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.get(1)?, 2);

        Ok(())
    }

    #[test]
    fn test_sub_sets_negative_flag() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::SUB.rrr(1, 2, 3)]);
        cpu.regs.set(2, 1)?;
        cpu.regs.set(3, 2)?;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.get(1)?, 0xFFFF); // -1
        assert!(!cpu.regs.zero);
        assert!(cpu.regs.negative);

        Ok(())
    }

    #[test]
    fn test_bitwise_ops() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[
            Opcode::AND.rrr(1, 4, 5),
            Opcode::OR.rrr(2, 4, 5),
            Opcode::XOR.rrr(3, 4, 5),
        ]);
        cpu.regs.set(4, 0b1100)?;
        cpu.regs.set(5, 0b1010)?;

        cpu.step(&mut mem)?;
        cpu.step(&mut mem)?;
        cpu.step(&mut mem)?;

        assert_eq!(cpu.regs.get(1)?, 0b1000);
        assert_eq!(cpu.regs.get(2)?, 0b1110);
        assert_eq!(cpu.regs.get(3)?, 0b0110);

        Ok(())
    }

    #[test]
    fn test_shifts() -> Result<()> {
        let (mut cpu, mut mem) =
            with_program(&[Opcode::SLL.rrr(1, 4, 5), Opcode::SRL.rrr(2, 4, 5)]);
        cpu.regs.set(4, 0x8001)?;
        cpu.regs.set(5, 1)?;

        cpu.step(&mut mem)?;
        cpu.step(&mut mem)?;

        assert_eq!(cpu.regs.get(1)?, 0x0002);
        assert_eq!(cpu.regs.get(2)?, 0x4000); // logical, no sign extension

        Ok(())
    }

    #[test]
    fn test_add_immediate() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::ADDI.ri(1, 5), Opcode::ADDI.ri(1, -2)]);

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.get(1)?, 5);

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.get(1)?, 3);

        Ok(())
    }

    #[test]
    fn test_sub_immediate() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::SUBI.ri(1, 1)]);

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.get(1)?, 0xFFFF);
        assert!(cpu.regs.negative);

        Ok(())
    }

    #[test]
    fn test_store_load_roundtrip() -> Result<()> {
        // the base nibble lands in the offset's high bits, so base r2 with
        // low nibble 4 addresses [r2 + 0x24]
        let (mut cpu, mut mem) =
            with_program(&[Opcode::SW.mem(1, 2, 4), Opcode::LW.mem(3, 2, 4)]);
        cpu.regs.set(1, 0x1234)?;
        cpu.regs.set(2, 0x0100)?;

        cpu.step(&mut mem)?;
        assert_eq!(mem.read_word(0x0100 + 0x24)?, 0x1234);

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.get(3)?, 0x1234);

        Ok(())
    }

    #[test]
    fn test_store_at_boundary_faults() -> Result<()> {
        // base register holds capacity-1; a word write there would straddle
        // the end of memory. Base r0 keeps the offset at zero.
        let (mut cpu, mut mem) = with_program(&[Opcode::SW.mem(1, 0, 0)]);
        let last = (MEMORY_SIZE - 1) as Word;
        cpu.regs.set(1, 0x1234)?;
        cpu.regs.set(0, last)?;

        assert_eq!(cpu.step(&mut mem), Err(Fault::Bounds(last)));
        assert_eq!(mem.data[MEMORY_SIZE - 1], 0); // no partial write

        Ok(())
    }

    #[test]
    fn test_load_negative_offset_faults() -> Result<()> {
        // r2 = 0, offset -1: the full 16-bit address is 0xFFFF, out of bounds
        let word = Opcode::LW.mem(1, 15, 0xF); // base r15, offset sext(0xFF) = -1
        let (mut cpu, mut mem) = with_program(&[word]);
        cpu.regs.set(15, 0)?;

        assert_eq!(cpu.step(&mut mem), Err(Fault::Bounds(0xFFFF)));

        Ok(())
    }

    #[test]
    fn test_branch_if_zero_taken() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::BRZ.ri(1, 4)]);
        cpu.regs.set(1, 0)?;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.pc, 2 + 4); // relative to the advanced pc

        Ok(())
    }

    #[test]
    fn test_branch_if_zero_falls_through() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::BRZ.ri(1, 4)]);
        cpu.regs.set(1, 7)?;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.pc, 2);

        Ok(())
    }

    #[test]
    fn test_branch_backwards() -> Result<()> {
        let mut mem = StdMem::default();
        mem.write_word(0x0100, Opcode::BRZ.ri(1, -6))?;
        let mut cpu = Processor::new();
        cpu.regs.pc = 0x0100;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.pc, 0x0102 - 6);

        Ok(())
    }

    #[test]
    fn test_jump_through_register() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::JR.rrr(1, 0, 0)]);
        cpu.regs.set(1, 0x0400)?;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.pc, 0x0400);

        Ok(())
    }

    #[test]
    fn test_halt() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::HALT.plain()]);

        assert_eq!(cpu.step(&mut mem)?, Outcome::Halt);
        assert_eq!(cpu.regs.pc, 2);

        Ok(())
    }

    #[test]
    fn test_unassigned_opcode_faults() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[0xE000]);

        assert_eq!(cpu.step(&mut mem), Err(Fault::Decode(0xE000)));

        Ok(())
    }

    #[test]
    fn test_pc_out_of_range_faults() {
        let mut mem = StdMem::default();
        let mut cpu = Processor::new();
        cpu.regs.pc = (MEMORY_SIZE - 1) as Word;

        assert_eq!(
            cpu.step(&mut mem),
            Err(Fault::Bounds((MEMORY_SIZE - 1) as Word))
        );
    }

    #[test]
    fn test_nop_only_advances_pc() -> Result<()> {
        let (mut cpu, mut mem) = with_program(&[Opcode::NOP.plain()]);
        let before = cpu.regs;

        cpu.step(&mut mem)?;
        assert_eq!(cpu.regs.pc, before.pc + 2);
        assert_eq!(cpu.regs.values(), before.values());

        Ok(())
    }
}
