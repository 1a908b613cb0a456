use std::convert::TryFrom;

use crate::memory::Word;
use crate::Fault;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

/// Bit layout of an instruction word. This is a stable wire format:
/// programs are raw big-endian instruction words with no header.
///
/// ```text
/// bits[15:12]  opcode
/// bits[11: 8]  first register field (rd)
/// bits[ 7: 4]  second register field (rs)
/// bits[ 3: 0]  third register field (rt)
/// bits[ 7: 0]  signed 8-bit immediate (imm)
/// ```
pub const OPCODE_SHIFT: u32 = 12;
/// Shift of the first register field
pub const RD_SHIFT: u32 = 8;
/// Shift of the second register field
pub const RS_SHIFT: u32 = 4;
/// Mask of a 4-bit field after shifting
pub const FIELD_MASK: Word = 0xF;
/// Mask of the immediate field
pub const IMM_MASK: Word = 0xFF;

macro_rules! opcodes {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal , )+ ) => {
        /// Defines the operations, selected by the top nibble of an
        /// instruction word. Opcode `0xE` is unassigned and classifies
        /// as a decode fault at execution time.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Opcode {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Opcode {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }
        }

        impl ::std::fmt::Display for Opcode {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $( Self::$name => f.write_str(stringify!($name)) , )+
                }
            }
        }
    }
}

opcodes! {
    /// No operation
    NOP = 0x0,
    /// Add two registers: `rd = rs + rt`, wrapping
    ADD = 0x1,
    /// Subtract two registers: `rd = rs - rt`, wrapping
    SUB = 0x2,
    /// Bitwise and: `rd = rs & rt`
    AND = 0x3,
    /// Bitwise or: `rd = rs | rt`
    OR = 0x4,
    /// Bitwise exclusive or: `rd = rs ^ rt`
    XOR = 0x5,
    /// Logical shift left: `rd = rs << (rt & 0xF)`
    SLL = 0x6,
    /// Logical shift right: `rd = rs >> (rt & 0xF)`
    SRL = 0x7,
    /// Add immediate: `rd = rd + imm`, wrapping
    ADDI = 0x8,
    /// Subtract immediate: `rd = rd - imm`, wrapping
    SUBI = 0x9,
    /// Load word: `rd = memory[rs + imm]`
    LW = 0xA,
    /// Store word: `memory[rs + imm] = rd`
    SW = 0xB,
    /// Branch if zero: `pc = pc + imm` when `rd == 0`, relative to the
    /// already-advanced program counter
    BRZ = 0xC,
    /// Jump through a register: `pc = rd`
    JR = 0xD,
    /// Stop the execution of the program
    HALT = 0xF,
}

impl Opcode {
    /// Encodes a three-register form
    pub fn rrr(self, rd: u8, rs: u8, rt: u8) -> Word {
        (u8::from(self) as Word) << OPCODE_SHIFT
            | (rd as Word & FIELD_MASK) << RD_SHIFT
            | (rs as Word & FIELD_MASK) << RS_SHIFT
            | rt as Word & FIELD_MASK
    }

    /// Encodes a register-and-immediate form
    pub fn ri(self, rd: u8, imm: i8) -> Word {
        (u8::from(self) as Word) << OPCODE_SHIFT
            | (rd as Word & FIELD_MASK) << RD_SHIFT
            | imm as u8 as Word
    }

    /// Encodes a memory form. The base register occupies bits[7:4] and so
    /// forms the high nibble of the signed offset: the effective offset is
    /// `sext(base << 4 | low)`.
    pub fn mem(self, rd: u8, base: u8, low: u8) -> Word {
        (u8::from(self) as Word) << OPCODE_SHIFT
            | (rd as Word & FIELD_MASK) << RD_SHIFT
            | (base as Word & FIELD_MASK) << RS_SHIFT
            | low as Word & FIELD_MASK
    }

    /// Encodes an opcode-only form (NOP, HALT)
    pub fn plain(self) -> Word {
        (u8::from(self) as Word) << OPCODE_SHIFT
    }
}

/// A decoded instruction: every field extracted, the opcode not yet
/// classified. Which fields an operation consumes depends on its form;
/// the immediate overlaps the two lower register fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The raw instruction word
    pub word: Word,
    /// bits[15:12]
    pub opcode: u8,
    /// bits[11:8]
    pub rd: u8,
    /// bits[7:4]
    pub rs: u8,
    /// bits[3:0]
    pub rt: u8,
    /// bits[7:0], sign-extended to 16 bits
    pub imm: i16,
}

/// Decodes an instruction word. Pure and total: every one of the 65536
/// possible words yields a structured instruction; unknown opcodes are
/// classified as a fault at execution time, not here.
pub fn decode(word: Word) -> Instruction {
    Instruction {
        word,
        opcode: (word >> OPCODE_SHIFT) as u8,
        rd: ((word >> RD_SHIFT) & FIELD_MASK) as u8,
        rs: ((word >> RS_SHIFT) & FIELD_MASK) as u8,
        rt: (word & FIELD_MASK) as u8,
        imm: (word & IMM_MASK) as u8 as i8 as i16,
    }
}

impl Instruction {
    /// Classifies the opcode field as a known operation
    pub fn classify(&self) -> Result<Opcode, Fault> {
        Opcode::try_from(self.opcode).map_err(|_| Fault::Decode(self.word))
    }
}

/// Assembles a list of instruction words into big-endian program bytes
#[macro_export]
macro_rules! program {
    ( $( $word:expr ),+ $(,)? ) => {{
        let mut bytes: ::std::vec::Vec<$crate::memory::Byte> = ::std::vec::Vec::new();
        $(
            bytes.extend_from_slice(&($word as $crate::memory::Word).to_be_bytes());
        )+
        bytes
    }};
}
