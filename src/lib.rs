//! Emulates a small fixed-width virtual computer: 4096 bytes of memory, a
//! 16-slot register file, a 16-bit instruction set and a clocked
//! fetch-decode-execute core.
//!
//! The [`machine::Machine`] handle is the control surface: load a program,
//! run it off the [`clock::Clock`] or step it by hand, and subscribe
//! observers that receive a state snapshot after every executed instruction.

pub mod clock;
pub mod isa;
pub mod machine;
pub mod memory;
pub mod processor;
pub mod register;

use crate::memory::Word;
use thiserror::Error;

/// Faults the machine can raise while executing or loading a program.
///
/// Execution faults halt the machine and are reported on the log channel;
/// only loader faults surface to the caller directly.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// A memory access or the program counter fell outside of memory
    #[error("address 0x{0:04X} is outside of memory")]
    Bounds(Word),
    /// A register index fell outside of `[0, 16)`
    #[error("register index {0} is outside of [0, 16)")]
    Index(u8),
    /// The instruction word carries an unassigned opcode
    #[error("unrecognized opcode in instruction word 0x{0:04X}")]
    Decode(Word),
    /// The program does not fit into memory at the requested address
    #[error("program of {len} bytes does not fit at address 0x{address:04X}")]
    ProgramTooLarge {
        /// Requested load address
        address: Word,
        /// Length of the rejected program
        len: usize,
    },
}
