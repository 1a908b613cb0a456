use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use color_eyre::eyre;
use log::*;
use serde::Serialize;
use thiserror::Error;

use crate::memory::{Byte, StdMem, Word};
use crate::processor::{Outcome, Processor};
use crate::register;
use crate::Fault;

/// How many bytes of memory a snapshot carries for display purposes
pub const MEMORY_WINDOW: usize = 256;

/// Governs whether the clock driver advances the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// The clock passes over the machine; manual stepping is allowed
    Paused,
    /// The clock executes one instruction per tick
    Running,
    /// HALT or a fault stopped the machine; terminal until reset or reload
    Halted,
}

/// Rejections from the control surface. Execution faults never surface
/// here: they halt the machine and are reported on the log channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The machine has halted; reset or load a program first
    #[error("machine is halted; reset or load a program first")]
    Halted,
}

/// Immutable point-in-time copy of the machine-visible state, produced
/// after every executed step and handed to observers and snapshot callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// General-purpose register values keyed by display name
    pub registers: BTreeMap<&'static str, Word>,
    /// Program counter
    pub pc: Word,
    /// Stack pointer
    pub sp: Word,
    /// Zero flag
    pub zero: bool,
    /// Negative flag
    pub negative: bool,
    /// Current run-mode
    pub mode: RunMode,
    /// True while the clock is advancing the machine
    pub running: bool,
    /// Bounded prefix of memory for display
    pub memory: Vec<Byte>,
}

/// Receives a state snapshot after every completed step.
///
/// Snapshots are passed by value, so an observer can never reach back into
/// the machine. A failing observer is logged and skipped; the remaining
/// observers still receive their delivery.
pub trait Observer: Send {
    fn on_update(&mut self, snapshot: Snapshot) -> eyre::Result<()>;
}

struct Core {
    memory: StdMem,
    processor: Processor,
    mode: RunMode,
    observers: Vec<Box<dyn Observer>>,
}

/// The shared engine handle. The composition root creates one `Machine`
/// and hands it to the clock driver and the control surface; every
/// state-mutating operation runs under one exclusive lock covering
/// decode, execute, flag update and broadcast, so concurrent callers
/// always observe whole steps.
pub struct Machine {
    core: Mutex<Core>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// Initializes a machine with zeroed memory and registers, paused
    pub fn new() -> Self {
        Self {
            core: Mutex::new(Core {
                memory: StdMem::default(),
                processor: Processor::new(),
                mode: RunMode::Paused,
                observers: Vec::new(),
            }),
        }
    }

    // A panicking observer must not wedge the machine for every later caller
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lets the clock advance the machine. Rejected once halted.
    pub fn start_run(&self) -> Result<(), ControlError> {
        let mut core = self.lock();
        match core.mode {
            RunMode::Halted => Err(ControlError::Halted),
            _ => {
                core.mode = RunMode::Running;
                Ok(())
            }
        }
    }

    /// Stops the clock from advancing the machine; a halted machine
    /// stays halted
    pub fn pause(&self) {
        let mut core = self.lock();
        if core.mode == RunMode::Running {
            core.mode = RunMode::Paused;
        }
    }

    /// Executes exactly one instruction, whether or not the clock is
    /// running. Rejected once the machine has halted; never a silent no-op.
    pub fn step_once(&self) -> Result<(), ControlError> {
        let mut core = self.lock();
        if core.mode == RunMode::Halted {
            return Err(ControlError::Halted);
        }
        core.step();
        Ok(())
    }

    /// Clock entry point: advances one instruction when the mode is
    /// `Running`, through the same locked path as [`Machine::step_once`]
    pub fn tick(&self) {
        let mut core = self.lock();
        if core.mode == RunMode::Running {
            core.step();
        }
    }

    /// Discards all machine state: zeroed memory and registers, paused.
    /// The observer registry survives.
    pub fn reset(&self) {
        let mut core = self.lock();
        core.memory = StdMem::default();
        core.processor = Processor::new();
        core.mode = RunMode::Paused;
        info!("machine reset");
        core.broadcast();
    }

    /// Copies `bytes` verbatim into memory at `address`, points the
    /// program counter there and leaves the machine paused. A program
    /// that does not fit is rejected whole.
    pub fn load_program(&self, bytes: &[Byte], address: Word) -> Result<(), Fault> {
        let mut core = self.lock();
        core.memory.load(address, bytes)?;
        core.processor.regs.pc = address;
        core.mode = RunMode::Paused;
        info!("loaded {} bytes at 0x{:04X}", bytes.len(), address);
        core.broadcast();
        Ok(())
    }

    /// Produces a snapshot of the current state
    pub fn get_snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Registers an observer. The registry is append-only; there is no
    /// unsubscribe.
    pub fn subscribe(&self, observer: Box<dyn Observer>) {
        self.lock().observers.push(observer);
    }
}

impl Core {
    /// One full step under the lock: execute, update the run-mode,
    /// broadcast the resulting state
    fn step(&mut self) {
        match self.processor.step(&mut self.memory) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Halt) => {
                info!("program halted");
                self.mode = RunMode::Halted;
            }
            Err(fault) => {
                error!("{}; halting", fault);
                self.mode = RunMode::Halted;
            }
        }
        self.broadcast();
    }

    fn snapshot(&self) -> Snapshot {
        let regs = &self.processor.regs;
        let values = regs.values();
        let registers = register::NAMES
            .iter()
            .zip(values.iter())
            .map(|(name, value)| (*name, *value))
            .collect();

        Snapshot {
            registers,
            pc: regs.pc,
            sp: regs.sp,
            zero: regs.zero,
            negative: regs.negative,
            mode: self.mode,
            running: self.mode == RunMode::Running,
            memory: self.memory.window(MEMORY_WINDOW).to_vec(),
        }
    }

    /// Delivers the current state to every observer in insertion order
    fn broadcast(&mut self) {
        let snapshot = self.snapshot();
        for observer in &mut self.observers {
            if let Err(err) = observer.on_update(snapshot.clone()) {
                warn!("observer delivery failed: {:#}", err);
            }
        }
    }
}
