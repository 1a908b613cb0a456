use std::sync::Arc;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{self, Result};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use minicomp::clock::Clock;
use minicomp::isa::Opcode::*;
use minicomp::machine::{Machine, Observer, RunMode, Snapshot};
use minicomp::memory::Word;
use minicomp::program;

/// Where the program is loaded
const ENTRYPOINT: Word = 0x0000;

/// Prints the counter register after every executed step
struct Printer;

impl Observer for Printer {
    fn on_update(&mut self, snapshot: Snapshot) -> eyre::Result<()> {
        println!(
            "pc=0x{:04X} r1={} mode={:?}",
            snapshot.pc, snapshot.registers["r1"], snapshot.mode
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap(); // logging

    let machine = Arc::new(Machine::new());
    machine.subscribe(Box::new(Printer));

    // count r1 down from 10 and halt at zero
    machine.load_program(
        &program![
            ADDI.ri(1, 10),          // r1 = 10
            ADDI.ri(2, 4),           // r2 = loop head
            SUBI.ri(1, 1),           // loop: r1 -= 1
            BRZ.ri(1, 2),            // done when r1 == 0
            JR.rrr(2, 0, 0),         // back to the loop head
            HALT.plain(),
        ],
        ENTRYPOINT,
    )?;
    machine.start_run()?;

    let clock = Clock::start(Arc::clone(&machine), Duration::from_millis(100));
    while machine.get_snapshot().mode == RunMode::Running {
        thread::sleep(Duration::from_millis(10));
    }
    clock.stop();

    Ok(())
}
