use std::sync::Arc;
use std::thread;

use color_eyre::eyre::Result;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use minicomp::clock::{Clock, TICK};
use minicomp::isa::Opcode::*;
use minicomp::machine::{Machine, RunMode};
use minicomp::memory::Word;
use minicomp::program;

/// Where the program is loaded
const ENTRYPOINT: Word = 0x0100;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Debug)
        .init()
        .unwrap(); // logging

    let machine = Arc::new(Machine::new());

    // r3 = r1 + r2
    machine.load_program(
        &program![
            ADDI.ri(1, 2),
            ADDI.ri(2, 3),
            ADD.rrr(3, 1, 2),
            HALT.plain(),
        ],
        ENTRYPOINT,
    )?;
    machine.start_run()?;

    let clock = Clock::start(Arc::clone(&machine), TICK);
    while machine.get_snapshot().mode == RunMode::Running {
        thread::sleep(TICK);
    }
    clock.stop();

    let snapshot = machine.get_snapshot();
    println!("r3 = {}", snapshot.registers["r3"]);

    Ok(())
}
