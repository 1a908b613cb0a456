use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::*;

use crate::machine::Machine;

/// Baseline tick period: a 1 kHz clock
pub const TICK: Duration = Duration::from_millis(1);

/// Fixed-rate driver that advances a running machine by one instruction
/// per tick.
///
/// The tick thread shares the machine's exclusive lock with the control
/// surface, so a tick and a manual step never interleave partially. The
/// driver tears down deterministically: [`Clock::stop`] (or drop) raises
/// the stop flag and joins the thread.
#[derive(Debug)]
pub struct Clock {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Clock {
    /// Spawns the tick thread against `machine`
    pub fn start(machine: Arc<Machine>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            debug!("clock started with period {:?}", period);
            while !flag.load(Ordering::Relaxed) {
                thread::sleep(period);
                machine.tick();
            }
            debug!("clock stopped");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signals the tick thread to exit and waits for it
    pub fn stop(mut self) {
        self.halt_thread();
    }

    fn halt_thread(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("clock thread panicked");
            }
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.halt_thread();
    }
}
