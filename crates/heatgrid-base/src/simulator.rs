//! Reference simulator - background writer of the reference table

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use heatgrid_core::{HeatgridResult, Rank, Reading, ReadingGenerator, SharedClock};
use tracing::{debug, trace, warn};

use crate::ReferenceTable;

/// Regenerates every slot of a [`ReferenceTable`] until told to stop
pub struct ReferenceSimulator {
    table: Arc<ReferenceTable>,
    generator: ReadingGenerator,
    clock: SharedClock,
    quantum: Duration,
    stop: Arc<AtomicBool>,
    sweeps: u64,
}

impl ReferenceSimulator {
    pub fn new(
        table: Arc<ReferenceTable>,
        generator: ReadingGenerator,
        clock: SharedClock,
        quantum: Duration,
        stop: Arc<AtomicBool>,
    ) -> Self {
        ReferenceSimulator {
            table,
            generator,
            clock,
            quantum,
            stop,
            sweeps: 0,
        }
    }

    /// Completed sweeps so far
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn readings(&self) -> Vec<Reading> {
        Rank::workers(self.table.workers())
            .map(|rank| self.generator.reading(rank, self.sweeps))
            .collect()
    }

    /// Write every slot once. Returns false if stopped part way.
    pub fn sweep(&mut self) -> bool {
        let readings = self.readings();
        for slot in 0..self.table.slots() {
            if self.stopped() {
                return false;
            }
            self.table.write_slot(slot, self.clock.unix_secs(), &readings);
            if !self.quantum.is_zero() {
                thread::sleep(self.quantum);
            }
        }
        self.sweeps += 1;
        trace!(sweep = self.sweeps, table = %self.table.render(), "reference sweep");
        true
    }

    /// Sweep until the stop flag is raised
    pub fn run(mut self) -> u64 {
        debug!(
            slots = self.table.slots(),
            workers = self.table.workers(),
            "reference simulator started"
        );
        while self.sweep() {}
        debug!(sweeps = self.sweeps, "reference simulator stopped");
        self.sweeps
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> HeatgridResult<SimulatorHandle> {
        let stop = Arc::clone(&self.stop);
        let thread = thread::Builder::new()
            .name("reference-simulator".into())
            .spawn(move || self.run())?;
        Ok(SimulatorHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Owner's side of a running simulator
pub struct SimulatorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl SimulatorHandle {
    /// Raise the stop flag; the simulator exits at the next slot boundary
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop and wait for the thread, returning completed sweeps
    pub fn join(mut self) -> u64 {
        self.stop();
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(sweeps)) => sweeps,
            Some(Err(_)) => {
                warn!("reference simulator panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatgrid_core::{Consistency, ManualClock, ReadingRange, SeedPolicy};

    fn simulator(consistency: Consistency) -> (ReferenceSimulator, Arc<ReferenceTable>, Arc<ManualClock>) {
        let table = Arc::new(ReferenceTable::new(3, 4, consistency).unwrap());
        let clock = Arc::new(ManualClock::new(5_000.0));
        let generator = ReadingGenerator::new(SeedPolicy::Fixed(9), ReadingRange::default());
        let sim = ReferenceSimulator::new(
            Arc::clone(&table),
            generator,
            clock.clone(),
            Duration::ZERO,
            Arc::new(AtomicBool::new(false)),
        );
        (sim, table, clock)
    }

    #[test]
    fn test_sweep_fills_every_slot() {
        let (mut sim, table, _) = simulator(Consistency::Relaxed);
        assert!(sim.sweep());
        assert_eq!(sim.sweeps(), 1);
        for slot in 0..3 {
            assert_eq!(table.timestamp(slot), 5_000);
            for rank in Rank::workers(4) {
                let v = table.value(slot, rank).unwrap();
                assert!(ReadingRange::default().contains(v));
            }
        }
    }

    #[test]
    fn test_sweeps_overwrite_in_place() {
        let (mut sim, table, clock) = simulator(Consistency::Strict);
        sim.sweep();
        clock.advance(Duration::from_secs(30));
        sim.sweep();
        for slot in 0..3 {
            assert_eq!(table.timestamp(slot), 5_030);
        }
    }

    #[test]
    fn test_stop_between_slots() {
        let (mut sim, table, _) = simulator(Consistency::Relaxed);
        sim.stop.store(true, Ordering::Release);
        assert!(!sim.sweep());
        assert_eq!(sim.sweeps(), 0);
        assert_eq!(table.timestamp(0), 0);
    }

    #[test]
    fn test_spawn_and_join() {
        let (sim, table, _) = simulator(Consistency::Relaxed);
        let handle = sim.spawn().unwrap();
        while table.timestamp(2) == 0 {
            thread::yield_now();
        }
        handle.join();
        assert_eq!(table.timestamp(0), 5_000);
    }
}
