//! Simulated sensor

use heatgrid_core::{Rank, Reading, ReadingGenerator};

/// Produces one reading per tick, seeded by (rank, iteration)
#[derive(Clone, Debug)]
pub struct Sensor {
    rank: Rank,
    generator: ReadingGenerator,
    iteration: u64,
}

impl Sensor {
    pub fn new(rank: Rank, generator: ReadingGenerator) -> Self {
        Sensor {
            rank,
            generator,
            iteration: 0,
        }
    }

    /// Take the next reading and advance the iteration counter
    pub fn sense(&mut self) -> Reading {
        let reading = self.generator.reading(self.rank, self.iteration);
        self.iteration += 1;
        reading
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }
}
