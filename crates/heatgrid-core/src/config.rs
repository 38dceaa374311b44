//! Run configuration
//!
//! Resolved once at startup by the launcher, validated before any worker or
//! correlator logic runs, then shared read-only for the lifetime of the run.

use std::time::Duration;

use crate::{GridShape, HeatgridError, HeatgridResult, Reading, ReadingRange, SeedPolicy};

/// Locking discipline of the correlator's reference table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Consistency {
    /// One lock for timestamps, one for values. A reader may pair a
    /// timestamp from one sweep with values from another.
    #[default]
    Relaxed,
    /// A single lock covers both field groups; compound reads are atomic.
    Strict,
}

impl std::str::FromStr for Consistency {
    type Err = HeatgridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relaxed" => Ok(Consistency::Relaxed),
            "strict" => Ok(Consistency::Strict),
            other => Err(HeatgridError::InvalidConfig(format!(
                "unknown consistency level '{}'",
                other
            ))),
        }
    }
}

/// Run parameters the correlator distributes to every worker
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunParams {
    /// Duration of each node tick
    pub node_interval: Duration,
    /// Pause after each accepted report at the correlator
    pub base_interval: Duration,
    /// Reports the correlator accepts before draining
    pub iteration_budget: u32,
}

impl Default for RunParams {
    fn default() -> Self {
        RunParams {
            node_interval: Duration::from_millis(500),
            base_interval: Duration::from_secs(1),
            iteration_budget: 20,
        }
    }
}

/// Complete configuration of a simulation run
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Grid shape; rows * cols must equal the worker count
    pub grid: GridShape,
    /// Tick intervals and iteration budget
    pub params: RunParams,
    /// Bounds of generated readings
    pub range: ReadingRange,
    /// A reading strictly above this starts a quorum round
    pub threshold: Reading,
    /// Maximum difference for two readings to match
    pub tolerance: Reading,
    /// Matching neighbours required to escalate
    pub quorum: usize,
    /// Slots in the reference table
    pub time_units: usize,
    /// Maximum distance in seconds between a report and an eligible reference slot
    pub detection_window_secs: i64,
    /// Pause after writing each reference slot
    pub simulator_quantum: Duration,
    /// Delay before a node's first tick so the reference table fills
    pub startup_delay: Duration,
    /// Subtracted from measured latency
    pub propagation_delay: Duration,
    /// Reference table locking
    pub consistency: Consistency,
    /// Reading generator seeding
    pub seed: SeedPolicy,
    /// Bound on blocking startup exchanges (addresses, identities, params)
    pub exchange_timeout: Duration,
    /// Slice of the correlator's report wait, between stop-flag checks
    pub report_poll: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            grid: GridShape { rows: 3, cols: 3 },
            params: RunParams::default(),
            range: ReadingRange::default(),
            threshold: 80,
            tolerance: 5,
            quorum: 2,
            time_units: 10,
            detection_window_secs: 8,
            simulator_quantum: Duration::from_millis(500),
            startup_delay: Duration::from_secs(3),
            propagation_delay: Duration::from_secs(3),
            consistency: Consistency::Relaxed,
            seed: SeedPolicy::WallClock,
            exchange_timeout: Duration::from_secs(10),
            report_poll: Duration::from_millis(100),
        }
    }
}

impl RunConfig {
    pub fn new(grid: GridShape) -> Self {
        RunConfig {
            grid,
            ..Default::default()
        }
    }

    /// Number of worker processes
    pub fn workers(&self) -> usize {
        self.grid.cells()
    }

    /// Number of processes in the world: workers plus the correlator
    pub fn world_size(&self) -> usize {
        self.workers() + 1
    }

    /// Check the configuration against a world of `process_count` ranks
    pub fn validate(&self, process_count: usize) -> HeatgridResult<()> {
        self.grid.check_world(process_count)?;
        ReadingRange::new(self.range.min, self.range.max)?;

        if self.tolerance < 0 {
            return Err(HeatgridError::InvalidConfig("tolerance must be >= 0".into()));
        }
        if self.quorum == 0 {
            return Err(HeatgridError::InvalidConfig("quorum must be >= 1".into()));
        }
        if self.time_units == 0 {
            return Err(HeatgridError::InvalidConfig("time units must be >= 1".into()));
        }
        if self.detection_window_secs < 0 {
            return Err(HeatgridError::InvalidConfig(
                "detection window must be >= 0".into(),
            ));
        }
        if self.report_poll.is_zero() {
            return Err(HeatgridError::InvalidConfig(
                "report poll slice must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
