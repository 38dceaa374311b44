//! Whole-grid scenarios over the in-process fabric

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use heatgrid_base::{broadcast_termination, Correlator, RunSummary};
use heatgrid_core::{
    Consistency, GridShape, HeatgridResult, Rank, ReadingRange, RunConfig, RunParams, SeedPolicy,
    SharedClock, SystemClock,
};
use heatgrid_fabric::MemoryFabric;
use heatgrid_node::{run_worker, AgentState, WorkerOutcome};
use heatgrid_wire::AddressRecord;
use tracing::warn;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Shape and pacing of a scenario
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub rows: usize,
    pub cols: usize,

    /// World size to validate against; defaults to rows * cols + 1
    pub process_count: Option<usize>,

    /// Reports the correlator accepts before draining
    pub budget: u32,

    pub range: ReadingRange,
    pub seed: SeedPolicy,
    pub consistency: Consistency,

    /// Raise the operator stop flag after this long
    pub stop_after: Option<Duration>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            process_count: None,
            budget: 5,
            // Always over threshold, mostly within tolerance of each other
            range: ReadingRange { min: 90, max: 100 },
            seed: SeedPolicy::Fixed(7),
            consistency: Consistency::Relaxed,
            stop_after: None,
        }
    }
}

impl ScenarioConfig {
    pub fn minimal() -> Self {
        Self {
            rows: 2,
            cols: 2,
            budget: 3,
            ..Self::default()
        }
    }

    pub fn standard() -> Self {
        Self::default()
    }

    /// Readings that never cross the alert threshold
    pub fn quiet() -> Self {
        Self {
            range: ReadingRange { min: 50, max: 60 },
            budget: 1_000,
            ..Self::default()
        }
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_stop_after(mut self, after: Duration) -> Self {
        self.stop_after = Some(after);
        self
    }

    pub fn with_process_count(mut self, process_count: usize) -> Self {
        self.process_count = Some(process_count);
        self
    }

    /// Run configuration with test pacing
    pub fn run_config(&self) -> HeatgridResult<RunConfig> {
        Ok(RunConfig {
            grid: GridShape::new(self.rows, self.cols)?,
            params: RunParams {
                node_interval: Duration::from_millis(2),
                base_interval: Duration::ZERO,
                iteration_budget: self.budget,
            },
            range: self.range,
            consistency: self.consistency,
            seed: self.seed,
            simulator_quantum: Duration::from_millis(1),
            startup_delay: Duration::from_millis(5),
            propagation_delay: Duration::ZERO,
            exchange_timeout: Duration::from_secs(5),
            report_poll: Duration::from_millis(5),
            ..RunConfig::default()
        })
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub summary: RunSummary,
    pub workers: Vec<(Rank, WorkerOutcome)>,
    pub worker_errors: Vec<(Rank, String)>,
    /// Rendered run log
    pub log: String,
}

impl ScenarioResult {
    pub fn all_terminated(&self) -> bool {
        self.workers
            .iter()
            .all(|(_, outcome)| outcome.state == AgentState::Terminated)
    }

    /// No worker left an operation pending
    pub fn no_outstanding(&self) -> bool {
        self.workers.iter().all(|(_, outcome)| outcome.outstanding == 0)
    }

    pub fn passed(&self) -> bool {
        self.worker_errors.is_empty() && self.all_terminated() && self.no_outstanding()
    }

    /// Reports sent by all workers (some may still be unread at the base)
    pub fn reports_sent(&self) -> u64 {
        self.workers.iter().map(|(_, outcome)| outcome.stats.reports).sum()
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Locally administered MAC and private IP derived from the rank
pub fn synthetic_address(rank: Rank) -> AddressRecord {
    AddressRecord::new(
        format!("02:00:00:00:{:02x}:{:02x}", (rank.0 >> 8) & 0xff, rank.0 & 0xff),
        format!("10.0.{}.{}", (rank.0 >> 8) & 0xff, rank.0 & 0xff),
    )
}

pub struct ScenarioHarness {
    config: ScenarioConfig,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    /// Run every worker and the correlator to completion
    ///
    /// A configuration that does not fit the world is rejected before any
    /// thread starts.
    pub fn run(&self) -> HeatgridResult<ScenarioResult> {
        let config = self.config.run_config()?;
        let process_count = self.config.process_count.unwrap_or(config.world_size());
        config.validate(process_count)?;

        let fabric = MemoryFabric::new(process_count);
        let clock: SharedClock = Arc::new(SystemClock);

        let mut handles = Vec::with_capacity(config.workers());
        for rank in Rank::workers(config.workers()) {
            let mut endpoint = fabric.endpoint(rank)?;
            let config = config.clone();
            let clock = Arc::clone(&clock);
            let handle = thread::Builder::new()
                .name(format!("node-{}", rank))
                .spawn(move || run_worker(&mut endpoint, &config, clock, &synthetic_address(rank)))?;
            handles.push((rank, handle));
        }

        let mut correlator = Correlator::new(config.clone(), clock)?;
        if let Some(after) = self.config.stop_after {
            let stop = correlator.stop_flag();
            thread::spawn(move || {
                thread::sleep(after);
                stop.store(true, Ordering::Release);
            });
        }

        let mut base = fabric.endpoint(Rank::BASE)?;
        let summary = correlator.run(&mut base);
        if summary.is_err() {
            broadcast_termination(&mut base, config.workers())?;
        }

        let mut workers = Vec::new();
        let mut worker_errors = Vec::new();
        for (rank, handle) in handles {
            match handle.join() {
                Ok(Ok(outcome)) => workers.push((rank, outcome)),
                Ok(Err(e)) => {
                    warn!(%rank, error = %e, "worker failed");
                    worker_errors.push((rank, e.to_string()));
                }
                Err(_) => worker_errors.push((rank, "panicked".to_string())),
            }
        }

        let summary = summary?;
        let mut log = Vec::new();
        correlator.write_log(&mut log, &summary)?;

        Ok(ScenarioResult {
            summary,
            workers,
            worker_errors,
            log: String::from_utf8_lossy(&log).into_owned(),
        })
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// Correlator reaches a budget of 5 and terminates every node
pub fn termination_scenario() -> HeatgridResult<ScenarioResult> {
    ScenarioHarness::new(ScenarioConfig::standard()).run()
}

/// No report ever arrives; the operator stops the run
pub fn operator_stop_scenario() -> HeatgridResult<ScenarioResult> {
    ScenarioHarness::new(ScenarioConfig::quiet().with_stop_after(Duration::from_millis(150))).run()
}

/// 3x3 grid in a world of 9 processes (8 workers)
pub fn config_rejection_scenario() -> HeatgridResult<ScenarioResult> {
    ScenarioHarness::new(ScenarioConfig::standard().with_process_count(9)).run()
}
