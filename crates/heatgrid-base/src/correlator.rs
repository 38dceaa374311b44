//! Report correlator
//!
//! ```text
//! RUNNING --(iteration budget reached | stop flag)--> DRAINING --> STOPPED
//! ```
//!
//! Draining broadcasts termination to every worker and stops the reference
//! simulator. Both exits from RUNNING take the same path.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use heatgrid_core::{HeatgridResult, ReadingGenerator, RunConfig, SharedClock};
use heatgrid_fabric::{Endpoint, Source};
use heatgrid_wire::{encode_params, AlertReport, Tag};
use tracing::{debug, info, warn};

use crate::{
    broadcast_termination, report_latency, AddressBook, Probe, ReferenceSimulator,
    ReferenceTable, ReportRecord, RunLog, RunStatistics, RunSummary, SimulatorHandle, Verdict,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorrelatorState {
    Running,
    Draining,
    Stopped,
}

/// The base station
pub struct Correlator {
    config: RunConfig,
    clock: SharedClock,
    table: Arc<ReferenceTable>,
    stop: Arc<AtomicBool>,
    simulator: Option<SimulatorHandle>,
    state: CorrelatorState,
    addresses: AddressBook,
    stats: RunStatistics,
    log: RunLog,
    iteration: u32,
    started_at: f64,
}

impl Correlator {
    pub fn new(config: RunConfig, clock: SharedClock) -> HeatgridResult<Self> {
        let table = ReferenceTable::new(config.time_units, config.workers(), config.consistency)?;
        let started_at = clock.wall_secs();
        Ok(Correlator {
            config,
            clock,
            table: Arc::new(table),
            stop: Arc::new(AtomicBool::new(false)),
            simulator: None,
            state: CorrelatorState::Running,
            addresses: AddressBook::new(),
            stats: RunStatistics::new(),
            log: RunLog::new(),
            iteration: 0,
            started_at,
        })
    }

    /// Share an externally owned stop flag (operator console)
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn table(&self) -> Arc<ReferenceTable> {
        Arc::clone(&self.table)
    }

    pub fn state(&self) -> CorrelatorState {
        self.state
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    fn budget_reached(&self) -> bool {
        self.iteration >= self.config.params.iteration_budget
    }

    /// Broadcast the run parameters to every worker
    pub fn distribute_params<E: Endpoint + ?Sized>(&self, endpoint: &mut E) -> HeatgridResult<usize> {
        let sent = endpoint.broadcast(Tag::Params, encode_params(&self.config.params))?;
        debug!(sent, params = ?self.config.params, "run parameters distributed");
        Ok(sent)
    }

    /// Start the reference simulator on its own thread
    pub fn start_simulator(&mut self) -> HeatgridResult<()> {
        if self.simulator.is_some() {
            return Ok(());
        }
        let simulator = ReferenceSimulator::new(
            Arc::clone(&self.table),
            ReadingGenerator::new(self.config.seed, self.config.range),
            Arc::clone(&self.clock),
            self.config.simulator_quantum,
            Arc::new(AtomicBool::new(false)),
        );
        self.simulator = Some(simulator.spawn()?);
        Ok(())
    }

    pub fn collect_addresses<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> HeatgridResult<()> {
        self.addresses =
            AddressBook::collect(endpoint, self.config.workers(), self.config.exchange_timeout)?;
        Ok(())
    }

    /// Wait for the next decodable report, or `None` once stop is requested
    pub fn next_report<E: Endpoint + ?Sized>(
        &self,
        endpoint: &mut E,
    ) -> HeatgridResult<Option<AlertReport>> {
        loop {
            if self.stop_requested() {
                return Ok(None);
            }
            let Some(envelope) = endpoint.recv(Source::Any, Tag::Report, self.config.report_poll)?
            else {
                continue;
            };
            match AlertReport::decode(&envelope.payload) {
                Ok(report) => return Ok(Some(report)),
                Err(e) => warn!(rank = %envelope.source, error = %e, "dropping malformed report"),
            }
        }
    }

    /// Classify one report against the reference table and record it
    pub fn process(&mut self, report: AlertReport) -> Verdict {
        self.iteration += 1;
        let now = self.clock.wall_secs();
        let latency = report_latency(now, report.detection_start_clock, self.config.propagation_delay);

        let verification = self.table.verify(&Probe {
            timestamp: report.detection_timestamp,
            rank: report.reporter.rank,
            reading: report.reporter.reading,
            window_secs: self.config.detection_window_secs,
            tolerance: self.config.tolerance,
        });
        let verdict = Verdict::from_match(verification.matched);
        self.stats.record(latency, verification.matched);

        info!(
            iteration = self.iteration,
            reporter = %report.reporter.rank,
            reading = report.reporter.reading,
            matches = report.match_count,
            %verdict,
            latency,
            "report classified"
        );

        self.log.push(ReportRecord {
            iteration: self.iteration,
            logged_at: now,
            latency,
            verdict,
            report,
            verification,
        });
        verdict
    }

    /// Leave RUNNING: terminate every worker and stop the simulator
    pub fn drain<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> HeatgridResult<RunSummary> {
        self.state = CorrelatorState::Draining;
        let delivered = broadcast_termination(endpoint, self.config.workers())?;
        if let Some(simulator) = self.simulator.take() {
            let sweeps = simulator.join();
            debug!(sweeps, "reference simulator joined");
        }
        self.state = CorrelatorState::Stopped;

        let summary = self.summary();
        info!(
            reports = summary.stats.reports,
            true_alerts = summary.stats.true_alerts,
            false_alerts = summary.stats.false_alerts,
            terminated = delivered,
            "run finished"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_time: (self.clock.wall_secs() - self.started_at).max(0.0),
            stats: self.stats.clone(),
        }
    }

    /// Full correlator lifetime: startup exchanges, report loop, drain
    pub fn run<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> HeatgridResult<RunSummary> {
        let span = tracing::info_span!("correlator");
        let _enter = span.enter();

        self.started_at = self.clock.wall_secs();
        self.distribute_params(endpoint)?;
        self.start_simulator()?;
        self.collect_addresses(endpoint)?;
        info!(
            workers = self.config.workers(),
            budget = self.config.params.iteration_budget,
            consistency = ?self.config.consistency,
            "correlator running"
        );

        while !self.budget_reached() {
            let Some(report) = self.next_report(endpoint)? else {
                info!("stop requested");
                break;
            };
            self.process(report);
            if !self.config.params.base_interval.is_zero() {
                thread::sleep(self.config.params.base_interval);
            }
        }

        self.drain(endpoint)
    }

    /// Render the run log and summary
    pub fn write_log<W: Write>(&self, out: &mut W, summary: &RunSummary) -> HeatgridResult<()> {
        self.log.render(out, &self.addresses, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use heatgrid_core::{Coord, GridShape, ManualClock, NodeIdentity, Rank, RunParams};
    use heatgrid_fabric::MemoryFabric;
    use heatgrid_wire::{decode_params, AddressRecord};

    fn config(budget: u32) -> RunConfig {
        RunConfig {
            grid: GridShape::new(3, 3).unwrap(),
            params: RunParams {
                node_interval: Duration::from_millis(1),
                base_interval: Duration::ZERO,
                iteration_budget: budget,
            },
            simulator_quantum: Duration::from_millis(1),
            exchange_timeout: Duration::from_millis(50),
            report_poll: Duration::from_millis(5),
            ..RunConfig::default()
        }
    }

    fn report(reading: i32, detected: i64, start_clock: f64) -> AlertReport {
        AlertReport {
            detection_timestamp: detected,
            match_count: 2,
            detection_start_clock: start_clock,
            reporter: NodeIdentity::new(Rank(5), Coord::new(1, 1)).with_reading(reading),
            neighbors: vec![NodeIdentity::new(Rank(4), Coord::new(1, 0)).with_reading(93)],
        }
    }

    fn seeded(reference: i32) -> Correlator {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let correlator = Correlator::new(config(5), clock).unwrap();
        let mut values = vec![70; 9];
        values[4] = reference;
        correlator.table().write_slot(0, 995, &values);
        correlator
    }

    #[test]
    fn test_true_scenario() {
        let mut c = seeded(93);
        assert_eq!(c.process(report(95, 1_000, 999.5)), Verdict::True);
        assert_eq!(c.stats().true_alerts, 1);
        let record = &c.log().records()[0];
        assert_eq!(record.verification.sample_reading, 93);
        assert_eq!(record.iteration, 1);
    }

    #[test]
    fn test_false_scenario() {
        let mut c = seeded(60);
        assert_eq!(c.process(report(95, 1_000, 999.5)), Verdict::False);
        assert_eq!(c.stats().false_alerts, 1);
        assert_eq!(c.log().records()[0].verification.sample_reading, 60);
    }

    #[test]
    fn test_latency() {
        let mut c = seeded(93);
        c.process(report(95, 1_000, 990.0));
        c.process(report(95, 1_000, 1_500.0));
        let records = c.log().records();
        assert!((records[0].latency - 7.0).abs() < 1e-9);
        assert_eq!(records[1].latency, 0.0);
        assert_eq!(c.stats().shortest, Some(0.0));
    }

    fn register_all(fabric: &MemoryFabric) {
        for rank in Rank::workers(9) {
            let mut ep = fabric.endpoint(rank).unwrap();
            let record = AddressRecord::new("02:00:00:00:00:01", format!("10.0.0.{}", rank));
            ep.send(Rank::BASE, Tag::Address, record.encode().unwrap()).unwrap();
        }
    }

    #[test]
    fn test_run_until_budget() {
        let fabric = MemoryFabric::new(10);
        register_all(&fabric);
        let mut reporter = fabric.endpoint(Rank(5)).unwrap();
        for _ in 0..3 {
            reporter
                .send(Rank::BASE, Tag::Report, report(95, 1, 0.0).encode().unwrap())
                .unwrap();
        }

        let mut base = fabric.endpoint(Rank::BASE).unwrap();
        let mut c = Correlator::new(config(2), Arc::new(ManualClock::new(1.0))).unwrap();
        let summary = c.run(&mut base).unwrap();

        assert_eq!(c.state(), CorrelatorState::Stopped);
        assert_eq!(summary.stats.reports, 2);
        assert_eq!(c.addresses().len(), 9);
        // Third report left unread
        assert_eq!(fabric.queued(Rank::BASE), 1);

        for rank in Rank::workers(9) {
            let mut ep = fabric.endpoint(rank).unwrap();
            let params = ep.try_recv(Source::Rank(Rank::BASE), Tag::Params).unwrap().unwrap();
            assert_eq!(decode_params(&params.payload).unwrap().iteration_budget, 2);
            assert!(ep.try_recv(Source::Rank(Rank::BASE), Tag::Termination).unwrap().is_some());
        }
    }

    #[test]
    fn test_stop_flag_drains_like_budget() {
        let fabric = MemoryFabric::new(10);
        let mut base = fabric.endpoint(Rank::BASE).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let mut c = Correlator::new(config(20), Arc::new(ManualClock::new(1.0)))
            .unwrap()
            .with_stop_flag(Arc::clone(&stop));

        let operator = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            stop.store(true, Ordering::Release);
        });
        let summary = c.run(&mut base).unwrap();
        operator.join().unwrap();

        assert_eq!(c.state(), CorrelatorState::Stopped);
        assert_eq!(summary.stats.reports, 0);
        assert_eq!(summary.stats.average(), None);
        for rank in Rank::workers(9) {
            assert_eq!(fabric.queued(rank), 2, "params and termination for {}", rank);
        }

        let mut out = Vec::new();
        c.write_log(&mut out, &summary).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("no data"));
    }

    #[test]
    fn test_malformed_report_skipped() {
        let fabric = MemoryFabric::new(10);
        let mut worker = fabric.endpoint(Rank(3)).unwrap();
        worker.send(Rank::BASE, Tag::Report, bytes::Bytes::from_static(&[1, 2, 3])).unwrap();
        worker
            .send(Rank::BASE, Tag::Report, report(95, 1, 0.0).encode().unwrap())
            .unwrap();

        let mut base = fabric.endpoint(Rank::BASE).unwrap();
        let c = Correlator::new(config(1), Arc::new(ManualClock::new(1.0))).unwrap();
        let next = c.next_report(&mut base).unwrap().unwrap();
        assert_eq!(next.reporter.reading, 95);
    }

    #[test]
    fn test_extreme_detection_times_classified_and_logged() {
        let mut c = seeded(93);
        for detected in [i64::MIN, i64::MAX, 300_000_000_000] {
            let wire = report(95, detected, 0.0).encode().unwrap();
            let decoded = AlertReport::decode(&wire).unwrap();
            assert_eq!(c.process(decoded), Verdict::False);
        }
        assert_eq!(c.stats().false_alerts, 3);

        let mut buf = Vec::new();
        c.write_log(&mut buf, &c.summary()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Alert Reported Time : 300000000000"));
        assert!(text.contains("Alert Reported Time : unset"));
    }
}
