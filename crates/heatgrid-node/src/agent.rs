//! Node agent - the per-worker state machine
//!
//! ```text
//! SENSING --(reading > threshold)--> REQUESTING --> WAITING
//! WAITING --(all replies, quorum met)--> REPORTING --> SENSING
//! WAITING --(all replies, no quorum)--> SENSING
//! any state --(termination signal)--> TERMINATED
//! ```
//!
//! Nothing inside a tick blocks: replies are polled, requests are served
//! every tick, and a neighbour that has already stopped simply leaves the
//! round waiting until this node's own termination cancels it.

use std::thread;
use std::time::Duration;

use heatgrid_core::{
    meets_quorum, GridShape, HeatgridError, HeatgridResult, NodeIdentity, Placement, Rank,
    Reading, ReadingGenerator, RunConfig, RunParams, SharedClock,
};
use heatgrid_fabric::{Endpoint, OpStatus, Source};
use heatgrid_wire::{
    decode_identity, decode_params, decode_reading, encode_identity, encode_reading,
    encode_scalar, AddressRecord, AlertReport, Tag, REQUEST_MARKER,
};
use tracing::{debug, info, trace, warn};

use crate::{InFlight, NeighborSnapshot, Sensor};

/// Node agent states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    Sensing,
    Requesting,
    Waiting,
    Reporting,
    Terminated,
}

/// Escalation rules shared by every node in a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuorumRules {
    /// A reading strictly above this starts a round
    pub threshold: Reading,
    pub tolerance: Reading,
    pub quorum: usize,
}

impl From<&RunConfig> for QuorumRules {
    fn from(config: &RunConfig) -> Self {
        QuorumRules {
            threshold: config.threshold,
            tolerance: config.tolerance,
            quorum: config.quorum,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RoundOp {
    Request(Rank),
    Reply(Rank),
}

/// What one tick did
#[derive(Clone, Debug)]
pub struct TickOutcome {
    pub state: AgentState,
    pub reading: Reading,
    pub served: usize,
    pub report: Option<AlertReport>,
}

/// Counters kept over the agent's lifetime
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub ticks: u64,
    pub rounds: u64,
    pub reports: u64,
    pub served: u64,
    pub cancelled: u64,
}

/// A sensor node
pub struct NodeAgent {
    identity: NodeIdentity,
    neighbors: Vec<NodeIdentity>,
    sensor: Sensor,
    rules: QuorumRules,
    clock: SharedClock,
    state: AgentState,
    snapshot: NeighborSnapshot,
    round: InFlight<RoundOp>,
    replies: InFlight<Rank>,
    stats: AgentStats,
}

impl NodeAgent {
    pub fn new(
        placement: &Placement,
        grid: &GridShape,
        config: &RunConfig,
        clock: SharedClock,
    ) -> HeatgridResult<Self> {
        let neighbors = placement
            .neighbors
            .ranks()
            .into_iter()
            .map(|rank| Ok(NodeIdentity::new(rank, grid.coord_of(rank)?)))
            .collect::<HeatgridResult<Vec<_>>>()?;

        Ok(NodeAgent {
            identity: NodeIdentity::new(placement.rank, placement.coord),
            neighbors,
            sensor: Sensor::new(placement.rank, ReadingGenerator::new(config.seed, config.range)),
            rules: QuorumRules::from(config),
            clock,
            state: AgentState::Sensing,
            snapshot: NeighborSnapshot::default(),
            round: InFlight::new(),
            replies: InFlight::new(),
            stats: AgentStats::default(),
        })
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    pub fn neighbors(&self) -> &[NodeIdentity] {
        &self.neighbors
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == AgentState::Terminated
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Operations this agent still holds (round plus replies)
    pub fn outstanding(&self) -> usize {
        self.round.len() + self.replies.len()
    }

    fn transition(&mut self, next: AgentState) {
        trace!(from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    // ------------------------------------------------------------------
    // Startup exchanges
    // ------------------------------------------------------------------

    /// Send this worker's addresses to the correlator
    pub fn register_address<E: Endpoint + ?Sized>(
        &self,
        endpoint: &mut E,
        address: &AddressRecord,
    ) -> HeatgridResult<()> {
        debug!(mac = %address.mac, ip = %address.ip, "registering address");
        endpoint.send(Rank::BASE, Tag::Address, address.encode()?)
    }

    /// Wait for the run parameters the correlator distributes
    pub fn receive_params<E: Endpoint + ?Sized>(
        &self,
        endpoint: &mut E,
        timeout: Duration,
    ) -> HeatgridResult<RunParams> {
        let envelope = endpoint
            .recv(Source::Rank(Rank::BASE), Tag::Params, timeout)?
            .ok_or(HeatgridError::Timeout(timeout, "run parameters"))?;
        decode_params(&envelope.payload)
    }

    /// Exchange identities with every neighbour
    pub fn handshake<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        timeout: Duration,
    ) -> HeatgridResult<()> {
        for neighbor in &self.neighbors {
            endpoint.send(neighbor.rank, Tag::InfoExchange, encode_identity(&self.identity))?;
        }

        for slot in 0..self.neighbors.len() {
            let expected = self.neighbors[slot];
            let envelope = endpoint
                .recv(Source::Rank(expected.rank), Tag::InfoExchange, timeout)?
                .ok_or(HeatgridError::Timeout(timeout, "neighbour identity"))?;
            let observed = decode_identity(&envelope.payload)?;
            if observed.rank != expected.rank || observed.coord != expected.coord {
                return Err(HeatgridError::InvalidWireFormat(format!(
                    "neighbour {} announced rank {} at {}, grid places it at {}",
                    expected.rank, observed.rank, observed.coord, expected.coord
                )));
            }
            debug!(neighbor = %observed.rank, coord = %observed.coord, "neighbour");
            self.neighbors[slot] = observed;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the state machine by one tick
    pub fn tick<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> HeatgridResult<TickOutcome> {
        if self.is_terminated() {
            return Ok(self.outcome(0, None));
        }
        self.stats.ticks += 1;

        if self.state == AgentState::Sensing {
            let reading = self.sense();
            if reading > self.rules.threshold {
                self.transition(AgentState::Requesting);
                self.request_readings(endpoint)?;
                self.transition(AgentState::Waiting);
            }
        }

        let served = self.serve_requests(endpoint)?;

        if self.poll_termination(endpoint)? {
            return Ok(self.outcome(served, None));
        }

        let report = if self.state == AgentState::Waiting {
            self.evaluate_quorum(endpoint)?
        } else {
            None
        };

        Ok(self.outcome(served, report))
    }

    fn outcome(&self, served: usize, report: Option<AlertReport>) -> TickOutcome {
        TickOutcome {
            state: self.state,
            reading: self.identity.reading,
            served,
            report,
        }
    }

    fn sense(&mut self) -> Reading {
        let reading = self.sensor.sense();
        self.identity.reading = reading;
        debug!(reading, iteration = self.sensor.iteration(), "reading");
        reading
    }

    fn request_readings<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> HeatgridResult<()> {
        self.snapshot = NeighborSnapshot::fresh(&self.neighbors);
        for neighbor in &self.neighbors {
            let send = endpoint.isend(neighbor.rank, Tag::Request, encode_scalar(REQUEST_MARKER))?;
            self.round.push(RoundOp::Request(neighbor.rank), send);
            let recv = endpoint.irecv(neighbor.rank, Tag::Reading);
            self.round.push(RoundOp::Reply(neighbor.rank), recv);
            trace!(neighbor = %neighbor.rank, "requested reading");
        }
        self.stats.rounds += 1;
        Ok(())
    }

    /// Reply to every waiting confirmation request with the current reading
    fn serve_requests<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> HeatgridResult<usize> {
        for (to, _) in self.replies.poll(endpoint) {
            trace!(neighbor = %to, "reply delivered");
        }

        let mut served = 0;
        while let Some(from) = endpoint.iprobe(Source::Any, Tag::Request) {
            let Some(request) = endpoint.try_recv(Source::Rank(from), Tag::Request)? else {
                break;
            };
            let reply = endpoint.isend(
                request.source,
                Tag::Reading,
                encode_reading(self.identity.reading),
            )?;
            self.replies.push(request.source, reply);
            debug!(neighbor = %request.source, reading = self.identity.reading, "served request");
            served += 1;
        }
        self.stats.served += served as u64;
        Ok(served)
    }

    fn poll_termination<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> HeatgridResult<bool> {
        if endpoint
            .iprobe(Source::Rank(Rank::BASE), Tag::Termination)
            .is_none()
        {
            return Ok(false);
        }
        endpoint.try_recv(Source::Rank(Rank::BASE), Tag::Termination)?;

        let cancelled = self.round.cancel_all(endpoint) + self.replies.cancel_all(endpoint);
        self.stats.cancelled += cancelled as u64;
        info!(cancelled, "termination signal received");
        self.transition(AgentState::Terminated);
        Ok(true)
    }

    fn evaluate_quorum<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
    ) -> HeatgridResult<Option<AlertReport>> {
        for (op, status) in self.round.poll(endpoint) {
            if let (RoundOp::Reply(from), OpStatus::Received(envelope)) = (op, status) {
                match decode_reading(&envelope.payload) {
                    Ok(reading) => {
                        trace!(neighbor = %from, reading, "reply received");
                        self.snapshot.record(from, reading);
                    }
                    Err(e) => {
                        warn!(neighbor = %from, error = %e, "malformed reply counted as non-matching");
                        self.snapshot.record_malformed(from);
                    }
                }
            }
        }
        if !self.snapshot.is_complete() {
            return Ok(None);
        }

        let matches = self.snapshot.matches(self.identity.reading, self.rules.tolerance);
        let mut report = None;
        if meets_quorum(matches, self.rules.quorum) {
            self.transition(AgentState::Reporting);
            let alert = self.build_report(matches);
            endpoint.send(Rank::BASE, Tag::Report, alert.encode()?)?;
            self.stats.reports += 1;
            info!(reading = self.identity.reading, matches, "alert reported");
            report = Some(alert);
        } else {
            debug!(reading = self.identity.reading, matches, "quorum not met");
        }

        self.stats.cancelled += self.round.cancel_all(endpoint) as u64;
        self.transition(AgentState::Sensing);
        Ok(report)
    }

    fn build_report(&self, matches: usize) -> AlertReport {
        AlertReport {
            detection_timestamp: self.clock.unix_secs(),
            match_count: matches as i32,
            detection_start_clock: self.clock.wall_secs(),
            reporter: self.identity,
            neighbors: self.snapshot.identities(),
        }
    }

    // ------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------

    /// Tick every `params.node_interval` until terminated
    pub fn run<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        params: &RunParams,
        startup_delay: Duration,
    ) -> HeatgridResult<AgentStats> {
        let span = tracing::info_span!("node", rank = %self.identity.rank);
        let _enter = span.enter();

        if !startup_delay.is_zero() {
            thread::sleep(startup_delay);
        }
        info!(coord = %self.identity.coord, neighbors = self.neighbors.len(), "node started");

        while !self.is_terminated() {
            if let Err(e) = self.tick(endpoint) {
                let cancelled =
                    self.round.cancel_all(endpoint) + self.replies.cancel_all(endpoint);
                self.stats.cancelled += cancelled as u64;
                warn!(error = %e, cancelled, "node loop aborted");
                return Err(e);
            }
            if !self.is_terminated() {
                thread::sleep(params.node_interval);
            }
        }

        info!(
            ticks = self.stats.ticks,
            reports = self.stats.reports,
            served = self.stats.served,
            "node terminated"
        );
        Ok(self.stats.clone())
    }
}
