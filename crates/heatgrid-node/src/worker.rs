//! Worker lifecycle: startup exchanges, then the tick loop

use heatgrid_core::{HeatgridResult, RunConfig, SharedClock};
use heatgrid_fabric::Endpoint;
use heatgrid_wire::AddressRecord;

use crate::{AgentState, AgentStats, NodeAgent};

/// How a worker ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub state: AgentState,
    pub stats: AgentStats,
    /// Operations still held by the agent or the endpoint after exit
    pub outstanding: usize,
}

/// Run one worker rank to completion
///
/// Order: receive run parameters, exchange identities with neighbours,
/// register the address with the correlator, then tick until terminated.
pub fn run_worker<E: Endpoint + ?Sized>(
    endpoint: &mut E,
    config: &RunConfig,
    clock: SharedClock,
    address: &AddressRecord,
) -> HeatgridResult<WorkerOutcome> {
    let placement = config.grid.resolve(endpoint.rank())?;
    let mut agent = NodeAgent::new(&placement, &config.grid, config, clock)?;

    let params = agent.receive_params(endpoint, config.exchange_timeout)?;
    agent.handshake(endpoint, config.exchange_timeout)?;
    agent.register_address(endpoint, address)?;

    let stats = agent.run(endpoint, &params, config.startup_delay)?;
    Ok(WorkerOutcome {
        state: agent.state(),
        stats,
        outstanding: agent.outstanding() + endpoint.outstanding(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use heatgrid_core::{GridShape, Rank, RunParams, SystemClock};
    use heatgrid_fabric::{MemoryFabric, Source};
    use heatgrid_wire::{encode_params, encode_scalar, Tag, TERMINATE_MARKER};

    #[test]
    fn test_worker_lifecycle() {
        let config = RunConfig {
            startup_delay: Duration::ZERO,
            exchange_timeout: Duration::from_secs(2),
            ..RunConfig::new(GridShape::new(1, 2).unwrap())
        };
        let fabric = MemoryFabric::new(3);
        let mut base = fabric.endpoint(Rank::BASE).unwrap();
        let params = RunParams {
            node_interval: Duration::from_millis(1),
            ..RunParams::default()
        };
        base.broadcast(Tag::Params, encode_params(&params)).unwrap();

        let workers: Vec<_> = Rank::workers(2)
            .map(|rank| {
                let mut ep = fabric.endpoint(rank).unwrap();
                let config = config.clone();
                thread::spawn(move || {
                    let address = AddressRecord::new("02:00:00:00:00:01", "127.0.0.1");
                    run_worker(&mut ep, &config, Arc::new(SystemClock), &address)
                })
            })
            .collect();

        for _ in 0..2 {
            base.recv(Source::Any, Tag::Address, Duration::from_secs(2))
                .unwrap()
                .expect("address registration");
        }
        for rank in Rank::workers(2) {
            base.send(rank, Tag::Termination, encode_scalar(TERMINATE_MARKER)).unwrap();
        }

        for worker in workers {
            let outcome = worker.join().unwrap().unwrap();
            assert_eq!(outcome.state, AgentState::Terminated);
            assert_eq!(outcome.outstanding, 0);
        }
    }
}
