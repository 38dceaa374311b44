//! Heatgrid launcher
//!
//! Runs a whole grid in one process: rank 0 is the correlator, ranks
//! 1..=rows*cols are sensor nodes, all connected by an in-process fabric.
//! Type `stop` (or press Ctrl-C) to end the run early.
//!
//! Exit codes: 0 on a completed run, 2 when the configuration is rejected
//! before anything starts, 1 on any other failure.

mod address;
mod console;
mod settings;

use std::fs::File;
use std::io::{self, BufWriter};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use heatgrid_base::{broadcast_termination, Correlator};
use heatgrid_core::{HeatgridError, HeatgridResult, Rank, SharedClock, SystemClock};
use heatgrid_fabric::MemoryFabric;
use heatgrid_node::run_worker;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

const CONFIG_REJECTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heatgrid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_config_error() => {
            error!(error = %e, "configuration rejected");
            ExitCode::from(CONFIG_REJECTED)
        }
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

/// Join every node thread, then raise `stop` so the correlator does not
/// wait out its budget for nodes that are already gone
fn join_workers<T>(
    workers: Vec<(Rank, JoinHandle<T>)>,
    stop: &AtomicBool,
) -> Vec<(Rank, thread::Result<T>)> {
    let joined = workers
        .into_iter()
        .map(|(rank, handle)| (rank, handle.join()))
        .collect::<Vec<_>>();
    if !stop.swap(true, Ordering::AcqRel) {
        debug!(nodes = joined.len(), "all nodes exited, stopping correlator");
    }
    joined
}

fn join_error(e: tokio::task::JoinError) -> HeatgridError {
    HeatgridError::Io(io::Error::other(e))
}

async fn run() -> HeatgridResult<()> {
    let settings = Settings::from_env()?;
    let config = settings.config;
    config.validate(settings.process_count)?;

    info!(
        rows = config.grid.rows,
        cols = config.grid.cols,
        workers = config.workers(),
        "starting heatgrid"
    );

    let fabric = MemoryFabric::new(settings.process_count);
    let clock: SharedClock = Arc::new(SystemClock);
    let stop = Arc::new(AtomicBool::new(false));
    let console = console::spawn(Arc::clone(&stop));
    let host_ip = address::host_ip();

    let mut workers = Vec::with_capacity(config.workers());
    for rank in Rank::workers(config.workers()) {
        let mut endpoint = fabric.endpoint(rank)?;
        let config = config.clone();
        let clock = Arc::clone(&clock);
        let address = address::worker_address(rank, &host_ip);
        let handle = thread::Builder::new()
            .name(format!("node-{}", rank))
            .spawn(move || run_worker(&mut endpoint, &config, clock, &address))?;
        workers.push((rank, handle));
    }

    let watched_stop = Arc::clone(&stop);
    let watcher = tokio::task::spawn_blocking(move || join_workers(workers, &watched_stop));

    let mut correlator = Correlator::new(config.clone(), clock)?.with_stop_flag(stop);
    let mut base = fabric.endpoint(Rank::BASE)?;
    let log_path = settings.log_path;
    let result = tokio::task::spawn_blocking(move || -> HeatgridResult<()> {
        let outcome = correlator.run(&mut base);
        if outcome.is_err() {
            broadcast_termination(&mut base, correlator.table().workers())?;
        }
        let summary = outcome?;
        let mut out = BufWriter::new(File::create(&log_path)?);
        correlator.write_log(&mut out, &summary)?;
        info!(path = %log_path.display(), "run log written");
        Ok(())
    })
    .await
    .map_err(join_error)?;

    let joined = watcher.await.map_err(join_error)?;

    for (rank, outcome) in joined {
        match outcome {
            Ok(Ok(outcome)) => info!(
                %rank,
                ticks = outcome.stats.ticks,
                reports = outcome.stats.reports,
                outstanding = outcome.outstanding,
                "node finished"
            ),
            Ok(Err(e)) => warn!(%rank, error = %e, "node failed"),
            Err(_) => warn!(%rank, "node panicked"),
        }
    }

    console.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stop_raised_once_nodes_exit() {
        let stop = AtomicBool::new(false);
        let workers = (1..=3)
            .map(|i| {
                let handle = thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * i));
                    if i == 2 {
                        Err(HeatgridError::Timeout(Duration::from_millis(5), "handshake"))
                    } else {
                        Ok(i)
                    }
                });
                (Rank(i as u32), handle)
            })
            .collect();

        let joined = join_workers(workers, &stop);
        assert!(stop.load(Ordering::Acquire));
        assert_eq!(joined.len(), 3);
        assert!(matches!(joined[0], (Rank(1), Ok(Ok(1)))));
        assert!(matches!(joined[1], (Rank(2), Ok(Err(HeatgridError::Timeout(..))))));
    }

    #[test]
    fn test_no_nodes_stops_immediately() {
        let stop = AtomicBool::new(false);
        let joined = join_workers::<()>(Vec::new(), &stop);
        assert!(joined.is_empty());
        assert!(stop.load(Ordering::Acquire));
    }
}
