//! Termination coordinator
//!
//! One fire-and-forget termination message per worker. Nothing is awaited:
//! a worker that has already gone leaves its message unread.

use heatgrid_core::{HeatgridResult, Rank};
use heatgrid_fabric::Endpoint;
use heatgrid_wire::{encode_scalar, Tag, TERMINATE_MARKER};
use tracing::{debug, warn};

/// Send termination to every worker rank; returns how many sends succeeded
pub fn broadcast_termination<E: Endpoint + ?Sized>(
    endpoint: &mut E,
    workers: usize,
) -> HeatgridResult<usize> {
    let mut delivered = 0;
    for rank in Rank::workers(workers) {
        match endpoint.send(rank, Tag::Termination, encode_scalar(TERMINATE_MARKER)) {
            Ok(()) => delivered += 1,
            Err(e) => warn!(%rank, error = %e, "termination not delivered"),
        }
    }
    debug!(delivered, workers, "termination broadcast");
    Ok(delivered)
}
