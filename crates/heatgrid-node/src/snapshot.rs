//! Per-round view of neighbour readings

use heatgrid_core::{count_matches, NodeIdentity, Rank, Reading};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reply {
    Awaiting,
    Reading(Reading),
    /// Answered with a payload that did not decode; never counts as a match
    Malformed,
}

impl Reply {
    fn reading(self) -> Option<Reading> {
        match self {
            Reply::Reading(r) => Some(r),
            _ => None,
        }
    }
}

/// Neighbour identities with the readings collected during one quorum round.
/// Rebuilt from scratch at the start of every round.
#[derive(Clone, Debug, Default)]
pub struct NeighborSnapshot {
    entries: Vec<(NodeIdentity, Reply)>,
}

impl NeighborSnapshot {
    pub fn fresh(neighbors: &[NodeIdentity]) -> Self {
        NeighborSnapshot {
            entries: neighbors.iter().map(|n| (*n, Reply::Awaiting)).collect(),
        }
    }

    fn set(&mut self, rank: Rank, reply: Reply) -> bool {
        match self.entries.iter_mut().find(|(n, _)| n.rank == rank) {
            Some(entry) => {
                entry.1 = reply;
                true
            }
            None => false,
        }
    }

    /// Record a neighbour's reply; returns false for ranks outside the snapshot
    pub fn record(&mut self, rank: Rank, reading: Reading) -> bool {
        self.set(rank, Reply::Reading(reading))
    }

    /// Mark a neighbour as answered with an undecodable reply
    pub fn record_malformed(&mut self, rank: Rank) -> bool {
        self.set(rank, Reply::Malformed)
    }

    pub fn get(&self, rank: Rank) -> Option<NodeIdentity> {
        self.entries
            .iter()
            .find(|(n, _)| n.rank == rank)
            .and_then(|(n, r)| r.reading().map(|reading| n.with_reading(reading)))
    }

    /// Every neighbour has replied
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|(_, r)| *r != Reply::Awaiting)
    }

    pub fn awaiting(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, r)| *r == Reply::Awaiting)
            .count()
    }

    /// Neighbours that replied within `tolerance` of `local`
    pub fn matches(&self, local: Reading, tolerance: Reading) -> usize {
        count_matches(
            local,
            self.entries.iter().filter_map(|(_, r)| r.reading()),
            tolerance,
        )
    }

    /// Observed identities in neighbour order
    pub fn identities(&self) -> Vec<NodeIdentity> {
        self.entries
            .iter()
            .map(|(n, r)| n.with_reading(r.reading().unwrap_or(n.reading)))
            .collect()
    }
}
