//! Owned set of outstanding non-blocking operations

use heatgrid_fabric::{Endpoint, OpHandle, OpStatus};

/// Outstanding operations, each labelled with a caller-defined key
#[derive(Debug)]
pub struct InFlight<K> {
    entries: Vec<(K, OpHandle)>,
}

impl<K: Copy> InFlight<K> {
    pub fn new() -> Self {
        InFlight {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, key: K, op: OpHandle) {
        self.entries.push((key, op));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Test every operation once; completed ones are returned and dropped
    pub fn poll<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> Vec<(K, OpStatus)> {
        let mut completed = Vec::new();
        self.entries.retain(|(key, op)| match endpoint.test(*op) {
            OpStatus::Pending => true,
            status => {
                completed.push((*key, status));
                false
            }
        });
        completed
    }

    /// Cancel everything still held. Already-completed operations are
    /// no-ops; returns how many were actually withdrawn.
    pub fn cancel_all<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> usize {
        self.entries
            .drain(..)
            .filter(|(_, op)| endpoint.cancel(*op))
            .count()
    }
}

impl<K: Copy> Default for InFlight<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatgrid_core::Rank;
    use heatgrid_fabric::{MemoryFabric, Source};
    use heatgrid_wire::{encode_reading, Tag};

    #[test]
    fn test_poll_returns_completed_only() {
        let fabric = MemoryFabric::new(3);
        let mut a = fabric.endpoint(Rank(1)).unwrap();
        let mut b = fabric.endpoint(Rank(2)).unwrap();

        let mut inflight = InFlight::new();
        inflight.push(2u32, a.irecv(Rank(2), Tag::Reading));
        inflight.push(0u32, a.irecv(Rank(0), Tag::Reading));

        assert!(inflight.poll(&mut a).is_empty());
        b.send(Rank(1), Tag::Reading, encode_reading(80)).unwrap();

        let done = inflight.poll(&mut a);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].0, 2);
        assert!(matches!(done[0].1, OpStatus::Received(_)));
        assert_eq!(inflight.len(), 1);
    }

    #[test]
    fn test_cancel_all_is_safe_after_completion() {
        let fabric = MemoryFabric::new(3);
        let mut a = fabric.endpoint(Rank(1)).unwrap();
        let mut b = fabric.endpoint(Rank(2)).unwrap();

        let mut inflight = InFlight::new();
        inflight.push((), a.isend(Rank(2), Tag::Request, encode_reading(0)).unwrap());
        inflight.push((), a.isend(Rank(2), Tag::Request, encode_reading(0)).unwrap());
        inflight.push((), a.irecv(Rank(2), Tag::Reading));

        // One request is taken by the neighbour before cancellation
        b.try_recv(Source::Any, Tag::Request).unwrap().unwrap();

        assert_eq!(inflight.cancel_all(&mut a), 2);
        assert!(inflight.is_empty());
        assert_eq!(a.outstanding(), 0);
        assert_eq!(fabric.queued(Rank(2)), 0);

        // A second bulk cancel has nothing left to touch
        assert_eq!(inflight.cancel_all(&mut a), 0);
    }
}
