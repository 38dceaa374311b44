//! Endpoint interface consumed by nodes and the correlator

use std::time::Duration;

use bytes::Bytes;
use heatgrid_core::{HeatgridResult, Rank};
use heatgrid_wire::Tag;

/// Which sender a receive or probe matches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Any,
    Rank(Rank),
}

impl Source {
    #[inline]
    pub fn matches(self, rank: Rank) -> bool {
        match self {
            Source::Any => true,
            Source::Rank(r) => r == rank,
        }
    }
}

impl From<Rank> for Source {
    fn from(rank: Rank) -> Self {
        Source::Rank(rank)
    }
}

/// A delivered message
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub source: Rank,
    pub tag: Tag,
    pub payload: Bytes,
}

/// Handle to an outstanding non-blocking operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpHandle(pub u64);

/// Result of testing a non-blocking operation
#[derive(Clone, Debug, PartialEq)]
pub enum OpStatus {
    /// Not yet complete; test again later
    Pending,
    /// The send was matched by its receiver
    Sent,
    /// The receive matched a message
    Received(Envelope),
    /// The handle already completed or was cancelled
    Retired,
}

impl OpStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, OpStatus::Pending)
    }
}

/// One rank's view of the message fabric
pub trait Endpoint: Send {
    /// Rank of this endpoint
    fn rank(&self) -> Rank;

    /// Number of ranks in the world, correlator included
    fn world_size(&self) -> usize;

    /// Buffered send; returns once the message is queued at `dest`
    fn send(&mut self, dest: Rank, tag: Tag, payload: Bytes) -> HeatgridResult<()>;

    /// Blocking receive bounded by `timeout`; `Ok(None)` when it elapses
    fn recv(&mut self, source: Source, tag: Tag, timeout: Duration) -> HeatgridResult<Option<Envelope>>;

    /// Take a matching message if one is already waiting
    fn try_recv(&mut self, source: Source, tag: Tag) -> HeatgridResult<Option<Envelope>>;

    /// Is a matching message waiting, and from whom
    fn iprobe(&self, source: Source, tag: Tag) -> Option<Rank>;

    /// Non-blocking send, complete once the receiver takes the message
    fn isend(&mut self, dest: Rank, tag: Tag, payload: Bytes) -> HeatgridResult<OpHandle>;

    /// Non-blocking receive from `source`
    fn irecv(&mut self, source: Rank, tag: Tag) -> OpHandle;

    /// Advance and report the state of an outstanding operation
    fn test(&mut self, op: OpHandle) -> OpStatus;

    /// Cancel an outstanding operation. Returns `true` if something was
    /// cancelled; cancelling a completed or unknown handle is a no-op.
    fn cancel(&mut self, op: OpHandle) -> bool;

    /// Number of operations this endpoint still tracks
    fn outstanding(&self) -> usize;

    /// Send to every other rank; returns the number of messages sent
    fn broadcast(&mut self, tag: Tag, payload: Bytes) -> HeatgridResult<usize> {
        let me = self.rank();
        let mut sent = 0;
        for dest in (0..self.world_size() as u32).map(Rank) {
            if dest != me {
                self.send(dest, tag, payload.clone())?;
                sent += 1;
            }
        }
        Ok(sent)
    }
}
