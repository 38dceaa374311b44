//! In-process message fabric
//!
//! Each rank owns a mailbox (FIFO queue + condvar). Matching takes the
//! oldest message for a (source, tag) pair, so messages between two ranks
//! on one tag never overtake each other.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use heatgrid_core::{HeatgridError, HeatgridResult, Rank};
use heatgrid_wire::Tag;
use parking_lot::{Condvar, Mutex};

use crate::{Endpoint, Envelope, OpHandle, OpStatus, Source};

/// Queued message; `op` links it to the sender's non-blocking handle
struct Queued {
    op: Option<u64>,
    envelope: Envelope,
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Queued>>,
    ready: Condvar,
}

impl Mailbox {
    fn take_match(queue: &mut VecDeque<Queued>, source: Source, tag: Tag) -> Option<Envelope> {
        let pos = queue
            .iter()
            .position(|q| q.envelope.tag == tag && source.matches(q.envelope.source))?;
        queue.remove(pos).map(|q| q.envelope)
    }
}

struct Shared {
    mailboxes: Vec<Mailbox>,
    next_op: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn mailbox(&self, rank: Rank) -> HeatgridResult<&Mailbox> {
        self.mailboxes
            .get(rank.0 as usize)
            .ok_or(HeatgridError::UnknownRank(rank))
    }

    fn push(&self, dest: Rank, op: Option<u64>, envelope: Envelope) -> HeatgridResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HeatgridError::FabricClosed);
        }
        let mailbox = self.mailbox(dest)?;
        mailbox.queue.lock().push_back(Queued { op, envelope });
        mailbox.ready.notify_all();
        Ok(())
    }
}

/// In-process fabric connecting `world_size` ranks
#[derive(Clone)]
pub struct MemoryFabric {
    shared: Arc<Shared>,
}

impl MemoryFabric {
    pub fn new(world_size: usize) -> Self {
        MemoryFabric {
            shared: Arc::new(Shared {
                mailboxes: (0..world_size).map(|_| Mailbox::default()).collect(),
                next_op: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn world_size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    /// Endpoint for one rank
    pub fn endpoint(&self, rank: Rank) -> HeatgridResult<MemoryEndpoint> {
        self.shared.mailbox(rank)?;
        Ok(MemoryEndpoint {
            rank,
            shared: Arc::clone(&self.shared),
            ops: HashMap::new(),
        })
    }

    /// Messages waiting in a rank's mailbox
    pub fn queued(&self, rank: Rank) -> usize {
        self.shared
            .mailbox(rank)
            .map(|m| m.queue.lock().len())
            .unwrap_or(0)
    }

    /// Wake every blocked receiver and refuse further sends
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        for mailbox in &self.shared.mailboxes {
            let _guard = mailbox.queue.lock();
            mailbox.ready.notify_all();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

enum OpState {
    Send { dest: Rank, id: u64 },
    Recv { source: Rank, tag: Tag },
}

/// One rank's endpoint on a [`MemoryFabric`]
pub struct MemoryEndpoint {
    rank: Rank,
    shared: Arc<Shared>,
    ops: HashMap<OpHandle, OpState>,
}

impl MemoryEndpoint {
    fn own_mailbox(&self) -> &Mailbox {
        // Endpoints are only created for ranks that have a mailbox
        &self.shared.mailboxes[self.rank.0 as usize]
    }

    fn envelope(&self, tag: Tag, payload: Bytes) -> Envelope {
        Envelope {
            source: self.rank,
            tag,
            payload,
        }
    }
}

impl Endpoint for MemoryEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    fn send(&mut self, dest: Rank, tag: Tag, payload: Bytes) -> HeatgridResult<()> {
        tracing::trace!(from = %self.rank, to = %dest, ?tag, len = payload.len(), "send");
        let envelope = self.envelope(tag, payload);
        self.shared.push(dest, None, envelope)
    }

    fn recv(&mut self, source: Source, tag: Tag, timeout: Duration) -> HeatgridResult<Option<Envelope>> {
        let deadline = Instant::now() + timeout;
        let mailbox = self.own_mailbox();
        let mut queue = mailbox.queue.lock();
        loop {
            if let Some(envelope) = Mailbox::take_match(&mut queue, source, tag) {
                return Ok(Some(envelope));
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(HeatgridError::FabricClosed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            mailbox.ready.wait_for(&mut queue, deadline - now);
        }
    }

    fn try_recv(&mut self, source: Source, tag: Tag) -> HeatgridResult<Option<Envelope>> {
        let mut queue = self.own_mailbox().queue.lock();
        Ok(Mailbox::take_match(&mut queue, source, tag))
    }

    fn iprobe(&self, source: Source, tag: Tag) -> Option<Rank> {
        self.own_mailbox()
            .queue
            .lock()
            .iter()
            .find(|q| q.envelope.tag == tag && source.matches(q.envelope.source))
            .map(|q| q.envelope.source)
    }

    fn isend(&mut self, dest: Rank, tag: Tag, payload: Bytes) -> HeatgridResult<OpHandle> {
        let id = self.shared.next_op.fetch_add(1, Ordering::Relaxed);
        let envelope = self.envelope(tag, payload);
        self.shared.push(dest, Some(id), envelope)?;
        let handle = OpHandle(id);
        self.ops.insert(handle, OpState::Send { dest, id });
        Ok(handle)
    }

    fn irecv(&mut self, source: Rank, tag: Tag) -> OpHandle {
        let handle = OpHandle(self.shared.next_op.fetch_add(1, Ordering::Relaxed));
        self.ops.insert(handle, OpState::Recv { source, tag });
        handle
    }

    fn test(&mut self, op: OpHandle) -> OpStatus {
        let status = match self.ops.get(&op) {
            None => return OpStatus::Retired,
            Some(OpState::Send { dest, id }) => {
                let still_queued = self
                    .shared
                    .mailbox(*dest)
                    .map(|m| m.queue.lock().iter().any(|q| q.op == Some(*id)))
                    .unwrap_or(false);
                if still_queued {
                    OpStatus::Pending
                } else {
                    OpStatus::Sent
                }
            }
            Some(OpState::Recv { source, tag }) => {
                let mut queue = self.own_mailbox().queue.lock();
                match Mailbox::take_match(&mut queue, Source::Rank(*source), *tag) {
                    Some(envelope) => OpStatus::Received(envelope),
                    None => OpStatus::Pending,
                }
            }
        };
        if !status.is_pending() {
            self.ops.remove(&op);
        }
        status
    }

    fn cancel(&mut self, op: OpHandle) -> bool {
        match self.ops.remove(&op) {
            None => false,
            Some(OpState::Recv { .. }) => true,
            Some(OpState::Send { dest, id }) => {
                let Ok(mailbox) = self.shared.mailbox(dest) else {
                    return false;
                };
                let mut queue = mailbox.queue.lock();
                match queue.iter().position(|q| q.op == Some(id)) {
                    Some(pos) => {
                        queue.remove(pos);
                        true
                    }
                    // Receiver already took it: completed, nothing to undo
                    None => false,
                }
            }
        }
    }

    fn outstanding(&self) -> usize {
        self.ops.len()
    }
}
