//! Worker addresses collected at startup (used only for the run log)

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use heatgrid_core::{HeatgridResult, Rank};
use heatgrid_fabric::{Endpoint, Source};
use heatgrid_wire::{AddressRecord, Tag};
use tracing::{debug, warn};

#[derive(Clone, Debug, Default)]
pub struct AddressBook {
    entries: BTreeMap<Rank, AddressRecord>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rank: Rank, record: AddressRecord) {
        self.entries.insert(rank, record);
    }

    pub fn get(&self, rank: Rank) -> Option<&AddressRecord> {
        self.entries.get(&rank)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Receive one record from every worker, waiting at most `timeout` overall
    ///
    /// Missing workers are logged, not fatal. Malformed records are skipped.
    pub fn collect<E: Endpoint + ?Sized>(
        endpoint: &mut E,
        workers: usize,
        timeout: Duration,
    ) -> HeatgridResult<Self> {
        let mut book = AddressBook::new();
        let deadline = Instant::now() + timeout;

        while book.len() < workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(envelope) = endpoint.recv(Source::Any, Tag::Address, remaining)? else {
                break;
            };
            match AddressRecord::decode(&envelope.payload) {
                Ok(record) => {
                    debug!(rank = %envelope.source, mac = %record.mac, ip = %record.ip, "address registered");
                    book.insert(envelope.source, record);
                }
                Err(e) => warn!(rank = %envelope.source, error = %e, "malformed address record"),
            }
        }

        if book.len() < workers {
            warn!(received = book.len(), workers, "address collection incomplete");
        }
        Ok(book)
    }
}
