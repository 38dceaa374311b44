//! Reference table shared by the simulator (writer) and correlator (reader)
//!
//! Under [`Consistency::Relaxed`] timestamps and values sit behind two
//! independent locks. A reader may observe a slot's timestamp from one sweep
//! next to values from another; that skew is part of the model.
//! [`Consistency::Strict`] guards both groups with a single lock so every
//! slot read is a consistent pair.

use std::fmt::Write as _;

use heatgrid_core::{within_tolerance, Consistency, HeatgridError, HeatgridResult, Rank, Reading};
use parking_lot::Mutex;

/// Timestamp of a slot that has never been written
pub const UNSET: i64 = 0;

#[derive(Debug)]
struct Slots {
    timestamps: Vec<i64>,
    values: Vec<Vec<Reading>>,
}

#[derive(Debug)]
enum Storage {
    Relaxed {
        timestamps: Mutex<Vec<i64>>,
        values: Mutex<Vec<Vec<Reading>>>,
    },
    Strict(Mutex<Slots>),
}

/// What to look for in the table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Probe {
    /// Detection time of the report (unix seconds)
    pub timestamp: i64,
    pub rank: Rank,
    pub reading: Reading,
    pub window_secs: i64,
    pub tolerance: Reading,
}

/// Result of scanning the table for a probe
///
/// `sample_time` is the last stamped slot inspected and `sample_reading`
/// the last in-window reading seen; both stay 0 when nothing qualified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Verification {
    pub matched: bool,
    pub slot: Option<usize>,
    pub sample_time: i64,
    pub sample_reading: Reading,
}

impl Verification {
    fn inspect(
        &mut self,
        probe: &Probe,
        slot: usize,
        timestamp: i64,
        value: impl FnOnce() -> Option<Reading>,
    ) -> bool {
        if timestamp == UNSET {
            return false;
        }
        self.sample_time = timestamp;
        if timestamp.abs_diff(probe.timestamp) > probe.window_secs.max(0) as u64 {
            return false;
        }
        let Some(reading) = value() else {
            return false;
        };
        self.sample_reading = reading;
        if within_tolerance(reading, probe.reading, probe.tolerance) {
            self.matched = true;
            self.slot = Some(slot);
        }
        self.matched
    }
}

/// Cyclic, time-indexed table of synthetic readings for every worker
#[derive(Debug)]
pub struct ReferenceTable {
    slots: usize,
    workers: usize,
    storage: Storage,
}

impl ReferenceTable {
    pub fn new(slots: usize, workers: usize, consistency: Consistency) -> HeatgridResult<Self> {
        if slots == 0 {
            return Err(HeatgridError::InvalidConfig(
                "reference table needs at least one slot".into(),
            ));
        }
        let timestamps = vec![UNSET; slots];
        let values = vec![vec![0; workers]; slots];
        let storage = match consistency {
            Consistency::Relaxed => Storage::Relaxed {
                timestamps: Mutex::new(timestamps),
                values: Mutex::new(values),
            },
            Consistency::Strict => Storage::Strict(Mutex::new(Slots { timestamps, values })),
        };
        Ok(ReferenceTable {
            slots,
            workers,
            storage,
        })
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn consistency(&self) -> Consistency {
        match self.storage {
            Storage::Relaxed { .. } => Consistency::Relaxed,
            Storage::Strict(_) => Consistency::Strict,
        }
    }

    /// Stamp a slot. Indices wrap.
    pub fn write_timestamp(&self, slot: usize, timestamp: i64) {
        let slot = slot % self.slots;
        match &self.storage {
            Storage::Relaxed { timestamps, .. } => timestamps.lock()[slot] = timestamp,
            Storage::Strict(slots) => slots.lock().timestamps[slot] = timestamp,
        }
    }

    /// Store one reading per worker (by worker index) in a slot
    pub fn write_values(&self, slot: usize, readings: &[Reading]) {
        let slot = slot % self.slots;
        match &self.storage {
            Storage::Relaxed { values, .. } => copy_readings(&mut values.lock()[slot], readings),
            Storage::Strict(slots) => copy_readings(&mut slots.lock().values[slot], readings),
        }
    }

    /// Stamp and fill a slot
    ///
    /// Relaxed tables take the two locks one after the other; strict tables
    /// publish both under one.
    pub fn write_slot(&self, slot: usize, timestamp: i64, readings: &[Reading]) {
        match &self.storage {
            Storage::Relaxed { .. } => {
                self.write_timestamp(slot, timestamp);
                self.write_values(slot, readings);
            }
            Storage::Strict(slots) => {
                let slot = slot % self.slots;
                let mut guard = slots.lock();
                guard.timestamps[slot] = timestamp;
                copy_readings(&mut guard.values[slot], readings);
            }
        }
    }

    pub fn timestamp(&self, slot: usize) -> i64 {
        let slot = slot % self.slots;
        match &self.storage {
            Storage::Relaxed { timestamps, .. } => timestamps.lock()[slot],
            Storage::Strict(slots) => slots.lock().timestamps[slot],
        }
    }

    /// Reading recorded for `rank` in a slot
    pub fn value(&self, slot: usize, rank: Rank) -> Option<Reading> {
        let slot = slot % self.slots;
        let worker = rank.worker_index()?;
        match &self.storage {
            Storage::Relaxed { values, .. } => values.lock()[slot].get(worker).copied(),
            Storage::Strict(slots) => slots.lock().values[slot].get(worker).copied(),
        }
    }

    /// Scan slots in index order; the first in-window slot whose reading for
    /// the probe's rank is within tolerance decides a match
    pub fn verify(&self, probe: &Probe) -> Verification {
        let mut verification = Verification::default();
        let worker = probe.rank.worker_index();

        match &self.storage {
            Storage::Relaxed { timestamps, values } => {
                for slot in 0..self.slots {
                    let timestamp = timestamps.lock()[slot];
                    let value = || worker.and_then(|w| values.lock()[slot].get(w).copied());
                    if verification.inspect(probe, slot, timestamp, value) {
                        break;
                    }
                }
            }
            Storage::Strict(slots) => {
                for slot in 0..self.slots {
                    let guard = slots.lock();
                    let value = || worker.and_then(|w| guard.values[slot].get(w).copied());
                    if verification.inspect(probe, slot, guard.timestamps[slot], value) {
                        break;
                    }
                }
            }
        }
        verification
    }

    /// Dump every slot, one `TIME[i]` line followed by its values
    pub fn render(&self) -> String {
        let mut out = String::new();
        for slot in 0..self.slots {
            let _ = writeln!(out, "TIME[{}] = {}", slot, self.timestamp(slot));
            for rank in Rank::workers(self.workers) {
                let value = self.value(slot, rank).unwrap_or_default();
                let _ = writeln!(out, "  values[{}] = {}", rank, value);
            }
        }
        out
    }
}

fn copy_readings(slot: &mut [Reading], readings: &[Reading]) {
    for (dst, src) in slot.iter_mut().zip(readings) {
        *dst = *src;
    }
}
