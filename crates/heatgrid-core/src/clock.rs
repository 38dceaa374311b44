//! Wall clocks shared by nodes and the correlator
//!
//! Latency is measured across processes, so every clock reports wall time
//! since the Unix epoch rather than a process-local monotonic instant.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch with sub-second precision
    fn wall_secs(&self) -> f64;

    /// Whole seconds since the Unix epoch (the 64-bit wire timestamp)
    fn unix_secs(&self) -> i64 {
        self.wall_secs().floor() as i64
    }
}

/// Operating-system wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Hand-driven clock for deterministic tests
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start_secs: f64) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(start_secs)),
        }
    }

    pub fn set(&self, secs: f64) {
        *self.now.lock() = secs;
    }

    pub fn advance(&self, dt: Duration) {
        *self.now.lock() += dt.as_secs_f64();
    }
}

impl Clock for ManualClock {
    fn wall_secs(&self) -> f64 {
        *self.now.lock()
    }
}

/// Shared handle to any clock
pub type SharedClock = Arc<dyn Clock>;
