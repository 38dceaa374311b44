//! Heatgrid Node - Per-worker event detection
//!
//! A node agent runs a single-threaded, non-blocking tick loop:
//! 1. Sense a reading
//! 2. Request neighbour readings when over threshold
//! 3. Serve neighbour requests (every tick, unconditionally)
//! 4. Poll for termination and cancel everything outstanding
//! 5. Evaluate quorum once every reply has arrived, and report

pub mod agent;
pub mod inflight;
pub mod sensor;
pub mod snapshot;
pub mod worker;

pub use agent::*;
pub use inflight::*;
pub use sensor::*;
pub use snapshot::*;
pub use worker::*;
