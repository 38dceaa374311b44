//! Heatgrid Test Harness - Whole-grid scenarios
//!
//! This crate provides:
//! - [`ScenarioHarness`]: one thread per worker plus the correlator, all
//!   connected by a [`heatgrid_fabric::MemoryFabric`]
//! - Canned scenarios: budget termination, operator stop, config rejection

pub mod scenario;

pub use scenario::*;
